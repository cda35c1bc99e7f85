pub use sea_orm_migration::prelude::*;

mod m20260110_090000_create_kv_entry;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20260110_090000_create_kv_entry::Migration)]
    }
}

pub struct Migrator;
