use sea_orm_migration::{
    prelude::*,
    schema::{json, string},
};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Jobs, ledgers and the id index all live in this one table as JSON
        manager
            .create_table(
                Table::create()
                    .table(KvEntry::Table)
                    .if_not_exists()
                    .col(string(KvEntry::Key).primary_key())
                    .col(json(KvEntry::Value))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(KvEntry::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum KvEntry {
    Table,
    Key,
    Value,
}
