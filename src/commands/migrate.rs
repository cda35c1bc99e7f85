use std::{cmp, error::Error, process};

use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;

use crate::{
    cli::MigrateAction,
    config::{Config, StorageConfig},
    database::{migrations::Migrator, setup_database_connection},
};

pub async fn handle_migrate_command(config: &Config, action: MigrateAction) {
    let StorageConfig::Database(database) = &config.storage else {
        eprintln!("❌ Migrations need database storage, but storage type is 'memory'");
        process::exit(1);
    };

    let db = match setup_database_connection(database).await {
        Ok(db) => db,
        Err(e) => {
            eprintln!("❌ Could not connect to database: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = handle_migration_command(&db, action).await {
        eprintln!("❌ Migration failed: {e}");
        process::exit(1);
    }
}

pub async fn handle_migration_command(
    db: &DatabaseConnection,
    action: MigrateAction,
) -> Result<(), Box<dyn Error>> {
    match action {
        MigrateAction::Up { steps } => {
            let pending = Migrator::get_pending_migrations(db).await?;

            if pending.is_empty() {
                println!("✅ All migrations are already up to date");
                return Ok(());
            }

            let count = steps.map_or(pending.len(), |steps| {
                cmp::min(steps as usize, pending.len())
            });
            println!("Running {count} migration(s) up:");
            for migration in &pending[..count] {
                println!("  📄 {}", migration.name());
            }
            println!();

            Migrator::up(db, steps).await?;
            println!("✅ Migrations completed successfully");
        }
        MigrateAction::Down { steps } => {
            let applied = Migrator::get_applied_migrations(db).await?;

            if applied.is_empty() {
                println!("❌ No migrations to roll back");
                return Ok(());
            }

            let count = cmp::min(steps as usize, applied.len());
            println!("Rolling back {count} migration(s):");
            for migration in applied[applied.len() - count..].iter().rev() {
                println!("  📄 {}", migration.name());
            }
            println!();

            Migrator::down(db, Some(steps)).await?;
            println!("✅ Rollback completed successfully");
        }
        MigrateAction::Status => {
            let pending = Migrator::get_pending_migrations(db).await?;
            if pending.is_empty() {
                println!("✅ All migrations are up to date");
            } else {
                println!("📋 Pending migrations:");
                for migration in pending {
                    println!("  - {}", migration.name());
                }
            }

            println!("📋 Applied migrations:");
            for migration in Migrator::get_applied_migrations(db).await? {
                println!("  ✓ {}", migration.name());
            }
        }
    }

    Ok(())
}
