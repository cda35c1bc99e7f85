use sea_orm::{ConnectOptions, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use tracing::debug;

use crate::config::DatabaseConfig;

pub mod migrations;
pub(crate) mod models;

/// Connect and bring the schema up to date.
pub async fn setup_database(db_config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let connection = setup_database_connection(db_config).await?;

    migrations::Migrator::up(&connection, None).await?;
    debug!("Database migrations applied");

    Ok(connection)
}

pub async fn setup_database_connection(
    db_config: &DatabaseConfig,
) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(db_config.url.clone());

    options.sqlx_logging(false); // Disable SQL query logging to reduce noise
    options.max_connections(db_config.pool_size);

    debug!("Connecting to database at: {}", &db_config.url);

    sea_orm::Database::connect(options).await
}
