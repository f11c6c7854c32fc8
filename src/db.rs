use crate::config::AppConfig;
use crate::entities;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, Schema,
};
use std::time::Duration;
use tracing::info;

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Establishes a connection pool to the database.
pub async fn establish_connection(database_url: &str) -> Result<DbPool, DbErr> {
    // An in-memory SQLite database exists per connection; anything more
    // than one pooled connection would see an empty schema.
    let max_connections = if database_url.starts_with("sqlite::memory:") {
        1
    } else {
        10
    };

    let mut opts = ConnectOptions::new(database_url.to_string());
    opts.max_connections(max_connections)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .acquire_timeout(Duration::from_secs(8))
        .sqlx_logging(false);

    let db = Database::connect(opts).await?;
    info!("database connection established");
    Ok(db)
}

pub async fn establish_connection_from_app_config(cfg: &AppConfig) -> Result<DbPool, DbErr> {
    establish_connection(&cfg.database_url).await
}

async fn create_table<E: EntityTrait>(db: &DbPool, entity: E) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);
    let mut stmt = schema.create_table_from_entity(entity);
    stmt.if_not_exists();
    db.execute(backend.build(&stmt)).await?;
    Ok(())
}

/// Create any missing tables from the entity definitions. Used on startup
/// when `auto_migrate` is enabled and by the test harness.
pub async fn ensure_schema(db: &DbPool) -> Result<(), DbErr> {
    create_table(db, entities::order::Entity).await?;
    create_table(db, entities::payment::Entity).await?;
    create_table(db, entities::payment_transaction::Entity).await?;
    create_table(db, entities::invoice::Entity).await?;
    create_table(db, entities::order_note::Entity).await?;
    info!("database schema verified");
    Ok(())
}
