use std::time::Duration;

use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Schema};
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::models;

pub type DbPool = DatabaseConnection;

/// Establishes a connection pool using the application's database settings.
pub async fn establish_connection_from_app_config(cfg: &AppConfig) -> Result<DbPool, DbErr> {
    debug!(url = %cfg.database_url, "configuring database connection");

    let mut opt = ConnectOptions::new(cfg.database_url.clone());
    opt.max_connections(cfg.db_max_connections)
        .min_connections(cfg.db_min_connections)
        .connect_timeout(Duration::from_secs(cfg.db_connect_timeout_secs))
        .acquire_timeout(Duration::from_secs(cfg.db_acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(cfg.db_idle_timeout_secs))
        .sqlx_logging(false);

    let pool = Database::connect(opt).await?;
    info!(
        max_connections = cfg.db_max_connections,
        "database connection pool established"
    );
    Ok(pool)
}

/// Creates any missing tables from the entity definitions. Used by tests and
/// sqlite-backed development environments; production schemas are managed
/// outside this service.
pub async fn ensure_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let mut statements = vec![
        schema.create_table_from_entity(models::rate_table::Entity),
        schema.create_table_from_entity(models::job_pricing::Entity),
        schema.create_table_from_entity(models::purchase_order::Entity),
        schema.create_table_from_entity(models::invoice::Entity),
        schema.create_table_from_entity(models::reconciliation_audit::Entity),
    ];

    for statement in &mut statements {
        statement.if_not_exists();
        db.execute(backend.build(&*statement)).await?;
    }

    Ok(())
}
