use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

use crate::config::DatabaseSettings;

/// Open the job's single connection pool
pub async fn connect(settings: &DatabaseSettings) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(settings.connection_url());
    opt.max_connections(1)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);

    tracing::info!(
        "Connecting to PostgreSQL at {}:{}/{}",
        settings.host,
        settings.port,
        settings.dbname
    );

    Database::connect(opt).await
}
