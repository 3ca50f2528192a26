use std::process::ExitCode;

use sea_orm::{DatabaseBackend, DatabaseConnection, FromQueryResult, Statement};

use crypto_pipeline::config::{self, DatabaseSettings};
use crypto_pipeline::error::Result;
use crypto_pipeline::logging;

#[derive(Debug, FromQueryResult)]
struct Version {
    version: String,
}

#[derive(Debug, FromQueryResult)]
struct Name {
    name: String,
}

#[derive(Debug, FromQueryResult)]
struct Grant {
    table_name: String,
    privilege_type: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let _guard = logging::init_tracing(None);

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Connection check failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    config::load_env_file();
    let settings = DatabaseSettings::from_env()?;

    tracing::info!("Database connection parameters:");
    settings.log_summary();

    let db = crypto_pipeline::db::connect(&settings).await?;
    tracing::info!("Connection successful");

    let outcome = inspect(&db).await;
    db.close().await?;
    outcome
}

fn statement(sql: &str) -> Statement {
    Statement::from_string(DatabaseBackend::Postgres, sql.to_string())
}

async fn inspect(db: &DatabaseConnection) -> Result<()> {
    if let Some(v) = Version::find_by_statement(statement("SELECT version() AS version"))
        .one(db)
        .await?
    {
        tracing::info!("PostgreSQL version: {}", v.version);
    }

    let databases = Name::find_by_statement(statement(
        "SELECT datname::text AS name FROM pg_database WHERE datistemplate = false ORDER BY datname",
    ))
    .all(db)
    .await?;
    tracing::info!("Available databases:");
    for d in databases {
        tracing::info!("  - {}", d.name);
    }

    let tables = Name::find_by_statement(statement(
        "SELECT table_name::text AS name FROM information_schema.tables \
         WHERE table_schema = 'public' ORDER BY table_name",
    ))
    .all(db)
    .await?;
    tracing::info!("Tables in public schema: {}", tables.len());
    for t in tables {
        tracing::info!("  - {}", t.name);
    }

    let grants = Grant::find_by_statement(statement(
        "SELECT table_name::text AS table_name, privilege_type::text AS privilege_type \
         FROM information_schema.role_table_grants \
         WHERE grantee = current_user AND table_schema = 'public' \
         ORDER BY table_name, privilege_type",
    ))
    .all(db)
    .await?;
    tracing::info!("Table privileges for current user: {}", grants.len());
    for g in grants {
        tracing::info!("  - {}: {}", g.table_name, g.privilege_type);
    }

    Ok(())
}
