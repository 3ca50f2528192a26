use std::process::ExitCode;

use migration::Migrator;
use sea_orm_migration::MigratorTrait;

use crypto_pipeline::config::{self, Settings};
use crypto_pipeline::error::Result;
use crypto_pipeline::jobs::forecaster;
use crypto_pipeline::logging;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let _guard = logging::init_tracing(None);

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Forecast failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    config::load_env_file();
    let settings = Settings::from_env()?;

    let db = crypto_pipeline::db::connect(&settings.database).await?;

    tracing::info!("Running migrations...");
    let outcome = match Migrator::up(&db, None).await {
        Ok(()) => forecaster::run_forecast(&db, &settings.forecast, &settings.data_dir).await,
        Err(e) => Err(e.into()),
    };
    db.close().await?;

    let summary = outcome?;
    tracing::info!(
        "Stored {} predictions for {}, pruned {} expired rows",
        summary.saved,
        summary.symbol,
        summary.pruned
    );
    Ok(())
}
