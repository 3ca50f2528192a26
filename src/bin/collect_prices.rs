use std::process::ExitCode;

use crypto_pipeline::config::{self, Settings};
use crypto_pipeline::error::Result;
use crypto_pipeline::jobs::collector;
use crypto_pipeline::logging;
use crypto_pipeline::services::coingecko::CoinGeckoService;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let _guard = logging::init_tracing(Some("crypto_etl.log"));

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("ETL process failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    config::load_env_file();
    let settings = Settings::from_env()?;

    let db = crypto_pipeline::db::connect(&settings.database).await?;
    let coingecko = CoinGeckoService::new(&settings.coingecko);

    let outcome = collector::run(&db, &coingecko, &settings).await;
    db.close().await?;

    let summary = outcome?;
    if !summary.skipped.is_empty() {
        tracing::warn!("Skipped coins: {}", summary.skipped.join(", "));
    }
    tracing::info!(
        "Collected {} coins, inserted {} new rows",
        summary.fetched,
        summary.inserted
    );
    Ok(())
}
