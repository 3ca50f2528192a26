use std::process::ExitCode;

use crypto_pipeline::config::{self, Settings};
use crypto_pipeline::error::Result;
use crypto_pipeline::jobs::backfill;
use crypto_pipeline::logging;
use crypto_pipeline::services::coingecko::CoinGeckoService;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let _guard = logging::init_tracing(None);

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Backfill failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    config::load_env_file();
    let settings = Settings::from_env()?;

    let db = crypto_pipeline::db::connect(&settings.database).await?;
    let coingecko = CoinGeckoService::new(&settings.coingecko);

    let outcome = backfill::run(&db, &coingecko, &settings).await;
    db.close().await?;

    let summary = outcome?;
    tracing::info!(
        "Backfilled {} days for {}: {} fetched, {} new rows ({} -> {} stored)",
        summary.days,
        summary.asset.coin_id,
        summary.fetched,
        summary.inserted,
        summary.before.count,
        summary.after.count
    );
    Ok(())
}
