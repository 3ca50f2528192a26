use chrono::{NaiveDateTime, Utc};
use sea_orm::DatabaseConnection;

use crate::config::Settings;
use crate::error::Result;
use crate::models::asset::TrackedAsset;
use crate::models::price_observation::PriceObservation;
use crate::services::coingecko::CoinGeckoService;
use crate::services::schema_reconciler::{self, SchemaAction};
use crate::services::{observations, price_history, price_loader, snapshot};

const RECENT_ROWS_SHOWN: u64 = 10;

/// Result of polling one coin
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Fetched(Box<PriceObservation>),
    Skipped { coin_id: String, reason: String },
}

#[derive(Debug, Clone)]
pub struct CollectorRun {
    pub fetched: usize,
    pub skipped: Vec<String>,
    /// None when nothing was fetched and the database was left alone
    pub schema: Option<SchemaAction>,
    pub inserted: u64,
}

/// Poll one coin. Network and decode failures skip the coin instead of failing the run.
pub async fn fetch_asset(
    coingecko: &CoinGeckoService,
    asset: &TrackedAsset,
    observed_at: NaiveDateTime,
) -> FetchOutcome {
    tracing::info!("Fetching data for {}...", asset.coin_id);

    let detail = match coingecko.fetch_coin_snapshot(asset.coin_id).await {
        Ok(detail) => detail,
        Err(e) => {
            tracing::warn!("Error fetching {}: {}", asset.coin_id, e);
            return FetchOutcome::Skipped {
                coin_id: asset.coin_id.to_string(),
                reason: e.to_string(),
            };
        }
    };

    match observations::from_snapshot(&detail, observed_at) {
        Some(row) => {
            tracing::info!("Successfully fetched {}", asset.coin_id);
            FetchOutcome::Fetched(Box::new(row))
        }
        None => {
            tracing::warn!("No market data in response for {}", asset.coin_id);
            FetchOutcome::Skipped {
                coin_id: asset.coin_id.to_string(),
                reason: "missing market_data".to_string(),
            }
        }
    }
}

/// Poll every coin in order, one request at a time
pub async fn fetch_batch(
    coingecko: &CoinGeckoService,
    assets: &[TrackedAsset],
    observed_at: NaiveDateTime,
) -> (Vec<PriceObservation>, Vec<String>) {
    let mut rows = Vec::with_capacity(assets.len());
    let mut skipped = Vec::new();

    for asset in assets {
        match fetch_asset(coingecko, asset, observed_at).await {
            FetchOutcome::Fetched(row) => rows.push(*row),
            FetchOutcome::Skipped { coin_id, .. } => skipped.push(coin_id),
        }
    }

    (rows, skipped)
}

/// One collector pass: fetch, snapshot, reconcile, load, report
pub async fn run(
    db: &DatabaseConnection,
    coingecko: &CoinGeckoService,
    settings: &Settings,
) -> Result<CollectorRun> {
    let observed_at = Utc::now().naive_utc();
    tracing::info!("Starting ETL process at {}", observed_at);

    let (rows, skipped) = fetch_batch(coingecko, &settings.coins, observed_at).await;
    tracing::info!(
        fetched = rows.len(),
        skipped = skipped.len(),
        "Fetched data for {} of {} coins",
        rows.len(),
        settings.coins.len()
    );

    if rows.is_empty() {
        tracing::warn!("No data fetched. Exiting.");
        return Ok(CollectorRun {
            fetched: 0,
            skipped,
            schema: None,
            inserted: 0,
        });
    }

    let stem = snapshot::collector_stem(observed_at);
    if let Err(e) = snapshot::write_observation_snapshots(&settings.data_dir, &stem, &rows) {
        tracing::error!("Failed to write snapshot files: {}", e);
    }

    let schema = schema_reconciler::reconcile_price_table(db).await?;
    let inserted = price_loader::insert_observations(db, &rows).await?;

    report(db).await?;

    tracing::info!("ETL process completed");

    Ok(CollectorRun {
        fetched: rows.len(),
        skipped,
        schema: Some(schema),
        inserted,
    })
}

async fn report(db: &DatabaseConnection) -> Result<()> {
    let total = price_history::total_rows(db).await?;
    tracing::info!("Total records in database: {}", total);

    let recent = price_history::recent_prices(db, RECENT_ROWS_SHOWN).await?;
    tracing::info!("Most recent {} records:", recent.len());
    for row in recent {
        let price = row
            .current_price_usd
            .map(|p| format!("${}", p.round_dp(2)))
            .unwrap_or_else(|| "n/a".to_string());
        tracing::info!("  {}: {} at {}", row.symbol.to_uppercase(), price, row.timestamp);
    }

    Ok(())
}
