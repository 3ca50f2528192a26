use chrono::Utc;
use sea_orm::DatabaseConnection;

use crate::config::Settings;
use crate::error::{PipelineError, Result};
use crate::models::asset::TrackedAsset;
use crate::services::coingecko::CoinGeckoService;
use crate::services::price_history::{self, HistoryStats};
use crate::services::schema_reconciler::{self, SchemaAction};
use crate::services::{observations, price_loader, snapshot};

/// Rows the forecaster wants before it is worth running
pub const MIN_ROWS_FOR_FORECAST: i64 = 10;

const SPARSE_HISTORY_ROWS: i64 = 30;
const SPARSE_WINDOW_DAYS: u32 = 30;
const TOP_UP_WINDOW_DAYS: u32 = 7;

#[derive(Debug, Clone)]
pub struct BackfillRun {
    pub asset: TrackedAsset,
    pub days: u32,
    pub schema: SchemaAction,
    pub fetched: usize,
    pub inserted: u64,
    pub before: HistoryStats,
    pub after: HistoryStats,
}

impl BackfillRun {
    pub fn ready_for_forecast(&self) -> bool {
        self.after.count >= MIN_ROWS_FOR_FORECAST
    }
}

/// History window to request: a month while history is sparse, a week after
pub fn days_to_fetch(stored_rows: i64, days_override: Option<u32>) -> u32 {
    if let Some(days) = days_override {
        return days;
    }
    if stored_rows < SPARSE_HISTORY_ROWS {
        SPARSE_WINDOW_DAYS
    } else {
        TOP_UP_WINDOW_DAYS
    }
}

fn log_stats(label: &str, asset: &TrackedAsset, stats: &HistoryStats) {
    tracing::info!("{} - {} records: {}", label, asset.coin_id, stats.count);
    if let (Some(first), Some(last)) = (stats.first, stats.last) {
        tracing::info!("  Date range: {} to {}", first, last);
    }
}

pub async fn run(
    db: &DatabaseConnection,
    coingecko: &CoinGeckoService,
    settings: &Settings,
) -> Result<BackfillRun> {
    let asset = settings.backfill.asset;
    let started_at = Utc::now().naive_utc();

    // The table may not exist yet, and a recreated table starts empty
    let schema = schema_reconciler::reconcile_price_table(db).await?;
    let before = price_history::history_stats(db, asset.coin_id).await?;
    log_stats("Before", &asset, &before);

    let days = days_to_fetch(before.count, settings.backfill.days_override);
    tracing::info!("Fetching {} days of historical data for {}", days, asset.coin_id);

    let chart = coingecko.fetch_market_chart(asset.coin_id, days, "daily").await?;
    let rows = observations::from_market_chart(&chart, &asset);
    if rows.is_empty() {
        return Err(PipelineError::NoData(format!(
            "no historical data returned for {}",
            asset.coin_id
        )));
    }
    tracing::info!("Fetched {} historical records", rows.len());

    let stem = snapshot::history_stem(asset.coin_id, days, started_at);
    if let Err(e) = snapshot::write_observation_snapshots(&settings.data_dir, &stem, &rows) {
        tracing::error!("Failed to write snapshot files: {}", e);
    }

    let inserted = price_loader::insert_observations(db, &rows).await?;

    let after = price_history::history_stats(db, asset.coin_id).await?;
    log_stats("After", &asset, &after);

    match snapshot::count_data_files(&settings.data_dir) {
        Ok(count) => tracing::info!("Data files in {}: {}", settings.data_dir.display(), count),
        Err(e) => tracing::warn!("Could not list {}: {}", settings.data_dir.display(), e),
    }

    let run = BackfillRun {
        asset,
        days,
        schema,
        fetched: rows.len(),
        inserted,
        before,
        after,
    };

    if run.ready_for_forecast() {
        tracing::info!("Enough data for forecasting ({} records)", run.after.count);
    } else {
        tracing::warn!(
            "Only {} records for {}; forecasting needs at least {}",
            run.after.count,
            asset.coin_id,
            MIN_ROWS_FOR_FORECAST
        );
    }

    Ok(run)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_days_to_fetch() {
        assert_eq!(days_to_fetch(0, None), 30);
        assert_eq!(days_to_fetch(29, None), 30);
        assert_eq!(days_to_fetch(30, None), 7);
        assert_eq!(days_to_fetch(500, None), 7);
        assert_eq!(days_to_fetch(500, Some(90)), 90);
    }
}
