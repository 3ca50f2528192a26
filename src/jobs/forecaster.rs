use std::path::{Path, PathBuf};

use chrono::{NaiveDateTime, Utc};
use sea_orm::DatabaseConnection;

use crate::config::ForecastSettings;
use crate::error::Result;
use crate::models::forecast::FuturePrediction;
use crate::services::forecast_store;
use crate::services::price_history;
use crate::services::seasonal_model::{self, ModelConfig};
use crate::services::snapshot::write_csv;

const SUMMARY_ROWS: usize = 5;
const RECENT_FORECASTS_SHOWN: u64 = 3;

#[derive(Debug, Clone)]
pub struct ForecastRun {
    pub symbol: String,
    pub observations: usize,
    pub training_start: NaiveDateTime,
    pub training_end: NaiveDateTime,
    pub last_price: f64,
    pub predictions: Vec<FuturePrediction>,
    pub created_at: NaiveDateTime,
    pub saved: u64,
    pub pruned: u64,
    pub full_csv: PathBuf,
    pub future_csv: PathBuf,
}

/// Fit, write both CSVs, store the future slice and prune old runs
pub async fn run_forecast(
    db: &DatabaseConnection,
    settings: &ForecastSettings,
    output_dir: &Path,
) -> Result<ForecastRun> {
    let coin_id = settings.asset.coin_id;
    let symbol = settings.symbol();

    let history = price_history::load_price_series(db, coin_id).await?;
    tracing::info!("Loaded {} {} price records", history.len(), coin_id);

    let config = ModelConfig {
        changepoint_prior_scale: settings.changepoint_prior_scale,
        ..ModelConfig::default()
    };
    let frame = seasonal_model::forecast(&history, settings.horizon_days, config)?;

    // Non-empty: the fit rejects fewer than 2 points
    let (training_start, _) = history[0];
    let (training_end, last_price) = history[history.len() - 1];

    let predictions: Vec<FuturePrediction> = frame[history.len()..]
        .iter()
        .map(FuturePrediction::from)
        .collect();

    std::fs::create_dir_all(output_dir)?;
    let full_csv = output_dir.join(format!("{}_forecast_full.csv", coin_id));
    let future_csv = output_dir.join(format!("{}_forecast_{}days.csv", coin_id, settings.horizon_days));
    write_csv(&full_csv, &frame)?;
    write_csv(&future_csv, &predictions)?;
    tracing::info!("Saved forecasts to {} and {}", full_csv.display(), future_csv.display());

    let created_at = Utc::now().naive_utc();
    let saved = forecast_store::save_forecast(db, &symbol, &predictions, created_at).await?;
    let pruned =
        forecast_store::prune_old_forecasts(db, &symbol, settings.retention_days, created_at).await?;

    let run = ForecastRun {
        symbol,
        observations: history.len(),
        training_start,
        training_end,
        last_price,
        predictions,
        created_at,
        saved,
        pruned,
        full_csv,
        future_csv,
    };

    log_summary(&run);
    report_stored(db, &run.symbol).await?;

    Ok(run)
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}

fn log_summary(run: &ForecastRun) {
    tracing::info!("{} forecast summary", run.symbol);
    tracing::info!(
        "Training window: {} to {} ({} points)",
        run.training_start,
        run.training_end,
        run.observations
    );
    tracing::info!("Last actual price: ${:.2}", run.last_price);
    tracing::info!(
        "Mean predicted price: ${:.2}",
        mean(run.predictions.iter().map(|p| p.predicted_price))
    );
    tracing::info!(
        "Mean interval: ${:.2} to ${:.2}",
        mean(run.predictions.iter().map(|p| p.lower_bound)),
        mean(run.predictions.iter().map(|p| p.upper_bound))
    );

    for p in run.predictions.iter().take(SUMMARY_ROWS) {
        tracing::info!(
            "  {}: ${:.2} (${:.2} - ${:.2})",
            p.date.date(),
            p.predicted_price,
            p.lower_bound,
            p.upper_bound
        );
    }
}

async fn report_stored(db: &DatabaseConnection, symbol: &str) -> Result<()> {
    let recent = forecast_store::recent_forecasts(db, symbol, RECENT_FORECASTS_SHOWN).await?;
    tracing::info!("Most recent stored forecasts:");
    for row in recent {
        tracing::info!(
            "  {} -> ${:.2} (created {})",
            row.ds.date(),
            row.yhat,
            row.created_at
        );
    }

    let stats = forecast_store::forecast_stats(db, symbol).await?;
    tracing::info!(
        total = stats.total_predictions,
        forecast_days = stats.forecast_days,
        "Stored {} predictions for {} across {} days",
        stats.total_predictions,
        symbol,
        stats.forecast_days
    );
    if let (Some(first), Some(latest)) = (stats.first_forecast, stats.latest_forecast) {
        tracing::info!("  First forecast: {}, latest: {}", first, latest);
    }

    Ok(())
}
