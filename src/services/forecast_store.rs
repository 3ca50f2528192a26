use chrono::{Duration, NaiveDateTime};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseBackend, DatabaseConnection, DbErr, EntityTrait,
    FromQueryResult, QueryFilter, QueryOrder, QuerySelect, Set, Statement, TransactionTrait,
};

use crate::entities::{crypto_predictions, prelude::CryptoPredictions};
use crate::models::forecast::FuturePrediction;

/// Aggregate view of the stored forecasts for one symbol
#[derive(Debug, Clone, PartialEq, Eq, FromQueryResult)]
pub struct ForecastStats {
    pub total_predictions: i64,
    pub forecast_days: i64,
    pub first_forecast: Option<NaiveDateTime>,
    pub latest_forecast: Option<NaiveDateTime>,
}

/// Append one forecast run; every row shares `created_at`
pub async fn save_forecast(
    db: &DatabaseConnection,
    symbol: &str,
    predictions: &[FuturePrediction],
    created_at: NaiveDateTime,
) -> Result<u64, DbErr> {
    if predictions.is_empty() {
        return Ok(0);
    }

    let models = predictions.iter().map(|p| crypto_predictions::ActiveModel {
        ds: Set(p.date),
        yhat: Set(p.predicted_price),
        yhat_lower: Set(p.lower_bound),
        yhat_upper: Set(p.upper_bound),
        symbol: Set(symbol.to_string()),
        created_at: Set(created_at),
        ..Default::default()
    });

    let txn = db.begin().await?;
    let inserted = CryptoPredictions::insert_many(models)
        .exec_without_returning(&txn)
        .await?;
    txn.commit().await?;

    tracing::info!("Saved {} predictions for {} to crypto_predictions", inserted, symbol);
    Ok(inserted)
}

/// Delete forecasts for `symbol` created before `now - retention_days`
pub async fn prune_old_forecasts<C: ConnectionTrait>(
    db: &C,
    symbol: &str,
    retention_days: i64,
    now: NaiveDateTime,
) -> Result<u64, DbErr> {
    if retention_days < 1 {
        return Err(DbErr::Custom(format!(
            "retention must be at least one day, got {}",
            retention_days
        )));
    }
    // A window reaching past the earliest representable time keeps everything
    let Some(cutoff) = Duration::try_days(retention_days).and_then(|d| now.checked_sub_signed(d))
    else {
        tracing::debug!("Retention of {} days keeps every {} prediction", retention_days, symbol);
        return Ok(0);
    };

    let result = CryptoPredictions::delete_many()
        .filter(crypto_predictions::Column::Symbol.eq(symbol))
        .filter(crypto_predictions::Column::CreatedAt.lt(cutoff))
        .exec(db)
        .await?;

    if result.rows_affected > 0 {
        tracing::info!(
            "Removed {} predictions for {} older than {} days",
            result.rows_affected,
            symbol,
            retention_days
        );
    } else {
        tracing::debug!("No predictions for {} older than {}", symbol, cutoff);
    }

    Ok(result.rows_affected)
}

/// Newest stored rows for `symbol`, latest run first
pub async fn recent_forecasts<C: ConnectionTrait>(
    db: &C,
    symbol: &str,
    limit: u64,
) -> Result<Vec<crypto_predictions::Model>, DbErr> {
    CryptoPredictions::find()
        .filter(crypto_predictions::Column::Symbol.eq(symbol))
        .order_by_desc(crypto_predictions::Column::CreatedAt)
        .order_by_asc(crypto_predictions::Column::Ds)
        .limit(limit)
        .all(db)
        .await
}

pub async fn forecast_stats<C: ConnectionTrait>(db: &C, symbol: &str) -> Result<ForecastStats, DbErr> {
    let stats = ForecastStats::find_by_statement(Statement::from_sql_and_values(
        DatabaseBackend::Postgres,
        r#"
        SELECT
            COUNT(*) AS total_predictions,
            COUNT(DISTINCT DATE(created_at)) AS forecast_days,
            MIN(created_at) AS first_forecast,
            MAX(created_at) AS latest_forecast
        FROM crypto_predictions
        WHERE symbol = $1
        "#,
        [symbol.into()],
    ))
    .one(db)
    .await?;

    Ok(stats.unwrap_or(ForecastStats {
        total_predictions: 0,
        forecast_days: 0,
        first_forecast: None,
        latest_forecast: None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use sea_orm::{MockDatabase, MockExecResult};

    fn noon(month: u32, day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, month, day)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn test_prune_deletes_before_cutoff() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 60,
            }])
            .into_connection();

        let deleted = prune_old_forecasts(&db, "BTC", 30, noon(5, 31)).await.unwrap();
        assert_eq!(deleted, 60);

        let log = format!("{:?}", db.into_transaction_log());
        assert!(log.contains("DELETE FROM"));
        assert!(log.contains("crypto_predictions"));
        assert!(log.contains("< $2"));
        // 30 days before 2025-05-31 12:00
        assert!(log.contains("2025-05-01T12:00:00"));
        assert!(log.contains("BTC"));
    }

    #[tokio::test]
    async fn test_prune_rejects_non_positive_retention() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();

        for days in [0, -1] {
            let err = prune_old_forecasts(&db, "BTC", days, noon(5, 31)).await.unwrap_err();
            assert!(err.to_string().contains("at least one day"));
        }
        assert!(db.into_transaction_log().is_empty());
    }

    #[tokio::test]
    async fn test_prune_with_huge_retention_deletes_nothing() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();

        let deleted = prune_old_forecasts(&db, "BTC", i64::MAX, noon(5, 31)).await.unwrap();
        assert_eq!(deleted, 0);
        assert!(db.into_transaction_log().is_empty());
    }

    #[tokio::test]
    async fn test_prune_error_propagates() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_errors([DbErr::Custom("relation does not exist".to_string())])
            .into_connection();

        let err = prune_old_forecasts(&db, "BTC", 30, noon(5, 31)).await.unwrap_err();
        assert!(err.to_string().contains("relation does not exist"));
    }

    #[tokio::test]
    async fn test_save_forecast_shares_created_at() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 2,
            }])
            .into_connection();

        let predictions = vec![
            FuturePrediction {
                date: noon(6, 1),
                predicted_price: 101_000.0,
                lower_bound: 99_000.0,
                upper_bound: 103_000.0,
            },
            FuturePrediction {
                date: noon(6, 2),
                predicted_price: 101_500.0,
                lower_bound: 99_200.0,
                upper_bound: 103_800.0,
            },
        ];

        let saved = save_forecast(&db, "BTC", &predictions, noon(5, 31)).await.unwrap();
        assert_eq!(saved, 2);

        let log = format!("{:?}", db.into_transaction_log());
        assert!(log.contains("INSERT INTO"));
        assert!(log.contains("crypto_predictions"));
        assert_eq!(log.matches("2025-05-31T12:00:00").count(), 2);
    }

    #[tokio::test]
    async fn test_save_empty_forecast_is_noop() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        assert_eq!(save_forecast(&db, "BTC", &[], noon(5, 31)).await.unwrap(), 0);
        assert!(db.into_transaction_log().is_empty());
    }
}
