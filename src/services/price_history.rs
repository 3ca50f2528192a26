use chrono::NaiveDateTime;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseBackend, DbErr, EntityTrait, FromQueryResult,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Statement,
};

use crate::entities::{crypto_prices, prelude::CryptoPrices};

/// Stored history for one coin
#[derive(Debug, Clone, PartialEq, Eq, FromQueryResult)]
pub struct HistoryStats {
    pub count: i64,
    pub first: Option<NaiveDateTime>,
    pub last: Option<NaiveDateTime>,
}

/// Row shown in the post-load report
#[derive(Debug, Clone, PartialEq, Eq, FromQueryResult)]
pub struct RecentPrice {
    pub symbol: String,
    pub current_price_usd: Option<Decimal>,
    pub timestamp: NaiveDateTime,
}

#[derive(Debug, FromQueryResult)]
struct PricePoint {
    timestamp: NaiveDateTime,
    current_price_usd: Option<Decimal>,
}

pub async fn history_stats<C: ConnectionTrait>(db: &C, coin_id: &str) -> Result<HistoryStats, DbErr> {
    let stats = HistoryStats::find_by_statement(Statement::from_sql_and_values(
        DatabaseBackend::Postgres,
        r#"
        SELECT COUNT(*) AS count, MIN(timestamp) AS first, MAX(timestamp) AS last
        FROM crypto_prices
        WHERE coin_id = $1
        "#,
        [coin_id.into()],
    ))
    .one(db)
    .await?;

    Ok(stats.unwrap_or(HistoryStats {
        count: 0,
        first: None,
        last: None,
    }))
}

pub async fn total_rows<C: ConnectionTrait>(db: &C) -> Result<u64, DbErr> {
    CryptoPrices::find().count(db).await
}

/// Most recent rows across all coins, newest first
pub async fn recent_prices<C: ConnectionTrait>(db: &C, limit: u64) -> Result<Vec<RecentPrice>, DbErr> {
    CryptoPrices::find()
        .select_only()
        .column(crypto_prices::Column::Symbol)
        .column(crypto_prices::Column::CurrentPriceUsd)
        .column(crypto_prices::Column::Timestamp)
        .order_by_desc(crypto_prices::Column::Timestamp)
        .limit(limit)
        .into_model::<RecentPrice>()
        .all(db)
        .await
}

/// Full price series for one coin, oldest first, with NULL prices dropped
pub async fn load_price_series<C: ConnectionTrait>(
    db: &C,
    coin_id: &str,
) -> Result<Vec<(NaiveDateTime, f64)>, DbErr> {
    let rows = CryptoPrices::find()
        .select_only()
        .column(crypto_prices::Column::Timestamp)
        .column(crypto_prices::Column::CurrentPriceUsd)
        .filter(crypto_prices::Column::CoinId.eq(coin_id))
        .order_by_asc(crypto_prices::Column::Timestamp)
        .into_model::<PricePoint>()
        .all(db)
        .await?;

    let total = rows.len();
    let series: Vec<(NaiveDateTime, f64)> = rows
        .into_iter()
        .filter_map(|row| Some((row.timestamp, row.current_price_usd?.to_f64()?)))
        .collect();

    if series.len() < total {
        tracing::debug!(
            "Dropped {} rows without a usable price for {}",
            total - series.len(),
            coin_id
        );
    }

    Ok(series)
}
