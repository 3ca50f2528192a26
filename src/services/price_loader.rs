//! Incremental loader for crypto_prices
//!
//! Rows are keyed by (coin_id, timestamp). A batch is inserted in one
//! transaction with `ON CONFLICT (coin_id, timestamp) DO NOTHING`, so loading
//! the same observation twice leaves exactly one stored row. Large batches are
//! split into several statements inside that transaction to stay under the
//! Postgres bind parameter limit.

use std::collections::HashSet;

use chrono::NaiveDateTime;
use sea_orm::sea_query::OnConflict;
use sea_orm::{DatabaseConnection, DbErr, EntityTrait, TransactionTrait};
use tracing::{info, warn};

use crate::entities::{crypto_prices, prelude::CryptoPrices};
use crate::models::price_observation::PriceObservation;

/// 15 bound columns per row keeps one statement well below 65535 parameters
pub const INSERT_CHUNK_ROWS: usize = 1000;

/// Insert a batch, skipping rows whose natural key is already stored.
///
/// Returns the number of rows actually inserted. On error the transaction is
/// rolled back and the database error is returned.
pub async fn insert_observations(
    db: &DatabaseConnection,
    observations: &[PriceObservation],
) -> Result<u64, DbErr> {
    let batch = dedupe_by_natural_key(observations);

    if batch.is_empty() {
        warn!("No data to insert");
        return Ok(0);
    }

    if batch.len() < observations.len() {
        info!(
            duplicates = observations.len() - batch.len(),
            "Collapsed duplicate keys inside batch"
        );
    }

    let txn = db.begin().await?;
    let mut inserted = 0u64;

    for chunk in batch.chunks(INSERT_CHUNK_ROWS) {
        let models = chunk.iter().map(|obs| obs.to_active_model());
        let insert = CryptoPrices::insert_many(models).on_conflict(
            OnConflict::columns([crypto_prices::Column::CoinId, crypto_prices::Column::Timestamp])
                .do_nothing()
                .to_owned(),
        );

        match insert.exec_without_returning(&txn).await {
            Ok(n) => inserted += n,
            Err(e) => {
                if let Err(rollback_err) = txn.rollback().await {
                    warn!(error = %rollback_err, "Rollback after failed insert also failed");
                }
                return Err(e);
            }
        }
    }

    txn.commit().await?;
    info!(
        inserted = inserted,
        skipped = batch.len() as u64 - inserted.min(batch.len() as u64),
        "Inserted {} new rows into 'crypto_prices'",
        inserted
    );
    Ok(inserted)
}

/// Keep the first row for each (coin_id, timestamp), preserving order
pub fn dedupe_by_natural_key(observations: &[PriceObservation]) -> Vec<&PriceObservation> {
    let mut seen: HashSet<(&str, NaiveDateTime)> = HashSet::with_capacity(observations.len());
    observations
        .iter()
        .filter(|obs| seen.insert(obs.natural_key()))
        .collect()
}
