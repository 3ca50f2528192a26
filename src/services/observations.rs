//! Flattening of CoinGecko responses into [`PriceObservation`] rows
//!
//! A value that is absent, null, non-numeric or out of `Decimal` range becomes
//! `None`, which the loader writes as SQL NULL.

use chrono::{DateTime, NaiveDateTime};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::models::asset::TrackedAsset;
use crate::models::price_observation::PriceObservation;
use crate::services::coingecko::{CoinDetail, MarketChart};

/// Flatten a `/coins/{id}` snapshot stamped with `observed_at`.
///
/// Returns `None` when the response carries no `market_data` object at all.
pub fn from_snapshot(detail: &CoinDetail, observed_at: NaiveDateTime) -> Option<PriceObservation> {
    let market = detail.market_data.as_ref().filter(|v| v.is_object())?;

    let mut row = PriceObservation::new(observed_at, &detail.id, &detail.symbol, &detail.name);
    row.current_price_usd = usd_decimal(market, "current_price");
    row.market_cap_usd = usd_decimal(market, "market_cap");
    row.total_volume_usd = usd_decimal(market, "total_volume");
    row.price_change_24h = scalar_decimal(market, "price_change_24h");
    row.price_change_percentage_24h = scalar_decimal(market, "price_change_percentage_24h");
    row.circulating_supply = scalar_decimal(market, "circulating_supply");
    row.total_supply = scalar_decimal(market, "total_supply");
    row.ath = usd_decimal(market, "ath");
    row.ath_date = usd_datetime(market, "ath_date", &detail.id);
    row.atl = usd_decimal(market, "atl");
    row.atl_date = usd_datetime(market, "atl_date", &detail.id);

    Some(row)
}

/// Flatten a `/market_chart` window, one row per `prices` entry.
///
/// Market cap and volume are matched by position; the endpoint provides no
/// supply, change or ATH/ATL figures, so those stay NULL.
pub fn from_market_chart(chart: &MarketChart, asset: &TrackedAsset) -> Vec<PriceObservation> {
    let mut rows = Vec::with_capacity(chart.prices.len());

    for (i, (timestamp_ms, price)) in chart.prices.iter().enumerate() {
        let Some(timestamp) = DateTime::from_timestamp_millis(*timestamp_ms as i64) else {
            tracing::warn!("Skipping {} entry with invalid timestamp {}", asset.coin_id, timestamp_ms);
            continue;
        };

        let mut row = PriceObservation::new(
            timestamp.naive_utc(),
            asset.coin_id,
            asset.symbol,
            asset.name,
        );
        row.current_price_usd = price.and_then(to_decimal);
        row.market_cap_usd = chart.market_caps.get(i).and_then(|(_, v)| *v).and_then(to_decimal);
        row.total_volume_usd = chart.total_volumes.get(i).and_then(|(_, v)| *v).and_then(to_decimal);
        rows.push(row);
    }

    rows
}

fn to_decimal(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_f64_retain(value)
}

fn usd_decimal(market: &Value, field: &str) -> Option<Decimal> {
    market.get(field)?.get("usd")?.as_f64().and_then(to_decimal)
}

fn scalar_decimal(market: &Value, field: &str) -> Option<Decimal> {
    market.get(field)?.as_f64().and_then(to_decimal)
}

fn usd_datetime(market: &Value, field: &str, coin_id: &str) -> Option<NaiveDateTime> {
    let raw = market.get(field)?.get("usd")?.as_str()?;
    match DateTime::parse_from_rfc3339(raw) {
        Ok(parsed) => Some(parsed.naive_utc()),
        Err(e) => {
            tracing::warn!("Could not parse {} for {}: {} ({})", field, coin_id, raw, e);
            None
        }
    }
}
