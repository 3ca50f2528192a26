// src/lib.rs

pub mod config;
pub mod db;
pub mod error;
pub mod logging;

pub mod entities {
    pub mod prelude;
    pub mod crypto_predictions;
    pub mod crypto_prices;
}

pub mod services {
    pub mod coingecko;
    pub mod forecast_store;
    pub mod observations;
    pub mod price_history;
    pub mod price_loader;
    pub mod schema_reconciler;
    pub mod seasonal_model;
    pub mod snapshot;
}

pub mod jobs;
pub mod models;
