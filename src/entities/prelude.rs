//! `SeaORM` Entity prelude

pub use super::crypto_predictions::Entity as CryptoPredictions;
pub use super::crypto_prices::Entity as CryptoPrices;
