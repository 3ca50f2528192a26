use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use sea_orm::{ActiveValue::NotSet, Set};
use serde::Serialize;

use crate::entities::crypto_prices;

/// One flattened market-data row, keyed by (coin_id, timestamp)
///
/// Field order matches the CSV snapshot column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceObservation {
    pub timestamp: NaiveDateTime,
    pub coin_id: String,
    pub symbol: String,
    pub name: String,
    pub current_price_usd: Option<Decimal>,
    pub market_cap_usd: Option<Decimal>,
    pub total_volume_usd: Option<Decimal>,
    pub price_change_24h: Option<Decimal>,
    pub price_change_percentage_24h: Option<Decimal>,
    pub circulating_supply: Option<Decimal>,
    pub total_supply: Option<Decimal>,
    pub ath: Option<Decimal>,
    pub ath_date: Option<NaiveDateTime>,
    pub atl: Option<Decimal>,
    pub atl_date: Option<NaiveDateTime>,
}

impl PriceObservation {
    /// Row with only the identifying fields set
    pub fn new(
        timestamp: NaiveDateTime,
        coin_id: impl Into<String>,
        symbol: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            coin_id: coin_id.into(),
            symbol: symbol.into(),
            name: name.into(),
            current_price_usd: None,
            market_cap_usd: None,
            total_volume_usd: None,
            price_change_24h: None,
            price_change_percentage_24h: None,
            circulating_supply: None,
            total_supply: None,
            ath: None,
            ath_date: None,
            atl: None,
            atl_date: None,
        }
    }

    pub fn natural_key(&self) -> (&str, NaiveDateTime) {
        (&self.coin_id, self.timestamp)
    }

    /// Every data column is `Set`, so absent values are written as NULL.
    /// `id` and `created_at` are left to the table defaults.
    pub fn to_active_model(&self) -> crypto_prices::ActiveModel {
        crypto_prices::ActiveModel {
            id: NotSet,
            timestamp: Set(self.timestamp),
            coin_id: Set(self.coin_id.clone()),
            symbol: Set(self.symbol.clone()),
            name: Set(self.name.clone()),
            current_price_usd: Set(self.current_price_usd),
            market_cap_usd: Set(self.market_cap_usd),
            total_volume_usd: Set(self.total_volume_usd),
            price_change_24h: Set(self.price_change_24h),
            price_change_percentage_24h: Set(self.price_change_percentage_24h),
            circulating_supply: Set(self.circulating_supply),
            total_supply: Set(self.total_supply),
            ath: Set(self.ath),
            ath_date: Set(self.ath_date),
            atl: Set(self.atl),
            atl_date: Set(self.atl_date),
            created_at: NotSet,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, day)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_active_model_keeps_nulls_as_set_none() {
        let mut obs = PriceObservation::new(at(1), "bitcoin", "btc", "Bitcoin");
        obs.current_price_usd = Some(Decimal::new(8_512_345, 2));

        let model = obs.to_active_model();
        assert_eq!(model.current_price_usd, Set(Some(Decimal::new(8_512_345, 2))));
        assert_eq!(model.market_cap_usd, Set(None));
        assert_eq!(model.ath_date, Set(None));
        assert_eq!(model.id, NotSet);
        assert_eq!(model.created_at, NotSet);
    }

    #[test]
    fn test_natural_key() {
        let obs = PriceObservation::new(at(2), "cardano", "ada", "Cardano");
        assert_eq!(obs.natural_key(), ("cardano", at(2)));
    }
}
