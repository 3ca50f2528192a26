use chrono::NaiveDateTime;
use serde::Serialize;

/// One row of the full fitted + predicted series
///
/// Components are additive: `yhat = trend + daily + weekly + yearly`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastRow {
    pub ds: NaiveDateTime,
    pub trend: f64,
    pub yhat_lower: f64,
    pub yhat_upper: f64,
    pub daily: f64,
    pub weekly: f64,
    pub yearly: f64,
    pub yhat: f64,
}

/// Future-only slice of a forecast, as written to the 30-day file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FuturePrediction {
    pub date: NaiveDateTime,
    pub predicted_price: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

impl From<&ForecastRow> for FuturePrediction {
    fn from(row: &ForecastRow) -> Self {
        Self {
            date: row.ds,
            predicted_price: row.yhat,
            lower_bound: row.yhat_lower,
            upper_bound: row.yhat_upper,
        }
    }
}
