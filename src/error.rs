use thiserror::Error;

use crate::config::ConfigError;
use crate::services::coingecko::CoinGeckoError;
use crate::services::seasonal_model::ForecastError;

/// Job-level error; anything that reaches a binary ends the run with exit 1
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("CoinGecko error: {0}")]
    CoinGecko(#[from] CoinGeckoError),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Forecast error: {0}")]
    Forecast(#[from] ForecastError),

    // File output errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Snapshot encoding error: {0}")]
    Encode(#[from] bincode::Error),

    #[error("No data: {0}")]
    NoData(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapped_errors_keep_their_message() {
        let err: PipelineError = ConfigError::MissingVars(vec!["POSTGRES_HOST"]).into();
        assert_eq!(
            err.to_string(),
            "Configuration error: missing environment variables: POSTGRES_HOST"
        );

        let err: PipelineError = ForecastError::InsufficientData(1).into();
        assert!(err.to_string().starts_with("Forecast error: need at least 2"));

        let err: PipelineError = sea_orm::DbErr::Custom("boom".to_string()).into();
        assert!(err.to_string().contains("boom"));
    }
}
