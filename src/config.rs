//! Process configuration
//!
//! Every job builds one [`Settings`] at start-up from the environment (after
//! loading the local `env` file) and passes it down explicitly.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::models::asset::{self, TrackedAsset};

pub const ENV_POSTGRES_HOST: &str = "POSTGRES_HOST";
pub const ENV_POSTGRES_PORT: &str = "POSTGRES_PORT";
pub const ENV_POSTGRES_DB: &str = "POSTGRES_DB";
pub const ENV_POSTGRES_USER: &str = "POSTGRES_USER";
pub const ENV_POSTGRES_PASSWORD: &str = "POSTGRES_PASSWORD";

const ENV_COINGECKO_BASE_URL: &str = "COINGECKO_BASE_URL";
const ENV_COINGECKO_API_KEY: &str = "COINGECKO_API_KEY";
const ENV_DATA_DIR: &str = "CRYPTO_DATA_DIR";
const ENV_BACKFILL_COIN_ID: &str = "BACKFILL_COIN_ID";
const ENV_BACKFILL_DAYS: &str = "BACKFILL_DAYS";
const ENV_FORECAST_COIN_ID: &str = "FORECAST_COIN_ID";
const ENV_FORECAST_RETENTION_DAYS: &str = "FORECAST_RETENTION_DAYS";

const DEFAULT_COINGECKO_BASE_URL: &str = "https://api.coingecko.com/api/v3";
const DEFAULT_DATA_DIR: &str = "crypto_data";
const DEFAULT_ASSET: &str = "bitcoin";

/// Snapshot endpoint timeout
const SNAPSHOT_TIMEOUT_SECS: u64 = 10;
/// Historical window endpoint timeout
const HISTORY_TIMEOUT_SECS: u64 = 30;

pub const FORECAST_HORIZON_DAYS: u32 = 30;
pub const DEFAULT_RETENTION_DAYS: i64 = 30;
/// Accepted FORECAST_RETENTION_DAYS range
pub const RETENTION_DAYS_RANGE: std::ops::RangeInclusive<i64> = 1..=36_500;
pub const CHANGEPOINT_PRIOR_SCALE: f64 = 0.05;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing environment variables: {}", .0.join(", "))]
    MissingVars(Vec<&'static str>),
    #[error("invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },
}

/// Load the local `env` file, falling back to `.env`. Variables already present
/// in the process environment win.
pub fn load_env_file() {
    if dotenvy::from_filename("env").is_err() {
        dotenvy::dotenv().ok();
    }
}

#[derive(Clone)]
pub struct DatabaseSettings {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
}

impl DatabaseSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary lookup. Empty values count as missing, and every
    /// missing variable is reported at once.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = [
            ENV_POSTGRES_HOST,
            ENV_POSTGRES_PORT,
            ENV_POSTGRES_DB,
            ENV_POSTGRES_USER,
            ENV_POSTGRES_PASSWORD,
        ];

        let values: Vec<Option<String>> = required
            .iter()
            .map(|key| lookup(key).filter(|v| !v.trim().is_empty()))
            .collect();

        let missing: Vec<&'static str> = required
            .iter()
            .zip(&values)
            .filter(|(_, v)| v.is_none())
            .map(|(key, _)| *key)
            .collect();

        if !missing.is_empty() {
            return Err(ConfigError::MissingVars(missing));
        }

        let mut values = values.into_iter().flatten();
        let mut next = || values.next().unwrap_or_default();
        let host = next();
        let port_raw = next();
        let dbname = next();
        let user = next();
        let password = next();

        let port = port_raw
            .trim()
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidValue {
                var: ENV_POSTGRES_PORT,
                value: port_raw.clone(),
            })?;

        Ok(Self {
            host,
            port,
            dbname,
            user,
            password,
        })
    }

    /// `postgres://` URL with user and password percent-encoded
    pub fn connection_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            urlencoding::encode(&self.user),
            urlencoding::encode(&self.password),
            self.host,
            self.port,
            self.dbname
        )
    }

    pub fn masked_password(&self) -> String {
        "*".repeat(self.password.chars().count())
    }

    pub fn log_summary(&self) {
        tracing::info!("Host: {}", self.host);
        tracing::info!("Port: {}", self.port);
        tracing::info!("Database: {}", self.dbname);
        tracing::info!("User: {}", self.user);
        tracing::info!("Password: {}", self.masked_password());
    }
}

impl fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &self.masked_password())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct CoinGeckoSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub snapshot_timeout: Duration,
    pub history_timeout: Duration,
}

impl Default for CoinGeckoSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_COINGECKO_BASE_URL.to_string(),
            api_key: None,
            snapshot_timeout: Duration::from_secs(SNAPSHOT_TIMEOUT_SECS),
            history_timeout: Duration::from_secs(HISTORY_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BackfillSettings {
    pub asset: TrackedAsset,
    /// Fixed window; when unset the window adapts to how much history is stored
    pub days_override: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct ForecastSettings {
    pub asset: TrackedAsset,
    pub horizon_days: u32,
    pub retention_days: i64,
    pub changepoint_prior_scale: f64,
}

impl ForecastSettings {
    /// Symbol tag written to the predictions table, e.g. "BTC"
    pub fn symbol(&self) -> String {
        self.asset.symbol.to_uppercase()
    }
}

impl Default for ForecastSettings {
    fn default() -> Self {
        Self {
            asset: asset::BITCOIN,
            horizon_days: FORECAST_HORIZON_DAYS,
            retention_days: DEFAULT_RETENTION_DAYS,
            changepoint_prior_scale: CHANGEPOINT_PRIOR_SCALE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub coingecko: CoinGeckoSettings,
    pub data_dir: PathBuf,
    pub coins: Vec<TrackedAsset>,
    pub backfill: BackfillSettings,
    pub forecast: ForecastSettings,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database = DatabaseSettings::from_lookup(&lookup)?;
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let coingecko = CoinGeckoSettings {
            base_url: optional(ENV_COINGECKO_BASE_URL)
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_COINGECKO_BASE_URL.to_string()),
            api_key: optional(ENV_COINGECKO_API_KEY),
            ..CoinGeckoSettings::default()
        };

        let data_dir = optional(ENV_DATA_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

        let backfill = BackfillSettings {
            asset: resolve_asset(ENV_BACKFILL_COIN_ID, optional(ENV_BACKFILL_COIN_ID))?,
            days_override: parse_optional(ENV_BACKFILL_DAYS, optional(ENV_BACKFILL_DAYS))?
                .filter(|days: &u32| *days > 0),
        };

        let forecast = ForecastSettings {
            asset: resolve_asset(ENV_FORECAST_COIN_ID, optional(ENV_FORECAST_COIN_ID))?,
            retention_days: parse_retention_days(optional(ENV_FORECAST_RETENTION_DAYS))?,
            ..ForecastSettings::default()
        };

        Ok(Self {
            database,
            coingecko,
            data_dir,
            coins: asset::TRACKED_ASSETS.to_vec(),
            backfill,
            forecast,
        })
    }
}

fn resolve_asset(var: &'static str, value: Option<String>) -> Result<TrackedAsset, ConfigError> {
    let coin_id = value.unwrap_or_else(|| DEFAULT_ASSET.to_string());
    asset::lookup(coin_id.trim()).ok_or(ConfigError::InvalidValue {
        var,
        value: coin_id,
    })
}

fn parse_retention_days(value: Option<String>) -> Result<i64, ConfigError> {
    let Some(raw) = value else {
        return Ok(DEFAULT_RETENTION_DAYS);
    };
    match parse_optional::<i64>(ENV_FORECAST_RETENTION_DAYS, Some(raw.clone()))? {
        Some(days) if RETENTION_DAYS_RANGE.contains(&days) => Ok(days),
        _ => Err(ConfigError::InvalidValue {
            var: ENV_FORECAST_RETENTION_DAYS,
            value: raw,
        }),
    }
}

fn parse_optional<T: std::str::FromStr>(
    var: &'static str,
    value: Option<String>,
) -> Result<Option<T>, ConfigError> {
    value
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|_| ConfigError::InvalidValue { var, value: raw })
        })
        .transpose()
}
