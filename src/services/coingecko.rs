use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::config::CoinGeckoSettings;

#[derive(Debug, Error)]
pub enum CoinGeckoError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("CoinGecko API error {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Clone)]
pub struct CoinGeckoService {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    snapshot_timeout: Duration,
    history_timeout: Duration,
}

/// `/coins/{id}` response, reduced to what the collector flattens
///
/// `market_data` stays untyped: individual fields are frequently null or
/// missing and each one degrades to NULL on its own.
#[derive(Debug, Clone, Deserialize)]
pub struct CoinDetail {
    pub id: String,
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub market_data: Option<Value>,
}

/// `/coins/{id}/market_chart` response: `[timestamp_ms, value]` pairs
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MarketChart {
    #[serde(default)]
    pub prices: Vec<(f64, Option<f64>)>,
    #[serde(default)]
    pub market_caps: Vec<(f64, Option<f64>)>,
    #[serde(default)]
    pub total_volumes: Vec<(f64, Option<f64>)>,
}

impl CoinGeckoService {
    pub fn new(settings: &CoinGeckoSettings) -> Self {
        Self {
            client: Client::new(),
            api_key: settings.api_key.clone(),
            base_url: settings.base_url.clone(),
            snapshot_timeout: settings.snapshot_timeout,
            history_timeout: settings.history_timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the current snapshot for one coin
    pub async fn fetch_coin_snapshot(&self, coin_id: &str) -> Result<CoinDetail, CoinGeckoError> {
        tracing::debug!("Fetching snapshot for {} from CoinGecko", coin_id);

        let url = format!("{}/coins/{}", self.base_url, coin_id);
        self.get_json(&url, &[], self.snapshot_timeout).await
    }

    /// Fetch a historical USD window for one coin
    pub async fn fetch_market_chart(
        &self,
        coin_id: &str,
        days: u32,
        interval: &str,
    ) -> Result<MarketChart, CoinGeckoError> {
        tracing::info!("Fetching {} days of market chart for {} from CoinGecko", days, coin_id);

        let url = format!("{}/coins/{}/market_chart", self.base_url, coin_id);
        let days = days.to_string();
        let chart: MarketChart = self
            .get_json(
                &url,
                &[("vs_currency", "usd"), ("days", days.as_str()), ("interval", interval)],
                self.history_timeout,
            )
            .await?;

        tracing::debug!(
            "Fetched {} prices, {} market caps, {} volumes for {}",
            chart.prices.len(),
            chart.market_caps.len(),
            chart.total_volumes.len(),
            coin_id
        );

        Ok(chart)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<T, CoinGeckoError> {
        let mut request = self
            .client
            .get(url)
            .header("accept", "application/json")
            .query(query)
            .timeout(timeout);

        if let Some(api_key) = &self.api_key {
            request = request.header("x-cg-demo-api-key", api_key);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CoinGeckoError::Status { status, body });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_chart_accepts_null_values() {
        let chart: MarketChart = serde_json::from_str(
            r#"{"prices":[[1735689600000,94000.5],[1735776000000,null]],"market_caps":[[1735689600000,1.86e12]]}"#,
        )
        .unwrap();
        assert_eq!(chart.prices.len(), 2);
        assert_eq!(chart.prices[1].1, None);
        assert_eq!(chart.market_caps.len(), 1);
        assert!(chart.total_volumes.is_empty());
    }

    #[test]
    fn test_coin_detail_without_market_data() {
        let detail: CoinDetail =
            serde_json::from_str(r#"{"id":"cardano","symbol":"ada","name":"Cardano"}"#).unwrap();
        assert_eq!(detail.id, "cardano");
        assert!(detail.market_data.is_none());
    }

    #[test]
    fn test_error_display() {
        let err = CoinGeckoError::Status {
            status: StatusCode::TOO_MANY_REQUESTS,
            body: "rate limited".to_string(),
        };
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("rate limited"));
    }
}
