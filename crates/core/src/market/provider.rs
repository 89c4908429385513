use crate::config::{env_or, Settings};
use crate::error::truncate;
use crate::market::types::{decode_movers, decode_quote, Movers, Quote};
use anyhow::{Context, Result};
use serde_json::Value;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_ERROR_BODY_CHARS: usize = 300;

#[async_trait::async_trait]
pub trait MarketDataProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// Top gainers, losers and most actively traded tickers for the session.
    async fn fetch_movers(&self) -> Result<Movers>;

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote>;
}

#[derive(Debug, Clone)]
pub struct AlphaVantageClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AlphaVantageClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let api_key = settings.require_alpha_vantage_api_key()?.to_string();
        let base_url = std::env::var("ALPHA_VANTAGE_BASE_URL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let timeout_secs = env_or("ALPHA_VANTAGE_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build Alpha Vantage http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn url(&self) -> String {
        format!("{}/query", self.base_url.trim_end_matches('/'))
    }

    async fn query(&self, params: &[(&str, &str)]) -> Result<Value> {
        // The URL carries the API key: strip it from reqwest errors before they surface.
        let res = self
            .http
            .get(self.url())
            .query(params)
            .query(&[("apikey", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| e.without_url())
            .context("Alpha Vantage request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(|e| e.without_url())
            .context("failed to read Alpha Vantage response")?;
        if !status.is_success() {
            anyhow::bail!(
                "Alpha Vantage HTTP {status}: {}",
                truncate(&text, MAX_ERROR_BODY_CHARS)
            );
        }

        serde_json::from_str::<Value>(&text).with_context(|| {
            format!(
                "Alpha Vantage response is not valid JSON: {}",
                truncate(&text, MAX_ERROR_BODY_CHARS)
            )
        })
    }
}

#[async_trait::async_trait]
impl MarketDataProvider for AlphaVantageClient {
    fn provider_name(&self) -> &'static str {
        "alpha_vantage"
    }

    async fn fetch_movers(&self) -> Result<Movers> {
        let raw = self.query(&[("function", "TOP_GAINERS_LOSERS")]).await?;
        decode_movers(&raw).into_result()
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote> {
        let raw = self
            .query(&[("function", "GLOBAL_QUOTE"), ("symbol", symbol)])
            .await?;
        decode_quote(symbol, &raw).into_result()
    }
}
