use crate::config::env_or;
use crate::market::provider::MarketDataProvider;
use crate::market::summary::build_summary_text;
use crate::market::types::{Movers, Quote};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// ETFs tracking the S&P 500, Nasdaq-100 and Dow Jones.
pub const DEFAULT_INDEX_SYMBOLS: [&str; 3] = ["SPY", "QQQ", "DIA"];
const DEFAULT_QUOTE_DELAY_MS: u64 = 300;

#[derive(Debug, Clone)]
pub struct AggregatorOptions {
    pub index_symbols: Vec<String>,
    /// Pause between consecutive quote requests.
    pub quote_delay: Duration,
}

impl Default for AggregatorOptions {
    fn default() -> Self {
        Self {
            index_symbols: DEFAULT_INDEX_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            quote_delay: Duration::from_millis(DEFAULT_QUOTE_DELAY_MS),
        }
    }
}

impl AggregatorOptions {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let index_symbols = parse_symbols(std::env::var("MARKET_INDEX_SYMBOLS").ok())
            .unwrap_or(defaults.index_symbols);
        let quote_delay = Duration::from_millis(env_or(
            "ALPHA_VANTAGE_REQ_DELAY_MS",
            DEFAULT_QUOTE_DELAY_MS,
        ));

        Self {
            index_symbols,
            quote_delay,
        }
    }
}

fn parse_symbols(raw: Option<String>) -> Option<Vec<String>> {
    let symbols: Vec<String> = raw?
        .split(',')
        .map(|s| s.trim().to_ascii_uppercase())
        .filter(|s| !s.is_empty())
        .collect();
    (!symbols.is_empty()).then_some(symbols)
}

#[derive(Debug, Clone)]
pub struct MarketSnapshot {
    pub generated_at: DateTime<Utc>,
    pub quotes: Vec<Quote>,
    pub movers: Movers,
}

impl MarketSnapshot {
    pub fn summary_text(&self) -> String {
        build_summary_text(
            self.generated_at,
            &self.quotes,
            &self.movers.gainers,
            &self.movers.losers,
            &self.movers.most_active,
        )
    }
}

/// Fetches one quote per symbol, sequentially. A failing symbol is skipped.
pub async fn fetch_index_quotes(
    provider: &dyn MarketDataProvider,
    symbols: &[String],
    delay: Duration,
) -> Vec<Quote> {
    let mut quotes = Vec::with_capacity(symbols.len());
    for (idx, symbol) in symbols.iter().enumerate() {
        if idx != 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match provider.fetch_quote(symbol).await {
            Ok(quote) => quotes.push(quote),
            Err(err) => {
                tracing::warn!(%symbol, error = %err, "index quote fetch failed; skipping symbol");
            }
        }
    }
    quotes
}

/// Collects movers and index quotes. Fails only when the movers call fails.
pub async fn aggregate(
    provider: &dyn MarketDataProvider,
    options: &AggregatorOptions,
    generated_at: DateTime<Utc>,
) -> Result<MarketSnapshot> {
    let movers = provider
        .fetch_movers()
        .await
        .context("failed to fetch top gainers/losers")?;
    tracing::info!(
        provider = provider.provider_name(),
        gainers = movers.gainers.len(),
        losers = movers.losers.len(),
        most_active = movers.most_active.len(),
        "market movers fetched"
    );

    let quotes = fetch_index_quotes(provider, &options.index_symbols, options.quote_delay).await;
    tracing::info!(
        fetched = quotes.len(),
        requested = options.index_symbols.len(),
        "index quotes fetched"
    );

    Ok(MarketSnapshot {
        generated_at,
        quotes,
        movers,
    })
}
