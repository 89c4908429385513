use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Rows kept per movers list.
pub const MOVERS_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoverEntry {
    pub ticker: String,
    pub price: f64,
    pub change_percent_text: String,
    pub volume: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movers {
    pub gainers: Vec<MoverEntry>,
    pub losers: Vec<MoverEntry>,
    pub most_active: Vec<MoverEntry>,
}

/// Decoded provider payload. The provider answers HTTP 200 even when it refuses a request,
/// so failures are recognised from markers inside the body.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderOutcome<T> {
    Ok(T),
    /// `Note` / `Information` field: call frequency or daily quota exceeded.
    RateLimited(String),
    /// `Error Message` field: bad key, unknown function, invalid symbol.
    Rejected(String),
    Malformed(String),
}

impl<T> ProviderOutcome<T> {
    pub fn into_result(self) -> anyhow::Result<T> {
        match self {
            ProviderOutcome::Ok(v) => Ok(v),
            ProviderOutcome::RateLimited(note) => {
                anyhow::bail!("Alpha Vantage API limit reached: {note}")
            }
            ProviderOutcome::Rejected(msg) => anyhow::bail!("Alpha Vantage rejected request: {msg}"),
            ProviderOutcome::Malformed(detail) => {
                anyhow::bail!("Alpha Vantage returned malformed data: {detail}")
            }
        }
    }
}

fn in_band_failure<T>(raw: &Value) -> Option<ProviderOutcome<T>> {
    let text = |key: &str| {
        raw.get(key).map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    };

    if let Some(msg) = text("Error Message") {
        return Some(ProviderOutcome::Rejected(msg));
    }
    if let Some(note) = text("Note").or_else(|| text("Information")) {
        return Some(ProviderOutcome::RateLimited(note));
    }
    None
}

#[derive(Debug, Deserialize)]
struct TopMoversResponse {
    #[serde(default)]
    top_gainers: Vec<RawMover>,
    #[serde(default)]
    top_losers: Vec<RawMover>,
    #[serde(default)]
    most_actively_traded: Vec<RawMover>,
}

#[derive(Debug, Deserialize)]
struct RawMover {
    ticker: String,
    price: String,
    #[serde(default)]
    change_percentage: String,
    #[serde(default)]
    volume: Option<String>,
}

fn convert_movers(rows: Vec<RawMover>) -> Vec<MoverEntry> {
    rows.into_iter()
        .filter_map(|row| match parse_number(&row.price) {
            Some(price) => Some(MoverEntry {
                ticker: row.ticker.trim().to_string(),
                price,
                change_percent_text: row.change_percentage.trim().to_string(),
                volume: row
                    .volume
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty()),
            }),
            None => {
                tracing::debug!(ticker = %row.ticker, price = %row.price, "dropping mover with unparseable price");
                None
            }
        })
        .take(MOVERS_LIMIT)
        .collect()
}

pub fn decode_movers(raw: &Value) -> ProviderOutcome<Movers> {
    if let Some(failure) = in_band_failure(raw) {
        return failure;
    }
    if !raw.is_object() {
        return ProviderOutcome::Malformed(format!("expected JSON object, got {raw}"));
    }

    match serde_json::from_value::<TopMoversResponse>(raw.clone()) {
        Ok(parsed) => ProviderOutcome::Ok(Movers {
            gainers: convert_movers(parsed.top_gainers),
            losers: convert_movers(parsed.top_losers),
            most_active: convert_movers(parsed.most_actively_traded),
        }),
        Err(err) => ProviderOutcome::Malformed(format!("top movers payload: {err}")),
    }
}

pub fn decode_quote(symbol: &str, raw: &Value) -> ProviderOutcome<Quote> {
    if let Some(failure) = in_band_failure(raw) {
        return failure;
    }

    // Unknown symbols come back as an empty "Global Quote" object.
    let Some(quote) = raw
        .get("Global Quote")
        .and_then(Value::as_object)
        .filter(|q| !q.is_empty())
    else {
        return ProviderOutcome::Malformed(format!("no Global Quote for {symbol}"));
    };

    let field = |key: &str| {
        quote
            .get(key)
            .and_then(Value::as_str)
            .and_then(parse_number)
            .unwrap_or(0.0)
    };

    ProviderOutcome::Ok(Quote {
        symbol: symbol.to_string(),
        price: field("05. price"),
        change: field("09. change"),
        change_percent: field("10. change percent"),
    })
}

/// Parses provider numerics such as `"512.3400"` or `"-0.4512%"`.
pub fn parse_number(s: &str) -> Option<f64> {
    s.trim()
        .trim_end_matches('%')
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}
