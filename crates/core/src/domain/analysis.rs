use serde::{Deserialize, Serialize};
use std::fmt;

pub const CONFIG_ERROR_MESSAGE: &str =
    "Missing API keys. Please set GEMINI_API_KEY and ALPHA_VANTAGE_API_KEY in .env";
pub const CONFIG_ERROR_SUMMARY: &str = "⚠️ API keys not configured";
pub const RUNTIME_ERROR_SUMMARY: &str = "❌ Unable to fetch market analysis";

/// The market analysis payload served to the dashboard.
///
/// Degraded responses keep the same shape: `error` is set and `opportunities` carries
/// remediation steps instead of market ideas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub summary: String,
    pub opportunities: Vec<String>,
    pub risk_level: RiskLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl TryFrom<String> for RiskLevel {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            other => Err(format!("unknown riskLevel: {other:?}")),
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        };
        f.write_str(s)
    }
}

impl AnalysisResult {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Served when either API key is absent. Identical on every call.
    pub fn config_error() -> Self {
        Self {
            summary: CONFIG_ERROR_SUMMARY.to_string(),
            opportunities: vec![
                "Add GEMINI_API_KEY to your .env file".to_string(),
                "Add ALPHA_VANTAGE_API_KEY to your .env file".to_string(),
                "Restart the dashboard server".to_string(),
                "Get free API keys from aistudio.google.com and alphavantage.co".to_string(),
            ],
            risk_level: RiskLevel::Medium,
            error: Some(CONFIG_ERROR_MESSAGE.to_string()),
        }
    }

    pub fn runtime_error(message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            "Failed to analyze market".to_string()
        } else {
            message
        };

        Self {
            summary: RUNTIME_ERROR_SUMMARY.to_string(),
            opportunities: vec![
                "Check your API keys are valid".to_string(),
                "Ensure you have not exceeded API rate limits".to_string(),
                "Verify your internet connection".to_string(),
                "Try refreshing in a few moments".to_string(),
            ],
            risk_level: RiskLevel::Medium,
            error: Some(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_camel_case_and_omits_absent_error() {
        let result = AnalysisResult {
            summary: "📈 Broad rally".to_string(),
            opportunities: vec!["a".to_string()],
            risk_level: RiskLevel::Low,
            error: None,
        };

        let v = serde_json::to_value(&result).unwrap();
        assert_eq!(
            v,
            json!({"summary": "📈 Broad rally", "opportunities": ["a"], "riskLevel": "Low"})
        );
    }

    #[test]
    fn risk_level_deserializes_case_insensitively() {
        let v: RiskLevel = serde_json::from_value(json!("medium")).unwrap();
        assert_eq!(v, RiskLevel::Medium);
        let v: RiskLevel = serde_json::from_value(json!(" HIGH ")).unwrap();
        assert_eq!(v, RiskLevel::High);
        assert!(serde_json::from_value::<RiskLevel>(json!("extreme")).is_err());
    }

    #[test]
    fn config_error_is_stable_and_medium() {
        let a = AnalysisResult::config_error();
        let b = AnalysisResult::config_error();
        assert_eq!(a, b);
        assert_eq!(a.risk_level, RiskLevel::Medium);
        assert_eq!(a.opportunities.len(), 4);
        assert_eq!(a.error.as_deref(), Some(CONFIG_ERROR_MESSAGE));
    }

    #[test]
    fn runtime_error_carries_message() {
        let r = AnalysisResult::runtime_error("market data provider error: rate limited");
        assert!(r.is_error());
        assert_eq!(r.summary, RUNTIME_ERROR_SUMMARY);
        assert_eq!(r.risk_level, RiskLevel::Medium);

        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["error"], "market data provider error: rate limited");
        assert_eq!(v["riskLevel"], "Medium");
    }

    #[test]
    fn runtime_error_never_has_blank_message() {
        let r = AnalysisResult::runtime_error("  ");
        assert_eq!(r.error.as_deref(), Some("Failed to analyze market"));
    }
}
