use crate::domain::analysis::{AnalysisResult, RiskLevel};
use anyhow::ensure;
use serde::{Deserialize, Serialize};

const EXPECTED_OPPORTUNITIES: std::ops::RangeInclusive<usize> = 3..=4;

/// The JSON object the model is asked to emit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelAnalysis {
    pub summary: String,
    #[serde(default)]
    pub opportunities: Vec<String>,
    pub risk_level: RiskLevel,
}

impl ModelAnalysis {
    pub fn validate_and_into_result(self) -> anyhow::Result<AnalysisResult> {
        let summary = self.summary.trim().to_string();
        ensure!(!summary.is_empty(), "model output summary must be non-empty");

        let opportunities: Vec<String> = self
            .opportunities
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        // Truncated output can still be useful, so a short list is accepted.
        if !EXPECTED_OPPORTUNITIES.contains(&opportunities.len()) {
            tracing::warn!(
                count = opportunities.len(),
                "model returned an unexpected number of opportunities"
            );
        }

        Ok(AnalysisResult {
            summary,
            opportunities,
            risk_level: self.risk_level,
            error: None,
        })
    }
}
