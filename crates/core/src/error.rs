use crate::domain::analysis::AnalysisResult;

/// Failure classes of one analysis pass. Every variant degrades to an [`AnalysisResult`].
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("missing credentials: {}", .missing.join(", "))]
    Configuration { missing: Vec<&'static str> },

    #[error("market data provider error: {0}")]
    Upstream(String),

    #[error("failed to get AI analysis: {0}")]
    Generation(String),

    #[error("failed to parse AI analysis: {detail}")]
    Parse {
        detail: String,
        raw_output: Option<String>,
    },
}

impl AnalysisError {
    pub fn upstream(err: anyhow::Error) -> Self {
        AnalysisError::Upstream(format!("{err:#}"))
    }

    pub fn generation(err: anyhow::Error) -> Self {
        AnalysisError::Generation(format!("{err:#}"))
    }

    pub fn to_result(&self) -> AnalysisResult {
        match self {
            AnalysisError::Configuration { .. } => AnalysisResult::config_error(),
            other => AnalysisResult::runtime_error(other.to_string()),
        }
    }
}

/// Caps provider bodies echoed into user-visible error messages.
pub(crate) fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
