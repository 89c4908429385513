pub mod gemini;
pub mod json;
pub mod prompt;

pub const FINISH_REASON_MAX_TOKENS: &str = "MAX_TOKENS";

/// Text produced by one model call.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub text: String,
    pub finish_reason: Option<String>,
}

impl Generation {
    /// The model stopped because it ran out of output tokens.
    pub fn is_truncated(&self) -> bool {
        self.finish_reason.as_deref() == Some(FINISH_REASON_MAX_TOKENS)
    }
}

#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    fn model(&self) -> &str;

    async fn generate(&self, prompt: &str) -> anyhow::Result<Generation>;
}
