use crate::config::{env_or, Settings};
use crate::error::truncate;
use crate::llm::{Generation, LlmClient};
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-3-flash-preview";
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 1024;
const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const RESPONSE_MIME_TYPE: &str = "application/json";

// Error bodies are echoed into the user-visible error field; keep them short.
const MAX_ERROR_BODY_CHARS: usize = 300;

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_output_tokens: u32,
    temperature: f32,
}

impl GeminiClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.require_gemini_api_key()?.to_string();
        let base_url =
            std::env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let max_output_tokens = env_or("GEMINI_MAX_OUTPUT_TOKENS", DEFAULT_MAX_OUTPUT_TOKENS);
        let temperature = env_or("GEMINI_TEMPERATURE", DEFAULT_TEMPERATURE);
        let timeout_secs = env_or("GEMINI_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            api_key,
            base_url,
            model,
            max_output_tokens,
            temperature,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    fn request(&self, prompt: &str) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
                response_mime_type: RESPONSE_MIME_TYPE,
            },
        }
    }

    async fn generate_content(
        &self,
        req: &GenerateContentRequest,
    ) -> anyhow::Result<GenerateContentResponse> {
        let mut headers = HeaderMap::new();
        headers.insert("x-goog-api-key", HeaderValue::from_str(&self.api_key)?);

        let res = self
            .http
            .post(self.url())
            .headers(headers)
            .json(req)
            .send()
            .await
            .map_err(|e| e.without_url())
            .context("Gemini request failed")?;

        let status = res.status();
        tracing::info!(%status, model = %self.model, "Gemini response received");
        let text = res
            .text()
            .await
            .map_err(|e| e.without_url())
            .context("failed to read Gemini response body")?;
        if !status.is_success() {
            tracing::error!(%status, body = %text, "Gemini returned an error response");
            anyhow::bail!("Gemini HTTP {status}: {}", truncate(&text, MAX_ERROR_BODY_CHARS));
        }

        serde_json::from_str::<GenerateContentResponse>(&text).with_context(|| {
            format!(
                "failed to decode Gemini response: {}",
                truncate(&text, MAX_ERROR_BODY_CHARS)
            )
        })
    }

    fn response_generation(res: GenerateContentResponse) -> anyhow::Result<Generation> {
        let Some(candidate) = res.candidates.into_iter().next() else {
            let reason = res
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "no candidates".to_string());
            anyhow::bail!("Gemini returned no candidates ({reason})");
        };

        let text: String = candidate
            .content
            .map(|c| c.parts)
            .unwrap_or_default()
            .into_iter()
            .filter(|p| !p.thought)
            .filter_map(|p| p.text)
            .collect();

        if text.trim().is_empty() {
            anyhow::bail!(
                "Gemini candidate carried no text (finish_reason={})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            );
        }

        Ok(Generation {
            text,
            finish_reason: candidate.finish_reason,
        })
    }
}

#[async_trait::async_trait]
impl LlmClient for GeminiClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> anyhow::Result<Generation> {
        tracing::info!(prompt_chars = prompt.len(), model = %self.model, "calling Gemini");
        let res = self.generate_content(&self.request(prompt)).await?;
        Self::response_generation(res)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    response_mime_type: &'static str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Clone, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    // Thinking models may interleave thought summaries with the answer.
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}
