pub mod analysis;
pub mod domain;
pub mod error;
pub mod llm;
pub mod market;

#[cfg(test)]
pub(crate) mod test_support;

pub mod config {
    pub const ALPHA_VANTAGE_API_KEY: &str = "ALPHA_VANTAGE_API_KEY";
    pub const GEMINI_API_KEY: &str = "GEMINI_API_KEY";

    #[derive(Debug, Clone, Default)]
    pub struct Settings {
        pub alpha_vantage_api_key: Option<String>,
        pub gemini_api_key: Option<String>,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                alpha_vantage_api_key: non_blank_var(ALPHA_VANTAGE_API_KEY),
                gemini_api_key: non_blank_var(GEMINI_API_KEY),
                sentry_dsn: non_blank_var("SENTRY_DSN"),
            })
        }

        /// Env var names of the credentials the analysis pipeline needs but does not have.
        pub fn missing_credentials(&self) -> Vec<&'static str> {
            let mut missing = Vec::new();
            if self.gemini_api_key.is_none() {
                missing.push(GEMINI_API_KEY);
            }
            if self.alpha_vantage_api_key.is_none() {
                missing.push(ALPHA_VANTAGE_API_KEY);
            }
            missing
        }

        pub fn require_alpha_vantage_api_key(&self) -> anyhow::Result<&str> {
            self.alpha_vantage_api_key
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("{ALPHA_VANTAGE_API_KEY} is required"))
        }

        pub fn require_gemini_api_key(&self) -> anyhow::Result<&str> {
            self.gemini_api_key
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("{GEMINI_API_KEY} is required"))
        }
    }

    fn non_blank_var(key: &str) -> Option<String> {
        std::env::var(key)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Reads an env var and parses it, falling back to `default` when unset or invalid.
    pub fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
        std::env::var(key)
            .ok()
            .and_then(|s| s.trim().parse::<T>().ok())
            .unwrap_or(default)
    }

}
