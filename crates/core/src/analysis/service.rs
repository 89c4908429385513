use crate::analysis::cache::AnalysisCache;
use crate::config::Settings;
use crate::domain::analysis::AnalysisResult;
use crate::error::AnalysisError;
use crate::llm::gemini::GeminiClient;
use crate::llm::json::parse_analysis;
use crate::llm::prompt::analysis_prompt;
use crate::llm::LlmClient;
use crate::market::aggregator::{aggregate, AggregatorOptions};
use crate::market::provider::{AlphaVantageClient, MarketDataProvider};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Which terminal state produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisSource {
    Cached,
    Fresh,
    ConfigError,
    RuntimeError,
}

#[derive(Debug, Clone)]
pub struct Analysis {
    pub result: AnalysisResult,
    pub source: AnalysisSource,
}

pub enum Backends {
    Ready {
        market: Arc<dyn MarketDataProvider>,
        llm: Arc<dyn LlmClient>,
    },
    Unconfigured {
        missing: Vec<&'static str>,
    },
}

/// Serves the market analysis from the cache slot, regenerating it when stale.
///
/// Every call ends in a well-formed [`AnalysisResult`]; failures are folded into the
/// degraded payloads rather than returned.
pub struct MarketAnalysisService {
    cache: Arc<AnalysisCache>,
    backends: Backends,
    options: AggregatorOptions,
}

impl MarketAnalysisService {
    pub fn new(cache: Arc<AnalysisCache>, backends: Backends, options: AggregatorOptions) -> Self {
        Self {
            cache,
            backends,
            options,
        }
    }

    /// Missing credentials are not an error here: the service starts and reports them per
    /// request.
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let missing = settings.missing_credentials();
        let backends = if missing.is_empty() {
            Backends::Ready {
                market: Arc::new(AlphaVantageClient::from_settings(settings)?),
                llm: Arc::new(GeminiClient::from_settings(settings)?),
            }
        } else {
            tracing::warn!(missing = ?missing, "API keys missing; market analysis will be degraded");
            Backends::Unconfigured { missing }
        };

        Ok(Self::new(
            Arc::new(AnalysisCache::from_env()),
            backends,
            AggregatorOptions::from_env(),
        ))
    }

    pub fn cache(&self) -> &Arc<AnalysisCache> {
        &self.cache
    }

    pub async fn analyze(&self) -> Analysis {
        self.analyze_at(Utc::now()).await
    }

    /// Runs the cache gate as of `now`.
    ///
    /// A freshly generated entry is stamped with `now`, the request instant, not the moment
    /// generation finished. Its effective TTL is therefore shorter by the generation latency.
    pub async fn analyze_at(&self, now: DateTime<Utc>) -> Analysis {
        if let Some((result, age)) = self.cache.fresh(now).await {
            tracing::info!(age_secs = age.num_seconds(), "returning cached market analysis");
            return Analysis {
                result,
                source: AnalysisSource::Cached,
            };
        }

        tracing::info!(
            ttl_secs = self.cache.ttl().num_seconds(),
            "market analysis cache expired or empty; generating"
        );

        match self.generate(now).await {
            Ok(result) => {
                self.cache.store(result.clone(), now).await;
                tracing::info!(risk_level = %result.risk_level, "market analysis generated and cached");
                Analysis {
                    result,
                    source: AnalysisSource::Fresh,
                }
            }
            Err(err @ AnalysisError::Configuration { .. }) => {
                tracing::warn!(error = %err, "market analysis unavailable");
                Analysis {
                    result: err.to_result(),
                    source: AnalysisSource::ConfigError,
                }
            }
            Err(err) => {
                if let AnalysisError::Parse {
                    raw_output: Some(raw),
                    ..
                } = &err
                {
                    tracing::debug!(raw_output = %raw, "unparseable model output");
                }
                tracing::error!(error = %err, "market analysis failed");
                Analysis {
                    result: err.to_result(),
                    source: AnalysisSource::RuntimeError,
                }
            }
        }
    }

    fn backends(&self) -> Result<(&dyn MarketDataProvider, &dyn LlmClient), AnalysisError> {
        match &self.backends {
            Backends::Ready { market, llm } => Ok((market.as_ref(), llm.as_ref())),
            Backends::Unconfigured { missing } => Err(AnalysisError::Configuration {
                missing: missing.clone(),
            }),
        }
    }

    /// Aggregated market data as the text block the model is prompted with.
    pub async fn market_summary(&self, now: DateTime<Utc>) -> Result<String, AnalysisError> {
        let (market, _) = self.backends()?;
        let snapshot = aggregate(market, &self.options, now)
            .await
            .map_err(AnalysisError::upstream)?;
        Ok(snapshot.summary_text())
    }

    /// Runs one uncached pass: aggregate, prompt, generate, parse.
    pub async fn generate(&self, now: DateTime<Utc>) -> Result<AnalysisResult, AnalysisError> {
        let (_, llm) = self.backends()?;
        let summary = self.market_summary(now).await?;
        let prompt = analysis_prompt(&summary);

        let generation = llm
            .generate(&prompt)
            .await
            .map_err(AnalysisError::generation)?;
        tracing::info!(
            model = llm.model(),
            finish_reason = generation.finish_reason.as_deref().unwrap_or("unknown"),
            "model output received"
        );
        if generation.is_truncated() {
            tracing::warn!("model output was truncated by the token limit; parsing anyway");
        }

        parse_analysis(&generation.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analysis::{RiskLevel, CONFIG_ERROR_MESSAGE, RUNTIME_ERROR_SUMMARY};
    use crate::llm::{Generation, FINISH_REASON_MAX_TOKENS};
    use crate::market::aggregator::tests::StubMarket;
    use crate::test_support::closed_port_url;
    use chrono::{Duration, TimeZone};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const VALID_OUTPUT: &str = "```json\n{\"summary\":\"📈 Tech leads\",\"opportunities\":[\"a\",\"b\",\"c\",\"d\"],\"riskLevel\":\"Low\"}\n```";

    struct StubLlm {
        output: Result<&'static str, &'static str>,
        finish_reason: &'static str,
        calls: AtomicUsize,
        last_prompt: Mutex<Option<String>>,
    }

    impl StubLlm {
        fn replying(output: &'static str) -> Self {
            Self {
                output: Ok(output),
                finish_reason: "STOP",
                calls: AtomicUsize::new(0),
                last_prompt: Mutex::new(None),
            }
        }

        fn failing(msg: &'static str) -> Self {
            Self {
                output: Err(msg),
                ..Self::replying("")
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl LlmClient for StubLlm {
        fn model(&self) -> &str {
            "stub-model"
        }

        async fn generate(&self, prompt: &str) -> anyhow::Result<Generation> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
            match self.output {
                Ok(text) => Ok(Generation {
                    text: text.to_string(),
                    finish_reason: Some(self.finish_reason.to_string()),
                }),
                Err(msg) => Err(anyhow::anyhow!("Gemini HTTP 503 Service Unavailable: {msg}")),
            }
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 14, 30, 0).unwrap()
    }

    fn options() -> AggregatorOptions {
        AggregatorOptions {
            quote_delay: std::time::Duration::ZERO,
            ..AggregatorOptions::default()
        }
    }

    fn service(market: Arc<StubMarket>, llm: Arc<StubLlm>) -> MarketAnalysisService {
        MarketAnalysisService::new(
            Arc::new(AnalysisCache::default()),
            Backends::Ready { market, llm },
            options(),
        )
    }

    #[tokio::test]
    async fn caches_successful_generation() {
        let market = Arc::new(StubMarket::healthy());
        let llm = Arc::new(StubLlm::replying(VALID_OUTPUT));
        let svc = service(market.clone(), llm.clone());

        let first = svc.analyze_at(t0()).await;
        assert_eq!(first.source, AnalysisSource::Fresh);
        assert_eq!(first.result.summary, "📈 Tech leads");
        assert_eq!(first.result.risk_level, RiskLevel::Low);
        assert_eq!(first.result.opportunities.len(), 4);

        let second = svc.analyze_at(t0() + Duration::minutes(1)).await;
        assert_eq!(second.source, AnalysisSource::Cached);
        assert_eq!(second.result, first.result);
        assert_eq!(llm.calls(), 1);
        assert_eq!(market.movers_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn regenerates_after_ttl() {
        let llm = Arc::new(StubLlm::replying(VALID_OUTPUT));
        let svc = service(Arc::new(StubMarket::healthy()), llm.clone());
        let ttl = svc.cache().ttl();

        svc.analyze_at(t0()).await;

        let before = svc.analyze_at(t0() + ttl - Duration::seconds(1)).await;
        assert_eq!(before.source, AnalysisSource::Cached);
        assert_eq!(llm.calls(), 1);

        let after = svc.analyze_at(t0() + ttl + Duration::seconds(1)).await;
        assert_eq!(after.source, AnalysisSource::Fresh);
        assert_eq!(llm.calls(), 2);

        let entry = svc.cache().peek().await.unwrap();
        assert_eq!(entry.fetched_at, t0() + ttl + Duration::seconds(1));
    }

    #[tokio::test]
    async fn missing_keys_return_config_error_every_time() {
        let svc = MarketAnalysisService::from_settings(&Settings::default()).unwrap();

        let first = svc.analyze_at(t0()).await;
        let second = svc.analyze_at(t0() + Duration::seconds(5)).await;

        assert_eq!(first.source, AnalysisSource::ConfigError);
        assert_eq!(second.source, AnalysisSource::ConfigError);
        assert_eq!(first.result, second.result);
        assert_eq!(first.result.error.as_deref(), Some(CONFIG_ERROR_MESSAGE));
        assert_eq!(first.result.risk_level, RiskLevel::Medium);
        assert!(svc.cache().peek().await.is_none());
    }

    #[tokio::test]
    async fn one_missing_key_is_enough_to_degrade() {
        let settings = Settings {
            gemini_api_key: Some("gm".to_string()),
            ..Settings::default()
        };
        let svc = MarketAnalysisService::from_settings(&settings).unwrap();
        let analysis = svc.analyze_at(t0()).await;
        assert_eq!(analysis.source, AnalysisSource::ConfigError);
    }

    #[tokio::test]
    async fn partial_quote_failure_still_completes() {
        let market = Arc::new(StubMarket {
            failing: vec!["DIA"],
            ..StubMarket::healthy()
        });
        let llm = Arc::new(StubLlm::replying(VALID_OUTPUT));
        let svc = service(market, llm.clone());

        let analysis = svc.analyze_at(t0()).await;
        assert_eq!(analysis.source, AnalysisSource::Fresh);

        let prompt = llm.last_prompt.lock().unwrap().clone().unwrap();
        assert!(prompt.contains("SPY: $100.00"));
        assert!(prompt.contains("QQQ: $100.00"));
        assert!(!prompt.contains("DIA"));
    }

    #[tokio::test]
    async fn unparseable_output_degrades_without_caching() {
        let llm = Arc::new(StubLlm::replying("Sure, here is your analysis: not json"));
        let svc = service(Arc::new(StubMarket::healthy()), llm.clone());

        let analysis = svc.analyze_at(t0()).await;
        assert_eq!(analysis.source, AnalysisSource::RuntimeError);
        assert_eq!(analysis.result.risk_level, RiskLevel::Medium);
        assert_eq!(analysis.result.summary, RUNTIME_ERROR_SUMMARY);
        assert!(!analysis.result.error.as_deref().unwrap_or("").is_empty());
        assert!(svc.cache().peek().await.is_none());

        svc.analyze_at(t0() + Duration::minutes(1)).await;
        assert_eq!(llm.calls(), 2);
    }

    #[tokio::test]
    async fn generation_failure_degrades() {
        let llm = Arc::new(StubLlm::failing("overloaded"));
        let svc = service(Arc::new(StubMarket::healthy()), llm);

        let analysis = svc.analyze_at(t0()).await;
        assert_eq!(analysis.source, AnalysisSource::RuntimeError);
        let error = analysis.result.error.unwrap();
        assert!(error.starts_with("failed to get AI analysis"));
        assert!(error.contains("overloaded"));
    }

    #[tokio::test]
    async fn upstream_failure_skips_the_model() {
        let market = Arc::new(StubMarket {
            movers_error: Some("Alpha Vantage API limit reached: 25 requests per day"),
            ..StubMarket::healthy()
        });
        let llm = Arc::new(StubLlm::replying(VALID_OUTPUT));
        let svc = service(market, llm.clone());

        let analysis = svc.analyze_at(t0()).await;
        assert_eq!(analysis.source, AnalysisSource::RuntimeError);
        assert!(analysis
            .result
            .error
            .unwrap()
            .starts_with("market data provider error"));
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn truncated_but_parseable_output_is_accepted() {
        let llm = Arc::new(StubLlm {
            finish_reason: FINISH_REASON_MAX_TOKENS,
            ..StubLlm::replying("{\"summary\":\"📊 Flat\",\"opportunities\":[\"a\"],\"riskLevel\":\"medium\"}")
        });
        let svc = service(Arc::new(StubMarket::healthy()), llm);

        let analysis = svc.analyze_at(t0()).await;
        assert_eq!(analysis.source, AnalysisSource::Fresh);
        assert_eq!(analysis.result.risk_level, RiskLevel::Medium);
    }

    #[tokio::test]
    async fn unreachable_market_data_does_not_leak_the_api_key() {
        let settings = Settings {
            alpha_vantage_api_key: Some("SECRETKEY123".to_string()),
            ..Settings::default()
        };
        let market = AlphaVantageClient::from_settings(&settings)
            .unwrap()
            .with_base_url(closed_port_url().await);
        let llm = Arc::new(StubLlm::replying(VALID_OUTPUT));
        let svc = MarketAnalysisService::new(
            Arc::new(AnalysisCache::default()),
            Backends::Ready {
                market: Arc::new(market),
                llm: llm.clone(),
            },
            options(),
        );

        let analysis = svc.analyze_at(t0()).await;
        assert_eq!(analysis.source, AnalysisSource::RuntimeError);
        let error = analysis.result.error.unwrap();
        assert!(error.starts_with("market data provider error"), "{error}");
        assert!(!error.contains("SECRETKEY123"), "{error}");
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn market_summary_requires_credentials() {
        let svc = MarketAnalysisService::from_settings(&Settings::default()).unwrap();
        assert!(matches!(
            svc.market_summary(t0()).await,
            Err(AnalysisError::Configuration { .. })
        ));
    }
}
