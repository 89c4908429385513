use crate::config::env_or;
use crate::domain::analysis::AnalysisResult;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

pub const DEFAULT_TTL_SECS: i64 = 60 * 60;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub data: AnalysisResult,
    pub fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.fetched_at
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.age(now) < ttl
    }
}

/// Single, unkeyed slot holding the latest successful analysis.
///
/// The lock only guards reads and writes of the slot; it is never held while an analysis is
/// generated, so concurrent misses each regenerate and the last writer wins.
#[derive(Debug)]
pub struct AnalysisCache {
    ttl: Duration,
    slot: Mutex<Option<CacheEntry>>,
}

impl Default for AnalysisCache {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_TTL_SECS))
    }
}

impl AnalysisCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: Mutex::new(None),
        }
    }

    pub fn from_env() -> Self {
        Self::new(Duration::seconds(env_or(
            "ANALYSIS_CACHE_TTL_SECS",
            DEFAULT_TTL_SECS,
        )))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The cached analysis and its age, if still within the TTL at `now`.
    pub async fn fresh(&self, now: DateTime<Utc>) -> Option<(AnalysisResult, Duration)> {
        let guard = self.slot.lock().await;
        guard
            .as_ref()
            .filter(|entry| entry.is_fresh(now, self.ttl))
            .map(|entry| (entry.data.clone(), entry.age(now)))
    }

    /// Overwrites the slot.
    pub async fn store(&self, data: AnalysisResult, fetched_at: DateTime<Utc>) {
        *self.slot.lock().await = Some(CacheEntry { data, fetched_at });
    }

    pub async fn peek(&self) -> Option<CacheEntry> {
        self.slot.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analysis::RiskLevel;
    use chrono::TimeZone;

    fn sample() -> AnalysisResult {
        AnalysisResult {
            summary: "📈 Up".to_string(),
            opportunities: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            risk_level: RiskLevel::Low,
            error: None,
        }
    }

    #[tokio::test]
    async fn empty_cache_has_nothing_fresh() {
        let cache = AnalysisCache::default();
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();
        assert!(cache.fresh(now).await.is_none());
        assert_eq!(cache.ttl(), Duration::hours(1));
    }

    #[tokio::test]
    async fn entry_expires_at_ttl() {
        let cache = AnalysisCache::default();
        let t = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();
        cache.store(sample(), t).await;

        let just_before = t + Duration::hours(1) - Duration::milliseconds(1);
        let (data, age) = cache.fresh(just_before).await.unwrap();
        assert_eq!(data, sample());
        assert_eq!(age, Duration::hours(1) - Duration::milliseconds(1));

        assert!(cache.fresh(t + Duration::hours(1)).await.is_none());
        assert!(cache.fresh(t + Duration::hours(1) + Duration::milliseconds(1)).await.is_none());
        // Expired entries are left in place until superseded.
        assert!(cache.peek().await.is_some());
    }

    #[tokio::test]
    async fn store_supersedes_previous_entry() {
        let cache = AnalysisCache::new(Duration::minutes(5));
        let t = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();
        cache.store(sample(), t).await;

        let mut newer = sample();
        newer.summary = "📉 Down".to_string();
        cache.store(newer.clone(), t + Duration::minutes(10)).await;

        let (data, _) = cache.fresh(t + Duration::minutes(11)).await.unwrap();
        assert_eq!(data, newer);
    }
}
