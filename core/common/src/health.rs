// core/common/src/health.rs
// Cache store health for the health and readiness endpoints

use crate::cache::CacheManager;
use serde::Serialize;
use std::time::{Duration, SystemTime};
use tokio::time::Instant;

/// A ping slower than this reports the store as degraded.
pub const SLOW_PING: Duration = Duration::from_millis(500);

const ADVISORY_NOTE: &str =
    "cache failures degrade to misses; requests keep being served from the primary store";

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Result of one ping against the store behind a [`CacheManager`].
#[derive(Debug, Clone, Serialize)]
pub struct CacheHealth {
    /// `cache:{backend}`
    pub name: String,
    pub status: HealthStatus,
    pub latency_ms: Option<u64>,
    pub message: Option<String>,
}

impl CacheHealth {
    pub async fn check(manager: &CacheManager) -> Self {
        let store = manager.store();
        let name = format!("cache:{}", store.backend_name());
        let start = Instant::now();

        match store.ping().await {
            Ok(()) => {
                let elapsed = start.elapsed();
                let status = if elapsed > SLOW_PING {
                    HealthStatus::Degraded
                } else {
                    HealthStatus::Healthy
                };
                Self {
                    name,
                    status,
                    latency_ms: Some(elapsed.as_millis() as u64),
                    message: None,
                }
            }
            Err(e) => Self {
                name,
                status: HealthStatus::Unhealthy,
                latency_ms: None,
                message: Some(format!("Cache store error: {}", e)),
            },
        }
    }
}

/// Body of `/health`. Its status is the cache's status; the endpoint itself
/// always answers 200 because the cache never decides whether a request
/// succeeds.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub service: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub features: Vec<String>,
    pub dependencies: Vec<CacheHealth>,
    pub note: &'static str,
}

impl HealthResponse {
    pub fn new(
        service: impl Into<String>,
        version: impl Into<String>,
        start_time: SystemTime,
        cache: CacheHealth,
    ) -> Self {
        let uptime_seconds = SystemTime::now()
            .duration_since(start_time)
            .unwrap_or(Duration::ZERO)
            .as_secs();

        Self {
            status: cache.status,
            service: service.into(),
            version: version.into(),
            uptime_seconds,
            features: Vec::new(),
            dependencies: vec![cache],
            note: ADVISORY_NOTE,
        }
    }

    pub fn with_features(mut self, features: Vec<String>) -> Self {
        self.features = features;
        self
    }
}

/// Body of `/ready`: ready exactly while the cache store answers.
#[derive(Debug, Clone, Serialize)]
pub struct Readiness {
    pub ready: bool,
    pub cache_available: bool,
}

impl Readiness {
    pub async fn check(manager: &CacheManager) -> Self {
        let cache_available = manager.is_available().await;
        Self {
            ready: cache_available,
            cache_available,
        }
    }
}
