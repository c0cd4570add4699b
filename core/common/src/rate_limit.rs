// core/common/src/rate_limit.rs
// Rate limiting with sliding window algorithm, keyed by endpoint category

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;

#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("Rate limit exceeded: {0}")]
    LimitExceeded(String),
    #[error("Internal error: {0}")]
    InternalError(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RateLimit {
    pub requests_per_window: u32,
    pub window_seconds: u64,
}

impl RateLimit {
    pub fn new(requests_per_window: u32, window_seconds: u64) -> Self {
        Self {
            requests_per_window,
            window_seconds,
        }
    }

    pub fn per_minute(requests: u32) -> Self {
        Self::new(requests, 60)
    }

    fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }
}

#[derive(Debug, Clone, Default)]
struct RateLimitEntry {
    timestamps: Vec<Instant>,
}

impl RateLimitEntry {
    fn cleanup_old_requests(&mut self, now: Instant, window: Duration) {
        self.timestamps
            .retain(|&ts| now.saturating_duration_since(ts) < window);
    }
}

pub struct RateLimiter {
    limits: HashMap<String, RateLimit>,
    entries: Arc<RwLock<HashMap<String, RateLimitEntry>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            limits: HashMap::new(),
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Add a rate limit for a category of endpoints
    pub fn add_limit(&mut self, category: impl Into<String>, limit: RateLimit) {
        self.limits.insert(category.into(), limit);
    }

    pub fn limit_for(&self, category: &str) -> Option<&RateLimit> {
        self.limits.get(category)
    }

    /// Check if request is allowed for given client key within a category
    pub async fn check_rate_limit(
        &self,
        category: &str,
        key: &str,
    ) -> Result<RateLimitInfo, RateLimitError> {
        let limit = self.limits.get(category).ok_or_else(|| {
            RateLimitError::InternalError(format!("No rate limit configured for {}", category))
        })?;

        let now = Instant::now();
        let rate_key = format!("{}:{}", category, key);

        let mut entries = self.entries.write().await;
        let entry = entries.entry(rate_key).or_default();

        entry.cleanup_old_requests(now, limit.window());

        let current_count = entry.timestamps.len();

        if current_count >= limit.requests_per_window as usize {
            let oldest_request = entry.timestamps.first().copied().unwrap_or(now);
            let retry_after = limit
                .window()
                .saturating_sub(now.saturating_duration_since(oldest_request))
                .as_secs()
                .max(1);

            return Err(RateLimitError::LimitExceeded(format!(
                "Rate limit exceeded. Retry after {} seconds",
                retry_after
            )));
        }

        entry.timestamps.push(now);

        let unix_now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| RateLimitError::InternalError(e.to_string()))?
            .as_secs();

        Ok(RateLimitInfo {
            limit: limit.requests_per_window,
            remaining: limit.requests_per_window - (current_count as u32 + 1),
            reset: unix_now + limit.window_seconds,
        })
    }

    /// Drop timestamps outside every window, then entries left empty.
    pub async fn cleanup_old_entries(&self) {
        let widest = self
            .limits
            .values()
            .map(RateLimit::window)
            .max()
            .unwrap_or_default();
        let now = Instant::now();

        let mut entries = self.entries.write().await;
        for entry in entries.values_mut() {
            entry.cleanup_old_requests(now, widest);
        }
        entries.retain(|_, entry| !entry.timestamps.is_empty());
    }

    pub async fn tracked_keys(&self) -> usize {
        self.entries.read().await.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitInfo {
    pub limit: u32,
    pub remaining: u32,
    pub reset: u64,
}

impl RateLimitInfo {
    /// Generate HTTP headers for rate limiting
    pub fn to_headers(&self) -> Vec<(String, String)> {
        vec![
            ("X-RateLimit-Limit".to_string(), self.limit.to_string()),
            ("X-RateLimit-Remaining".to_string(), self.remaining.to_string()),
            ("X-RateLimit-Reset".to_string(), self.reset.to_string()),
        ]
    }
}

/// Start background cleanup task
pub fn start_cleanup_task(limiter: Arc<RateLimiter>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            limiter.cleanup_old_entries().await;
        }
    })
}
