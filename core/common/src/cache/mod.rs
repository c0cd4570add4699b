// core/common/src/cache/mod.rs
// Domain-scoped cache-aside layer: configuration, store seam, manager,
// result decorator and in-flight de-duplication.

pub mod config;
pub mod decorator;
pub mod fingerprint;
pub mod manager;
pub mod memory;
#[cfg(feature = "redis-cache")]
pub mod redis_store;
pub mod single_flight;
pub mod store;

use thiserror::Error;

pub use config::{CacheConfig, DEFAULT_TTL_SECONDS, KEY_SEPARATOR};
pub use decorator::{CacheResult, CachedCall};
pub use fingerprint::{fingerprint, CallArgs, FINGERPRINT_LEN, READ_PREFIX};
pub use manager::CacheManager;
pub use memory::{start_purge_task, MemoryStore};
#[cfg(feature = "redis-cache")]
pub use redis_store::RedisStore;
pub use single_flight::SingleFlight;
pub use store::KeyValueStore;

/// Failures inside the cache layer. None of these ever reach an HTTP caller:
/// the manager logs them and degrades to miss / no-op.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Store unavailable: {0}")]
    Transport(String),
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid key pattern: {0}")]
    InvalidPattern(String),
}

#[cfg(feature = "redis-cache")]
impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::Transport(err.to_string())
    }
}
