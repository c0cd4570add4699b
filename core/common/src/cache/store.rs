// core/common/src/cache/store.rs
// Key-value store seam consumed by the cache manager

use async_trait::async_trait;

use super::CacheError;

/// The subset of a networked key-value store the cache layer relies on:
/// GET / SETEX / KEYS / DEL plus a set type for the secondary index.
///
/// Keys passed here are always fully qualified (`{domain}:{category}:{id}`).
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Write `value` so that it disappears after `ttl_seconds`.
    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), CacheError>;

    /// Enumerate keys matching a glob (`*`, `?`, `[...]`).
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError>;

    /// Delete in one batch, returning how many keys existed.
    async fn delete(&self, keys: &[String]) -> Result<u64, CacheError>;

    /// Add `member` to the index set `index_key`, (re)arming its expiry.
    async fn index_add(
        &self,
        index_key: &str,
        member: &str,
        ttl_seconds: u64,
    ) -> Result<(), CacheError>;

    async fn index_members(&self, index_key: &str) -> Result<Vec<String>, CacheError>;

    async fn ping(&self) -> Result<(), CacheError>;

    fn backend_name(&self) -> &'static str;
}
