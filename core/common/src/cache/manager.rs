// core/common/src/cache/manager.rs
// Cache manager: namespaced keys, JSON values, best-effort store access

use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};

use super::config::CacheConfig;
use super::store::KeyValueStore;
use super::CacheError;
use crate::metrics::CacheMetrics;

const DATA_CATEGORY: &str = "data";
const INDEX_CATEGORY: &str = "index";
const META_CATEGORY: &str = "meta";
const GENERATION_KEY: &str = "generation";

/// Marker read from the store that changes on every invalidation.
///
/// Taken before a fetch and compared after the write, it lets a reader tell
/// that a writer purged the domain while the fetched value was in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation(Option<String>);

/// Sole owner of cache entries for one domain.
///
/// The cache is advisory: a store failure is logged at `warn`, counted, and
/// then reported to the caller as a miss (reads) or a no-op (writes and
/// invalidations). Nothing here returns an error.
#[derive(Clone)]
pub struct CacheManager {
    config: Arc<CacheConfig>,
    store: Arc<dyn KeyValueStore>,
    metrics: Option<CacheMetrics>,
}

impl CacheManager {
    pub fn new(config: CacheConfig, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            config: Arc::new(config),
            store,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: CacheMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn metrics(&self) -> Option<&CacheMetrics> {
        self.metrics.as_ref()
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Fully-qualified store key for a logical cache key.
    pub fn data_key(&self, key: &str) -> String {
        self.config.build_key(DATA_CATEGORY, key)
    }

    fn index_key(&self, tag: &str) -> String {
        self.config.build_key(INDEX_CATEGORY, tag)
    }

    fn generation_key(&self) -> String {
        self.config.build_key(META_CATEGORY, GENERATION_KEY)
    }

    /// Current invalidation generation, or `None` if the store did not answer.
    pub async fn generation(&self) -> Option<Generation> {
        let key = self.generation_key();
        match self.store.get(&key).await {
            Ok(marker) => Some(Generation(marker)),
            Err(e) => {
                self.failure("generation", &key, &e);
                None
            }
        }
    }

    async fn advance_generation(&self) {
        let key = self.generation_key();
        let marker = uuid::Uuid::new_v4().to_string();
        if let Err(e) = self.store.set_ex(&key, &marker, self.config.max_ttl()).await {
            self.failure("generation", &key, &e);
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let full_key = self.data_key(key);
        let raw = match self.store.get(&full_key).await {
            Ok(raw) => raw,
            Err(e) => {
                self.failure("get", &full_key, &e);
                self.count(|m| m.record_miss());
                return None;
            }
        };

        let Some(raw) = raw else {
            tracing::debug!(key = %full_key, "Cache miss");
            self.count(|m| m.record_miss());
            return None;
        };

        match serde_json::from_str::<T>(&raw) {
            Ok(value) => {
                tracing::debug!(key = %full_key, "Cache hit");
                self.count(|m| m.record_hit());
                Some(value)
            }
            Err(e) => {
                self.failure("decode", &full_key, &CacheError::from(e));
                self.count(|m| m.record_miss());
                None
            }
        }
    }

    /// Store `value` for the TTL of `ttl_class`. `false` means "not cached".
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl_class: &str) -> bool {
        self.set_tagged(key, value, ttl_class, &[]).await
    }

    /// Like [`CacheManager::set`], also recording the entry under every tag
    /// so [`CacheManager::invalidate_tags`] can find it without a key scan.
    pub async fn set_tagged<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl_class: &str,
        tags: &[String],
    ) -> bool {
        let full_key = self.data_key(key);
        let serialized = match serde_json::to_string(value) {
            Ok(s) => s,
            Err(e) => {
                self.failure("encode", &full_key, &CacheError::from(e));
                self.count(|m| m.record_write(false));
                return false;
            }
        };

        let ttl = self.config.resolve_ttl(ttl_class);
        if let Err(e) = self.store.set_ex(&full_key, &serialized, ttl).await {
            self.failure("set", &full_key, &e);
            self.count(|m| m.record_write(false));
            return false;
        }

        // Index sets outlive any member so a tag never forgets a live entry.
        let index_ttl = self.config.max_ttl();
        for tag in tags {
            let index_key = self.index_key(tag);
            if let Err(e) = self.store.index_add(&index_key, &full_key, index_ttl).await {
                // An entry no tag can reach would survive its invalidation.
                self.failure("index", &index_key, &e);
                self.discard(&full_key).await;
                self.count(|m| m.record_write(false));
                return false;
            }
        }

        tracing::debug!(key = %full_key, ttl_seconds = ttl, ttl_class = ttl_class, "Cache set");
        self.count(|m| m.record_write(true));
        true
    }

    /// [`CacheManager::set_tagged`], unless an invalidation ran since `seen`
    /// was read. The check happens after the write: invalidations that start
    /// later find the entry through its tags, earlier ones show up as a
    /// changed generation and the entry is dropped again.
    pub async fn set_tagged_since<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl_class: &str,
        tags: &[String],
        seen: &Generation,
    ) -> bool {
        if !self.set_tagged(key, value, ttl_class, tags).await {
            return false;
        }
        if self.generation().await.as_ref() == Some(seen) {
            return true;
        }

        let full_key = self.data_key(key);
        tracing::debug!(key = %full_key, "Dropping value fetched before an invalidation");
        self.discard(&full_key).await;
        false
    }

    /// Delete entries matching `pattern` (scoped under the domain's data
    /// keys), or every key of the domain when `pattern` is `None`.
    ///
    /// Returns how many keys were removed; callers should not depend on it.
    pub async fn invalidate(&self, pattern: Option<&str>) -> usize {
        let scoped = match pattern {
            Some(p) => self.data_key(p),
            None => self.config.domain_pattern(),
        };

        self.advance_generation().await;
        let generation_key = self.generation_key();
        let keys: Vec<String> = match self.store.keys(&scoped).await {
            Ok(keys) => keys.into_iter().filter(|k| *k != generation_key).collect(),
            Err(e) => {
                self.failure("invalidate", &scoped, &e);
                return 0;
            }
        };

        let removed = self.delete_batch(&keys, &scoped).await;
        tracing::debug!(pattern = %scoped, removed = removed, "Cache invalidated by pattern");
        removed
    }

    /// Delete every entry recorded under any of `tags`, then the index sets.
    ///
    /// The returned count covers cached entries only.
    pub async fn invalidate_tags(&self, tags: &[String]) -> usize {
        // Advance before reading the indexes; see `set_tagged_since`.
        self.advance_generation().await;
        let mut doomed = Vec::new();
        let mut indexes = Vec::with_capacity(tags.len());
        for tag in tags {
            let index_key = self.index_key(tag);
            match self.store.index_members(&index_key).await {
                Ok(members) => doomed.extend(members),
                Err(e) => self.failure("invalidate", &index_key, &e),
            }
            indexes.push(index_key);
        }
        doomed.sort();
        doomed.dedup();

        let removed = self.delete_batch(&doomed, "tags").await;
        if let Err(e) = self.store.delete(&indexes).await {
            self.failure("invalidate", "index", &e);
        }
        tracing::debug!(tags = ?tags, removed = removed, "Cache invalidated by tag");
        removed
    }

    /// Whether the backing store currently answers.
    pub async fn is_available(&self) -> bool {
        match self.store.ping().await {
            Ok(()) => true,
            Err(e) => {
                self.failure("ping", self.config.domain_prefix(), &e);
                false
            }
        }
    }

    async fn delete_batch(&self, keys: &[String], context: &str) -> usize {
        if keys.is_empty() {
            return 0;
        }
        match self.store.delete(keys).await {
            Ok(n) => {
                let n = n as usize;
                self.count(|m| m.record_invalidated(n));
                n
            }
            Err(e) => {
                self.failure("invalidate", context, &e);
                0
            }
        }
    }

    async fn discard(&self, full_key: &str) {
        if let Err(e) = self.store.delete(&[full_key.to_string()]).await {
            self.failure("delete", full_key, &e);
        }
    }

    fn failure(&self, operation: &str, key: &str, error: &CacheError) {
        crate::logging::log_cache_failure(self.store.backend_name(), operation, key, error);
        self.count(|m| m.record_error(operation));
    }

    fn count(&self, f: impl FnOnce(&CacheMetrics)) {
        if let Some(metrics) = &self.metrics {
            f(metrics);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cache::memory::MemoryStore;
    use async_trait::async_trait;
    use prometheus::Registry;
    use serde_json::{json, Value};
    use std::time::Duration;

    /// Store whose every call fails, as if the network were down.
    pub(crate) struct UnreachableStore;

    #[async_trait]
    impl KeyValueStore for UnreachableStore {
        async fn get(&self, _: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::Transport("connection refused".into()))
        }
        async fn set_ex(&self, _: &str, _: &str, _: u64) -> Result<(), CacheError> {
            Err(CacheError::Transport("connection refused".into()))
        }
        async fn keys(&self, _: &str) -> Result<Vec<String>, CacheError> {
            Err(CacheError::Transport("connection refused".into()))
        }
        async fn delete(&self, _: &[String]) -> Result<u64, CacheError> {
            Err(CacheError::Transport("connection refused".into()))
        }
        async fn index_add(&self, _: &str, _: &str, _: u64) -> Result<(), CacheError> {
            Err(CacheError::Transport("connection refused".into()))
        }
        async fn index_members(&self, _: &str) -> Result<Vec<String>, CacheError> {
            Err(CacheError::Transport("connection refused".into()))
        }
        async fn ping(&self) -> Result<(), CacheError> {
            Err(CacheError::Transport("connection refused".into()))
        }
        fn backend_name(&self) -> &'static str {
            "unreachable"
        }
    }

    /// Memory store that refuses every tag-index write.
    struct IndexRefusingStore(MemoryStore);

    #[async_trait]
    impl KeyValueStore for IndexRefusingStore {
        async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
            self.0.get(key).await
        }
        async fn set_ex(&self, key: &str, value: &str, ttl: u64) -> Result<(), CacheError> {
            self.0.set_ex(key, value, ttl).await
        }
        async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
            self.0.keys(pattern).await
        }
        async fn delete(&self, keys: &[String]) -> Result<u64, CacheError> {
            self.0.delete(keys).await
        }
        async fn index_add(&self, _: &str, _: &str, _: u64) -> Result<(), CacheError> {
            Err(CacheError::Transport("broken pipe".into()))
        }
        async fn index_members(&self, key: &str) -> Result<Vec<String>, CacheError> {
            self.0.index_members(key).await
        }
        async fn ping(&self) -> Result<(), CacheError> {
            self.0.ping().await
        }
        fn backend_name(&self) -> &'static str {
            "memory"
        }
    }

    fn manager() -> CacheManager {
        let config = CacheConfig::new("test", [("short", 2), ("long", 3600)]);
        CacheManager::new(config, Arc::new(MemoryStore::new()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_then_get_until_expiry() {
        let cache = manager();

        assert!(cache.set("k1", &json!({"a": 1}), "short").await);
        assert_eq!(cache.get::<Value>("k1").await, Some(json!({"a": 1})));

        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(cache.get::<Value>("k1").await, None);
    }

    #[tokio::test]
    async fn test_get_never_written() {
        let cache = manager();
        assert_eq!(cache.get::<Value>("nothing-here").await, None);
    }

    #[tokio::test]
    async fn test_round_trip_nested_values() {
        let cache = manager();
        let values = vec![
            json!(null),
            json!(true),
            json!(-12.5),
            json!("text"),
            json!([1, "two", [3.0], {"four": null}]),
            json!({"menu": {"items": [{"id": 1, "tags": ["vegan"]}], "active": false}}),
        ];

        for (i, value) in values.into_iter().enumerate() {
            let key = format!("value:{}", i);
            assert!(cache.set(&key, &value, "long").await);
            assert_eq!(cache.get::<Value>(&key).await, Some(value));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rewrite_resets_expiry_only() {
        let cache = manager();
        cache.set("k", &json!({"v": 1}), "short").await;
        tokio::time::advance(Duration::from_millis(1500)).await;
        cache.set("k", &json!({"v": 1}), "short").await;
        tokio::time::advance(Duration::from_millis(1500)).await;

        assert_eq!(cache.get::<Value>("k").await, Some(json!({"v": 1})));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_ttl_class_uses_default() {
        let config = CacheConfig::new("test", [("short", 2)]).with_default_ttl(10);
        let cache = CacheManager::new(config, Arc::new(MemoryStore::new()));

        cache.set("k", &1, "mystery").await;
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(cache.get::<i32>("k").await, Some(1));
        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(cache.get::<i32>("k").await, None);
    }

    #[tokio::test]
    async fn test_pattern_invalidation_is_selective() {
        let cache = manager();
        cache.set("treatments:details:5:aa", &json!(5), "long").await;
        cache.set("treatments:details:6:bb", &json!(6), "long").await;

        cache.invalidate(Some("*details:5*")).await;

        assert_eq!(cache.get::<Value>("treatments:details:5:aa").await, None);
        assert_eq!(cache.get::<Value>("treatments:details:6:bb").await, Some(json!(6)));
    }

    #[tokio::test]
    async fn test_full_domain_flush() {
        let store = Arc::new(MemoryStore::new());
        let cache = CacheManager::new(CacheConfig::new("mine", [("long", 60)]), store.clone());
        let other = CacheManager::new(CacheConfig::new("other", [("long", 60)]), store.clone());

        cache.set("a", &1, "long").await;
        cache.set_tagged("b", &2, "long", &["t".to_string()]).await;
        other.set("a", &3, "long").await;

        assert_eq!(cache.invalidate(None).await, 3);
        assert_eq!(cache.get::<i32>("a").await, None);
        assert_eq!(cache.get::<i32>("b").await, None);
        assert_eq!(other.get::<i32>("a").await, Some(3));
    }

    #[tokio::test]
    async fn test_tag_invalidation() {
        let cache = manager();
        let t5 = vec!["treatment:5".to_string(), "catalog".to_string()];
        cache.set_tagged("detail-5", &json!({"id": 5}), "long", &t5[..1]).await;
        cache.set_tagged("catalog", &json!([5, 6]), "long", &t5[1..]).await;
        cache.set_tagged("detail-6", &json!({"id": 6}), "long", &["treatment:6".to_string()]).await;

        let removed = cache.invalidate_tags(&t5).await;
        assert_eq!(removed, 2);

        assert_eq!(cache.get::<Value>("detail-5").await, None);
        assert_eq!(cache.get::<Value>("catalog").await, None);
        assert_eq!(cache.get::<Value>("detail-6").await, Some(json!({"id": 6})));
    }

    #[tokio::test]
    async fn test_type_mismatch_is_a_miss() {
        let cache = manager();
        cache.set("k", &"not a number", "long").await;
        assert_eq!(cache.get::<u32>("k").await, None);
    }

    #[tokio::test]
    async fn test_unreachable_store_degrades() {
        let registry = Registry::new();
        let metrics = CacheMetrics::new(&registry, "test").unwrap();
        let cache = CacheManager::new(CacheConfig::beauty_clinic(), Arc::new(UnreachableStore))
            .with_metrics(metrics.clone());

        assert!(!cache.set("k", &json!(1), "service_catalog").await);
        assert_eq!(cache.get::<Value>("k").await, None);
        assert_eq!(cache.invalidate(Some("*")).await, 0);
        assert_eq!(cache.invalidate_tags(&["x".to_string()]).await, 0);
        assert!(!cache.is_available().await);

        assert_eq!(metrics.errors_total.with_label_values(&["set"]).get(), 1);
        assert_eq!(metrics.errors_total.with_label_values(&["get"]).get(), 1);
        assert_eq!(metrics.misses_total.get(), 1);
    }

    #[tokio::test]
    async fn test_metrics_count_hits_and_misses() {
        let registry = Registry::new();
        let metrics = CacheMetrics::new(&registry, "test").unwrap();
        let cache = manager().with_metrics(metrics.clone());

        cache.get::<i32>("k").await;
        cache.set("k", &1, "long").await;
        cache.get::<i32>("k").await;

        assert_eq!(metrics.hits_total.get(), 1);
        assert_eq!(metrics.misses_total.get(), 1);
        assert_eq!(metrics.writes_total.with_label_values(&["ok"]).get(), 1);
    }

    #[tokio::test]
    async fn test_unindexed_entry_is_not_kept() {
        let registry = Registry::new();
        let metrics = CacheMetrics::new(&registry, "test").unwrap();
        let config = CacheConfig::new("test", [("long", 3600)]);
        let cache = CacheManager::new(config, Arc::new(IndexRefusingStore(MemoryStore::new())))
            .with_metrics(metrics.clone());

        let tags = vec!["treatment:5".to_string()];
        assert!(!cache.set_tagged("detail-5", &json!({"id": 5}), "long", &tags).await);
        assert_eq!(cache.get::<Value>("detail-5").await, None);

        assert_eq!(metrics.writes_total.with_label_values(&["failed"]).get(), 1);
        assert_eq!(metrics.writes_total.with_label_values(&["ok"]).get(), 0);
        assert_eq!(metrics.errors_total.with_label_values(&["index"]).get(), 1);

        // Untagged writes never touch the index.
        assert!(cache.set("plain", &1, "long").await);
    }

    #[tokio::test]
    async fn test_generation_advances_on_every_invalidation() {
        let cache = manager();
        let start = cache.generation().await.unwrap();

        cache.invalidate_tags(&["nothing".to_string()]).await;
        let after_tags = cache.generation().await.unwrap();
        assert_ne!(after_tags, start);

        cache.invalidate(Some("*")).await;
        let after_pattern = cache.generation().await.unwrap();
        assert_ne!(after_pattern, after_tags);

        cache.invalidate(None).await;
        assert_ne!(cache.generation().await.unwrap(), after_pattern);
    }

    #[tokio::test]
    async fn test_set_since_stale_generation_is_dropped() {
        let cache = manager();
        let tags = vec!["cfg".to_string()];

        let seen = cache.generation().await.unwrap();
        assert!(cache.set_tagged_since("a", &1, "long", &tags, &seen).await);
        assert_eq!(cache.get::<i32>("a").await, Some(1));

        let seen = cache.generation().await.unwrap();
        cache.invalidate_tags(&tags).await;
        assert!(!cache.set_tagged_since("b", &2, "long", &tags, &seen).await);
        assert_eq!(cache.get::<i32>("b").await, None);
    }
}
