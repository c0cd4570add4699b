// core/common/src/cache/decorator.rs
// Cache-aside wrapper for data-fetching operations

use std::future::Future;

use serde::{de::DeserializeOwned, Serialize};

use super::fingerprint::{fingerprint, CallArgs, FINGERPRINT_LEN};
use super::manager::CacheManager;
use super::single_flight::SingleFlight;
use super::KEY_SEPARATOR;

/// Cache policy for one read path: which TTL class its results get and
/// which prefix its keys live under.
///
/// ```ignore
/// let catalog = CacheResult::new(cache.clone(), "service_catalog", "catalog");
/// let treatments = catalog
///     .op("get_catalog")
///     .tag("catalog")
///     .run(|| async { repo.list_treatments().await })
///     .await?;
/// ```
#[derive(Clone)]
pub struct CacheResult {
    manager: CacheManager,
    ttl_class: String,
    key_prefix: String,
    fingerprint_len: usize,
    single_flight: Option<SingleFlight>,
}

impl CacheResult {
    pub fn new(
        manager: CacheManager,
        ttl_class: impl Into<String>,
        key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            manager,
            ttl_class: ttl_class.into(),
            key_prefix: key_prefix.into(),
            fingerprint_len: FINGERPRINT_LEN,
            single_flight: None,
        }
    }

    /// Let concurrent misses on the same key share one computation.
    pub fn with_single_flight(mut self, flights: SingleFlight) -> Self {
        self.single_flight = Some(flights);
        self
    }

    pub fn ttl_class(&self) -> &str {
        &self.ttl_class
    }

    /// Start describing one call of the operation `name`.
    pub fn op<'a, T>(&'a self, name: &'a str) -> CachedCall<'a, T> {
        CachedCall {
            policy: self,
            name,
            args: CallArgs::new(),
            tags: Vec::new(),
            tags_from: None,
        }
    }

    /// Logical key (`{key_prefix}:{op}:{fingerprint}`) for a call.
    pub fn cache_key(&self, name: &str, args: &CallArgs) -> String {
        format!(
            "{}{sep}{}{sep}{}",
            self.key_prefix,
            name,
            fingerprint(name, args, self.fingerprint_len),
            sep = KEY_SEPARATOR
        )
    }
}

type TagsFrom<'a, T> = Box<dyn FnOnce(&T) -> Vec<String> + Send + 'a>;

/// One call being routed through a [`CacheResult`].
pub struct CachedCall<'a, T> {
    policy: &'a CacheResult,
    name: &'a str,
    args: CallArgs,
    tags: Vec<String>,
    tags_from: Option<TagsFrom<'a, T>>,
}

impl<'a, T> CachedCall<'a, T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn receiver<A: Serialize>(mut self, value: A) -> Self {
        self.args = self.args.receiver(value);
        self
    }

    pub fn arg<A: Serialize>(mut self, value: A) -> Self {
        self.args = self.args.arg(value);
        self
    }

    pub fn named<A: Serialize>(mut self, name: impl Into<String>, value: A) -> Self {
        self.args = self.args.named(name, value);
        self
    }

    /// Register the cached result under an invalidation tag.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Derive further tags from the computed result (e.g. every entity it joins).
    pub fn tags_from<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&T) -> Vec<String> + Send + 'a,
    {
        self.tags_from = Some(Box::new(f));
        self
    }

    /// Return the cached result, or run `fetch` and cache its `Ok` value.
    /// Errors from `fetch` pass through untouched and are never cached.
    pub async fn run<E, F, Fut>(self, fetch: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.args.is_cacheable() {
            tracing::warn!(op = self.name, "Bypassing cache for unfingerprintable call");
            return fetch().await;
        }

        let manager = &self.policy.manager;
        let key = self.policy.cache_key(self.name, &self.args);

        if let Some(hit) = manager.get::<T>(&key).await {
            return Ok(hit);
        }

        let _flight = match &self.policy.single_flight {
            Some(flights) => {
                let guard = flights.acquire(&key).await;
                // Another caller may have filled the entry while we waited.
                if let Some(hit) = manager.get::<T>(&key).await {
                    return Ok(hit);
                }
                Some(guard)
            }
            None => None,
        };

        let seen = manager.generation().await;
        let result = fetch().await?;

        // No generation means the store is not answering; skip the write.
        let Some(seen) = seen else {
            return Ok(result);
        };

        let mut tags = self.tags;
        if let Some(derive) = self.tags_from {
            tags.extend(derive(&result));
        }
        manager
            .set_tagged_since(&key, &result, &self.policy.ttl_class, &tags, &seen)
            .await;

        Ok(result)
    }
}
