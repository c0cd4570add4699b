// core/common/src/cache/memory.rs
// In-process TTL store with Redis-compatible glob enumeration

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::store::KeyValueStore;
use super::CacheError;

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Clone)]
struct IndexSet {
    members: HashSet<String>,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct Inner {
    values: HashMap<String, StoredValue>,
    indexes: HashMap<String, IndexSet>,
}

/// Single-process stand-in for the networked store.
///
/// Expiry is measured with `tokio::time::Instant`, so paused-clock tests can
/// step over TTL windows with `tokio::time::advance`.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired value and index set. Returns the number removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.inner.write().await;
        let before = inner.values.len() + inner.indexes.len();
        inner.values.retain(|_, v| v.expires_at > now);
        inner.indexes.retain(|_, s| s.expires_at > now);
        before - (inner.values.len() + inner.indexes.len())
    }

    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let inner = self.inner.read().await;
        inner.values.values().filter(|v| v.expires_at > now).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        {
            let inner = self.inner.read().await;
            match inner.values.get(key) {
                Some(stored) if stored.expires_at > now => return Ok(Some(stored.value.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }

        // Expired: remove lazily.
        let mut inner = self.inner.write().await;
        if inner
            .values
            .get(key)
            .is_some_and(|stored| stored.expires_at <= now)
        {
            inner.values.remove(key);
        }
        Ok(None)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), CacheError> {
        let expires_at = Instant::now() + Duration::from_secs(ttl_seconds);
        let mut inner = self.inner.write().await;
        inner.values.insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        let matcher = glob_to_regex(pattern)?;
        let now = Instant::now();
        let inner = self.inner.read().await;
        let mut keys: Vec<String> = inner
            .values
            .iter()
            .filter(|(_, v)| v.expires_at > now)
            .map(|(k, _)| k)
            .chain(
                inner
                    .indexes
                    .iter()
                    .filter(|(_, s)| s.expires_at > now)
                    .map(|(k, _)| k),
            )
            .filter(|k| matcher.is_match(k))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, CacheError> {
        let now = Instant::now();
        let mut inner = self.inner.write().await;
        let mut removed = 0;
        for key in keys {
            if let Some(v) = inner.values.remove(key) {
                if v.expires_at > now {
                    removed += 1;
                }
            }
            if let Some(s) = inner.indexes.remove(key) {
                if s.expires_at > now {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    async fn index_add(
        &self,
        index_key: &str,
        member: &str,
        ttl_seconds: u64,
    ) -> Result<(), CacheError> {
        let now = Instant::now();
        let expires_at = now + Duration::from_secs(ttl_seconds);
        let mut inner = self.inner.write().await;
        let set = inner
            .indexes
            .entry(index_key.to_string())
            .or_insert_with(|| IndexSet {
                members: HashSet::new(),
                expires_at,
            });
        if set.expires_at <= now {
            set.members.clear();
        }
        set.members.insert(member.to_string());
        set.expires_at = expires_at;
        Ok(())
    }

    async fn index_members(&self, index_key: &str) -> Result<Vec<String>, CacheError> {
        let now = Instant::now();
        let inner = self.inner.read().await;
        Ok(inner
            .indexes
            .get(index_key)
            .filter(|s| s.expires_at > now)
            .map(|s| s.members.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// Translate a Redis-style glob into an anchored regex.
fn glob_to_regex(pattern: &str) -> Result<Regex, CacheError> {
    let mut out = String::with_capacity(pattern.len() * 2 + 2);
    out.push('^');
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '[' => {
                let mut class = String::new();
                let mut closed = false;
                for inner in chars.by_ref() {
                    if inner == ']' {
                        closed = true;
                        break;
                    }
                    class.push(inner);
                }
                if !closed {
                    return Err(CacheError::InvalidPattern(pattern.to_string()));
                }
                out.push('[');
                if let Some(rest) = class.strip_prefix('^') {
                    out.push('^');
                    out.push_str(&escape_class(rest));
                } else {
                    out.push_str(&escape_class(&class));
                }
                out.push(']');
            }
            '\\' => match chars.next() {
                Some(escaped) => out.push_str(&regex::escape(&escaped.to_string())),
                None => return Err(CacheError::InvalidPattern(pattern.to_string())),
            },
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    Regex::new(&out).map_err(|e| CacheError::InvalidPattern(e.to_string()))
}

fn escape_class(class: &str) -> String {
    class
        .chars()
        .map(|c| match c {
            '\\' | '[' | ']' | '^' | '&' | '~' => format!("\\{}", c),
            other => other.to_string(),
        })
        .collect()
}

/// Start background purge of expired entries.
pub fn start_purge_task(store: MemoryStore, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            let removed = store.purge_expired().await;
            if removed > 0 {
                tracing::debug!(removed = removed, "Purged expired cache entries");
            }
        }
    })
}
