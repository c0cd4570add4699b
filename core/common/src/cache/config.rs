// core/common/src/cache/config.rs
// Cache configuration: domain prefix and named TTL classes

use std::collections::HashMap;

/// Fallback expiry for TTL classes the configuration does not know.
pub const DEFAULT_TTL_SECONDS: u64 = 300;

pub const KEY_SEPARATOR: &str = ":";

/// Immutable cache settings for one business domain.
///
/// Every cache write resolves its expiry through [`CacheConfig::resolve_ttl`],
/// so an unknown class still gets `default_ttl` rather than living forever.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    domain_prefix: String,
    ttl_classes: HashMap<String, u64>,
    default_ttl: u64,
}

impl CacheConfig {
    pub fn new<I, S>(domain_prefix: impl Into<String>, ttl_classes: I) -> Self
    where
        I: IntoIterator<Item = (S, u64)>,
        S: Into<String>,
    {
        Self {
            domain_prefix: domain_prefix.into(),
            ttl_classes: ttl_classes
                .into_iter()
                .map(|(name, secs)| (name.into(), secs))
                .collect(),
            default_ttl: DEFAULT_TTL_SECONDS,
        }
    }

    pub fn with_default_ttl(mut self, seconds: u64) -> Self {
        self.default_ttl = seconds;
        self
    }

    /// Beauty clinic TTL table: appointment availability churns fast,
    /// clinic configuration barely moves.
    pub fn beauty_clinic() -> Self {
        Self::new(
            "beauty",
            [
                ("available_appointments", 120),
                ("treatment_detail", 600),
                ("service_catalog", 3600),
                ("clinic_config", 86400),
                ("client_history", 300),
                ("active_promotions", 300),
            ],
        )
    }

    /// Override TTL classes from variables named `CACHE_TTL_<CLASS>`.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        for (class, ttl) in self.ttl_classes.iter_mut() {
            let var = format!("CACHE_TTL_{}", class.to_uppercase());
            if let Some(raw) = lookup(&var) {
                match raw.trim().parse::<u64>() {
                    Ok(seconds) => *ttl = seconds,
                    Err(_) => tracing::warn!(
                        variable = %var,
                        value = %raw,
                        "Ignoring unparsable TTL override"
                    ),
                }
            }
        }
        self
    }

    pub fn domain_prefix(&self) -> &str {
        &self.domain_prefix
    }

    pub fn default_ttl(&self) -> u64 {
        self.default_ttl
    }

    pub fn resolve_ttl(&self, class_name: &str) -> u64 {
        self.ttl_classes
            .get(class_name)
            .copied()
            .unwrap_or(self.default_ttl)
    }

    /// Longest lifetime any entry can have; secondary index sets live this long.
    pub fn max_ttl(&self) -> u64 {
        self.ttl_classes
            .values()
            .copied()
            .chain(std::iter::once(self.default_ttl))
            .max()
            .unwrap_or(self.default_ttl)
    }

    pub fn build_key(&self, category: &str, identifier: &str) -> String {
        format!(
            "{}{sep}{}{sep}{}",
            self.domain_prefix,
            category,
            identifier,
            sep = KEY_SEPARATOR
        )
    }

    /// Glob matching every key owned by this domain.
    pub fn domain_pattern(&self) -> String {
        format!("{}{}*", self.domain_prefix, KEY_SEPARATOR)
    }
}
