// core/beauty-clinic-service/src/cache_invalidation.rs
// Which cached read paths each clinic write makes stale

use domain_cache_common::CacheManager;

pub mod tags {
    pub const CATALOG: &str = "catalog";
    pub const AVAILABLE_APPOINTMENTS: &str = "appointments:available";
    pub const CLINIC_CONFIG: &str = "clinic:config";
    pub const PROMOTIONS: &str = "promotions";

    pub fn treatment(id: u64) -> String {
        format!("treatment:{}", id)
    }

    pub fn appointment(id: u64) -> String {
        format!("appointment:{}", id)
    }

    pub fn client_history(client_id: &str) -> String {
        format!("client:{}:history", client_id)
    }
}

/// Invalidation policy for the clinic.
///
/// Every cached read registers the tags below when it is written; each
/// `on_*` hook purges all entries under the tags the mutated entity feeds.
/// Callers await the purge before answering the write request. A read that
/// fetched the old value before the purge does not write it back: the
/// manager compares invalidation generations around the fetch.
#[derive(Clone)]
pub struct ClinicInvalidation {
    cache: CacheManager,
}

impl ClinicInvalidation {
    pub fn new(cache: CacheManager) -> Self {
        Self { cache }
    }

    /// Detail view, catalog, slot listings (they embed the treatment name)
    /// and every client history that includes the treatment.
    pub async fn on_treatment_change(&self, treatment_id: u64) -> usize {
        let removed = self
            .cache
            .invalidate_tags(&[
                tags::treatment(treatment_id),
                tags::CATALOG.to_string(),
                tags::AVAILABLE_APPOINTMENTS.to_string(),
            ])
            .await;
        tracing::info!(treatment_id, removed, "Invalidated treatment caches");
        removed
    }

    pub async fn on_appointment_change(&self, appointment_id: u64, client_id: Option<&str>) -> usize {
        let mut purge = vec![
            tags::AVAILABLE_APPOINTMENTS.to_string(),
            tags::appointment(appointment_id),
        ];
        if let Some(client) = client_id {
            purge.push(tags::client_history(client));
        }
        let removed = self.cache.invalidate_tags(&purge).await;
        tracing::info!(appointment_id, client_id = ?client_id, removed, "Invalidated appointment caches");
        removed
    }

    pub async fn on_clinic_config_change(&self) -> usize {
        let removed = self
            .cache
            .invalidate_tags(&[tags::CLINIC_CONFIG.to_string()])
            .await;
        tracing::info!(removed, "Invalidated clinic configuration cache");
        removed
    }

    pub async fn on_promotion_change(&self) -> usize {
        let removed = self
            .cache
            .invalidate_tags(&[tags::PROMOTIONS.to_string()])
            .await;
        tracing::info!(removed, "Invalidated promotions cache");
        removed
    }

    /// Drop everything the clinic has cached.
    pub async fn flush_domain(&self) -> usize {
        let removed = self.cache.invalidate(None).await;
        tracing::warn!(removed, "Flushed clinic cache");
        removed
    }

    /// Glob over logical keys, e.g. `treatments:*`.
    pub async fn purge_pattern(&self, pattern: &str) -> usize {
        let removed = self.cache.invalidate(Some(pattern)).await;
        tracing::info!(pattern, removed, "Purged clinic cache by pattern");
        removed
    }
}
