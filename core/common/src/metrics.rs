// core/common/src/metrics.rs
// Prometheus metrics collection

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry,
    TextEncoder,
};
use std::time::Instant;

/// Service-wide metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    // HTTP metrics
    pub http_requests_total: IntCounterVec,
    pub http_request_duration_seconds: HistogramVec,
    pub http_requests_in_progress: IntGaugeVec,

    // Error metrics
    pub errors_total: IntCounterVec,

    // Business metrics
    pub business_operations_total: IntCounterVec,
    pub business_operation_duration_seconds: HistogramVec,
}

impl ServiceMetrics {
    pub fn new(registry: &Registry, service_name: &str) -> Result<Self, prometheus::Error> {
        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total number of HTTP requests")
                .namespace(service_name),
            &["method", "endpoint", "status"],
        )?;
        registry.register(Box::new(http_requests_total.clone()))?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .namespace(service_name)
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["method", "endpoint"],
        )?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        let http_requests_in_progress = IntGaugeVec::new(
            Opts::new("http_requests_in_progress", "Number of HTTP requests currently being processed")
                .namespace(service_name),
            &["method", "endpoint"],
        )?;
        registry.register(Box::new(http_requests_in_progress.clone()))?;

        let errors_total = IntCounterVec::new(
            Opts::new("errors_total", "Total number of errors")
                .namespace(service_name),
            &["type", "operation"],
        )?;
        registry.register(Box::new(errors_total.clone()))?;

        let business_operations_total = IntCounterVec::new(
            Opts::new("business_operations_total", "Total number of business operations")
                .namespace(service_name),
            &["operation", "status"],
        )?;
        registry.register(Box::new(business_operations_total.clone()))?;

        let business_operation_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "business_operation_duration_seconds",
                "Business operation duration in seconds",
            )
            .namespace(service_name)
            .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]),
            &["operation"],
        )?;
        registry.register(Box::new(business_operation_duration_seconds.clone()))?;

        Ok(Self {
            http_requests_total,
            http_request_duration_seconds,
            http_requests_in_progress,
            errors_total,
            business_operations_total,
            business_operation_duration_seconds,
        })
    }

    /// Record an HTTP request
    pub fn record_http_request(
        &self,
        method: &str,
        endpoint: &str,
        status: u16,
        duration: f64,
    ) {
        self.http_requests_total
            .with_label_values(&[method, endpoint, &status.to_string()])
            .inc();

        self.http_request_duration_seconds
            .with_label_values(&[method, endpoint])
            .observe(duration);
    }

    /// Record an error
    pub fn record_error(&self, error_type: &str, operation: &str) {
        self.errors_total
            .with_label_values(&[error_type, operation])
            .inc();
    }

    /// Record a business operation (booking, treatment update, ...)
    pub fn record_business_operation(&self, operation: &str, status: &str, duration: f64) {
        self.business_operations_total
            .with_label_values(&[operation, status])
            .inc();

        self.business_operation_duration_seconds
            .with_label_values(&[operation])
            .observe(duration);
    }
}

/// Cache health counters.
///
/// Store failures are served as misses, so these counters are the only place
/// a degraded store becomes visible.
#[derive(Clone)]
pub struct CacheMetrics {
    pub hits_total: IntCounter,
    pub misses_total: IntCounter,
    pub writes_total: IntCounterVec,
    pub errors_total: IntCounterVec,
    pub invalidated_keys_total: IntCounter,
}

impl CacheMetrics {
    pub fn new(registry: &Registry, domain: &str) -> Result<Self, prometheus::Error> {
        let hits_total = IntCounter::with_opts(
            Opts::new("cache_hits_total", "Cache lookups served from the store")
                .const_label("domain", domain),
        )?;
        registry.register(Box::new(hits_total.clone()))?;

        let misses_total = IntCounter::with_opts(
            Opts::new("cache_misses_total", "Cache lookups that fell through to the source")
                .const_label("domain", domain),
        )?;
        registry.register(Box::new(misses_total.clone()))?;

        let writes_total = IntCounterVec::new(
            Opts::new("cache_writes_total", "Cache writes by outcome")
                .const_label("domain", domain),
            &["status"],
        )?;
        registry.register(Box::new(writes_total.clone()))?;

        let errors_total = IntCounterVec::new(
            Opts::new("cache_errors_total", "Cache store failures by operation")
                .const_label("domain", domain),
            &["operation"],
        )?;
        registry.register(Box::new(errors_total.clone()))?;

        let invalidated_keys_total = IntCounter::with_opts(
            Opts::new("cache_invalidated_keys_total", "Keys removed by invalidation")
                .const_label("domain", domain),
        )?;
        registry.register(Box::new(invalidated_keys_total.clone()))?;

        Ok(Self {
            hits_total,
            misses_total,
            writes_total,
            errors_total,
            invalidated_keys_total,
        })
    }

    pub fn record_hit(&self) {
        self.hits_total.inc();
    }

    pub fn record_miss(&self) {
        self.misses_total.inc();
    }

    pub fn record_write(&self, success: bool) {
        let status = if success { "ok" } else { "failed" };
        self.writes_total.with_label_values(&[status]).inc();
    }

    pub fn record_error(&self, operation: &str) {
        self.errors_total.with_label_values(&[operation]).inc();
    }

    pub fn record_invalidated(&self, keys: usize) {
        self.invalidated_keys_total.inc_by(keys as u64);
    }

    /// Hit ratio in percent over the process lifetime.
    pub fn hit_rate_percentage(&self) -> f64 {
        let hits = self.hits_total.get() as f64;
        let total = hits + self.misses_total.get() as f64;
        if total == 0.0 {
            0.0
        } else {
            hits / total * 100.0
        }
    }
}

/// Render a registry in the Prometheus text exposition format.
pub fn render(registry: &Registry) -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// Timer to measure operation duration
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for MetricsTimer {
    fn default() -> Self {
        Self::new()
    }
}
