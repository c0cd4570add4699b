// core/common/src/lib.rs
// Domain cache common library: cache-aside layer, auth and service plumbing

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod middleware;
pub mod rate_limit;
pub mod validation;

// Re-export commonly used items
pub use auth::{hash_password, require_role, verify_password, AuthError, Claims, JwtManager, Role};
pub use cache::{
    CacheConfig, CacheError, CacheManager, CacheResult, CallArgs, KeyValueStore, MemoryStore,
    SingleFlight,
};
#[cfg(feature = "redis-cache")]
pub use cache::RedisStore;
pub use config::{CacheBackend, ConfigError, Environment, LogFormat, ServiceConfig};
pub use error::{ErrorResponse, ServiceError};
pub use health::{CacheHealth, HealthResponse, HealthStatus, Readiness};
pub use logging::{
    generate_request_id, init_console_logging, init_logging, log_auth_attempt, log_failure,
    log_success, LogContext,
};
pub use metrics::{CacheMetrics, MetricsTimer, ServiceMetrics};
pub use middleware::{configure_beauty_rate_limits, RateLimitMiddleware, RouteCategories};
pub use rate_limit::{start_cleanup_task, RateLimit, RateLimitError, RateLimitInfo, RateLimiter};
pub use validation::ValidationError;
