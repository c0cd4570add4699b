// core/common/src/logging.rs
// Structured JSON logging with correlation IDs

use tracing::{error, info, warn};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};
use uuid::Uuid;

/// Initialize structured logging for a service
pub fn init_logging(service_name: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_span_events(FmtSpan::CLOSE)
                .with_current_span(true),
        )
        .init();

    info!(service = service_name, "Logging initialized");
}

/// Initialize simple console logging (for development)
pub fn init_console_logging(service_name: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().pretty().with_target(true))
        .init();

    info!(service = service_name, "Console logging initialized");
}

/// Generate a correlation ID for request tracing
pub fn generate_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// Context for structured logging
#[derive(Debug, Clone)]
pub struct LogContext {
    pub request_id: String,
    pub username: Option<String>,
    pub ip_address: Option<String>,
}

impl LogContext {
    pub fn new(request_id: String) -> Self {
        Self {
            request_id,
            username: None,
            ip_address: None,
        }
    }

    pub fn with_user(mut self, username: String) -> Self {
        self.username = Some(username);
        self
    }

    pub fn with_ip(mut self, ip: String) -> Self {
        self.ip_address = Some(ip);
        self
    }
}

/// Log a successful operation
pub fn log_success(ctx: &LogContext, action: &str, details: Option<&str>) {
    info!(
        request_id = %ctx.request_id,
        username = ?ctx.username,
        ip_address = ?ctx.ip_address,
        action = action,
        details = ?details,
        "Operation successful"
    );
}

/// Log a failed operation
pub fn log_failure(ctx: &LogContext, action: &str, error: &str) {
    error!(
        request_id = %ctx.request_id,
        username = ?ctx.username,
        ip_address = ?ctx.ip_address,
        action = action,
        error = error,
        "Operation failed"
    );
}

/// Log authentication attempt
pub fn log_auth_attempt(ctx: &LogContext, username: &str, success: bool) {
    if success {
        info!(
            request_id = %ctx.request_id,
            username = username,
            ip_address = ?ctx.ip_address,
            "Authentication successful"
        );
    } else {
        warn!(
            request_id = %ctx.request_id,
            attempted_username = %sanitize_for_logging(username),
            ip_address = ?ctx.ip_address,
            "Authentication failed"
        );
    }
}

/// Log rate limit exceeded
pub fn log_rate_limit_exceeded(ctx: &LogContext, endpoint: &str, key: &str) {
    warn!(
        request_id = %ctx.request_id,
        ip_address = ?ctx.ip_address,
        endpoint = endpoint,
        rate_limit_key = key,
        "Rate limit exceeded"
    );
}

/// Cache failures are advisory: logged, then the caller degrades.
pub fn log_cache_failure(backend: &str, operation: &str, key: &str, error: &dyn std::fmt::Display) {
    warn!(
        backend = backend,
        operation = operation,
        key = %key,
        error = %error,
        "Cache operation failed"
    );
}

/// Sanitize sensitive data for logging (redact passwords, tokens, etc.)
pub fn sanitize_for_logging(input: &str) -> String {
    let lower = input.to_lowercase();
    if input.chars().count() > 100 {
        let head: String = input.chars().take(20).collect();
        format!("{}...[REDACTED]", head)
    } else if lower.contains("password")
        || lower.contains("secret")
        || lower.contains("token")
        || lower.starts_with("bearer ")
    {
        "[REDACTED]".to_string()
    } else {
        input.to_string()
    }
}
