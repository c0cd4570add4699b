// core/common/src/middleware.rs
// Category-based rate limiting for a domain's route prefix

use crate::error::ErrorResponse;
use crate::logging::{generate_request_id, log_rate_limit_exceeded, LogContext};
use crate::rate_limit::{RateLimit, RateLimitError, RateLimiter};
use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::InternalError,
    http::header::{HeaderName, HeaderValue},
    Error, HttpResponse,
};
use futures_util::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::rc::Rc;
use std::sync::Arc;

pub const GENERAL_CATEGORY: &str = "general";

/// Maps request paths under one route prefix to rate-limit categories.
///
/// Rules are checked in insertion order; the first fragment contained in the
/// path wins. Paths outside the prefix are not limited at all.
#[derive(Debug, Clone)]
pub struct RouteCategories {
    domain: String,
    route_prefix: String,
    rules: Vec<(String, String)>,
}

impl RouteCategories {
    pub fn new(domain: impl Into<String>, route_prefix: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            route_prefix: route_prefix.into(),
            rules: Vec::new(),
        }
    }

    pub fn rule(mut self, fragment: impl Into<String>, category: impl Into<String>) -> Self {
        self.rules.push((fragment.into(), category.into()));
        self
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn categorize(&self, path: &str) -> Option<&str> {
        let rest = path.strip_prefix(self.route_prefix.as_str())?;
        if !(rest.is_empty() || rest.starts_with('/')) {
            return None;
        }
        let category = self
            .rules
            .iter()
            .find(|(fragment, _)| rest.contains(fragment.as_str()))
            .map(|(_, category)| category.as_str())
            .unwrap_or(GENERAL_CATEGORY);
        Some(category)
    }
}

pub struct RateLimitMiddleware {
    limiter: Arc<RateLimiter>,
    routes: Arc<RouteCategories>,
}

impl RateLimitMiddleware {
    pub fn new(limiter: Arc<RateLimiter>, routes: RouteCategories) -> Self {
        Self {
            limiter,
            routes: Arc::new(routes),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimitMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RateLimitMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddlewareService {
            service: Rc::new(service),
            limiter: self.limiter.clone(),
            routes: self.routes.clone(),
        }))
    }
}

pub struct RateLimitMiddlewareService<S> {
    service: Rc<S>,
    limiter: Arc<RateLimiter>,
    routes: Arc<RouteCategories>,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let limiter = self.limiter.clone();
        let routes = self.routes.clone();

        Box::pin(async move {
            let category = match routes.categorize(req.path()) {
                Some(category) => category.to_string(),
                None => return service.call(req).await,
            };

            let key = req
                .connection_info()
                .realip_remote_addr()
                .unwrap_or("unknown")
                .to_string();

            match limiter.check_rate_limit(&category, &key).await {
                Ok(info) => {
                    let mut res = service.call(req).await?;

                    let headers = res.headers_mut();
                    for (header_name, header_value) in info.to_headers() {
                        if let (Ok(name), Ok(value)) = (
                            HeaderName::from_bytes(header_name.as_bytes()),
                            HeaderValue::from_str(&header_value),
                        ) {
                            headers.insert(name, value);
                        }
                    }

                    Ok(res)
                }
                Err(RateLimitError::LimitExceeded(msg)) => {
                    let ctx = LogContext::new(generate_request_id()).with_ip(key.clone());
                    log_rate_limit_exceeded(&ctx, req.path(), &category);

                    let limit = limiter.limit_for(&category).cloned();
                    let body = ErrorResponse::new(
                        "Rate limit exceeded".to_string(),
                        "rate_limit_exceeded".to_string(),
                        msg.clone(),
                    )
                    .with_details(serde_json::json!({
                        "category": category,
                        "limit": limit.as_ref().map(|l| l.requests_per_window),
                        "window": limit.as_ref().map(|l| l.window_seconds),
                        "domain": routes.domain(),
                    }))
                    .with_request_id(ctx.request_id);

                    let response = HttpResponse::TooManyRequests().json(body);
                    Err(InternalError::from_response(msg, response).into())
                }
                Err(RateLimitError::InternalError(e)) => {
                    tracing::warn!(error = %e, category = %category, "Rate limiter failed, allowing request");
                    service.call(req).await
                }
            }
        })
    }
}

/// Rate-limit categories and route rules for the beauty clinic API.
pub fn configure_beauty_rate_limits(
    limiter: &mut RateLimiter,
    domain: &str,
    route_prefix: &str,
) -> RouteCategories {
    limiter.add_limit("availability", RateLimit::per_minute(400));
    limiter.add_limit("booking", RateLimit::per_minute(100));
    limiter.add_limit("history", RateLimit::per_minute(150));
    limiter.add_limit("admin", RateLimit::per_minute(50));
    limiter.add_limit(GENERAL_CATEGORY, RateLimit::per_minute(120));

    RouteCategories::new(domain, route_prefix)
        .rule("/appointments/available", "availability")
        .rule("/book", "booking")
        .rule("/cancel", "booking")
        .rule("/history", "history")
        .rule("/admin", "admin")
}
