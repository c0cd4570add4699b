// core/beauty-clinic-service/src/handlers/health.rs
// Health check endpoints

use crate::state::AppState;
use actix_web::{http::StatusCode, web, HttpResponse, Result};
use domain_cache_common::{CacheHealth, HealthResponse, Readiness};
use serde_json::json;

/// Health check endpoint - service health plus cache store latency
pub async fn health_check(data: web::Data<AppState>) -> Result<HttpResponse> {
    let cache = CacheHealth::check(&data.cache).await;
    let health = HealthResponse::new(
        data.service_name.as_str(),
        env!("CARGO_PKG_VERSION"),
        data.start_time,
        cache,
    )
    .with_features(vec![
        "cache-aside".to_string(),
        "tag-invalidation".to_string(),
        "jwt-auth".to_string(),
        "rate-limiting".to_string(),
    ]);

    Ok(HttpResponse::Ok().json(health))
}

/// Liveness probe - is the service alive?
pub async fn liveness_probe() -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(json!({ "alive": true })))
}

/// Readiness probe - 503 while the cache store is unreachable.
pub async fn readiness_probe(data: web::Data<AppState>) -> Result<HttpResponse> {
    let readiness = Readiness::check(&data.cache).await;
    let status = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    Ok(HttpResponse::build(status).json(readiness))
}
