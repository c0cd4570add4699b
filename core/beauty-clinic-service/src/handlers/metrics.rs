// core/beauty-clinic-service/src/handlers/metrics.rs
// Prometheus scrape endpoint

use crate::state::AppState;
use actix_web::{web, HttpResponse};
use domain_cache_common::{metrics::render, ServiceError};

pub async fn metrics_handler(state: web::Data<AppState>) -> Result<HttpResponse, ServiceError> {
    let body = render(&state.registry).map_err(|e| ServiceError::InternalError(e.to_string()))?;

    Ok(HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(body))
}
