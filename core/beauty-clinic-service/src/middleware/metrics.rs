// core/beauty-clinic-service/src/middleware/metrics.rs
// HTTP request metrics collection middleware

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use domain_cache_common::{MetricsTimer, ServiceMetrics};
use futures_util::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::rc::Rc;

pub struct MetricsMiddleware {
    metrics: Rc<ServiceMetrics>,
}

impl MetricsMiddleware {
    pub fn new(metrics: ServiceMetrics) -> Self {
        Self {
            metrics: Rc::new(metrics),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for MetricsMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = MetricsMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(MetricsMiddlewareService {
            service: Rc::new(service),
            metrics: self.metrics.clone(),
        }))
    }
}

pub struct MetricsMiddlewareService<S> {
    service: Rc<S>,
    metrics: Rc<ServiceMetrics>,
}

impl<S, B> Service<ServiceRequest> for MetricsMiddlewareService<S>
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
        let metrics = self.metrics.clone();
        let service = self.service.clone();

        let method = req.method().to_string();
        // Route template, not the raw path, so ids don't explode label cardinality
        let endpoint = req
            .match_pattern()
            .unwrap_or_else(|| "unmatched".to_string());

        metrics
            .http_requests_in_progress
            .with_label_values(&[&method, &endpoint])
            .inc();

        let timer = MetricsTimer::new();

        Box::pin(async move {
            let result = service.call(req).await;

            metrics
                .http_requests_in_progress
                .with_label_values(&[&method, &endpoint])
                .dec();

            let duration = timer.elapsed_seconds();

            match &result {
                Ok(response) => {
                    let status = response.status();
                    metrics.record_http_request(&method, &endpoint, status.as_u16(), duration);
                    if status.is_server_error() {
                        metrics.record_error("http_5xx", &endpoint);
                    }
                }
                Err(err) => {
                    let status = err.as_response_error().status_code();
                    metrics.record_http_request(&method, &endpoint, status.as_u16(), duration);
                }
            }

            result
        })
    }
}
