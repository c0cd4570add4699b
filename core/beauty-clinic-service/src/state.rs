// core/beauty-clinic-service/src/state.rs
// Shared application state handed to every handler

use crate::cache_invalidation::ClinicInvalidation;
use crate::repository::ClinicRepository;
use crate::users::UserStore;
use domain_cache_common::{
    CacheManager, CacheResult, JwtManager, ServiceMetrics, SingleFlight,
};
use prometheus::Registry;
use std::time::SystemTime;

/// One cache policy per cached read path.
#[derive(Clone)]
pub struct ClinicCaches {
    pub availability: CacheResult,
    pub treatment: CacheResult,
    pub catalog: CacheResult,
    pub clinic_config: CacheResult,
    pub promotions: CacheResult,
    pub history: CacheResult,
}

impl ClinicCaches {
    pub fn new(cache: &CacheManager) -> Self {
        // Availability is the hottest read; concurrent misses share one fetch.
        let flights = SingleFlight::new();
        Self {
            availability: CacheResult::new(cache.clone(), "available_appointments", "appointments")
                .with_single_flight(flights.clone()),
            treatment: CacheResult::new(cache.clone(), "treatment_detail", "treatments"),
            catalog: CacheResult::new(cache.clone(), "service_catalog", "catalog")
                .with_single_flight(flights),
            clinic_config: CacheResult::new(cache.clone(), "clinic_config", "clinic"),
            promotions: CacheResult::new(cache.clone(), "active_promotions", "promotions"),
            history: CacheResult::new(cache.clone(), "client_history", "history"),
        }
    }
}

pub struct AppState {
    pub service_name: String,
    pub start_time: SystemTime,
    pub repo: ClinicRepository,
    pub users: UserStore,
    pub jwt: JwtManager,
    pub cache: CacheManager,
    pub caches: ClinicCaches,
    pub invalidation: ClinicInvalidation,
    pub registry: Registry,
    pub metrics: ServiceMetrics,
}

impl AppState {
    pub fn new(
        service_name: &str,
        repo: ClinicRepository,
        jwt: JwtManager,
        cache: CacheManager,
        registry: Registry,
        metrics: ServiceMetrics,
    ) -> Self {
        Self {
            service_name: service_name.to_string(),
            start_time: SystemTime::now(),
            repo,
            users: UserStore::new(),
            jwt,
            caches: ClinicCaches::new(&cache),
            invalidation: ClinicInvalidation::new(cache.clone()),
            cache,
            registry,
            metrics,
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::middleware::auth::AuthMiddleware;
    use actix_web::{
        body::MessageBody,
        dev::{Service, ServiceFactory, ServiceRequest, ServiceResponse},
        http::StatusCode,
        test, web, App,
    };
    use async_trait::async_trait;
    use domain_cache_common::{
        CacheConfig, CacheError, CacheMetrics, KeyValueStore, MemoryStore, Role,
    };
    use serde_json::Value;
    use std::sync::Arc;

    pub const TEST_SECRET: &str = "test-secret";

    pub fn state_with_store(store: Arc<dyn KeyValueStore>) -> web::Data<AppState> {
        let registry = Registry::new();
        let cache_metrics = CacheMetrics::new(&registry, "beauty").unwrap();
        let metrics = ServiceMetrics::new(&registry, "beauty_clinic").unwrap();
        let cache = CacheManager::new(CacheConfig::beauty_clinic(), store).with_metrics(cache_metrics);
        web::Data::new(AppState::new(
            "beauty-clinic-service",
            ClinicRepository::seeded(),
            JwtManager::new(TEST_SECRET.to_string()),
            cache,
            registry,
            metrics,
        ))
    }

    pub fn test_state() -> web::Data<AppState> {
        state_with_store(Arc::new(MemoryStore::new()))
    }

    /// A store whose every call fails, as when Redis is down.
    pub struct UnreachableStore;

    #[async_trait]
    impl KeyValueStore for UnreachableStore {
        async fn get(&self, _: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::Transport("connection refused".into()))
        }
        async fn set_ex(&self, _: &str, _: &str, _: u64) -> Result<(), CacheError> {
            Err(CacheError::Transport("connection refused".into()))
        }
        async fn keys(&self, _: &str) -> Result<Vec<String>, CacheError> {
            Err(CacheError::Transport("connection refused".into()))
        }
        async fn delete(&self, _: &[String]) -> Result<u64, CacheError> {
            Err(CacheError::Transport("connection refused".into()))
        }
        async fn index_add(&self, _: &str, _: &str, _: u64) -> Result<(), CacheError> {
            Err(CacheError::Transport("connection refused".into()))
        }
        async fn index_members(&self, _: &str) -> Result<Vec<String>, CacheError> {
            Err(CacheError::Transport("connection refused".into()))
        }
        async fn ping(&self) -> Result<(), CacheError> {
            Err(CacheError::Transport("connection refused".into()))
        }
        fn backend_name(&self) -> &'static str {
            "unreachable"
        }
    }

    /// Routes plus authentication, without rate limiting or metrics.
    pub fn clinic_app(
        state: web::Data<AppState>,
    ) -> App<
        impl ServiceFactory<
            ServiceRequest,
            Config = (),
            Response = ServiceResponse<impl MessageBody>,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        App::new()
            .app_data(state)
            .wrap(AuthMiddleware::new(JwtManager::new(TEST_SECRET.to_string())))
            .configure(crate::configure_routes)
    }

    /// Register `username` (first one becomes admin) and return a bearer header.
    pub async fn bearer_for(state: &AppState, username: &str) -> (String, String) {
        let user = state
            .users
            .register(username, &format!("{}@clinic.test", username), "password-123")
            .await
            .unwrap();
        let token = state.jwt.issue_token(&user.username, user.role).unwrap();
        (format!("Bearer {}", token), user.id)
    }

    pub async fn admin_and_client(state: &AppState) -> (String, String, String) {
        let (admin, _) = bearer_for(state, "owner").await;
        assert_eq!(state.users.find("owner").await.unwrap().role, Role::Admin);
        let (client, client_id) = bearer_for(state, "ana").await;
        (admin, client, client_id)
    }

    /// Call the service and decode the JSON body, whether the handler or a
    /// middleware produced the response.
    pub async fn send<S, R, B>(app: &S, req: R) -> (StatusCode, Value)
    where
        S: Service<R, Response = ServiceResponse<B>, Error = actix_web::Error>,
        B: MessageBody,
    {
        match test::try_call_service(app, req).await {
            Ok(resp) => {
                let status = resp.status();
                let body = test::read_body(resp).await;
                (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
            }
            Err(err) => {
                let resp = err.error_response();
                let status = resp.status();
                let body = actix_web::body::to_bytes(resp.into_body())
                    .await
                    .unwrap_or_default();
                (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
            }
        }
    }
}
