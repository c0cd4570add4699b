// core/beauty-clinic-service/src/main.rs
// Beauty Clinic Service: cached clinic reads, invalidating writes, JWT auth

mod cache_invalidation;
mod models;
mod repository;
mod state;
mod users;
mod handlers {
    pub mod admin;
    pub mod auth;
    pub mod clinic;
    pub mod health;
    pub mod metrics;
}
mod middleware {
    pub mod auth;
    pub mod metrics;
}

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use domain_cache_common::{
    cache::start_purge_task, configure_beauty_rate_limits, init_console_logging, init_logging,
    start_cleanup_task, CacheBackend, CacheConfig, CacheManager, CacheMetrics, JwtManager,
    KeyValueStore, LogFormat, MemoryStore, RateLimitMiddleware, RateLimiter, RedisStore,
    ServiceConfig, ServiceMetrics,
};
use dotenv::dotenv;
use prometheus::Registry;
use repository::ClinicRepository;
use state::AppState;
use std::sync::Arc;
use std::time::Duration;

pub(crate) const SERVICE_NAME: &str = "beauty-clinic-service";
pub(crate) const ROUTE_PREFIX: &str = "/beauty";

const RATE_LIMIT_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);
const MEMORY_PURGE_INTERVAL: Duration = Duration::from_secs(60);

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg
        // Health and metrics (no auth)
        .route("/health", web::get().to(handlers::health::health_check))
        .route("/liveness", web::get().to(handlers::health::liveness_probe))
        .route("/readiness", web::get().to(handlers::health::readiness_probe))
        .route("/metrics", web::get().to(handlers::metrics::metrics_handler))
        // Accounts
        .service(
            web::scope("/auth")
                .route("/register", web::post().to(handlers::auth::register))
                .route("/login", web::post().to(handlers::auth::login))
                .route("/refresh", web::post().to(handlers::auth::refresh))
                .route("/me", web::get().to(handlers::auth::me)),
        )
        .service(
            web::scope("/admin")
                .route("/users", web::get().to(handlers::admin::list_users))
                .route(
                    "/users/{username}/role",
                    web::post().to(handlers::admin::set_user_role),
                ),
        )
        // Clinic
        .service(
            web::scope(ROUTE_PREFIX)
                .route(
                    "/appointments/available",
                    web::get().to(handlers::clinic::available_appointments),
                )
                .route(
                    "/appointments/{id}/book",
                    web::post().to(handlers::clinic::book_appointment),
                )
                .route(
                    "/appointments/{id}/cancel",
                    web::post().to(handlers::clinic::cancel_appointment),
                )
                .route("/treatments/{id}", web::get().to(handlers::clinic::treatment_detail))
                .route("/catalog/treatments", web::get().to(handlers::clinic::service_catalog))
                .route("/config/clinic", web::get().to(handlers::clinic::clinic_config))
                .route("/promotions", web::get().to(handlers::clinic::active_promotions))
                .route(
                    "/clients/{id}/history",
                    web::get().to(handlers::clinic::client_history),
                )
                .service(
                    web::scope("/admin")
                        .route("/treatments", web::post().to(handlers::admin::create_treatment))
                        .route(
                            "/treatments/{id}",
                            web::put().to(handlers::admin::update_treatment),
                        )
                        .route(
                            "/treatments/{id}",
                            web::delete().to(handlers::admin::delete_treatment),
                        )
                        .route(
                            "/appointments",
                            web::post().to(handlers::admin::create_appointment),
                        )
                        .route("/config", web::put().to(handlers::admin::update_clinic_config))
                        .route("/promotions", web::post().to(handlers::admin::create_promotion))
                        .route("/cache", web::delete().to(handlers::admin::purge_cache)),
                ),
        );
}

/// Redis when configured and reachable, otherwise the in-process store.
async fn connect_store(config: &ServiceConfig) -> Arc<dyn KeyValueStore> {
    if config.cache_backend == CacheBackend::Redis {
        match RedisStore::connect(&config.redis_url()).await {
            Ok(store) => {
                tracing::info!(host = %config.redis_host, port = config.redis_port, "Connected to Redis");
                return Arc::new(store);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Redis unavailable, falling back to in-process cache");
            }
        }
    }

    if config.is_production() {
        tracing::warn!("Running production with the in-process cache; entries are not shared between instances");
    }
    let store = MemoryStore::new();
    start_purge_task(store.clone(), MEMORY_PURGE_INTERVAL);
    Arc::new(store)
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = ServiceConfig::from_env()?;

    match config.log_format {
        LogFormat::Json => init_logging(SERVICE_NAME),
        LogFormat::Pretty => init_console_logging(SERVICE_NAME),
    }
    tracing::info!(environment = %config.environment, "Starting Beauty Clinic Service");

    // Prometheus metrics
    let registry = Registry::new();
    let service_metrics = ServiceMetrics::new(&registry, "beauty_clinic")?;
    let cache_metrics = CacheMetrics::new(&registry, "beauty")?;

    // Cache layer
    let cache_config = CacheConfig::beauty_clinic().with_env_overrides(|key| std::env::var(key).ok());
    let store = connect_store(&config).await;
    tracing::info!(backend = store.backend_name(), "Cache store ready");
    let cache = CacheManager::new(cache_config, store).with_metrics(cache_metrics);

    let jwt_manager = JwtManager::new(config.jwt_secret.clone())
        .with_expiry_minutes(config.access_token_expire_minutes);

    // Rate limiter
    let mut rate_limiter = RateLimiter::new();
    let route_categories =
        configure_beauty_rate_limits(&mut rate_limiter, cache.config().domain_prefix(), ROUTE_PREFIX);
    let rate_limiter = Arc::new(rate_limiter);
    start_cleanup_task(rate_limiter.clone(), RATE_LIMIT_CLEANUP_INTERVAL);

    let state = web::Data::new(AppState::new(
        SERVICE_NAME,
        ClinicRepository::seeded(),
        jwt_manager.clone(),
        cache,
        registry,
        service_metrics.clone(),
    ));

    let (host, port) = config.bind_address();
    tracing::info!(%host, port, "Starting HTTP server");

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin("http://localhost:3000")
            .allowed_origin("http://localhost:5173")
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE"])
            .allowed_headers(vec![
                actix_web::http::header::AUTHORIZATION,
                actix_web::http::header::CONTENT_TYPE,
            ])
            .max_age(3600);

        App::new()
            .app_data(state.clone())
            .wrap(middleware::auth::AuthMiddleware::new(jwt_manager.clone()))
            .wrap(RateLimitMiddleware::new(
                rate_limiter.clone(),
                route_categories.clone(),
            ))
            .wrap(middleware::metrics::MetricsMiddleware::new(service_metrics.clone()))
            .wrap(
                actix_web::middleware::DefaultHeaders::new()
                    .add(("X-Frame-Options", "DENY"))
                    .add(("X-Content-Type-Options", "nosniff"))
                    .add(("Content-Security-Policy", "default-src 'self'")),
            )
            .wrap(actix_web::middleware::Logger::default())
            .wrap(cors)
            .configure(configure_routes)
    })
    .bind((host, port))?
    .run()
    .await?;

    Ok(())
}
