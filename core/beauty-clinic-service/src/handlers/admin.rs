// core/beauty-clinic-service/src/handlers/admin.rs
// Admin-only writes; each commits to the repository, then purges stale caches

use crate::middleware::auth::Caller;
use crate::models::{
    ClinicSettings, NewAppointment, NewPromotion, NewTreatment, PurgeQuery, TreatmentUpdate,
};
use crate::state::AppState;
use actix_web::{web, HttpRequest, HttpResponse};
use domain_cache_common::{
    generate_request_id, log_failure, log_success, validation::validate_cache_pattern, LogContext,
    Role, ServiceError,
};
use serde::Deserialize;

fn log_context(req: &HttpRequest, username: &str) -> LogContext {
    let mut ctx = LogContext::new(generate_request_id()).with_user(username.to_string());
    if let Some(addr) = req.peer_addr() {
        ctx = ctx.with_ip(addr.ip().to_string());
    }
    ctx
}

/// POST /beauty/admin/treatments
pub async fn create_treatment(
    state: web::Data<AppState>,
    caller: Caller,
    req: HttpRequest,
    body: web::Json<NewTreatment>,
) -> Result<HttpResponse, ServiceError> {
    let admin = caller.require(&state, Role::Admin).await?;
    let ctx = log_context(&req, &admin.username);
    let new = body.into_inner();
    if let Err(e) = new.validate() {
        log_failure(&ctx, "create_treatment", &e.to_string());
        return Err(e.into());
    }

    let treatment = state.repo.create_treatment(new).await;
    let removed = state.invalidation.on_treatment_change(treatment.id).await;

    let details = format!("id={} evicted={}", treatment.id, removed);
    log_success(&ctx, "create_treatment", Some(details.as_str()));
    Ok(HttpResponse::Created().json(treatment))
}

/// PUT /beauty/admin/treatments/{id}
pub async fn update_treatment(
    state: web::Data<AppState>,
    caller: Caller,
    req: HttpRequest,
    path: web::Path<u64>,
    body: web::Json<TreatmentUpdate>,
) -> Result<HttpResponse, ServiceError> {
    let admin = caller.require(&state, Role::Admin).await?;
    let ctx = log_context(&req, &admin.username);
    let id = path.into_inner();
    let update = body.into_inner();
    update.validate()?;

    let treatment = match state.repo.update_treatment(id, update).await {
        Ok(t) => t,
        Err(e) => {
            log_failure(&ctx, "update_treatment", &e.to_string());
            return Err(e);
        }
    };
    let removed = state.invalidation.on_treatment_change(id).await;

    let details = format!("id={} evicted={}", id, removed);
    log_success(&ctx, "update_treatment", Some(details.as_str()));
    Ok(HttpResponse::Ok().json(treatment))
}

/// DELETE /beauty/admin/treatments/{id}
pub async fn delete_treatment(
    state: web::Data<AppState>,
    caller: Caller,
    req: HttpRequest,
    path: web::Path<u64>,
) -> Result<HttpResponse, ServiceError> {
    let admin = caller.require(&state, Role::Admin).await?;
    let ctx = log_context(&req, &admin.username);
    let id = path.into_inner();

    let treatment = match state.repo.delete_treatment(id).await {
        Ok(t) => t,
        Err(e) => {
            log_failure(&ctx, "delete_treatment", &e.to_string());
            return Err(e);
        }
    };
    state.invalidation.on_treatment_change(id).await;

    let details = format!("id={}", id);
    log_success(&ctx, "delete_treatment", Some(details.as_str()));
    Ok(HttpResponse::Ok().json(treatment))
}

/// POST /beauty/admin/appointments: open a new slot.
pub async fn create_appointment(
    state: web::Data<AppState>,
    caller: Caller,
    req: HttpRequest,
    body: web::Json<NewAppointment>,
) -> Result<HttpResponse, ServiceError> {
    let admin = caller.require(&state, Role::Admin).await?;
    let ctx = log_context(&req, &admin.username);
    let new = body.into_inner();
    new.validate()?;

    let appointment = match state.repo.create_appointment(new).await {
        Ok(a) => a,
        Err(e) => {
            log_failure(&ctx, "create_appointment", &e.to_string());
            return Err(e);
        }
    };
    state
        .invalidation
        .on_appointment_change(appointment.id, None)
        .await;

    let details = format!("id={}", appointment.id);
    log_success(&ctx, "create_appointment", Some(details.as_str()));
    Ok(HttpResponse::Created().json(appointment))
}

/// PUT /beauty/admin/config
pub async fn update_clinic_config(
    state: web::Data<AppState>,
    caller: Caller,
    req: HttpRequest,
    body: web::Json<ClinicSettings>,
) -> Result<HttpResponse, ServiceError> {
    let admin = caller.require(&state, Role::Admin).await?;
    let ctx = log_context(&req, &admin.username);
    let settings = body.into_inner();
    settings.validate()?;

    let settings = state.repo.update_settings(settings).await;
    state.invalidation.on_clinic_config_change().await;

    log_success(&ctx, "update_clinic_config", None);
    Ok(HttpResponse::Ok().json(settings))
}

/// POST /beauty/admin/promotions
pub async fn create_promotion(
    state: web::Data<AppState>,
    caller: Caller,
    req: HttpRequest,
    body: web::Json<NewPromotion>,
) -> Result<HttpResponse, ServiceError> {
    let admin = caller.require(&state, Role::Admin).await?;
    let ctx = log_context(&req, &admin.username);
    let new = body.into_inner();
    new.validate()?;

    let promotion = state.repo.create_promotion(new).await?;
    state.invalidation.on_promotion_change().await;

    let details = format!("id={}", promotion.id);
    log_success(&ctx, "create_promotion", Some(details.as_str()));
    Ok(HttpResponse::Created().json(promotion))
}

/// DELETE /beauty/admin/cache[?pattern=glob]. Without a pattern the whole
/// clinic cache is flushed.
pub async fn purge_cache(
    state: web::Data<AppState>,
    caller: Caller,
    req: HttpRequest,
    query: web::Query<PurgeQuery>,
) -> Result<HttpResponse, ServiceError> {
    let admin = caller.require(&state, Role::Admin).await?;
    let ctx = log_context(&req, &admin.username);

    let removed = match query.pattern.as_deref() {
        Some(pattern) => {
            validate_cache_pattern(pattern)?;
            state.invalidation.purge_pattern(pattern).await
        }
        None => state.invalidation.flush_domain().await,
    };

    let details = format!("removed={}", removed);
    log_success(&ctx, "purge_cache", Some(details.as_str()));
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "pattern": query.pattern,
        "removed": removed,
    })))
}

/// GET /admin/users
pub async fn list_users(
    state: web::Data<AppState>,
    caller: Caller,
) -> Result<HttpResponse, ServiceError> {
    caller.require(&state, Role::Admin).await?;
    Ok(HttpResponse::Ok().json(state.users.list().await))
}

#[derive(Debug, Deserialize)]
pub struct RoleChange {
    pub role: Role,
}

/// POST /admin/users/{username}/role
pub async fn set_user_role(
    state: web::Data<AppState>,
    caller: Caller,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<RoleChange>,
) -> Result<HttpResponse, ServiceError> {
    let admin = caller.require(&state, Role::Admin).await?;
    let ctx = log_context(&req, &admin.username);
    let username = path.into_inner();

    let user = state.users.set_role(&username, body.role).await?;

    let details = format!("user={} role={}", user.username, user.role);
    log_success(&ctx, "set_user_role", Some(details.as_str()));
    Ok(HttpResponse::Ok().json(crate::users::UserView::from(&user)))
}
