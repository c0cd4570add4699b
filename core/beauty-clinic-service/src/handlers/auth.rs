// core/beauty-clinic-service/src/handlers/auth.rs
// Registration, login and token refresh

use crate::middleware::auth::Caller;
use crate::state::AppState;
use crate::users::UserView;
use actix_web::{web, HttpRequest, HttpResponse};
use domain_cache_common::{
    generate_request_id, log_auth_attempt, AuthError, LogContext, ServiceError,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

impl TokenResponse {
    fn bearer(access_token: String, expires_in: i64) -> Self {
        Self {
            access_token,
            token_type: "bearer",
            expires_in,
        }
    }
}

/// POST /auth/register
pub async fn register(
    state: web::Data<AppState>,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ServiceError> {
    let user = state
        .users
        .register(&body.username, &body.email, &body.password)
        .await?;

    tracing::info!(username = %user.username, role = %user.role, "User registered");
    Ok(HttpResponse::Created().json(UserView::from(&user)))
}

/// POST /auth/login. The token carries the role stored at login time.
pub async fn login(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, ServiceError> {
    let mut ctx = LogContext::new(generate_request_id());
    if let Some(addr) = req.peer_addr() {
        ctx = ctx.with_ip(addr.ip().to_string());
    }

    let user = match state.users.authenticate(&body.username, &body.password).await {
        Ok(user) => user,
        Err(e) => {
            log_auth_attempt(&ctx, &body.username, false);
            return Err(e.into());
        }
    };
    log_auth_attempt(&ctx, &user.username, true);

    let token = state.jwt.issue_token(&user.username, user.role)?;
    Ok(HttpResponse::Ok().json(TokenResponse::bearer(token, state.jwt.expiry_seconds())))
}

/// POST /auth/refresh: exchange a still-valid token for a fresh one.
pub async fn refresh(
    state: web::Data<AppState>,
    body: web::Json<RefreshRequest>,
) -> Result<HttpResponse, ServiceError> {
    let claims = state.jwt.verify_token(&body.token)?;
    if state.users.find(&claims.sub).await.is_none() {
        return Err(AuthError::InvalidToken.into());
    }

    let token = state.jwt.refresh_token(&body.token)?;
    Ok(HttpResponse::Ok().json(TokenResponse::bearer(token, state.jwt.expiry_seconds())))
}

/// GET /auth/me
pub async fn me(state: web::Data<AppState>, caller: Caller) -> Result<HttpResponse, ServiceError> {
    let account = caller.account(&state).await?;
    Ok(HttpResponse::Ok().json(UserView::from(&account)))
}
