// core/beauty-clinic-service/src/middleware/auth.rs
// Bearer-token authentication and the authenticated-caller extractor

use crate::state::AppState;
use crate::users::User;
use crate::ROUTE_PREFIX;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    http::Method,
    Error, FromRequest, HttpMessage, HttpRequest,
};
use domain_cache_common::{
    auth::extract_bearer_token, require_role, Claims, JwtManager, Role, ServiceError,
};
use futures_util::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::rc::Rc;

const OPEN_PATHS: [&str; 7] = [
    "/health",
    "/liveness",
    "/readiness",
    "/metrics",
    "/auth/register",
    "/auth/login",
    "/auth/refresh",
];

/// Anonymous access: probes, account entry points, and clinic GETs other
/// than client history and admin views.
fn is_public(method: &Method, path: &str) -> bool {
    if OPEN_PATHS.contains(&path) {
        return true;
    }
    let Some(rest) = path.strip_prefix(ROUTE_PREFIX) else {
        return false;
    };
    *method == Method::GET && !rest.starts_with("/clients/") && !rest.starts_with("/admin")
}

pub struct AuthMiddleware {
    jwt_manager: Rc<JwtManager>,
}

impl AuthMiddleware {
    pub fn new(jwt_manager: JwtManager) -> Self {
        Self {
            jwt_manager: Rc::new(jwt_manager),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service: Rc::new(service),
            jwt_manager: self.jwt_manager.clone(),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: Rc<S>,
    jwt_manager: Rc<JwtManager>,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
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
        let jwt_manager = self.jwt_manager.clone();
        let service = self.service.clone();

        Box::pin(async move {
            if is_public(req.method(), req.path()) {
                return service.call(req).await;
            }

            let auth_header = req
                .headers()
                .get("Authorization")
                .and_then(|h| h.to_str().ok());

            let Some(header) = auth_header else {
                return Err(ServiceError::Unauthorized("Missing authorization header".to_string()).into());
            };

            let claims = extract_bearer_token(header)
                .and_then(|token| jwt_manager.verify_token(&token))
                .map_err(ServiceError::from)?;

            req.extensions_mut().insert(claims);
            service.call(req).await
        })
    }
}

/// Verified token claims of the caller.
#[derive(Debug, Clone)]
pub struct Caller(pub Claims);

impl Caller {
    pub fn username(&self) -> &str {
        &self.0.sub
    }

    /// Load the caller's account; a valid token for a deleted user is refused.
    pub async fn account(&self, state: &AppState) -> Result<User, ServiceError> {
        state
            .users
            .find(self.username())
            .await
            .ok_or_else(|| ServiceError::Unauthorized("Unknown user".to_string()))
    }

    /// Gate on the role stored for the account, not the one in the token.
    pub async fn require(&self, state: &AppState, role: Role) -> Result<User, ServiceError> {
        let user = self.account(state).await?;
        require_role(user.role, role)?;
        Ok(user)
    }
}

impl FromRequest for Caller {
    type Error = ServiceError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<Claims>()
                .cloned()
                .map(Caller)
                .ok_or_else(|| ServiceError::Unauthorized("Authentication required".to_string())),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::{send, TEST_SECRET};
    use actix_web::{http::StatusCode, test, web, App, HttpResponse};
    use chrono::{Duration, Utc};

    async fn ok_handler() -> HttpResponse {
        HttpResponse::Ok().json(serde_json::json!({"ok": true}))
    }

    async fn whoami(caller: Caller) -> HttpResponse {
        HttpResponse::Ok().json(serde_json::json!({"sub": caller.username()}))
    }

    fn jwt() -> JwtManager {
        JwtManager::new(TEST_SECRET.to_string())
    }

    #[actix_web::test]
    async fn test_public_paths() {
        assert!(is_public(&Method::GET, "/health"));
        assert!(is_public(&Method::POST, "/auth/login"));
        assert!(is_public(&Method::GET, "/beauty/catalog/treatments"));
        assert!(is_public(&Method::GET, "/beauty/appointments/available"));

        assert!(!is_public(&Method::POST, "/beauty/appointments/1/book"));
        assert!(!is_public(&Method::GET, "/beauty/clients/abc/history"));
        assert!(!is_public(&Method::GET, "/beauty/admin/anything"));
        assert!(!is_public(&Method::GET, "/auth/me"));
        assert!(!is_public(&Method::GET, "/admin/users"));
    }

    #[actix_web::test]
    async fn test_public_endpoint_without_token() {
        let app = test::init_service(
            App::new()
                .wrap(AuthMiddleware::new(jwt()))
                .route("/health", web::get().to(ok_handler)),
        )
        .await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }

    #[actix_web::test]
    async fn test_rejects_missing_token() {
        let app = test::init_service(
            App::new()
                .wrap(AuthMiddleware::new(jwt()))
                .route("/auth/me", web::get().to(whoami)),
        )
        .await;

        let req = test::TestRequest::get().uri("/auth/me").to_request();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error_code"], "unauthorized");
    }

    #[actix_web::test]
    async fn test_accepts_valid_token_and_exposes_caller() {
        let token = jwt().issue_token("ana", Role::User).unwrap();
        let app = test::init_service(
            App::new()
                .wrap(AuthMiddleware::new(jwt()))
                .route("/auth/me", web::get().to(whoami)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/auth/me")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sub"], "ana");
    }

    #[actix_web::test]
    async fn test_rejects_expired_token() {
        let token = jwt()
            .issue_token_at("ana", Role::User, Utc::now() - Duration::minutes(31))
            .unwrap();
        let app = test::init_service(
            App::new()
                .wrap(AuthMiddleware::new(jwt()))
                .route("/auth/me", web::get().to(whoami)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/auth/me")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Token expired");
    }

    #[actix_web::test]
    async fn test_rejects_foreign_signature() {
        let token = JwtManager::new("someone-else".to_string())
            .issue_token("ana", Role::Admin)
            .unwrap();
        let app = test::init_service(
            App::new()
                .wrap(AuthMiddleware::new(jwt()))
                .route("/auth/me", web::get().to(whoami)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/auth/me")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        let (status, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
