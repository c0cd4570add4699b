// core/common/src/error.rs
// Standardized error responses and handling

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: String, error_code: String, message: String) -> Self {
        Self {
            error,
            error_code,
            message,
            details: None,
            request_id: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_request_id(mut self, request_id: String) -> Self {
        self.request_id = Some(request_id);
        self
    }
}

#[derive(Debug)]
pub enum ServiceError {
    // Client errors (4xx)
    ValidationError(String),
    NotFound(String),
    Unauthorized(String),
    Forbidden,
    Conflict(String),
    RateLimitExceeded(String),
    BadRequest(String),

    // Server errors (5xx)
    ServiceUnavailable(String),
    InternalError(String),
}

impl ServiceError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ServiceError::ValidationError(_) => "validation_error",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::Unauthorized(_) => "unauthorized",
            ServiceError::Forbidden => "forbidden",
            ServiceError::Conflict(_) => "conflict",
            ServiceError::RateLimitExceeded(_) => "rate_limit_exceeded",
            ServiceError::BadRequest(_) => "bad_request",
            ServiceError::ServiceUnavailable(_) => "service_unavailable",
            ServiceError::InternalError(_) => "internal_error",
        }
    }

    pub fn message(&self) -> String {
        match self {
            ServiceError::ValidationError(msg)
            | ServiceError::NotFound(msg)
            | ServiceError::Unauthorized(msg)
            | ServiceError::Conflict(msg)
            | ServiceError::RateLimitExceeded(msg)
            | ServiceError::BadRequest(msg) => msg.clone(),
            ServiceError::Forbidden => "Insufficient permissions".to_string(),
            ServiceError::ServiceUnavailable(msg) => format!("Service unavailable: {}", msg),
            ServiceError::InternalError(msg) => format!("Internal error: {}", msg),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServiceError::Forbidden => StatusCode::FORBIDDEN,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::RateLimitExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
            ServiceError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn to_error_response(&self, request_id: Option<String>) -> ErrorResponse {
        let mut response = ErrorResponse::new(
            self.status_code()
                .canonical_reason()
                .unwrap_or("Error")
                .to_string(),
            self.error_code().to_string(),
            self.message(),
        );

        if let Some(id) = request_id {
            response = response.with_request_id(id);
        }

        response
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl ResponseError for ServiceError {
    fn error_response(&self) -> HttpResponse {
        let error_response = self.to_error_response(None);
        HttpResponse::build(self.status_code()).json(error_response)
    }

    fn status_code(&self) -> StatusCode {
        self.status_code()
    }
}

impl From<crate::auth::AuthError> for ServiceError {
    fn from(err: crate::auth::AuthError) -> Self {
        use crate::auth::AuthError;
        match err {
            AuthError::InvalidToken => ServiceError::Unauthorized("Invalid token".to_string()),
            AuthError::TokenExpired => ServiceError::Unauthorized("Token expired".to_string()),
            AuthError::MissingAuth => {
                ServiceError::Unauthorized("Missing authorization header".to_string())
            }
            AuthError::InvalidCredentials => {
                ServiceError::Unauthorized("Invalid username or password".to_string())
            }
            AuthError::InsufficientPermissions => ServiceError::Forbidden,
            AuthError::UnknownRole(role) => {
                ServiceError::ValidationError(format!("Unknown role: {}", role))
            }
            AuthError::JwtError(_) => ServiceError::Unauthorized("Invalid token".to_string()),
            AuthError::PasswordHash(msg) => ServiceError::InternalError(msg),
        }
    }
}

impl From<crate::validation::ValidationError> for ServiceError {
    fn from(err: crate::validation::ValidationError) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl From<crate::rate_limit::RateLimitError> for ServiceError {
    fn from(err: crate::rate_limit::RateLimitError) -> Self {
        match err {
            crate::rate_limit::RateLimitError::LimitExceeded(msg) => {
                ServiceError::RateLimitExceeded(msg)
            }
            crate::rate_limit::RateLimitError::InternalError(msg) => {
                ServiceError::InternalError(msg)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthError;

    #[test]
    fn test_error_response_creation() {
        let error = ErrorResponse::new(
            "Test error".to_string(),
            "test_error".to_string(),
            "This is a test error".to_string(),
        );

        assert_eq!(error.error, "Test error");
        assert_eq!(error.error_code, "test_error");
        assert!(error.details.is_none());
        assert!(error.request_id.is_none());
    }

    #[test]
    fn test_error_response_with_details() {
        let error = ErrorResponse::new(
            "Bad Request".to_string(),
            "validation_error".to_string(),
            "date must be YYYY-MM-DD".to_string(),
        )
        .with_details(serde_json::json!({"field": "date"}));

        assert!(error.details.is_some());
    }

    #[test]
    fn test_service_error_validation() {
        let error = ServiceError::ValidationError("Invalid date".to_string());

        assert_eq!(error.error_code(), "validation_error");
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(error.message(), "Invalid date");
    }

    #[test]
    fn test_service_error_not_found() {
        let error = ServiceError::NotFound("Treatment 9 not found".to_string());

        assert_eq!(error.error_code(), "not_found");
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_auth_error_mapping() {
        let expired: ServiceError = AuthError::TokenExpired.into();
        assert_eq!(expired.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(expired.message(), "Token expired");

        let forbidden: ServiceError = AuthError::InsufficientPermissions.into();
        assert_eq!(forbidden.status_code(), StatusCode::FORBIDDEN);

        let creds: ServiceError = AuthError::InvalidCredentials.into();
        assert_eq!(creds.error_code(), "unauthorized");

        let hash: ServiceError = AuthError::PasswordHash("boom".to_string()).into();
        assert_eq!(hash.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_unknown_role_is_a_bad_request() {
        let parsed: ServiceError = match "superuser".parse::<crate::auth::Role>() {
            Ok(role) => panic!("parsed {:?}", role),
            Err(e) => e.into(),
        };
        assert_eq!(parsed.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(parsed.error_code(), "validation_error");
        assert_eq!(parsed.message(), "Unknown role: superuser");
    }

    #[test]
    fn test_service_error_rate_limit() {
        let error = ServiceError::RateLimitExceeded("Too many requests".to_string());

        assert_eq!(error.error_code(), "rate_limit_exceeded");
        assert_eq!(error.status_code(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_to_error_response() {
        let error = ServiceError::Conflict("Appointment 4 is already booked".to_string());
        let response = error.to_error_response(Some("req-456".to_string()));

        assert_eq!(response.error, "Conflict");
        assert_eq!(response.error_code, "conflict");
        assert_eq!(response.request_id, Some("req-456".to_string()));
    }

    #[test]
    fn test_error_response_serialization() {
        let response = ServiceError::Forbidden.to_error_response(None);

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"error_code\":\"forbidden\""));
        assert!(!json.contains("request_id"));
    }

    #[test]
    fn test_error_display() {
        let error = ServiceError::ValidationError("Test message".to_string());
        assert_eq!(format!("{}", error), "Test message");
    }
}
