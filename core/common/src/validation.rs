// core/common/src/validation.rs
// Input validation for account, scheduling and catalog payloads

use chrono::{NaiveDate, NaiveTime};
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Invalid username: {0}")]
    InvalidUsername(String),
    #[error("Invalid email format: {0}")]
    InvalidEmail(String),
    #[error("Invalid password: {0}")]
    InvalidPassword(String),
    #[error("Invalid date: {0}")]
    InvalidDate(String),
    #[error("Invalid time: {0}")]
    InvalidTime(String),
    #[error("Invalid price: {0}")]
    InvalidPrice(String),
    #[error("Invalid duration: {0}")]
    InvalidDuration(String),
    #[error("Invalid cache pattern: {0}")]
    InvalidPattern(String),
    #[error("Input too long: {field} exceeds {max} characters")]
    InputTooLong { field: String, max: usize },
    #[error("Required field missing: {0}")]
    MissingField(String),
    #[error("XSS attempt detected: potentially dangerous content found")]
    XssAttempt,
}

const MIN_USERNAME_LENGTH: usize = 3;
const MAX_USERNAME_LENGTH: usize = 32;
const MAX_EMAIL_LENGTH: usize = 255;
const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_PASSWORD_LENGTH: usize = 128;
const MAX_PATTERN_LENGTH: usize = 200;

/// Prices are whole cents; 100 000.00 is the catalog ceiling.
pub const MAX_PRICE_CENTS: i64 = 10_000_000;
pub const MIN_DURATION_MINUTES: u32 = 5;
pub const MAX_DURATION_MINUTES: u32 = 480;

// ============================================================================
// SECURITY VALIDATORS
// ============================================================================

/// XSS prevention
pub fn validate_no_xss(input: &str) -> Result<(), ValidationError> {
    let dangerous_patterns = [
        "<script", "javascript:", "onerror=", "onclick=",
        "onload=", "<iframe", "document.cookie", "eval(",
    ];

    let input_lower = input.to_lowercase();
    for pattern in &dangerous_patterns {
        if input_lower.contains(pattern) {
            return Err(ValidationError::XssAttempt);
        }
    }
    Ok(())
}

/// Length validation in characters
pub fn validate_max_length(field: &str, input: &str, max: usize) -> Result<(), ValidationError> {
    if input.chars().count() > max {
        return Err(ValidationError::InputTooLong {
            field: field.to_string(),
            max,
        });
    }
    Ok(())
}

/// Free text shown back to clients (names, descriptions, titles).
pub fn validate_text(field: &str, input: &str, max: usize) -> Result<(), ValidationError> {
    if input.trim().is_empty() {
        return Err(ValidationError::MissingField(field.to_string()));
    }
    validate_max_length(field, input, max)?;
    validate_no_xss(input)
}

// ============================================================================
// ACCOUNT VALIDATORS
// ============================================================================

pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    let len = username.chars().count();
    if len < MIN_USERNAME_LENGTH || len > MAX_USERNAME_LENGTH {
        return Err(ValidationError::InvalidUsername(format!(
            "must be {}-{} characters",
            MIN_USERNAME_LENGTH, MAX_USERNAME_LENGTH
        )));
    }

    let re = Regex::new(r"^[A-Za-z0-9_.-]+$")
        .map_err(|_| ValidationError::InvalidUsername("Regex compilation failed".to_string()))?;

    if !re.is_match(username) {
        return Err(ValidationError::InvalidUsername(
            "only letters, digits, '.', '_' and '-' are allowed".to_string(),
        ));
    }

    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    validate_max_length("email", email, MAX_EMAIL_LENGTH)?;
    validate_no_xss(email)?;

    let re = Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .map_err(|_| ValidationError::InvalidEmail("Regex compilation failed".to_string()))?;

    if !re.is_match(email) {
        return Err(ValidationError::InvalidEmail(
            "Must be in format: user@domain.tld".to_string(),
        ));
    }

    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::InvalidPassword(format!(
            "must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::InvalidPassword(format!(
            "must be at most {} characters",
            MAX_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

// ============================================================================
// SCHEDULING / CATALOG VALIDATORS
// ============================================================================

/// Parse a calendar date in `YYYY-MM-DD` form.
pub fn validate_date(date: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| ValidationError::InvalidDate(format!("'{}' is not YYYY-MM-DD", date)))
}

/// Parse a wall-clock time in `HH:MM` form.
pub fn validate_time(time: &str) -> Result<NaiveTime, ValidationError> {
    NaiveTime::parse_from_str(time, "%H:%M")
        .map_err(|_| ValidationError::InvalidTime(format!("'{}' is not HH:MM", time)))
}

pub fn validate_price(cents: i64) -> Result<(), ValidationError> {
    if cents <= 0 {
        return Err(ValidationError::InvalidPrice(
            "price must be greater than zero".to_string(),
        ));
    }
    if cents > MAX_PRICE_CENTS {
        return Err(ValidationError::InvalidPrice(format!(
            "price exceeds maximum ({} cents)",
            MAX_PRICE_CENTS
        )));
    }
    Ok(())
}

pub fn validate_duration(minutes: u32) -> Result<(), ValidationError> {
    if !(MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&minutes) {
        return Err(ValidationError::InvalidDuration(format!(
            "must be between {} and {} minutes",
            MIN_DURATION_MINUTES, MAX_DURATION_MINUTES
        )));
    }
    Ok(())
}

/// Glob patterns accepted by the cache purge endpoint.
pub fn validate_cache_pattern(pattern: &str) -> Result<(), ValidationError> {
    if pattern.is_empty() {
        return Err(ValidationError::InvalidPattern("pattern is empty".to_string()));
    }
    validate_max_length("pattern", pattern, MAX_PATTERN_LENGTH)?;
    let re = Regex::new(r"^[A-Za-z0-9_:.*?\[\]^-]+$")
        .map_err(|_| ValidationError::InvalidPattern("Regex compilation failed".to_string()))?;

    if !re.is_match(pattern) {
        return Err(ValidationError::InvalidPattern(
            "contains unsupported characters".to_string(),
        ));
    }
    Ok(())
}

/// Sanitize string input (remove control characters, limit length)
pub fn sanitize_string(input: &str, max_length: usize) -> String {
    input
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .take(max_length)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_no_xss_safe() {
        assert!(validate_no_xss("Hydrating Facial").is_ok());
        assert!(validate_no_xss("Deep cleanse AND exfoliation").is_ok());
    }

    #[test]
    fn test_validate_no_xss_dangerous() {
        assert!(validate_no_xss("<script>alert('xss')</script>").is_err());
        assert!(validate_no_xss("javascript:alert(1)").is_err());
        assert!(validate_no_xss("<img onerror='alert(1)'>").is_err());
    }

    #[test]
    fn test_validate_text() {
        assert!(validate_text("name", "Gel Manicure", 80).is_ok());
        assert_eq!(
            validate_text("name", "   ", 80),
            Err(ValidationError::MissingField("name".to_string()))
        );
        assert!(matches!(
            validate_text("name", &"a".repeat(81), 80),
            Err(ValidationError::InputTooLong { max: 80, .. })
        ));
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("ana.lopez").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username("has space").is_err());
        assert!(validate_username(&"x".repeat(33)).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("client@example.com").is_ok());
        assert!(validate_email("notanemail").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("<script>@example.com").is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("long-enough").is_ok());
        assert!(validate_password("short").is_err());
        assert!(validate_password(&"p".repeat(129)).is_err());
    }

    #[test]
    fn test_validate_date_and_time() {
        assert_eq!(
            validate_date("2025-03-14").unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
        );
        assert!(validate_date("2025-02-30").is_err());
        assert!(validate_date("14/03/2025").is_err());

        assert!(validate_time("09:30").is_ok());
        assert!(validate_time("25:00").is_err());
    }

    #[test]
    fn test_validate_price() {
        assert!(validate_price(4500).is_ok());
        assert!(validate_price(0).is_err());
        assert!(validate_price(-1).is_err());
        assert!(validate_price(MAX_PRICE_CENTS + 1).is_err());
    }

    #[test]
    fn test_validate_duration() {
        assert!(validate_duration(60).is_ok());
        assert!(validate_duration(4).is_err());
        assert!(validate_duration(481).is_err());
    }

    #[test]
    fn test_validate_cache_pattern() {
        assert!(validate_cache_pattern("treatments:*").is_ok());
        assert!(validate_cache_pattern("appointments:slot_[0-9]?").is_ok());
        assert!(validate_cache_pattern("").is_err());
        assert!(validate_cache_pattern("a b").is_err());
        assert!(validate_cache_pattern(&"*".repeat(201)).is_err());
    }

    #[test]
    fn test_sanitize_string() {
        let input = "hello\x00world\x01test";
        let sanitized = sanitize_string(input, 100);
        assert!(!sanitized.contains('\x00'));
        assert_eq!(sanitize_string("abcdef", 3), "abc");
    }
}
