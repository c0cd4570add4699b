// core/beauty-clinic-service/src/users.rs
// Registered accounts with Argon2 password hashes and stored roles

use chrono::{DateTime, Utc};
use domain_cache_common::{
    auth::{hash_password, verify_password},
    validation::{validate_email, validate_password, validate_username},
    AuthError, Role, ServiceError,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// What the API returns about an account; never the hash.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UserView {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserView {
    fn from(u: &User) -> Self {
        Self {
            id: u.id.clone(),
            username: u.username.clone(),
            email: u.email.clone(),
            role: u.role,
            created_at: u.created_at,
        }
    }
}

#[derive(Clone, Default)]
pub struct UserStore {
    users: Arc<RwLock<HashMap<String, User>>>,
}

impl UserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The first account ever registered becomes the clinic admin.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<User, ServiceError> {
        validate_username(username)?;
        validate_email(email)?;
        validate_password(password)?;

        let password_hash = hash_off_thread(password.to_string()).await?;

        let mut users = self.users.write().await;
        if users.contains_key(username) {
            return Err(ServiceError::Conflict(format!(
                "Username '{}' is already taken",
                username
            )));
        }

        let role = if users.is_empty() {
            Role::Admin
        } else {
            Role::User
        };
        let user = User {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash,
            role,
            created_at: Utc::now(),
        };
        users.insert(user.username.clone(), user.clone());
        Ok(user)
    }

    /// Unknown users and wrong passwords fail the same way.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let user = self
            .find(username)
            .await
            .ok_or(AuthError::InvalidCredentials)?;

        let hash = user.password_hash.clone();
        let candidate = password.to_string();
        let matches = tokio::task::spawn_blocking(move || verify_password(&candidate, &hash))
            .await
            .map_err(|e| AuthError::PasswordHash(e.to_string()))??;

        if matches {
            Ok(user)
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }

    pub async fn find(&self, username: &str) -> Option<User> {
        self.users.read().await.get(username).cloned()
    }

    pub async fn list(&self) -> Vec<UserView> {
        let mut views: Vec<UserView> = self.users.read().await.values().map(UserView::from).collect();
        views.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.username.cmp(&b.username)));
        views
    }

    pub async fn set_role(&self, username: &str, role: Role) -> Result<User, ServiceError> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(username)
            .ok_or_else(|| ServiceError::NotFound(format!("User '{}' not found", username)))?;
        user.role = role;
        Ok(user.clone())
    }
}

async fn hash_off_thread(password: String) -> Result<String, ServiceError> {
    let hashed = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ServiceError::InternalError(e.to_string()))?;
    Ok(hashed?)
}
