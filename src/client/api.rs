//! Remote authentication endpoints consumed by the session layer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::Result;
use crate::identity::{Role, User};

/// Body returned by login and registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: User,
    pub access_token: String,
    /// Expiry in epoch milliseconds.
    pub expires_at: u64,
}

/// Body returned by token renewal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    pub expires_at: u64,
}

/// Registration request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

/// A user notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub message: String,
    pub timestamp: String,
    pub read: bool,
}

/// Token issuance, renewal and logout endpoints.
///
/// `refresh` carries the renewal credential out of band (cookie); a missing or
/// invalid credential surfaces as [`super::ClientError::Authentication`].
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse>;

    async fn register(&self, registration: &Registration) -> Result<LoginResponse>;

    async fn refresh(&self) -> Result<RefreshResponse>;

    async fn logout(&self, access_token: &str) -> Result<()>;
}
