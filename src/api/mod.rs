mod auth;
mod error;
mod notifications;
mod users;

use axum::Router;
use std::sync::Arc;

use crate::db::Database;
use crate::jwt::JwtConfig;
use crate::rate_limit::RateLimitConfig;

pub use auth::{AuthState, MIN_PASSWORD_LENGTH, is_valid_email};
pub use error::{ApiError, ResultExt};
pub use notifications::NotificationsState;
pub use users::UsersState;

/// Create the API router.
pub fn create_api_router(
    db: Database,
    jwt: Arc<JwtConfig>,
    secure_cookies: bool,
    rate_limit_config: Arc<RateLimitConfig>,
) -> Router {
    let auth_state = auth::AuthState {
        db: db.clone(),
        jwt: jwt.clone(),
        secure_cookies,
        rate_limit_config,
    };

    let notifications_state = notifications::NotificationsState {
        db: db.clone(),
        jwt: jwt.clone(),
    };

    let users_state = users::UsersState { db, jwt };

    Router::new()
        .nest("/auth", auth::router(auth_state))
        .nest("/users", users::router(users_state))
        .nest("/notifications", notifications::router(notifications_state))
}
