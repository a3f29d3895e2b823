//! Token issuance: login, registration, renewal and logout.

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

use super::error::{ApiError, ResultExt};
use crate::auth::{Auth, REFRESH_COOKIE_NAME, clear_refresh_cookie, get_cookie, refresh_cookie};
use crate::client::{LoginResponse, RefreshResponse};
use crate::db::{Database, StoreError, verify_password};
use crate::identity::{Role, User};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;
use crate::rate_limit::{RateLimitConfig, rate_limit_login, rate_limit_register};

/// Minimum password length for new accounts.
pub const MIN_PASSWORD_LENGTH: usize = 6;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[derive(Clone)]
pub struct AuthState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub secure_cookies: bool,
    pub rate_limit_config: Arc<RateLimitConfig>,
}

impl_has_auth_backend!(AuthState);

pub fn router(state: AuthState) -> Router {
    let login_router = Router::new()
        .route("/login", post(login))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit_config.clone(),
            rate_limit_login,
        ));

    let register_router = Router::new()
        .route("/register", post(register))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit_config.clone(),
            rate_limit_register,
        ));

    let session_router = Router::new()
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .with_state(state);

    Router::new()
        .merge(login_router)
        .merge(register_router)
        .merge(session_router)
}

#[derive(Deserialize)]
struct LoginRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Deserialize)]
struct RegisterRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    role: Option<Role>,
}

/// Access token body plus a fresh refresh cookie.
fn issue_session(state: &AuthState, user: &User) -> Result<(LoginResponse, String), ApiError> {
    let access = state
        .jwt
        .generate_access_token(user)
        .token_err("Failed to generate access token")?;
    let refresh = state
        .jwt
        .generate_refresh_token(user)
        .token_err("Failed to generate refresh token")?;

    let body = LoginResponse {
        user: user.clone(),
        access_token: access.token,
        expires_at: access.expires_at.saturating_mul(1000),
    };
    let cookie = refresh_cookie(&refresh.token, refresh.duration, state.secure_cookies);
    Ok((body, cookie))
}

async fn login(
    State(state): State<AuthState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = payload.email.trim();
    if email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    // Unknown email and wrong password are indistinguishable to the caller.
    let record = state
        .db
        .users()
        .get_by_email(email)
        .await
        .ok_or_else(|| ApiError::unauthorized(INVALID_CREDENTIALS))?;
    if !verify_password(&record, &payload.password).await {
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    }

    let user = record.to_user();
    let (body, cookie) = issue_session(&state, &user)?;
    info!(user_id = %user.id, "User logged in");

    Ok(([(header::SET_COOKIE, cookie)], Json(body)))
}

async fn register(
    State(state): State<AuthState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = payload.email.trim();
    let name = payload.name.trim();
    if email.is_empty() || payload.password.is_empty() || name.is_empty() {
        return Err(ApiError::bad_request(
            "Email, password and name are required",
        ));
    }
    if !is_valid_email(email) {
        return Err(ApiError::bad_request("Invalid email format"));
    }
    if payload.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }

    let role = payload.role.unwrap_or_default();
    if role == Role::Admin {
        return Err(ApiError::forbidden("The admin role cannot be self-assigned"));
    }

    let record = match state
        .db
        .users()
        .create(email, &payload.password, name, role)
        .await
    {
        Ok(record) => record,
        Err(StoreError::Conflict) => {
            return Err(ApiError::conflict("A user with this email already exists"));
        }
        Err(e) => return Err(ApiError::db_error("Failed to create user", e)),
    };

    let user = record.to_user();
    let (body, cookie) = issue_session(&state, &user)?;
    info!(user_id = %user.id, role = %user.role, "User registered");

    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(body),
    ))
}

async fn refresh(State(state): State<AuthState>, headers: HeaderMap) -> Response {
    let Some(token) = get_cookie(&headers, REFRESH_COOKIE_NAME) else {
        return ApiError::unauthorized("Refresh token not found").into_response();
    };

    let claims = match state.jwt.validate_refresh_token(token) {
        Ok(claims) => claims,
        Err(e) => {
            debug!(error = %e, "Rejected refresh token");
            let clear = clear_refresh_cookie(state.secure_cookies);
            return (
                [(header::SET_COOKIE, clear)],
                ApiError::unauthorized("Invalid refresh token"),
            )
                .into_response();
        }
    };

    let Some(record) = state.db.users().get_by_id(&claims.sub).await else {
        return ApiError::unauthorized("User not found").into_response();
    };

    // Role and name changes take effect on renewal.
    let user = record.to_user();
    let (body, cookie) = match issue_session(&state, &user) {
        Ok(issued) => issued,
        Err(e) => return e.into_response(),
    };
    debug!(user_id = %user.id, "Access token renewed");

    (
        [(header::SET_COOKIE, cookie)],
        Json(RefreshResponse {
            access_token: body.access_token,
            expires_at: body.expires_at,
        }),
    )
        .into_response()
}

async fn logout(State(state): State<AuthState>) -> impl IntoResponse {
    (
        [(header::SET_COOKIE, clear_refresh_cookie(state.secure_cookies))],
        Json(json!({ "message": "Logged out" })),
    )
}

async fn me(
    State(state): State<AuthState>,
    Auth(auth, _): Auth,
) -> Result<Json<User>, ApiError> {
    let record = state
        .db
        .users()
        .get_by_id(auth.id())
        .await
        .ok_or_else(|| ApiError::unauthorized("User not found"))?;
    Ok(Json(record.to_user()))
}

/// `local@domain.tld` shape: no whitespace, one `@`, a dot inside the domain.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain
            .char_indices()
            .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}
