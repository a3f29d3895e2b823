//! Rate limiting for authentication endpoints.
//!
//! Uses a token bucket algorithm with per-IP tracking to slow down password
//! guessing and signup spam.

use axum::{
    Json,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use serde_json::json;
use std::{num::NonZeroU32, sync::Arc};
use tracing::warn;

use crate::auth::extract_client_ip;

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Default login attempts per minute per IP.
pub const DEFAULT_LOGIN_PER_MINUTE: u32 = 10;

/// Default registrations per minute per IP.
pub const DEFAULT_REGISTER_PER_MINUTE: u32 = 3;

/// Rate limiting configuration for authentication endpoints.
#[derive(Clone)]
pub struct RateLimitConfig {
    pub login: Arc<IpLimiter>,
    pub register: Arc<IpLimiter>,
}

impl RateLimitConfig {
    /// Limiters allowing `login_per_minute` logins and `register_per_minute`
    /// registrations per IP. Zero is treated as one.
    pub fn new(login_per_minute: u32, register_per_minute: u32) -> Self {
        Self {
            login: Arc::new(RateLimiter::keyed(per_minute(login_per_minute))),
            register: Arc::new(RateLimiter::keyed(per_minute(register_per_minute))),
        }
    }

    /// Effectively unlimited, for tests that hammer the endpoints.
    pub fn unlimited() -> Self {
        Self::new(1_000_000, 1_000_000)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(DEFAULT_LOGIN_PER_MINUTE, DEFAULT_REGISTER_PER_MINUTE)
    }
}

fn per_minute(n: u32) -> Quota {
    Quota::per_minute(NonZeroU32::new(n).unwrap_or(NonZeroU32::MIN))
}

fn check(limiter: &IpLimiter, request: &Request, message: &'static str) -> Option<Response> {
    let ip = extract_client_ip(request);
    match limiter.check_key(&ip) {
        Ok(_) => None,
        Err(_) => {
            warn!(ip = %ip, path = %request.uri().path(), "Rate limit exceeded");
            Some((StatusCode::TOO_MANY_REQUESTS, Json(json!({ "error": message }))).into_response())
        }
    }
}

/// Middleware for rate limiting login.
pub async fn rate_limit_login(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    match check(
        &config.login,
        &request,
        "Too many login attempts. Please wait before trying again.",
    ) {
        Some(rejection) => rejection,
        None => next.run(request).await,
    }
}

/// Middleware for rate limiting registration.
pub async fn rate_limit_register(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    match check(
        &config.register,
        &request,
        "Too many signup attempts. Please wait before trying again.",
    ) {
        Some(rejection) => rejection,
        None => next.run(request).await,
    }
}
