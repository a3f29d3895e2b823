pub mod api;
pub mod auth;
pub mod cli;
pub mod client;
pub mod db;
pub mod identity;
pub mod jwt;
pub mod rate_limit;

use api::create_api_router;
use axum::Router;
use db::Database;
use jwt::JwtConfig;
use rate_limit::RateLimitConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Prefix under which every API route is mounted.
pub const API_PREFIX: &str = "/api/v1";

pub struct ServerConfig {
    /// User store (cloneable, shares one in-memory copy of the user file)
    pub db: Database,
    /// JWT secret for signing tokens
    pub jwt_secret: Vec<u8>,
    /// Whether to set Secure flag on cookies (should be true in production with HTTPS)
    pub secure_cookies: bool,
    /// Access token lifetime in seconds
    pub access_ttl: u64,
    /// Refresh token lifetime in seconds
    pub refresh_ttl: u64,
    /// Per-IP limits for login and registration
    pub rate_limit: RateLimitConfig,
}

impl ServerConfig {
    /// Configuration with default lifetimes and limits.
    pub fn new(db: Database, jwt_secret: impl Into<Vec<u8>>) -> Self {
        Self {
            db,
            jwt_secret: jwt_secret.into(),
            secure_cookies: false,
            access_ttl: jwt::ACCESS_TOKEN_DURATION_SECS,
            refresh_ttl: jwt::REFRESH_TOKEN_DURATION_SECS,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let jwt = Arc::new(
        JwtConfig::new(&config.jwt_secret).with_lifetimes(config.access_ttl, config.refresh_ttl),
    );

    let api_router = create_api_router(
        config.db.clone(),
        jwt,
        config.secure_cookies,
        Arc::new(config.rate_limit.clone()),
    );

    Router::new().nest(API_PREFIX, api_router)
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
/// Note: For production use, prefer `run_server` directly in main.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> Result<(tokio::task::JoinHandle<()>, SocketAddr), std::io::Error> {
    let addr = format!("127.0.0.1:{}", port);
    let listener = TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = run_server(config, listener).await {
            tracing::error!(error = %e, "Server error");
        }
    });

    Ok((handle, local_addr))
}
