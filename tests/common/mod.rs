#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, Response, header},
};
use portfolio_auth::{
    ServerConfig, create_app, db::Database, identity::Role, rate_limit::RateLimitConfig,
    start_server,
};
use std::net::SocketAddr;

pub const TEST_SECRET: &[u8] = b"test-jwt-secret-that-is-long-enough";

pub const VIEWER_EMAIL: &str = "viewer@example.com";
pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const PASSWORD: &str = "correct horse";

/// In-memory store with one viewer and one admin.
pub async fn seeded_db() -> Database {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    db.users()
        .create(VIEWER_EMAIL, PASSWORD, "Vera Viewer", Role::Viewer)
        .await
        .expect("Failed to create viewer");
    db.users()
        .create(ADMIN_EMAIL, PASSWORD, "Ada Admin", Role::Admin)
        .await
        .expect("Failed to create admin");
    db
}

pub fn test_config(db: Database) -> ServerConfig {
    ServerConfig {
        rate_limit: RateLimitConfig::unlimited(),
        ..ServerConfig::new(db, TEST_SECRET)
    }
}

pub async fn create_test_app() -> (axum::Router, Database) {
    let db = seeded_db().await;
    (create_app(&test_config(db.clone())), db)
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub db: Database,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// API root with a trailing slash, e.g. `http://127.0.0.1:41234/api/v1/`.
    pub fn api_url(&self) -> String {
        format!("http://{}/api/v1/", self.addr)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub async fn spawn_server(config: ServerConfig) -> TestServer {
    let db = config.db.clone();
    let (handle, addr) = start_server(config, 0)
        .await
        .expect("Failed to start server");
    TestServer { addr, db, handle }
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn bearer_request(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

pub fn cookie_request(method: &str, uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// The `name=value` pair of the first `Set-Cookie` header, without attributes.
pub fn set_cookie_pair(response: &Response<Body>) -> Option<String> {
    let value = response.headers().get(header::SET_COOKIE)?.to_str().ok()?;
    value.split(';').next().map(|pair| pair.trim().to_string())
}

pub fn set_cookie_header(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(header::SET_COOKIE)?
        .to_str()
        .ok()
        .map(str::to_string)
}
