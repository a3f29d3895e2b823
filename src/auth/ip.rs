//! Client IP extraction utilities.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request};

/// Key used when the connection address is unknown (e.g. in-process tests).
pub const UNKNOWN_CLIENT: &str = "local";

/// Client IP from the connection's `ConnectInfo`, or [`UNKNOWN_CLIENT`].
pub fn extract_client_ip<B>(request: &Request<B>) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}
