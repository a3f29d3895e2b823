//! Requests carrying the current bearer token.

use std::sync::Arc;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Response, StatusCode};
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use super::api::Notification;
use super::error::{ClientError, Result, error_for_status};
use super::refresh::RefreshCoordinator;

/// Method, headers and body of a request. The `Authorization` header is
/// always replaced with the current bearer token.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl FetchOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Serialize `body` as JSON and set the content type.
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self> {
        let bytes =
            serde_json::to_vec(body).map_err(|e| ClientError::InvalidBody(e.to_string()))?;
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.body = Some(bytes);
        Ok(self)
    }
}

/// Issues authenticated requests, retrying once after a forced renewal when
/// the server answers 401.
pub struct AuthenticatedClient {
    http: reqwest::Client,
    base: Url,
    coordinator: Arc<RefreshCoordinator>,
}

impl AuthenticatedClient {
    pub fn new(http: reqwest::Client, base: Url, coordinator: Arc<RefreshCoordinator>) -> Self {
        Self {
            http,
            base,
            coordinator,
        }
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    /// Absolute URLs pass through; anything else is relative to the API root.
    pub fn resolve(&self, url: &str) -> Result<Url> {
        match Url::parse(url) {
            Ok(absolute) => Ok(absolute),
            Err(url::ParseError::RelativeUrlWithoutBase) => self
                .base
                .join(url.trim_start_matches('/'))
                .map_err(|e| ClientError::InvalidUrl(format!("{url}: {e}"))),
            Err(e) => Err(ClientError::InvalidUrl(format!("{url}: {e}"))),
        }
    }

    /// Send a request with the current bearer token.
    ///
    /// Non-401 responses, successful or not, are returned untouched. A 401
    /// forces one renewal and one retry; a second 401 is an authentication
    /// failure and the local session is cleared.
    pub async fn fetch(&self, url: &str, options: FetchOptions) -> Result<Response> {
        let url = self.resolve(url)?;
        let store = self.coordinator.store();

        let Some(token) = self.coordinator.ensure_valid_token().await else {
            store.clear();
            return Err(ClientError::no_credential());
        };

        let response = self.send(&url, &options, &token).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        debug!(url = %url, "Request rejected with 401, forcing token renewal");
        let Some(token) = self.coordinator.force_refresh(&token).await else {
            store.clear();
            return Err(ClientError::session_expired());
        };

        let response = self.send(&url, &options, &token).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!(url = %url, "Request still unauthorized after token renewal");
            store.clear();
            return Err(ClientError::session_expired());
        }
        Ok(response)
    }

    /// GET `url` and decode a JSON body, mapping failure statuses to errors.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.fetch(url, FetchOptions::default()).await?;
        let response = error_for_status(response).await?;
        Ok(response.json().await?)
    }

    /// Best-effort notification fetch: any failure, 404 included, yields an empty list.
    pub async fn notifications(&self) -> Vec<Notification> {
        #[derive(Deserialize)]
        struct NotificationsResponse {
            #[serde(default)]
            notifications: Vec<Notification>,
        }

        let response = match self.fetch("notifications", FetchOptions::default()).await {
            Ok(response) if response.status() == StatusCode::NOT_FOUND => return Vec::new(),
            Ok(response) => response,
            Err(e) => {
                debug!(error = %e, "Failed to fetch notifications");
                return Vec::new();
            }
        };

        let parsed = match error_for_status(response).await {
            Ok(response) => response
                .json::<NotificationsResponse>()
                .await
                .map_err(ClientError::from),
            Err(e) => Err(e),
        };
        match parsed {
            Ok(body) => body.notifications,
            Err(e) => {
                debug!(error = %e, "Failed to fetch notifications");
                Vec::new()
            }
        }
    }

    async fn send(&self, url: &Url, options: &FetchOptions, token: &str) -> Result<Response> {
        let bearer = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| ClientError::MalformedToken)?;
        let mut headers = options.headers.clone();
        headers.insert(AUTHORIZATION, bearer);

        let mut request = self
            .http
            .request(options.method.clone(), url.clone())
            .headers(headers);
        if let Some(body) = &options.body {
            request = request.body(body.clone());
        }
        Ok(request.send().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_json_body_sets_content_type() {
        let options = FetchOptions::new(Method::POST)
            .json(&serde_json::json!({ "name": "Roadmap" }))
            .unwrap();

        assert_eq!(options.headers[CONTENT_TYPE], "application/json");
        assert_eq!(options.body.as_deref(), Some(br#"{"name":"Roadmap"}"#.as_slice()));
    }

    #[test]
    fn test_unencodable_body_is_a_local_error() {
        // JSON object keys must be strings.
        let mut body = BTreeMap::new();
        body.insert((1, 2), "pair");

        let err = FetchOptions::new(Method::POST).json(&body).unwrap_err();

        assert!(matches!(err, ClientError::InvalidBody(_)));
        assert_eq!(err.status(), None);
        assert!(!err.clears_session());
    }
}
