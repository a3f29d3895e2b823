//! Client-side session management.
//!
//! The access token lives in a [`TokenStore`]; the renewal credential lives
//! in the HTTP client's cookie jar. [`RefreshCoordinator`] renews the access
//! token at most once at a time, [`AuthenticatedClient`] attaches it to
//! requests, and [`SessionHook`] exposes the resulting session to a UI.

mod api;
mod error;
mod fetch;
mod hook;
mod http;
mod refresh;
mod session;
mod store;
#[cfg(test)]
mod testing;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use url::Url;

pub use api::{AuthApi, LoginResponse, Notification, RefreshResponse, Registration};
pub use error::{ClientError, Result, error_for_status, error_from_response};
pub use fetch::{AuthenticatedClient, FetchOptions};
pub use hook::{AuthState, DEFAULT_LOGIN_PATH, Navigator, SessionHook, WatchNavigator};
pub use http::HttpAuthApi;
pub use refresh::{DEFAULT_REFRESH_THRESHOLD, RefreshCoordinator};
pub use session::{Session, session_from_token};
pub use store::{
    ACCESS_TOKEN_KEY, FileTokenStore, MemoryTokenStore, REFRESH_TOKEN_KEY, TokenStore,
};

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for [`AuthClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API root, e.g. `http://localhost:7291/api/v1/`. Always ends with `/`.
    pub base_url: Url,
    pub refresh_threshold: Duration,
    /// Where the access token is persisted. `None` keeps it in memory.
    pub token_file: Option<PathBuf>,
    pub login_path: String,
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Result<Self> {
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let base_url = Url::parse(&normalized)
            .map_err(|e| ClientError::InvalidUrl(format!("{base_url}: {e}")))?;

        Ok(Self {
            base_url,
            refresh_threshold: DEFAULT_REFRESH_THRESHOLD,
            token_file: None,
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    pub fn with_token_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_file = Some(path.into());
        self
    }

    pub fn with_refresh_threshold(mut self, threshold: Duration) -> Self {
        self.refresh_threshold = threshold;
        self
    }
}

/// Everything a client application needs, wired together.
pub struct AuthClient {
    config: ClientConfig,
    api: Arc<HttpAuthApi>,
    coordinator: Arc<RefreshCoordinator>,
    fetcher: AuthenticatedClient,
}

impl AuthClient {
    pub fn connect(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(config.request_timeout)
            .build()?;

        let store: Arc<dyn TokenStore> = match &config.token_file {
            Some(path) => Arc::new(FileTokenStore::new(path)),
            None => Arc::new(MemoryTokenStore::new()),
        };
        let api = Arc::new(HttpAuthApi::new(http.clone(), config.base_url.clone()));
        let coordinator = Arc::new(
            RefreshCoordinator::new(store, api.clone()).with_threshold(config.refresh_threshold),
        );
        let fetcher =
            AuthenticatedClient::new(http, config.base_url.clone(), Arc::clone(&coordinator));

        Ok(Self {
            config,
            api,
            coordinator,
            fetcher,
        })
    }

    pub fn api(&self) -> &Arc<HttpAuthApi> {
        &self.api
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    pub fn fetcher(&self) -> &AuthenticatedClient {
        &self.fetcher
    }

    pub fn session_hook(&self, navigator: Arc<dyn Navigator>) -> SessionHook {
        SessionHook::new(
            Arc::clone(&self.coordinator),
            self.api.clone(),
            navigator,
        )
        .with_login_path(self.config.login_path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let config = ClientConfig::new("http://localhost:7291/api/v1").unwrap();
        assert_eq!(config.base_url.as_str(), "http://localhost:7291/api/v1/");
        assert_eq!(
            config.base_url.join("auth/login").unwrap().as_str(),
            "http://localhost:7291/api/v1/auth/login"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            ClientConfig::new("not a url"),
            Err(ClientError::InvalidUrl(_))
        ));
    }
}
