//! HTTP implementation of [`AuthApi`] on top of reqwest.
//!
//! The renewal credential is an HttpOnly cookie set by the server, so the
//! reqwest client must be built with a cookie store.

use async_trait::async_trait;
use serde::Serialize;
use url::Url;

use super::api::{AuthApi, LoginResponse, RefreshResponse, Registration};
use super::error::{ClientError, Result, error_for_status};

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

pub struct HttpAuthApi {
    http: reqwest::Client,
    base: Url,
}

impl HttpAuthApi {
    /// `base` is the API root, e.g. `http://localhost:7291/api/v1/`.
    pub fn new(http: reqwest::Client, base: Url) -> Self {
        Self { http, base }
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| ClientError::InvalidUrl(format!("{path}: {e}")))
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse> {
        let response = self
            .http
            .post(self.endpoint("auth/login")?)
            .json(&Credentials { email, password })
            .send()
            .await?;
        let response = error_for_status(response).await?;
        Ok(response.json().await?)
    }

    async fn register(&self, registration: &Registration) -> Result<LoginResponse> {
        let response = self
            .http
            .post(self.endpoint("auth/register")?)
            .json(registration)
            .send()
            .await?;
        let response = error_for_status(response).await?;
        Ok(response.json().await?)
    }

    async fn refresh(&self) -> Result<RefreshResponse> {
        let response = self
            .http
            .post(self.endpoint("auth/refresh")?)
            .send()
            .await?;
        let response = error_for_status(response).await?;
        Ok(response.json().await?)
    }

    async fn logout(&self, access_token: &str) -> Result<()> {
        let response = self
            .http
            .post(self.endpoint("auth/logout")?)
            .bearer_auth(access_token)
            .send()
            .await?;
        error_for_status(response).await?;
        Ok(())
    }
}
