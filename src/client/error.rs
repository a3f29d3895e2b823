//! Client-side error taxonomy.

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors surfaced by the client session layer.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// No usable credential, renewal credential invalid, or repeated 401.
    /// Local tokens are cleared and the user must sign in again.
    #[error("{0}")]
    Authentication(String),

    /// Credential valid but the role is insufficient. Tokens are kept.
    #[error("{0}")]
    Authorization(String),

    /// No connectivity, timeout, or a server-side failure. Retryable by the user.
    #[error("{message}")]
    Network {
        status: Option<u16>,
        message: String,
    },

    /// Any other 4xx, carrying the server's message (validation, conflict, ...).
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// A token that cannot be decoded. Handled like an authentication failure.
    #[error("malformed token")]
    MalformedToken,

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The request body could not be serialized; nothing was sent.
    #[error("could not encode request body: {0}")]
    InvalidBody(String),
}

impl ClientError {
    pub fn no_credential() -> Self {
        Self::Authentication("no usable credential".into())
    }

    pub fn session_expired() -> Self {
        Self::Authentication("session expired, please sign in again".into())
    }

    /// Whether this failure means the local session is gone.
    pub fn clears_session(&self) -> bool {
        matches!(self, Self::Authentication(_) | Self::MalformedToken)
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Authentication(_) | Self::MalformedToken => Some(401),
            Self::Authorization(_) => Some(403),
            Self::Network { status, .. } => *status,
            Self::Rejected { status, .. } => Some(*status),
            Self::InvalidUrl(_) | Self::InvalidBody(_) => None,
        }
    }

    /// Categorize an HTTP status with the message the server sent.
    pub fn from_status(status: StatusCode, message: impl Into<String>) -> Self {
        let message = message.into();
        match status.as_u16() {
            401 => Self::Authentication(message),
            403 => Self::Authorization(message),
            code if code >= 500 => Self::Network {
                status: Some(code),
                message: "server error, please try again later".into(),
            },
            code => Self::Rejected {
                status: code,
                message,
            },
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        let message = if e.is_timeout() {
            "the server took too long to respond".to_string()
        } else if e.is_connect() {
            "no connection to the server".to_string()
        } else if e.is_decode() {
            format!("unexpected response from the server: {e}")
        } else {
            format!("request failed: {e}")
        };
        Self::Network {
            status: e.status().map(|s| s.as_u16()),
            message,
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

/// Turn a non-success response into a categorized error, reading `message`
/// or `error` from a JSON body when present.
pub async fn error_from_response(response: reqwest::Response) -> ClientError {
    let status = response.status();
    let fallback = status
        .canonical_reason()
        .unwrap_or("request failed")
        .to_string();
    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.message.or(body.error).unwrap_or(fallback),
        Err(_) => fallback,
    };
    ClientError::from_status(status, message)
}

/// Pass a response through when it succeeded, otherwise categorize it.
pub async fn error_for_status(response: reqwest::Response) -> Result<reqwest::Response> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(error_from_response(response).await)
    }
}
