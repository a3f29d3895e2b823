//! JWT token generation, verification and client-side decoding.
//!
//! Tokens are `header.payload.signature`, each segment base64url encoded and
//! signed with HMAC-SHA256. There are two reading paths:
//! - [`JwtConfig::validate_access_token`] / [`JwtConfig::verify`] check the
//!   signature and expiry. Only the server holds the secret.
//! - [`decode`] reads the claim set without checking the signature. Clients use
//!   it to display the session and to schedule renewals, nothing more.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::identity::{Role, User, email_local_part};

/// Token type for distinguishing access vs refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Short-lived bearer token (15 minutes)
    Access,
    /// Long-lived renewal credential (7 days), only ever sent in an HttpOnly cookie
    Refresh,
}

/// Identity claim set carried in the token payload.
///
/// The schema is closed: unknown fields and missing required fields make the
/// payload malformed. Only `name` is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Claims {
    /// Subject (user id), stable across renewals
    pub sub: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub role: Role,
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

impl Claims {
    pub fn for_user(user: &User, token_type: TokenType, issued_at: u64, ttl_secs: u64) -> Self {
        Self {
            sub: user.id.clone(),
            email: user.email.clone(),
            name: Some(user.name.clone()),
            role: user.role,
            token_type,
            iat: issued_at,
            exp: issued_at.saturating_add(ttl_secs),
        }
    }

    /// Display name, falling back to the local part of the email.
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => email_local_part(&self.email),
        }
    }

    /// Project the identity fields into a user record.
    pub fn user(&self) -> User {
        User {
            id: self.sub.clone(),
            email: self.email.clone(),
            name: self.display_name().to_string(),
            role: self.role,
        }
    }

    /// Expiry in epoch milliseconds.
    pub fn expires_at_ms(&self) -> u64 {
        self.exp.saturating_mul(1000)
    }

    pub fn is_expired_at(&self, now_secs: u64) -> bool {
        self.exp <= now_secs
    }

    fn is_well_formed(&self) -> bool {
        !self.sub.is_empty() && self.exp > self.iat
    }
}

/// Access token duration: 15 minutes
pub const ACCESS_TOKEN_DURATION_SECS: u64 = 15 * 60;

/// Refresh token duration: 7 days
pub const REFRESH_TOKEN_DURATION_SECS: u64 = 7 * 24 * 60 * 60;

/// Configuration for JWT operations.
#[derive(Clone)]
pub struct JwtConfig {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: u64,
    refresh_ttl: u64,
}

/// Result of issuing a token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// The JWT token string
    pub token: String,
    /// Issued at timestamp (Unix seconds)
    pub issued_at: u64,
    /// Expiration timestamp (Unix seconds)
    pub expires_at: u64,
    /// Token duration in seconds
    pub duration: u64,
}

impl JwtConfig {
    /// Create a new JWT configuration with the given secret and default lifetimes.
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_ttl: ACCESS_TOKEN_DURATION_SECS,
            refresh_ttl: REFRESH_TOKEN_DURATION_SECS,
        }
    }

    /// Override token lifetimes (seconds).
    pub fn with_lifetimes(mut self, access_secs: u64, refresh_secs: u64) -> Self {
        self.access_ttl = access_secs;
        self.refresh_ttl = refresh_secs;
        self
    }

    pub fn access_ttl(&self) -> u64 {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> u64 {
        self.refresh_ttl
    }

    /// Encode an access token for `user` valid for `ttl_secs` from now.
    pub fn encode(&self, user: &User, ttl_secs: u64) -> Result<String, JwtError> {
        self.issue(user, TokenType::Access, ttl_secs)
            .map(|issued| issued.token)
    }

    /// Sign an explicit claim set. Rejects claims with `exp <= iat` or an empty subject.
    pub fn encode_claims(&self, claims: &Claims) -> Result<String, JwtError> {
        if !claims.is_well_formed() {
            return Err(JwtError::InvalidClaims);
        }
        jsonwebtoken::encode(&Header::default(), claims, &self.encoding_key)
            .map_err(JwtError::Encoding)
    }

    /// Issue a token of the given type.
    pub fn issue(
        &self,
        user: &User,
        token_type: TokenType,
        ttl_secs: u64,
    ) -> Result<IssuedToken, JwtError> {
        let now = unix_now()?;
        let claims = Claims::for_user(user, token_type, now, ttl_secs);
        let token = self.encode_claims(&claims)?;

        Ok(IssuedToken {
            token,
            issued_at: claims.iat,
            expires_at: claims.exp,
            duration: ttl_secs,
        })
    }

    pub fn generate_access_token(&self, user: &User) -> Result<IssuedToken, JwtError> {
        self.issue(user, TokenType::Access, self.access_ttl)
    }

    pub fn generate_refresh_token(&self, user: &User) -> Result<IssuedToken, JwtError> {
        self.issue(user, TokenType::Refresh, self.refresh_ttl)
    }

    /// Validate and decode an access token.
    pub fn validate_access_token(&self, token: &str) -> Result<Claims, JwtError> {
        self.validate(token, TokenType::Access)
    }

    /// Validate and decode a refresh token.
    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims, JwtError> {
        self.validate(token, TokenType::Refresh)
    }

    /// Verified access-token claims, or `None` for any failure.
    pub fn verify(&self, token: &str) -> Option<Claims> {
        self.validate_access_token(token).ok()
    }

    fn validate(&self, token: &str, expected: TokenType) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let token_data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(JwtError::Decoding)?;
        let claims = token_data.claims;

        if claims.token_type != expected {
            return Err(JwtError::WrongTokenType);
        }
        if !claims.is_well_formed() {
            return Err(JwtError::InvalidClaims);
        }
        // jsonwebtoken accepts exp == now; a token expiring this second is already dead.
        if claims.is_expired_at(unix_now()?) {
            return Err(JwtError::Expired);
        }

        Ok(claims)
    }
}

/// Errors that can occur during JWT operations.
#[derive(Debug)]
pub enum JwtError {
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// Error decoding the token
    Decoding(jsonwebtoken::errors::Error),
    /// Claims violate `exp > iat` or carry an empty subject
    InvalidClaims,
    /// Token expired
    Expired,
    /// System time error
    TimeError,
    /// Wrong token type (e.g., using refresh token as access token)
    WrongTokenType,
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            JwtError::Decoding(e) => write!(f, "Failed to decode token: {}", e),
            JwtError::InvalidClaims => write!(f, "Invalid token claims"),
            JwtError::Expired => write!(f, "Token expired"),
            JwtError::TimeError => write!(f, "System time error"),
            JwtError::WrongTokenType => write!(f, "Wrong token type"),
        }
    }
}

impl std::error::Error for JwtError {}

/// Base64url, accepting segments with or without padding.
const SEGMENT_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Deserialize)]
struct SegmentHeader {
    #[allow(dead_code)]
    alg: String,
}

/// Decode a token's claim set without checking its signature.
///
/// Returns `None` unless the token has exactly three non-empty segments, the
/// header and payload are base64url JSON of the expected shape, and `exp > iat`.
pub fn decode(token: &str) -> Option<Claims> {
    let mut segments = token.split('.');
    let (Some(header), Some(payload), Some(signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return None;
    };
    if header.is_empty() || payload.is_empty() || signature.is_empty() {
        return None;
    }

    let header_bytes = SEGMENT_ENGINE.decode(header).ok()?;
    serde_json::from_slice::<SegmentHeader>(&header_bytes).ok()?;

    let payload_bytes = SEGMENT_ENGINE.decode(payload).ok()?;
    let claims: Claims = serde_json::from_slice(&payload_bytes).ok()?;

    claims.is_well_formed().then_some(claims)
}

/// Whether the token is expired (or cannot be decoded at all).
pub fn is_token_expired(token: &str) -> bool {
    match decode(token) {
        Some(claims) => claims.is_expired_at(now_secs()),
        None => true,
    }
}

/// Current Unix time in seconds (zero if the clock is before the epoch).
pub fn now_secs() -> u64 {
    unix_now().unwrap_or_default()
}

fn unix_now() -> Result<u64, JwtError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| JwtError::TimeError)
}
