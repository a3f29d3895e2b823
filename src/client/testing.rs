//! Test doubles for the client session layer.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::api::{AuthApi, LoginResponse, RefreshResponse, Registration};
use super::error::{ClientError, Result};
use crate::identity::{Role, User};
use crate::jwt::{Claims, JwtConfig, TokenType, now_secs};

pub const TEST_SECRET: &[u8] = b"client-test-secret";
pub const TEST_PASSWORD: &str = "correct horse";

pub fn test_user() -> User {
    User {
        id: "user-1".into(),
        email: "viewer@example.com".into(),
        name: "Vera Viewer".into(),
        role: Role::Viewer,
    }
}

/// A signed access token whose `exp` is `now + secs` (negative for the past).
pub fn token_expiring_in(secs: i64) -> String {
    let now = now_secs() as i64;
    let exp = now + secs;
    let iat = now.min(exp) - 100;
    let claims = Claims {
        iat: iat as u64,
        exp: exp as u64,
        ..Claims::for_user(&test_user(), TokenType::Access, 0, 1)
    };
    JwtConfig::new(TEST_SECRET).encode_claims(&claims).unwrap()
}

#[derive(Clone, Copy, Debug)]
pub enum RenewalOutcome {
    Success,
    Unauthorized,
    ServerError,
    Malformed,
}

pub struct MockAuthApi {
    delay: Duration,
    renewal: Mutex<RenewalOutcome>,
    logout_fails: bool,
    refresh_calls: AtomicUsize,
    logout_calls: AtomicUsize,
}

impl MockAuthApi {
    pub fn new() -> Self {
        Self {
            delay: Duration::ZERO,
            renewal: Mutex::new(RenewalOutcome::Success),
            logout_fails: false,
            refresh_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_renewal(self, outcome: RenewalOutcome) -> Self {
        self.set_renewal(outcome);
        self
    }

    pub fn with_failing_logout(mut self) -> Self {
        self.logout_fails = true;
        self
    }

    pub fn set_renewal(&self, outcome: RenewalOutcome) {
        *self.renewal.lock().unwrap() = outcome;
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn logout_calls(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }

    fn issue(&self, ttl: u64) -> (String, u64) {
        let config = JwtConfig::new(TEST_SECRET);
        let token = config.encode(&test_user(), ttl).unwrap();
        let expires_at = (now_secs() + ttl) * 1000;
        (token, expires_at)
    }
}

#[async_trait]
impl AuthApi for MockAuthApi {
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse> {
        if email != test_user().email || password != TEST_PASSWORD {
            return Err(ClientError::Authentication(
                "invalid email or password".into(),
            ));
        }
        let (access_token, expires_at) = self.issue(900);
        Ok(LoginResponse {
            user: test_user(),
            access_token,
            expires_at,
        })
    }

    async fn register(&self, registration: &Registration) -> Result<LoginResponse> {
        if registration.email == test_user().email {
            return Err(ClientError::Rejected {
                status: 409,
                message: "a user with this email already exists".into(),
            });
        }
        let (access_token, expires_at) = self.issue(900);
        Ok(LoginResponse {
            user: test_user(),
            access_token,
            expires_at,
        })
    }

    async fn refresh(&self) -> Result<RefreshResponse> {
        let call = self.refresh_calls.fetch_add(1, Ordering::SeqCst) as u64;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let outcome = *self.renewal.lock().unwrap();
        match outcome {
            RenewalOutcome::Success => {
                let (access_token, expires_at) = self.issue(1000 + call);
                Ok(RefreshResponse {
                    access_token,
                    expires_at,
                })
            }
            RenewalOutcome::Unauthorized => {
                Err(ClientError::Authentication("no refresh token".into()))
            }
            RenewalOutcome::ServerError => Err(ClientError::Network {
                status: Some(500),
                message: "server error, please try again later".into(),
            }),
            RenewalOutcome::Malformed => Ok(RefreshResponse {
                access_token: "not-a-token".into(),
                expires_at: 0,
            }),
        }
    }

    async fn logout(&self, _access_token: &str) -> Result<()> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        if self.logout_fails {
            return Err(ClientError::Network {
                status: None,
                message: "no connection to the server".into(),
            });
        }
        Ok(())
    }
}
