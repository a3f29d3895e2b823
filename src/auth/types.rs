//! Authentication user types.

use crate::identity::{Role, User};
use crate::jwt::Claims;

/// Authenticated user information extracted from a verified access token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub claims: Claims,
}

impl AuthenticatedUser {
    pub fn id(&self) -> &str {
        &self.claims.sub
    }

    pub fn role(&self) -> Role {
        self.claims.role
    }

    pub fn user(&self) -> User {
        self.claims.user()
    }
}
