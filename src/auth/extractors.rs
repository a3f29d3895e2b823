//! Axum extractors for bearer authentication.

use std::marker::PhantomData;

use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::debug;

use super::cookie::bearer_token;
use super::errors::{ApiAuthError, AuthErrorKind};
use super::state::HasAuthBackend;
use super::types::AuthenticatedUser;
use crate::identity::Role;

/// Role requirement checked after the token is verified.
pub trait RoleConstraint {
    fn allows(role: Role) -> bool;
}

/// Any authenticated user.
pub struct AnyRole;

impl RoleConstraint for AnyRole {
    fn allows(_: Role) -> bool {
        true
    }
}

/// Administrators only.
pub struct AdminOnly;

impl RoleConstraint for AdminOnly {
    fn allows(role: Role) -> bool {
        role == Role::Admin
    }
}

fn authenticate<S: HasAuthBackend>(
    parts: &Parts,
    state: &S,
) -> Result<AuthenticatedUser, AuthErrorKind> {
    let token = bearer_token(&parts.headers).ok_or(AuthErrorKind::NotAuthenticated)?;
    let claims = state.jwt().validate_access_token(token).map_err(|e| {
        debug!(error = %e, "Rejected bearer token");
        AuthErrorKind::InvalidToken
    })?;
    Ok(AuthenticatedUser { claims })
}

/// Extractor for API endpoints that require a valid bearer access token.
///
/// Missing or invalid tokens are rejected with 401, a role outside `R` with 403.
pub struct Auth<R: RoleConstraint = AnyRole>(pub AuthenticatedUser, pub PhantomData<fn() -> R>);

impl<R: RoleConstraint> Auth<R> {
    pub fn into_inner(self) -> AuthenticatedUser {
        self.0
    }
}

impl<S, R> FromRequestParts<S> for Auth<R>
where
    S: HasAuthBackend + Send + Sync,
    R: RoleConstraint,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = authenticate(parts, state).map_err(ApiAuthError::new)?;
        if !R::allows(user.role()) {
            return Err(ApiAuthError::new(AuthErrorKind::InsufficientRole));
        }
        Ok(Auth(user, PhantomData))
    }
}
