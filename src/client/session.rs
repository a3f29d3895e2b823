//! Session derivation from an access token.

use serde::Serialize;

use crate::identity::User;
use crate::jwt::{self, now_secs};

/// Read-only view of the signed-in principal.
///
/// A renewed token produces a new `Session`; sessions are never updated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user: User,
    pub access_token: String,
    /// Expiry in epoch milliseconds.
    pub expires_at: u64,
}

/// Derive a session from a token that is currently valid.
///
/// The signature is not checked here; the server re-verifies on every request.
pub fn session_from_token(token: &str) -> Option<Session> {
    let claims = jwt::decode(token)?;
    if claims.is_expired_at(now_secs()) {
        return None;
    }

    Some(Session {
        user: claims.user(),
        access_token: token.to_string(),
        expires_at: claims.expires_at_ms(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Role;
    use crate::jwt::{Claims, JwtConfig, TokenType};

    fn user() -> User {
        User {
            id: "42".into(),
            email: "pm@example.com".into(),
            name: "Pat".into(),
            role: Role::ProjectManager,
        }
    }

    #[test]
    fn test_session_from_valid_token() {
        let config = JwtConfig::new(b"secret");
        let token = config.encode(&user(), 600).unwrap();

        let session = session_from_token(&token).unwrap();
        let claims = jwt::decode(&token).unwrap();

        assert_eq!(session.user, user());
        assert_eq!(session.access_token, token);
        assert_eq!(session.expires_at, claims.exp * 1000);
    }

    #[test]
    fn test_expired_token_yields_no_session() {
        let config = JwtConfig::new(b"secret");
        let now = now_secs();
        let claims = Claims {
            iat: now - 60,
            exp: now - 1,
            ..Claims::for_user(&user(), TokenType::Access, now, 1)
        };
        let token = config.encode_claims(&claims).unwrap();

        assert!(session_from_token(&token).is_none());
    }

    #[test]
    fn test_malformed_token_yields_no_session() {
        assert!(session_from_token("not-a-token").is_none());
        assert!(session_from_token("a.b.c").is_none());
    }

    #[test]
    fn test_missing_name_uses_email_local_part() {
        let config = JwtConfig::new(b"secret");
        let now = now_secs();
        let claims = Claims {
            name: None,
            email: "abc@example.com".into(),
            ..Claims::for_user(&user(), TokenType::Access, now, 600)
        };
        let token = config.encode_claims(&claims).unwrap();

        assert_eq!(session_from_token(&token).unwrap().user.name, "abc");
    }
}
