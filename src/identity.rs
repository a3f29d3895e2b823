//! Principal identity shared by the token codec, the client and the server.

use serde::{Deserialize, Serialize};

/// User role for authorization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    PortfolioManager,
    ProjectManager,
    #[default]
    Viewer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::PortfolioManager => "portfolio_manager",
            Role::ProjectManager => "project_manager",
            Role::Viewer => "viewer",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity projected out of a token or a stored user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
}

/// Local part of an email address, used when a token carries no display name.
pub fn email_local_part(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_wire_name() {
        for role in [
            Role::Admin,
            Role::PortfolioManager,
            Role::ProjectManager,
            Role::Viewer,
        ] {
            let json = serde_json::to_string(&role).unwrap();
            assert_eq!(json, format!("\"{}\"", role));
        }
    }

    #[test]
    fn test_role_serde_names() {
        let json = serde_json::to_string(&Role::PortfolioManager).unwrap();
        assert_eq!(json, "\"portfolio_manager\"");
        assert!(serde_json::from_str::<Role>("\"root\"").is_err());
    }

    #[test]
    fn test_email_local_part() {
        assert_eq!(email_local_part("abc@example.com"), "abc");
        assert_eq!(email_local_part("no-at-sign"), "no-at-sign");
    }
}
