use std::path::{Path, PathBuf};
use std::sync::Arc;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::Rng;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::sync::RwLock;
use tracing::{debug, error};

use super::StoreError;
use crate::identity::{Role, User};

/// A persisted account. `password` holds an Argon2id PHC string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: Role,
    pub created_at: String,
}

impl UserRecord {
    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.role,
        }
    }
}

/// Admin listing entry. Never carries the password hash.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub created_at: String,
}

impl From<&UserRecord> for UserSummary {
    fn from(record: &UserRecord) -> Self {
        Self {
            id: record.id.clone(),
            email: record.email.clone(),
            name: record.name.clone(),
            role: record.role,
            created_at: record.created_at.clone(),
        }
    }
}

#[derive(Clone)]
pub struct UserStore {
    path: Option<PathBuf>,
    users: Arc<RwLock<Vec<UserRecord>>>,
}

impl UserStore {
    pub(super) async fn load(path: Option<PathBuf>) -> Result<Self, StoreError> {
        let users = match &path {
            Some(path) => read_users(path).await?,
            None => Vec::new(),
        };
        Ok(Self {
            path,
            users: Arc::new(RwLock::new(users)),
        })
    }

    /// Find a user by email, ignoring case.
    pub async fn get_by_email(&self, email: &str) -> Option<UserRecord> {
        let email = normalize_email(email);
        self.users
            .read()
            .await
            .iter()
            .find(|u| normalize_email(&u.email) == email)
            .cloned()
    }

    pub async fn get_by_id(&self, id: &str) -> Option<UserRecord> {
        self.users
            .read()
            .await
            .iter()
            .find(|u| u.id == id)
            .cloned()
    }

    pub async fn list(&self) -> Vec<UserSummary> {
        self.users
            .read()
            .await
            .iter()
            .map(UserSummary::from)
            .collect()
    }

    pub async fn count(&self) -> usize {
        self.users.read().await.len()
    }

    /// Create a user. The email is stored lower-cased; a duplicate (ignoring
    /// case) is a conflict.
    pub async fn create(
        &self,
        email: &str,
        password: &str,
        name: &str,
        role: Role,
    ) -> Result<UserRecord, StoreError> {
        let record = UserRecord {
            id: uuid::Uuid::new_v4().to_string(),
            email: normalize_email(email),
            password: hash_password(password).await?,
            name: name.trim().to_string(),
            role,
            created_at: now_rfc3339(),
        };
        self.insert(record.clone()).await?;
        Ok(record)
    }

    /// Seed the demo accounts when the store is empty. Returns how many were added.
    pub async fn seed_demo_users(&self) -> Result<usize, StoreError> {
        if self.count().await > 0 {
            return Ok(0);
        }
        for (email, password, name, role) in DEMO_USERS {
            self.create(email, password, name, *role).await?;
        }
        Ok(DEMO_USERS.len())
    }

    async fn insert(&self, record: UserRecord) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| normalize_email(&u.email) == record.email) {
            return Err(StoreError::Conflict);
        }

        let mut next = users.clone();
        next.push(record);
        if let Some(path) = &self.path {
            write_users(path, &next).await?;
        }
        *users = next;
        Ok(())
    }
}

const DEMO_USERS: &[(&str, &str, &str, Role)] = &[
    ("admin@example.com", "admin-demo-pass", "Demo Admin", Role::Admin),
    (
        "portfolio@example.com",
        "portfolio-demo-pass",
        "Demo Portfolio Manager",
        Role::PortfolioManager,
    ),
    (
        "project@example.com",
        "project-demo-pass",
        "Demo Project Manager",
        Role::ProjectManager,
    ),
    ("viewer@example.com", "viewer-demo-pass", "Demo Viewer", Role::Viewer),
];

/// Check a password against the record's hash. Malformed hashes never verify.
///
/// Argon2 is CPU-bound, so the check runs on the blocking pool.
pub async fn verify_password(record: &UserRecord, password: &str) -> bool {
    let hash = record.password.clone();
    let password = password.to_string();
    let user_id = record.id.clone();

    let result = tokio::task::spawn_blocking(move || {
        let hash = match PasswordHash::new(&hash) {
            Ok(hash) => hash,
            Err(e) => {
                error!(user_id = %user_id, error = %e, "Stored password hash is malformed");
                return false;
            }
        };
        let valid = Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok();
        if !valid {
            debug!(user_id = %user_id, "Password verification failed");
        }
        valid
    })
    .await;

    result.unwrap_or_else(|e| {
        error!(error = %e, "Password verification task failed");
        false
    })
}

/// Argon2id PHC string for `password`, computed on the blocking pool.
pub async fn hash_password(password: &str) -> Result<String, StoreError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || {
        let mut salt = [0u8; 16];
        rand::rng().fill(&mut salt);
        let salt = SaltString::encode_b64(&salt).map_err(|e| StoreError::Hash(e.to_string()))?;
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| StoreError::Hash(e.to_string()))
    })
    .await
    .map_err(|e| StoreError::Hash(e.to_string()))?
}

/// Emails are compared and stored trimmed and Unicode lower-cased.
fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

async fn read_users(path: &Path) -> Result<Vec<UserRecord>, StoreError> {
    match tokio::fs::read(path).await {
        Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

async fn write_users(path: &Path, users: &[UserRecord]) -> Result<(), StoreError> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            tokio::fs::create_dir_all(dir).await?;
        }
    }
    let json = serde_json::to_vec_pretty(users)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
