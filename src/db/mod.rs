mod users;

use std::path::PathBuf;

use thiserror::Error;

pub use users::{UserRecord, UserStore, UserSummary, hash_password, verify_password};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("a user with this email already exists")]
    Conflict,
    #[error("user file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("user file is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("password hashing failed: {0}")]
    Hash(String),
}

#[derive(Clone)]
pub struct Database {
    users: UserStore,
}

impl Database {
    /// Open or create the user file at the given path.
    /// Use ":memory:" for a store that is never written to disk.
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        let path = (path != ":memory:").then(|| PathBuf::from(path));
        Ok(Self {
            users: UserStore::load(path).await?,
        })
    }

    /// Get the user store.
    pub fn users(&self) -> &UserStore {
        &self.users
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Role;

    #[tokio::test]
    async fn test_create_and_get_user() {
        let db = Database::open(":memory:").await.unwrap();

        let created = db
            .users()
            .create("Alice@Example.com", "secret1", "Alice", Role::Viewer)
            .await
            .unwrap();
        assert_eq!(created.email, "alice@example.com");

        let by_email = db.users().get_by_email("ALICE@example.COM").await.unwrap();
        assert_eq!(by_email.id, created.id);

        let by_id = db.users().get_by_id(&created.id).await.unwrap();
        assert_eq!(by_id.name, "Alice");
        assert!(db.users().get_by_id("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_non_ascii_email_lookup_ignores_case() {
        let db = Database::open(":memory:").await.unwrap();

        let created = db
            .users()
            .create("Élodie@example.com", "secret1", "Élodie", Role::Viewer)
            .await
            .unwrap();
        assert_eq!(created.email, "élodie@example.com");

        let found = db.users().get_by_email(" ÉLODIE@EXAMPLE.COM ").await.unwrap();
        assert_eq!(found.id, created.id);

        let duplicate = db
            .users()
            .create("ÉLODIE@example.com", "secret2", "Again", Role::Viewer)
            .await;
        assert!(matches!(duplicate, Err(StoreError::Conflict)));
    }

    #[tokio::test]
    async fn test_duplicate_email_fails() {
        let db = Database::open(":memory:").await.unwrap();

        db.users()
            .create("alice@example.com", "secret1", "Alice", Role::Viewer)
            .await
            .unwrap();
        let result = db
            .users()
            .create("ALICE@example.com", "secret2", "Other", Role::Admin)
            .await;

        assert!(matches!(result, Err(StoreError::Conflict)));
        assert_eq!(db.users().count().await, 1);
    }

    #[tokio::test]
    async fn test_verify_password() {
        let db = Database::open(":memory:").await.unwrap();
        let mut record = db
            .users()
            .create("bob@example.com", "hunter22", "Bob", Role::ProjectManager)
            .await
            .unwrap();

        assert!(record.password.starts_with("$argon2id$"));
        assert!(verify_password(&record, "hunter22").await);
        assert!(!verify_password(&record, "hunter23").await);

        record.password = "not-a-phc-string".into();
        assert!(!verify_password(&record, "hunter22").await);
    }

    #[tokio::test]
    async fn test_list_hides_password() {
        let db = Database::open(":memory:").await.unwrap();
        db.users()
            .create("carol@example.com", "secret1", "Carol", Role::Admin)
            .await
            .unwrap();

        let list = db.users().list().await;
        assert_eq!(list.len(), 1);
        let json = serde_json::to_value(&list[0]).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["role"], "admin");
        assert!(json["createdAt"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_file_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("users.json");
        let path_str = path.to_str().unwrap();

        let db = Database::open(path_str).await.unwrap();
        db.users()
            .create("dave@example.com", "secret1", "Dave", Role::PortfolioManager)
            .await
            .unwrap();
        assert!(path.exists());

        let reopened = Database::open(path_str).await.unwrap();
        let dave = reopened.users().get_by_email("dave@example.com").await.unwrap();
        assert_eq!(dave.role, Role::PortfolioManager);
        assert!(verify_password(&dave, "secret1").await);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        std::fs::write(&path, "{not json").unwrap();

        let result = Database::open(path.to_str().unwrap()).await;
        assert!(matches!(result, Err(StoreError::Corrupt(_))));
    }

    #[tokio::test]
    async fn test_seed_demo_users_only_when_empty() {
        let db = Database::open(":memory:").await.unwrap();

        assert_eq!(db.users().seed_demo_users().await.unwrap(), 4);
        assert_eq!(db.users().seed_demo_users().await.unwrap(), 0);

        let admin = db.users().get_by_email("admin@example.com").await.unwrap();
        assert_eq!(admin.role, Role::Admin);
    }
}
