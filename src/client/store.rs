//! Durable client-side storage for the access token.
//!
//! Two named slots exist: `access_token` and the reserved `refresh_token`
//! label. The renewal credential itself never lands here; it only lives in the
//! HTTP client's cookie jar. Storage failures are logged and swallowed.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::error;

/// Slot holding the access token.
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Reserved slot for the renewal token label. Cleared alongside the access token.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Persist, read and clear the current access token.
pub trait TokenStore: Send + Sync {
    fn set(&self, token: &str);
    fn get(&self) -> Option<String>;
    fn clear(&self);
}

/// JSON-file backed store. With no path, storage is unavailable and every
/// operation is a no-op.
pub struct FileTokenStore {
    path: Option<PathBuf>,
    lock: Mutex<()>,
}

type Slots = BTreeMap<String, String>;

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            lock: Mutex::new(()),
        }
    }

    /// A store with no durable backing (e.g. a headless context).
    pub fn unavailable() -> Self {
        Self {
            path: None,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn read_slots(path: &Path) -> std::io::Result<Slots> {
        match std::fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Slots::new()),
            Err(e) => Err(e),
        }
    }

    fn write_slots(path: &Path, slots: &Slots) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let json = serde_json::to_vec_pretty(slots)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)
    }

    fn update(&self, op: &str, f: impl FnOnce(&mut Slots)) {
        let Some(path) = self.path.as_deref() else {
            return;
        };
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());

        // Unreadable contents are discarded on the next write.
        let mut slots = Self::read_slots(path).unwrap_or_else(|e| {
            error!(path = %path.display(), error = %e, "Discarding unreadable token file");
            Slots::new()
        });
        f(&mut slots);
        if let Err(e) = Self::write_slots(path, &slots) {
            error!(path = %path.display(), error = %e, "Failed to {} token", op);
        }
    }
}

impl TokenStore for FileTokenStore {
    fn set(&self, token: &str) {
        self.update("save", |slots| {
            slots.insert(ACCESS_TOKEN_KEY.to_string(), token.to_string());
        });
    }

    fn get(&self) -> Option<String> {
        let path = self.path.as_deref()?;
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        match Self::read_slots(path) {
            Ok(mut slots) => slots.remove(ACCESS_TOKEN_KEY),
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to get access token");
                None
            }
        }
    }

    fn clear(&self) {
        self.update("clear", |slots| {
            slots.remove(ACCESS_TOKEN_KEY);
            slots.remove(REFRESH_TOKEN_KEY);
        });
    }
}

/// Process-local store, used by tests and short-lived tools.
#[derive(Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn set(&self, token: &str) {
        *self.token.lock().unwrap_or_else(|e| e.into_inner()) = Some(token.to_string());
    }

    fn get(&self) -> Option<String> {
        self.token.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn clear(&self) {
        *self.token.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}
