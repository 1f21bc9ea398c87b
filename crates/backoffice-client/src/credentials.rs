//! Access/refresh credential persistence.
//!
//! The store holds exactly two opaque entries, `access_token` and
//! `refresh_token`. It carries no logic: callers read and write them directly
//! and no invariant spans more than one call.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const CREDENTIALS_FILE: &str = "credentials.json";

/// Process-wide key-value storage for the credential pair.
pub trait CredentialStore: Send + Sync {
    fn access(&self) -> Option<String>;
    fn refresh(&self) -> Option<String>;
    fn set_pair(&self, access: &str, refresh: &str);
    /// Replace the access credential only, keeping the refresh one.
    fn set_access(&self, access: &str);
    fn clear(&self);
}

/// The persisted layout: two named entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct StoredPair {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
}

impl StoredPair {
    fn pair(access: &str, refresh: &str) -> Self {
        Self {
            access_token: Some(access.to_string()),
            refresh_token: Some(refresh.to_string()),
        }
    }
}

/// In-memory store, lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    inner: RwLock<StoredPair>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pair(access: &str, refresh: &str) -> Self {
        Self {
            inner: RwLock::new(StoredPair::pair(access, refresh)),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn access(&self) -> Option<String> {
        self.inner.read().access_token.clone()
    }

    fn refresh(&self) -> Option<String> {
        self.inner.read().refresh_token.clone()
    }

    fn set_pair(&self, access: &str, refresh: &str) {
        *self.inner.write() = StoredPair::pair(access, refresh);
    }

    fn set_access(&self, access: &str) {
        self.inner.write().access_token = Some(access.to_string());
    }

    fn clear(&self) {
        *self.inner.write() = StoredPair::default();
    }
}

/// Store backed by `credentials.json` in a data directory.
///
/// The in-memory copy is authoritative. A write failure is logged and does not
/// reach the caller; the next successful write brings the file back in sync.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    cache: RwLock<StoredPair>,
}

impl FileCredentialStore {
    /// Open the store in `data_dir`, loading whatever is already persisted.
    /// A missing or unreadable file starts out empty.
    pub fn open(data_dir: impl AsRef<Path>) -> Self {
        let path = data_dir.as_ref().join(CREDENTIALS_FILE);
        let stored = load_pair(&path);
        Self {
            path,
            cache: RwLock::new(stored),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn update(&self, apply: impl FnOnce(&mut StoredPair)) {
        let mut guard = self.cache.write();
        apply(&mut guard);
        if let Err(e) = write_pair(&self.path, &guard) {
            tracing::warn!("Failed to persist credentials to {}: {}", self.path.display(), e);
        }
    }
}

impl CredentialStore for FileCredentialStore {
    fn access(&self) -> Option<String> {
        self.cache.read().access_token.clone()
    }

    fn refresh(&self) -> Option<String> {
        self.cache.read().refresh_token.clone()
    }

    fn set_pair(&self, access: &str, refresh: &str) {
        self.update(|pair| *pair = StoredPair::pair(access, refresh));
    }

    fn set_access(&self, access: &str) {
        self.update(|pair| pair.access_token = Some(access.to_string()));
    }

    fn clear(&self) {
        self.update(|pair| *pair = StoredPair::default());
    }
}

fn load_pair(path: &Path) -> StoredPair {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(_) => return StoredPair::default(),
    };
    match serde_json::from_str(&content) {
        Ok(pair) => pair,
        Err(e) => {
            tracing::warn!("Ignoring unreadable credentials file {}: {}", path.display(), e);
            StoredPair::default()
        },
    }
}

fn write_pair(path: &Path, pair: &StoredPair) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| format!("Failed to create directory: {}", e))?;
    }

    let temp_path = path.with_extension("json.tmp");
    let json_str =
        serde_json::to_string_pretty(pair).map_err(|e| format!("JSON serialize: {}", e))?;

    fs::write(&temp_path, json_str).map_err(|e| format!("Failed to write temp file: {}", e))?;
    fs::rename(&temp_path, path).map_err(|e| format!("Failed to rename file: {}", e))?;

    Ok(())
}
