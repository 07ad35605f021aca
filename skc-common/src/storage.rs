//! Durable key/value storage for the access token
//!
//! The client keeps exactly one piece of durable state: the bearer token,
//! stored under [`ACCESS_TOKEN_KEY`]. There is no expiry check and no refresh;
//! a token is trusted until a protected call fails or it is removed.
//!
//! The file-backed store writes a flat TOML table atomically (temp file +
//! rename) so a crash mid-write never leaves a truncated token file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::{Error, Result};

/// Fixed storage key for the bearer token
pub const ACCESS_TOKEN_KEY: &str = "accessToken";

/// Minimal string key/value store
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

// ========================================
// File-backed store
// ========================================

/// Key/value store persisted as a TOML file
pub struct FileStore {
    path: PathBuf,
    // Serialises read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let content = std::fs::read_to_string(&self.path)?;
        toml::from_str(&content).map_err(|e| {
            Error::Storage(format!("Corrupt storage file {}: {}", self.path.display(), e))
        })
    }

    fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string(entries)
            .map_err(|e| Error::Storage(format!("Serialize storage failed: {}", e)))?;

        let tmp_path = self.path.with_extension("toml.tmp");
        std::fs::write(&tmp_path, content)?;
        restrict_permissions(&tmp_path)?;
        std::fs::rename(&tmp_path, &self.path)?;

        debug!(path = %self.path.display(), entries = entries.len(), "Storage file written");
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| Error::Internal("storage lock poisoned".to_string()))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock()?;
        Ok(self.read_entries()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock()?;
        let mut entries = self.read_entries()?;
        entries.insert(key.to_string(), value.to_string());
        self.write_entries(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.lock()?;
        let mut entries = match self.read_entries() {
            Ok(entries) => entries,
            Err(Error::Storage(reason)) => {
                // Unparseable file: the key cannot be rewritten out, drop the file
                warn!(key, "{}; discarding storage file", reason);
                std::fs::remove_file(&self.path)?;
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        if entries.remove(key).is_some() {
            self.write_entries(&entries)?;
        }
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

// ========================================
// In-memory store
// ========================================

/// Volatile store for tests and throwaway sessions
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| Error::Internal("storage lock poisoned".to_string()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries()?.remove(key);
        Ok(())
    }
}

// ========================================
// Token store
// ========================================

/// Bearer token persistence under the fixed [`ACCESS_TOKEN_KEY`]
#[derive(Clone)]
pub struct TokenStore {
    backend: Arc<dyn KeyValueStore>,
}

impl TokenStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// Token store backed by a TOML file
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(FileStore::new(path)))
    }

    /// Token store that forgets everything on drop
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn set_token(&self, token: &str) -> Result<()> {
        if token.trim().is_empty() {
            return Err(Error::InvalidInput("refusing to store an empty token".to_string()));
        }
        self.backend.set(ACCESS_TOKEN_KEY, token)
    }

    pub fn get_token(&self) -> Result<Option<String>> {
        Ok(self
            .backend
            .get(ACCESS_TOKEN_KEY)?
            .filter(|token| !token.trim().is_empty()))
    }

    pub fn remove_token(&self) -> Result<()> {
        self.backend.remove(ACCESS_TOKEN_KEY)
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore").finish_non_exhaustive()
    }
}

// ========================================
// Tests
// ========================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_token_roundtrip() {
        let store = TokenStore::in_memory();
        assert_eq!(store.get_token().unwrap(), None);

        store.set_token("abc.def.ghi").unwrap();
        assert_eq!(store.get_token().unwrap().as_deref(), Some("abc.def.ghi"));

        store.remove_token().unwrap();
        assert_eq!(store.get_token().unwrap(), None);
    }

    #[test]
    fn test_empty_token_rejected() {
        let store = TokenStore::in_memory();
        assert!(matches!(store.set_token("  "), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_file_store_persists_across_instances() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("storage.toml");

        TokenStore::file(&path).set_token("persisted").unwrap();
        assert!(path.exists());

        let reopened = TokenStore::file(&path);
        assert_eq!(reopened.get_token().unwrap().as_deref(), Some("persisted"));
    }

    #[test]
    fn test_file_store_keeps_other_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storage.toml");
        let store = FileStore::new(&path);

        store.set("theme", "dark").unwrap();
        store.set(ACCESS_TOKEN_KEY, "tok").unwrap();
        store.remove(ACCESS_TOKEN_KEY).unwrap();

        assert_eq!(store.get("theme").unwrap().as_deref(), Some("dark"));
        assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn test_remove_missing_file_is_ok() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::file(dir.path().join("absent.toml"));
        assert!(store.remove_token().is_ok());
    }

    #[test]
    fn test_corrupt_file_reports_storage_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storage.toml");
        std::fs::write(&path, "this is = = not toml").unwrap();

        let store = TokenStore::file(&path);
        assert!(matches!(store.get_token(), Err(Error::Storage(_))));
    }

    #[test]
    fn test_remove_from_corrupt_file_discards_it() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storage.toml");
        std::fs::write(&path, "accessToken = \"abc\"\nnot toml at all\n").unwrap();

        let store = TokenStore::file(&path);
        store.remove_token().unwrap();

        assert!(!path.exists());
        assert_eq!(store.get_token().unwrap(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_file_permissions_restricted() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storage.toml");
        TokenStore::file(&path).set_token("secret").unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
