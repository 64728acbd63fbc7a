//! Session Storage Abstraction
//!
//! String-keyed, string-valued persistent map backing the resume store and
//! the stored session credential. It survives a redirect within the same
//! browsing scope (tab) but not a fresh scope or a data wipe.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{Result, WizardError};

/// Abstract string store
pub trait SessionStorage: Send + Sync {
    /// Read a value
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a value. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory store, one per scope
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A panic while holding the lock cannot leave a HashMap half-written
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries().remove(key);
        Ok(())
    }
}

/// Directory-backed store. Each scope (tab) gets its own directory and each
/// key its own file.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Store rooted at `base_path/scope`
    pub fn new(base_path: impl Into<PathBuf>, scope: &str) -> Result<Self> {
        let scope = encode_key(scope);
        if scope.is_empty() {
            return Err(WizardError::Storage("storage scope is empty".into()));
        }
        let dir = base_path.into().join(scope);
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Directory holding this scope's entries
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Drop the whole scope, as closing the tab does
    pub fn clear(&self) -> Result<()> {
        if self.dir.exists() {
            std::fs::remove_dir_all(&self.dir)?;
        }
        std::fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    fn path_for_key(&self, key: &str) -> Result<PathBuf> {
        let name = encode_key(key);
        if name.is_empty() {
            return Err(WizardError::Storage("storage key is empty".into()));
        }
        Ok(self.dir.join(name))
    }
}

impl SessionStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for_key(key)?;
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for_key(key)?;
        // Write then rename so a reader never sees a torn value
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for_key(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// File-name-safe encoding of a key: `[A-Za-z0-9_-]` pass through, everything
/// else becomes `%XX` per byte. Dots are encoded so no key can collide with
/// the `.tmp` write file.
fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_storage_roundtrip() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("k").unwrap(), None);

        storage.set("k", "v1").unwrap();
        storage.set("k", "v2").unwrap();
        assert_eq!(storage.get("k").unwrap().as_deref(), Some("v2"));

        storage.remove("k").unwrap();
        storage.remove("k").unwrap();
        assert_eq!(storage.get("k").unwrap(), None);
    }

    #[test]
    fn test_file_storage_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path(), "tab-1").unwrap();

        storage.set("wizard.resume.itr_filing", "{}").unwrap();
        assert_eq!(
            storage.get("wizard.resume.itr_filing").unwrap().as_deref(),
            Some("{}")
        );

        storage.remove("wizard.resume.itr_filing").unwrap();
        assert_eq!(storage.get("wizard.resume.itr_filing").unwrap(), None);
    }

    #[test]
    fn test_file_storage_scopes_are_isolated() {
        let temp_dir = TempDir::new().unwrap();
        let tab_a = FileStorage::new(temp_dir.path(), "tab-a").unwrap();
        let tab_b = FileStorage::new(temp_dir.path(), "tab-b").unwrap();

        tab_a.set("k", "a").unwrap();
        assert_eq!(tab_b.get("k").unwrap(), None);

        // Reopening the same scope sees the value (survives a redirect)
        let tab_a_again = FileStorage::new(temp_dir.path(), "tab-a").unwrap();
        assert_eq!(tab_a_again.get("k").unwrap().as_deref(), Some("a"));

        tab_a.clear().unwrap();
        assert_eq!(tab_a_again.get("k").unwrap(), None);
    }

    #[test]
    fn test_keys_cannot_escape_scope() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path(), "tab").unwrap();
        storage.set("../../etc/passwd", "x").unwrap();
        assert!(storage.path_for_key("../../etc/passwd").unwrap().starts_with(storage.dir()));
        assert_eq!(storage.get("../../etc/passwd").unwrap().as_deref(), Some("x"));
    }

    #[test]
    fn test_encode_key() {
        assert_eq!(encode_key("abc_1-2"), "abc_1-2");
        assert_eq!(encode_key("a.b/c"), "a%2Eb%2Fc");
    }
}
