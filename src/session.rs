use anyhow::{anyhow, Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const SESSION_KEY: &str = "guthealth_session_id";

/// Small persistent key/value store holding the session identifier
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn open_default() -> Result<Self> {
        Ok(Self::at(data_dir()?.join("storage.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return the stored session id, creating and persisting one on first use
    pub fn get_or_create(&self) -> Result<String> {
        let mut entries = self.read_entries()?;

        if let Some(existing) = entries.get(SESSION_KEY) {
            return Ok(existing.clone());
        }

        let session_id = generate_session_id();
        entries.insert(SESSION_KEY.to_string(), session_id.clone());
        self.write_entries(&entries)?;
        info!(path = %self.path.display(), "created new session id");

        Ok(session_id)
    }

    pub fn get(&self) -> Result<Option<String>> {
        Ok(self.read_entries()?.remove(SESSION_KEY))
    }

    /// Forget the stored session id. Returns whether one was present.
    pub fn clear(&self) -> Result<bool> {
        let mut entries = self.read_entries()?;
        if entries.remove(SESSION_KEY).is_none() {
            return Ok(false);
        }
        self.write_entries(&entries)?;
        Ok(true)
    }

    fn read_entries(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", self.path.display()))
    }

    fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        // Create storage directory if it doesn't exist
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, content)
            .with_context(|| format!("writing {}", self.path.display()))?;
        Ok(())
    }
}

pub fn generate_session_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Per-user data directory, shared with the log file
pub fn data_dir() -> Result<PathBuf> {
    let dir = dirs::data_dir().ok_or_else(|| anyhow!("Could not determine data directory"))?;
    Ok(dir.join("guthealth"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> SessionStore {
        SessionStore::at(dir.path().join("nested").join("storage.json"))
    }

    #[test]
    fn test_get_or_create_is_stable() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let first = store.get_or_create().unwrap();
        let second = store.get_or_create().unwrap();
        assert_eq!(first, second);
        assert!(!first.is_empty());

        // A fresh handle on the same file sees the same id
        let reopened = store_in(&dir);
        assert_eq!(reopened.get_or_create().unwrap(), first);
    }

    #[test]
    fn test_first_call_writes_one_entry() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert_eq!(store.get().unwrap(), None);

        let id = store.get_or_create().unwrap();

        let content = fs::read_to_string(store.path()).unwrap();
        let entries: BTreeMap<String, String> = serde_json::from_str(&content).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries.get(SESSION_KEY), Some(&id));
    }

    #[test]
    fn test_existing_value_is_returned_unchanged() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(
            store.path(),
            r#"{"guthealth_session_id":"not-a-uuid","theme":"dark"}"#,
        )
        .unwrap();

        assert_eq!(store.get_or_create().unwrap(), "not-a-uuid");
    }

    #[test]
    fn test_clear_keeps_unrelated_keys() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), r#"{"theme":"dark"}"#).unwrap();

        let id = store.get_or_create().unwrap();
        assert_eq!(store.get().unwrap(), Some(id));

        assert!(store.clear().unwrap());
        assert!(!store.clear().unwrap());
        assert_eq!(store.get().unwrap(), None);

        let content = fs::read_to_string(store.path()).unwrap();
        let entries: BTreeMap<String, String> = serde_json::from_str(&content).unwrap();
        assert_eq!(entries.get("theme").map(String::as_str), Some("dark"));
    }

    #[test]
    fn test_corrupt_storage_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::at(dir.path().join("storage.json"));
        fs::write(store.path(), "{ not json").unwrap();
        assert!(store.get_or_create().is_err());
    }
}
