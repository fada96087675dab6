//! Persisted UI preferences
//!
//! A tiny key-value capability shared across playback sessions. Writes are
//! whole-key assignments, so the last write wins.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::error::TimeMachineResult;

pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> TimeMachineResult<()>;
}

#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) -> TimeMachineResult<()> {
        self.values
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Preferences kept in a JSON object on disk, rewritten on every change
#[derive(Debug)]
pub struct JsonFilePreferenceStore {
    path: PathBuf,
    values: RwLock<HashMap<String, String>>,
}

impl JsonFilePreferenceStore {
    /// Open `path`, starting empty if it does not exist yet
    pub fn open(path: impl AsRef<Path>) -> TimeMachineResult<Self> {
        let path = path.as_ref().to_path_buf();
        let values = match std::fs::read_to_string(&path) {
            Ok(content) if !content.trim().is_empty() => serde_json::from_str(&content)?,
            Ok(_) => HashMap::new(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }
}

impl PreferenceStore for JsonFilePreferenceStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) -> TimeMachineResult<()> {
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        let mut next = values.clone();
        next.insert(key.to_string(), value.to_string());
        let content = serde_json::to_string_pretty(&next)?;
        // memory only changes once the file holds the new value
        std::fs::write(&self.path, content)?;
        *values = next;
        Ok(())
    }
}

/// A boolean toggle persisted under `key`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BooleanPreference {
    pub key: String,
    pub default: bool,
}

impl BooleanPreference {
    pub fn new(key: impl Into<String>, default: bool) -> Self {
        Self {
            key: key.into(),
            default,
        }
    }

    /// Stored value, or the default when absent or unparseable
    pub fn load(&self, store: &dyn PreferenceStore) -> bool {
        match store.get(&self.key).as_deref() {
            Some("true") => true,
            Some("false") => false,
            _ => self.default,
        }
    }

    pub fn store(&self, store: &dyn PreferenceStore, value: bool) {
        if let Err(e) = store.set(&self.key, if value { "true" } else { "false" }) {
            tracing::warn!("Failed to persist preference {}: {}", self.key, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_value_uses_default() {
        let store = MemoryPreferenceStore::new();
        assert!(BooleanPreference::new("show-candles", true).load(&store));
        assert!(!BooleanPreference::new("show-candles", false).load(&store));
    }

    #[test]
    fn test_stored_value_overrides_default() {
        let store = MemoryPreferenceStore::new();
        store.set("tm", "false").unwrap();
        let pref = BooleanPreference::new("tm", true);
        assert!(!pref.load(&store));

        pref.store(&store, true);
        assert_eq!(store.get("tm").as_deref(), Some("true"));
    }

    #[test]
    fn test_garbage_value_falls_back() {
        let store = MemoryPreferenceStore::new();
        store.set("tm", "yes please").unwrap();
        assert!(BooleanPreference::new("tm", true).load(&store));
    }

    #[test]
    fn test_json_file_store_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");

        let store = JsonFilePreferenceStore::open(&path).unwrap();
        assert_eq!(store.get("tm"), None);
        store.set("tm", "false").unwrap();

        let reopened = JsonFilePreferenceStore::open(&path).unwrap();
        assert_eq!(reopened.get("tm").as_deref(), Some("false"));
    }

    #[test]
    fn test_json_file_store_unchanged_when_write_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFilePreferenceStore::open(dir.path().join("missing/prefs.json")).unwrap();

        assert!(store.set("tm", "false").is_err());
        assert_eq!(store.get("tm"), None);
        assert!(BooleanPreference::new("tm", true).load(&store));
    }
}
