//! Persistent settings: the stored API key.
//!
//! Settings are a flat JSON object of string values. The store is loaded once
//! when opened and written back on every change.

use crate::error::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Key under which the Gemini API key is stored.
pub const API_KEY_STORAGE_KEY: &str = "gemini-api-key";

/// Environment variable that overrides the settings file location.
pub const SETTINGS_PATH_ENV: &str = "PEDALSCENE_SETTINGS";

/// Number of trailing key characters shown by [`SettingsStore::masked_api_key`].
const VISIBLE_KEY_CHARS: usize = 4;

/// Settings loaded at startup and persisted on write.
#[derive(Clone, Default)]
pub struct SettingsStore {
    path: Option<PathBuf>,
    values: BTreeMap<String, String>,
}

impl std::fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsStore")
            .field("path", &self.path)
            .field("api_key", &self.masked_api_key())
            .finish_non_exhaustive()
    }
}

impl SettingsStore {
    /// Default location: `$PEDALSCENE_SETTINGS`, else
    /// `$XDG_CONFIG_HOME/pedalscene/settings.json`, else
    /// `$HOME/.config/pedalscene/settings.json`.
    pub fn default_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(SETTINGS_PATH_ENV) {
            return Some(PathBuf::from(path));
        }
        let config_dir = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .filter(|p| p.is_absolute())
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(config_dir.join("pedalscene").join("settings.json"))
    }

    /// Loads settings from `path`. A missing file yields an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = match std::fs::read(&path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(path = %path.display(), entries = values.len(), "settings loaded");
        Ok(Self {
            path: Some(path),
            values,
        })
    }

    /// A store that is never written to disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The stored API key, if one is set.
    pub fn api_key(&self) -> Option<&str> {
        self.values
            .get(API_KEY_STORAGE_KEY)
            .map(String::as_str)
            .filter(|k| !k.is_empty())
    }

    /// Replaces the stored API key and persists it. A blank key clears it.
    ///
    /// On a failed write the store keeps its previous contents.
    pub fn save_api_key(&mut self, key: &str) -> Result<()> {
        let key = key.trim();
        let mut values = self.values.clone();
        if key.is_empty() {
            values.remove(API_KEY_STORAGE_KEY);
        } else {
            values.insert(API_KEY_STORAGE_KEY.to_string(), key.to_string());
        }
        self.commit(values)
    }

    /// Removes the stored API key and persists the change.
    pub fn clear_api_key(&mut self) -> Result<()> {
        let mut values = self.values.clone();
        values.remove(API_KEY_STORAGE_KEY);
        self.commit(values)
    }

    /// The key with everything but its last characters hidden.
    pub fn masked_api_key(&self) -> Option<String> {
        self.api_key().map(mask_key)
    }

    fn commit(&mut self, values: BTreeMap<String, String>) -> Result<()> {
        if let Some(path) = &self.path {
            persist(path, &values)?;
        }
        self.values = values;
        Ok(())
    }
}

fn persist(path: &Path, values: &BTreeMap<String, String>) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, serde_json::to_vec_pretty(values)?)?;
    std::fs::rename(&tmp, path)?;
    tracing::debug!(path = %path.display(), "settings saved");
    Ok(())
}

fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let tail: String = chars[chars.len().saturating_sub(VISIBLE_KEY_CHARS)..]
        .iter()
        .collect();
    format!("••••••••{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::open(dir.path().join("settings.json")).unwrap();
        assert_eq!(store.api_key(), None);
    }

    #[test]
    fn test_save_then_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let mut store = SettingsStore::open(&path).unwrap();
        store.save_api_key("  AIza-first  ").unwrap();
        store.save_api_key("AIza-second").unwrap();

        let reopened = SettingsStore::open(&path).unwrap();
        assert_eq!(reopened.api_key(), Some("AIza-second"));

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw[API_KEY_STORAGE_KEY], "AIza-second");
    }

    #[test]
    fn test_blank_key_clears() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut store = SettingsStore::open(&path).unwrap();
        store.save_api_key("abc").unwrap();
        store.save_api_key("   ").unwrap();
        assert_eq!(SettingsStore::open(&path).unwrap().api_key(), None);
    }

    #[test]
    fn test_unrelated_entries_survive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"theme": "dark"}"#).unwrap();

        let mut store = SettingsStore::open(&path).unwrap();
        store.save_api_key("k").unwrap();
        store.clear_api_key().unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["theme"], "dark");
        assert!(raw.get(API_KEY_STORAGE_KEY).is_none());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(SettingsStore::open(&path).is_err());
    }

    #[test]
    fn test_failed_write_keeps_previous_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut store = SettingsStore::open(&path).unwrap();
        store.save_api_key("old-key").unwrap();

        // A directory in the way of the temp file makes every write fail.
        std::fs::create_dir(path.with_extension("json.tmp")).unwrap();

        assert!(store.save_api_key("new-key").is_err());
        assert_eq!(store.api_key(), Some("old-key"));
        assert!(store.clear_api_key().is_err());
        assert_eq!(store.api_key(), Some("old-key"));
        assert_eq!(SettingsStore::open(&path).unwrap().api_key(), Some("old-key"));
    }

    #[test]
    fn test_debug_hides_key() {
        let mut store = SettingsStore::in_memory();
        store.save_api_key("AIzaSySECRET9876").unwrap();
        let debug = format!("{store:?}");
        assert!(!debug.contains("SECRET"));
        assert!(debug.contains("9876"));
    }

    #[test]
    fn test_masked_key() {
        let mut store = SettingsStore::in_memory();
        assert_eq!(store.masked_api_key(), None);
        store.save_api_key("AIzaSyABCDWXYZ").unwrap();
        assert_eq!(store.masked_api_key().as_deref(), Some("••••••••WXYZ"));
        store.save_api_key("ab").unwrap();
        assert_eq!(store.masked_api_key().as_deref(), Some("••••••••ab"));
    }
}
