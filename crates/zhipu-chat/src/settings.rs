use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::{PoisonError, RwLock},
};

use anyhow::Context;
use clap::ValueEnum;
use zhipu_ox::{
    SettingsStore,
    config::{API_KEY_SETTING, BASE_URL_SETTING, MODEL_SETTING},
};

/// Settings the user can persist with `config set`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SettingField {
    ApiKey,
    BaseUrl,
    Model,
}

impl SettingField {
    pub fn key(self) -> &'static str {
        match self {
            SettingField::ApiKey => API_KEY_SETTING,
            SettingField::BaseUrl => BASE_URL_SETTING,
            SettingField::Model => MODEL_SETTING,
        }
    }
}

/// Settings kept as a flat JSON object on disk
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: RwLock<BTreeMap<String, String>>,
}

impl JsonFileStore {
    /// `<config dir>/zhipu-chat/settings.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("zhipu-chat").join("settings.json"))
    }

    /// Load the file at `path`; a missing file is an empty store
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text)
                .with_context(|| format!("invalid settings file {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", path.display()));
            }
        };

        log::debug!("loaded {} setting(s) from {}", values.len(), path.display());
        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn set(&self, field: SettingField, value: impl Into<String>) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(field.key().to_string(), value.into());
    }

    pub fn unset(&self, field: SettingField) -> bool {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(field.key())
            .is_some()
    }

    pub fn entries(&self) -> BTreeMap<String, String> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Write the current values back to disk
    pub fn save(&self) -> anyhow::Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        let text = serde_json::to_string_pretty(&self.entries())?;
        fs::write(&self.path, text)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        Ok(())
    }
}

impl SettingsStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

/// Show enough of a key to recognise it
pub fn mask_key(key: &str) -> String {
    let visible: String = key.chars().take(4).collect();
    format!("{visible}****")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("zhipu-chat-test-{}", std::process::id()))
            .join(name)
    }

    #[test]
    fn test_missing_file_is_empty() {
        let store = JsonFileStore::open(scratch_path("missing.json")).unwrap();
        assert!(store.entries().is_empty());
        assert_eq!(store.get(API_KEY_SETTING), None);
    }

    #[test]
    fn test_set_save_reload() {
        let path = scratch_path("roundtrip.json");
        let store = JsonFileStore::open(&path).unwrap();
        store.set(SettingField::ApiKey, "abcd.efgh");
        store.set(SettingField::Model, "glm-4-air");
        store.save().unwrap();

        let reloaded = JsonFileStore::open(&path).unwrap();
        assert_eq!(reloaded.get(API_KEY_SETTING).as_deref(), Some("abcd.efgh"));
        assert_eq!(reloaded.get(MODEL_SETTING).as_deref(), Some("glm-4-air"));

        assert!(reloaded.unset(SettingField::Model));
        assert!(!reloaded.unset(SettingField::BaseUrl));
        reloaded.save().unwrap();
        assert_eq!(JsonFileStore::open(&path).unwrap().get(MODEL_SETTING), None);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let path = scratch_path("broken.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{not json").unwrap();
        assert!(JsonFileStore::open(&path).is_err());
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key("abcdefgh"), "abcd****");
        assert_eq!(mask_key("ab"), "ab****");
    }
}
