//! Layered configuration resolution.
//!
//! The client never owns persistence. It asks a [`ConfigResolver`] for a
//! [`ResolvedConfig`] once per call. The stock resolver, [`LayeredConfig`], walks its
//! layers from highest to lowest priority and takes every field from the first layer
//! that has a usable value, falling back to the built-in defaults.

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, PoisonError, RwLock},
};

use bon::Builder;

use crate::Model;

/// Default chat-completions endpoint
pub const DEFAULT_BASE_URL: &str = "https://open.bigmodel.cn/api/paas/v4/chat/completions";

/// Default model
pub const DEFAULT_MODEL: Model = Model::Glm4;

/// Value shipped in sample `.env` files; never a real key
pub const API_KEY_PLACEHOLDER: &str = "your_api_key_here";

pub const API_KEY_ENV: &str = "ZHIPU_AI_API_KEY";
pub const BASE_URL_ENV: &str = "ZHIPU_AI_BASE_URL";
pub const MODEL_ENV: &str = "ZHIPU_AI_MODEL";

/// Settings keys used by [`StoreSource`]
pub const API_KEY_SETTING: &str = "custom_api_key";
pub const BASE_URL_SETTING: &str = "custom_base_url";
pub const MODEL_SETTING: &str = "custom_model";

/// Configuration for a single completion call
#[derive(Clone, PartialEq, Eq, Builder)]
pub struct ResolvedConfig {
    #[builder(into)]
    pub api_key: Option<String>,

    #[builder(default = DEFAULT_BASE_URL.to_string(), into)]
    pub base_url: String,

    #[builder(default = DEFAULT_MODEL, into)]
    pub model: Model,
}

impl ResolvedConfig {
    /// Defaults with the given key
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self::builder().api_key(api_key).build()
    }

    /// The API key, unless it is missing, blank, or the placeholder value
    #[must_use]
    pub fn valid_api_key(&self) -> Option<&str> {
        self.api_key.as_deref().and_then(usable_api_key)
    }
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

// Keys must not end up in logs
impl fmt::Debug for ResolvedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

/// Strategy the client uses to obtain its configuration for each call
pub trait ConfigResolver: fmt::Debug + Send + Sync {
    fn resolve(&self) -> ResolvedConfig;
}

impl ConfigResolver for ResolvedConfig {
    fn resolve(&self) -> ResolvedConfig {
        self.clone()
    }
}

/// Values one configuration layer provides. `None` defers to lower layers.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
}

impl fmt::Debug for ConfigOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigOverrides")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

/// One layer of configuration
pub trait ConfigSource: fmt::Debug + Send + Sync {
    /// Short label used in logs
    fn name(&self) -> &str;

    fn overrides(&self) -> ConfigOverrides;
}

/// Explicit values, e.g. from command line flags or a build-time constant
impl ConfigSource for ConfigOverrides {
    fn name(&self) -> &str {
        "explicit"
    }

    fn overrides(&self) -> ConfigOverrides {
        self.clone()
    }
}

/// Reads overrides from environment variables
#[derive(Debug, Clone)]
pub struct EnvSource {
    pub api_key_var: String,
    pub base_url_var: String,
    pub model_var: String,
}

impl Default for EnvSource {
    fn default() -> Self {
        Self {
            api_key_var: API_KEY_ENV.to_string(),
            base_url_var: BASE_URL_ENV.to_string(),
            model_var: MODEL_ENV.to_string(),
        }
    }
}

impl ConfigSource for EnvSource {
    fn name(&self) -> &str {
        "environment"
    }

    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            api_key: std::env::var(&self.api_key_var).ok(),
            base_url: std::env::var(&self.base_url_var).ok(),
            model: std::env::var(&self.model_var).ok(),
        }
    }
}

/// Key/value storage for locally persisted settings
pub trait SettingsStore: fmt::Debug + Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

/// In-process [`SettingsStore`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value.into());
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }
}

impl SettingsStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

impl<T: SettingsStore + ?Sized> SettingsStore for Arc<T> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }
}

/// Reads the `custom_*` overrides from a [`SettingsStore`]
#[derive(Debug, Clone)]
pub struct StoreSource<S> {
    store: S,
}

impl<S: SettingsStore> StoreSource<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S: SettingsStore> ConfigSource for StoreSource<S> {
    fn name(&self) -> &str {
        "settings"
    }

    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            api_key: self.store.get(API_KEY_SETTING),
            base_url: self.store.get(BASE_URL_SETTING),
            model: self.store.get(MODEL_SETTING),
        }
    }
}

/// Resolves each field from the highest-priority layer that provides it
#[derive(Debug, Default)]
pub struct LayeredConfig {
    layers: Vec<Box<dyn ConfigSource>>,
}

impl LayeredConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Environment, then the given settings store, then defaults
    pub fn standard<S: SettingsStore + 'static>(store: S) -> Self {
        Self::new()
            .with_layer(EnvSource::default())
            .with_layer(StoreSource::new(store))
    }

    /// Append a layer below the existing ones
    #[must_use]
    pub fn with_layer(mut self, source: impl ConfigSource + 'static) -> Self {
        self.layers.push(Box::new(source));
        self
    }

    /// Insert a layer above the existing ones
    #[must_use]
    pub fn with_top_layer(mut self, source: impl ConfigSource + 'static) -> Self {
        self.layers.insert(0, Box::new(source));
        self
    }

    pub fn layer_names(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(|layer| layer.name())
    }
}

impl ConfigResolver for LayeredConfig {
    fn resolve(&self) -> ResolvedConfig {
        let mut api_key = None;
        let mut base_url = None;
        let mut model = None;

        for layer in &self.layers {
            let overrides = layer.overrides();

            if api_key.is_none() {
                if let Some(key) = overrides.api_key.as_deref().and_then(usable_api_key) {
                    log::debug!("API key taken from {} layer", layer.name());
                    api_key = Some(key.to_string());
                }
            }
            if base_url.is_none() {
                base_url = overrides.base_url.as_deref().and_then(non_blank).map(str::to_string);
            }
            if model.is_none() {
                model = overrides
                    .model
                    .as_deref()
                    .and_then(non_blank)
                    .map(|name| Model::from(name.to_string()));
            }
        }

        ResolvedConfig {
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: model.unwrap_or(DEFAULT_MODEL),
        }
    }
}

fn non_blank(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

fn usable_api_key(key: &str) -> Option<&str> {
    non_blank(key).filter(|key| *key != API_KEY_PLACEHOLDER)
}
