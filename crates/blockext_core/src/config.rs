//! Loader configuration.
//!
//! # Responsibility
//! - Carry the policy choices the loader workflow leaves to the host.
//! - Load them from TOML with defaults for every field.
//!
//! # Invariants
//! - A config that passed `validate()` has a non-zero fetch timeout and a
//!   supported log level.

use crate::logging::{default_log_level, normalize_level};
use crate::loader::messages::MessageCatalog;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;
const DEFAULT_USER_AGENT: &str = concat!("blockext/", env!("CARGO_PKG_VERSION"));

/// What the library does when the user declines a replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclinePolicy {
    /// The tile stays unselected; no selection callback.
    #[default]
    LeaveUnselected,
    /// The existing extension is selected as if its tile were clicked.
    SelectExisting,
}

/// What happens when a tile is selected while its previous selection is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyPolicy {
    /// The later selection returns `Busy` immediately.
    #[default]
    Ignore,
    /// The later selection waits for the earlier one, then runs.
    Queue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoaderConfig {
    pub locale: String,
    pub decline_policy: DeclinePolicy,
    pub concurrency_policy: ConcurrencyPolicy,
    pub fetch_timeout_secs: u64,
    pub user_agent: String,
    pub log_level: String,
    /// Template overrides: locale -> message id -> template.
    pub messages: BTreeMap<String, BTreeMap<String, String>>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            locale: "en".to_string(),
            decline_policy: DeclinePolicy::default(),
            concurrency_policy: ConcurrencyPolicy::default(),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            log_level: default_log_level().to_string(),
            messages: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl LoaderConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "fetch_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.locale.trim().is_empty() {
            return Err(ConfigError::Invalid("locale must not be empty".to_string()));
        }
        normalize_level(&self.log_level).map_err(ConfigError::Invalid)?;
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Builds the message catalog for the configured locale with overrides applied.
    pub fn message_catalog(&self) -> MessageCatalog {
        let mut catalog = MessageCatalog::new(self.locale.trim());
        for (locale, templates) in &self.messages {
            catalog.merge(locale, templates);
        }
        catalog
    }
}
