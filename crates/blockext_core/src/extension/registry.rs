//! Extension registry and host runtime contract.
//!
//! # Responsibility
//! - Hold the session's loaded `(entry, blockClass)` pairs keyed by id.
//! - Expose the host runtime contract the loader workflow depends on.
//!
//! # Invariants
//! - At most one entry per extension id.
//! - Registration is one write-locked insert; readers never see a partial entry.
//! - Entries are only superseded by an explicit `register`, never removed.
//! - `load_by_url` never supersedes; an already loaded id is rejected.

use crate::extension::entry::{BlockClass, EntryValidationError, ExtensionEntry, LoadedExtension};
use crate::loader::fetcher::{ExtensionFetcher, FetchError, FetchFailure};
use async_trait::async_trait;
use log::{info, warn};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Where a registered extension came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionSource {
    /// Bundled with the host and installed at startup.
    Builtin,
    /// Loaded from a URL during the session.
    Url(String),
}

/// Registered extension snapshot.
#[derive(Debug, Clone)]
pub struct RegisteredExtension {
    pub entry: ExtensionEntry,
    pub block_class: BlockClass,
    pub source: ExtensionSource,
}

/// Contract between the loader workflow and the running host environment.
#[async_trait]
pub trait HostRuntime: Send + Sync {
    fn is_loaded(&self, extension_id: &str) -> bool;

    /// Snapshot of one loaded extension.
    fn loaded(&self, extension_id: &str) -> Option<RegisteredExtension>;

    /// Inserts or atomically supersedes the entry for `extension.entry.extension_id`.
    fn register(&self, extension: LoadedExtension, source: ExtensionSource);

    /// Fetches and registers the module at `url`; returns the registered id.
    ///
    /// Fails with `FetchFailure::AlreadyLoaded` instead of replacing an entry.
    async fn load_by_url(&self, url: &str) -> Result<String, FetchError>;
}

/// Builtin registration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("invalid extension entry: {0}")]
    InvalidEntry(#[from] EntryValidationError),
    #[error("extension id already registered: {0}")]
    DuplicateExtensionId(String),
}

/// In-memory registry backing the default host runtime.
pub struct ExtensionRegistry {
    entries: RwLock<BTreeMap<String, RegisteredExtension>>,
    fetcher: Arc<dyn ExtensionFetcher>,
}

impl ExtensionRegistry {
    pub fn new(fetcher: Arc<dyn ExtensionFetcher>) -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            fetcher,
        }
    }

    /// Registers one bundled extension; duplicates are rejected.
    pub fn register_builtin(&self, extension: LoadedExtension) -> Result<(), RegistryError> {
        extension.entry.validate()?;
        let mut entries = self.entries.write();
        let id = extension.entry.extension_id.clone();
        if entries.contains_key(id.as_str()) {
            return Err(RegistryError::DuplicateExtensionId(id));
        }
        entries.insert(
            id,
            RegisteredExtension {
                entry: extension.entry,
                block_class: extension.block_class,
                source: ExtensionSource::Builtin,
            },
        );
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Returns sorted loaded ids.
    pub fn extension_ids(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }
}

#[async_trait]
impl HostRuntime for ExtensionRegistry {
    fn is_loaded(&self, extension_id: &str) -> bool {
        self.entries.read().contains_key(extension_id)
    }

    fn loaded(&self, extension_id: &str) -> Option<RegisteredExtension> {
        self.entries.read().get(extension_id).cloned()
    }

    fn register(&self, extension: LoadedExtension, source: ExtensionSource) {
        let id = extension.entry.extension_id.clone();
        let previous = self.entries.write().insert(
            id.clone(),
            RegisteredExtension {
                entry: extension.entry,
                block_class: extension.block_class,
                source,
            },
        );
        info!(
            "event=extension_register module=registry status=ok extension_id={} replaced={}",
            id,
            previous.is_some()
        );
    }

    async fn load_by_url(&self, url: &str) -> Result<String, FetchError> {
        let extension = self.fetcher.fetch(url).await?;
        let id = extension.entry.extension_id.clone();
        let mut entries = self.entries.write();
        if entries.contains_key(id.as_str()) {
            warn!(
                "event=extension_load_by_url module=registry status=rejected extension_id={} reason=already_loaded",
                id
            );
            return Err(FetchError::new(url, FetchFailure::AlreadyLoaded(id)));
        }
        entries.insert(
            id.clone(),
            RegisteredExtension {
                entry: extension.entry,
                block_class: extension.block_class,
                source: ExtensionSource::Url(url.to_string()),
            },
        );
        info!(
            "event=extension_register module=registry status=ok extension_id={} replaced=false",
            id
        );
        Ok(id)
    }
}
