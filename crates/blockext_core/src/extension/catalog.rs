//! Built-in extension catalog and startup pre-install.
//!
//! # Responsibility
//! - Hold the ordered, read-only list of library tiles.
//! - Register locally bundled extension modules when a session starts.
//!
//! # Invariants
//! - Catalog ids are trimmed and unique; the custom prompt tile has no id.
//! - Tile order is preserved from the source document.

use crate::extension::descriptor::{ExtensionDescriptor, LibraryItem};
use crate::extension::entry::LoadedExtension;
use crate::extension::registry::ExtensionRegistry;
use crate::loader::messages::MessageCatalog;
use log::{info, warn};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("catalog lists extension id twice: {0}")]
    DuplicateId(String),
}

/// Ordered list of built-in library tiles.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    descriptors: Vec<ExtensionDescriptor>,
}

impl Catalog {
    /// Builds a catalog; ids are trimmed and a blank id marks the custom prompt tile.
    pub fn new(mut descriptors: Vec<ExtensionDescriptor>) -> Result<Self, CatalogError> {
        for descriptor in &mut descriptors {
            descriptor.extension_id = descriptor
                .extension_id
                .take()
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty());
        }
        let mut seen = BTreeSet::new();
        for id in descriptors.iter().filter_map(|d| d.extension_id.as_deref()) {
            if !seen.insert(id) {
                return Err(CatalogError::DuplicateId(id.to_string()));
            }
        }
        Ok(Self { descriptors })
    }

    pub fn from_json_str(raw: &str) -> Result<Self, CatalogError> {
        Self::new(serde_json::from_str(raw)?)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_json_str(&raw)?;
        info!(
            "event=catalog_load module=catalog status=ok path={} tiles={}",
            path.display(),
            catalog.len()
        );
        Ok(catalog)
    }

    /// Finds the tile declaring `extension_id`.
    pub fn find(&self, extension_id: &str) -> Option<&ExtensionDescriptor> {
        self.descriptors
            .iter()
            .find(|d| d.extension_id.as_deref() == Some(extension_id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExtensionDescriptor> {
        self.descriptors.iter()
    }

    /// Loader path for every tile, in catalog order.
    pub fn items(&self) -> Vec<LibraryItem> {
        self.descriptors
            .iter()
            .map(LibraryItem::from_descriptor)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Merges every tile's per-locale templates into `messages`.
    pub fn apply_translations(&self, messages: &mut MessageCatalog) {
        for descriptor in &self.descriptors {
            for (locale, templates) in &descriptor.translations {
                messages.merge(locale, templates);
            }
        }
    }
}

/// Registers bundled extension modules as built-ins.
///
/// Invalid or duplicate modules are skipped with a warning so one broken
/// bundle cannot keep the session from starting. Returns the installed count.
pub fn install_builtins(registry: &ExtensionRegistry, modules: Vec<LoadedExtension>) -> usize {
    let mut installed = 0;
    for module in modules {
        let id = module.entry.extension_id.clone();
        match registry.register_builtin(module) {
            Ok(()) => installed += 1,
            Err(err) => warn!(
                "event=builtin_install module=catalog status=skipped extension_id={} error={}",
                id, err
            ),
        }
    }
    info!(
        "event=builtin_install module=catalog status=ok installed={}",
        installed
    );
    installed
}
