//! Library tile descriptors and the selection variant derived from them.
//!
//! # Responsibility
//! - Model one catalog tile as shown by the extension library.
//! - Decide once, at the presentation boundary, which loader path a tile takes.
//!
//! # Invariants
//! - A tile with an `extension_id` always maps to `LibraryItem::KnownExtension`.
//! - A tile without one maps to `LibraryItem::CustomExtensionPrompt`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tile name: literal text or a reference into the message catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DisplayName {
    Plain(String),
    #[serde(rename_all = "camelCase")]
    Message { id: String, default_message: String },
}

impl DisplayName {
    pub fn plain(value: impl Into<String>) -> Self {
        Self::Plain(value.into())
    }

    pub fn message(id: impl Into<String>, default_message: impl Into<String>) -> Self {
        Self::Message {
            id: id.into(),
            default_message: default_message.into(),
        }
    }
}

/// One extension library tile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionDescriptor {
    /// Stable identity key; `None` marks the "load custom extension" tile.
    #[serde(default)]
    pub extension_id: Option<String>,
    pub name: DisplayName,
    #[serde(default, rename = "iconURL")]
    pub icon_url: Option<String>,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default, rename = "extensionURL")]
    pub extension_url: Option<String>,
    #[serde(default)]
    pub description: Option<DisplayName>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub internet_connection_required: bool,
    #[serde(default)]
    pub collaborator: Option<String>,
    #[serde(default)]
    pub help_link: Option<String>,
    /// Per-locale message templates contributed by this tile.
    #[serde(default)]
    pub translations: BTreeMap<String, BTreeMap<String, String>>,
}

impl ExtensionDescriptor {
    /// Descriptor for a tile backed by a known extension id.
    pub fn known(extension_id: impl Into<String>, name: DisplayName) -> Self {
        Self {
            extension_id: Some(extension_id.into()),
            ..Self::custom_prompt(name)
        }
    }

    /// Descriptor for the tile that asks the user for an extension URL.
    pub fn custom_prompt(name: DisplayName) -> Self {
        Self {
            extension_id: None,
            name,
            icon_url: None,
            disabled: false,
            extension_url: None,
            description: None,
            featured: false,
            internet_connection_required: false,
            collaborator: None,
            help_link: None,
            translations: BTreeMap::new(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.extension_url = Some(url.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }
}

/// Loader path for one tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryItem {
    KnownExtension {
        id: String,
        /// Declared module URL, or the id itself when none is declared.
        url: String,
        disabled: bool,
    },
    CustomExtensionPrompt {
        disabled: bool,
    },
}

impl LibraryItem {
    pub fn from_descriptor(descriptor: &ExtensionDescriptor) -> Self {
        let id = descriptor
            .extension_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty());
        match id {
            Some(id) => Self::KnownExtension {
                id: id.to_string(),
                url: descriptor
                    .extension_url
                    .clone()
                    .filter(|url| !url.trim().is_empty())
                    .unwrap_or_else(|| id.to_string()),
                disabled: descriptor.disabled,
            },
            None => Self::CustomExtensionPrompt {
                disabled: descriptor.disabled,
            },
        }
    }

    pub fn is_selectable(&self) -> bool {
        match self {
            Self::KnownExtension { disabled, .. } | Self::CustomExtensionPrompt { disabled } => {
                !disabled
            }
        }
    }
}
