//! Loaded extension entry metadata and the opaque block class handle.
//!
//! # Responsibility
//! - Describe what a fetched extension module declares about itself.
//! - Carry the host-owned `blockClass` without interpreting it.
//!
//! # Invariants
//! - `extension_id` is the authoritative identity of a loaded module.
//! - An entry must pass `validate()` before it can reach a registry.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeSet;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use thiserror::Error;

/// Metadata declared by one extension module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionEntry {
    /// Stable extension identifier, e.g. `microbitMore`.
    pub extension_id: String,
    /// Human-readable name declared by the module.
    #[serde(default)]
    pub name: String,
    /// Optional module version string.
    #[serde(default)]
    pub version: Option<String>,
    /// Declared blocks.
    #[serde(default)]
    pub blocks: Vec<BlockDeclaration>,
}

impl ExtensionEntry {
    pub fn new(extension_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            extension_id: extension_id.into(),
            name: name.into(),
            version: None,
            blocks: Vec::new(),
        }
    }

    /// Name for user-facing messages; falls back to the id when unnamed.
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            self.extension_id.as_str()
        } else {
            self.name.as_str()
        }
    }

    /// Validates declaration-level entry invariants.
    pub fn validate(&self) -> Result<(), EntryValidationError> {
        let id = self.extension_id.trim();
        if id.is_empty() {
            return Err(EntryValidationError::EmptyId);
        }
        if id != self.extension_id || !is_valid_extension_id(id) {
            return Err(EntryValidationError::InvalidId(self.extension_id.clone()));
        }

        let mut seen = BTreeSet::<&str>::new();
        for block in &self.blocks {
            let opcode = block.opcode.trim();
            if opcode.is_empty() {
                return Err(EntryValidationError::EmptyOpcode);
            }
            if !seen.insert(opcode) {
                return Err(EntryValidationError::DuplicateOpcode(opcode.to_string()));
            }
        }
        Ok(())
    }
}

/// One block declared by an extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockDeclaration {
    pub opcode: String,
    #[serde(default = "default_block_type")]
    pub block_type: String,
    #[serde(default)]
    pub text: Option<String>,
}

fn default_block_type() -> String {
    "command".to_string()
}

/// Entry validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntryValidationError {
    #[error("extension id must not be empty")]
    EmptyId,
    #[error("extension id is invalid: {0}")]
    InvalidId(String),
    #[error("block opcode must not be empty")]
    EmptyOpcode,
    #[error("block opcode is duplicated: {0}")]
    DuplicateOpcode(String),
}

fn is_valid_extension_id(value: &str) -> bool {
    let mut chars = value.chars();
    let first = match chars.next() {
        Some(c) => c,
        None => return false,
    };
    if !first.is_ascii_alphanumeric() {
        return false;
    }

    let mut prev_separator = false;
    for c in chars {
        if c.is_ascii_alphanumeric() {
            prev_separator = false;
            continue;
        }
        if c == '.' || c == '_' || c == '-' {
            if prev_separator {
                return false;
            }
            prev_separator = true;
            continue;
        }
        return false;
    }
    !prev_separator
}

/// Opaque handle to the code entry point of a loaded extension.
///
/// The host runtime owns the concrete type. Clones share one allocation, so
/// `ptr_eq` answers "is this the same block class".
#[derive(Clone)]
pub struct BlockClass(Arc<dyn Any + Send + Sync>);

impl BlockClass {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    pub fn ptr_eq(&self, other: &BlockClass) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Debug for BlockClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "BlockClass({:p})", Arc::as_ptr(&self.0))
    }
}

/// The `(entry, blockClass)` pair produced by a fetch or a bundled module.
#[derive(Debug, Clone)]
pub struct LoadedExtension {
    pub entry: ExtensionEntry,
    pub block_class: BlockClass,
}

impl LoadedExtension {
    pub fn new(entry: ExtensionEntry, block_class: BlockClass) -> Self {
        Self { entry, block_class }
    }

    pub fn extension_id(&self) -> &str {
        self.entry.extension_id.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::{BlockClass, BlockDeclaration, EntryValidationError, ExtensionEntry};

    fn block(opcode: &str) -> BlockDeclaration {
        BlockDeclaration {
            opcode: opcode.to_string(),
            block_type: "command".to_string(),
            text: None,
        }
    }

    #[test]
    fn validates_plain_entry() {
        let mut entry = ExtensionEntry::new("microbitMore", "micro:bit MORE");
        entry.blocks = vec![block("whenConnected"), block("displayText")];
        assert!(entry.validate().is_ok());
    }

    #[test]
    fn rejects_blank_and_malformed_ids() {
        let err = ExtensionEntry::new("  ", "x").validate().unwrap_err();
        assert_eq!(err, EntryValidationError::EmptyId);

        for bad in ["my ext", ".hidden", "trailing-", "double..dot", " padded"] {
            let err = ExtensionEntry::new(bad, "x").validate().unwrap_err();
            assert!(
                matches!(err, EntryValidationError::InvalidId(_)),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_duplicate_opcodes() {
        let mut entry = ExtensionEntry::new("ext1", "Ext");
        entry.blocks = vec![block("go"), block("go")];
        assert_eq!(
            entry.validate().unwrap_err(),
            EntryValidationError::DuplicateOpcode("go".to_string())
        );
    }

    #[test]
    fn display_name_falls_back_to_id() {
        assert_eq!(ExtensionEntry::new("ext1", "").display_name(), "ext1");
        assert_eq!(ExtensionEntry::new("ext1", "Ext One").display_name(), "Ext One");
    }

    #[test]
    fn deserializes_camel_case_wire_shape() {
        let entry: ExtensionEntry = serde_json::from_str(
            r#"{"extensionId":"ext1","name":"Ext","blocks":[{"opcode":"go","blockType":"reporter"}]}"#,
        )
        .expect("entry json");
        assert_eq!(entry.extension_id, "ext1");
        assert_eq!(entry.blocks[0].block_type, "reporter");
    }

    #[test]
    fn block_class_identity_follows_clones() {
        let original = BlockClass::new(7_u32);
        let clone = original.clone();
        let other = BlockClass::new(7_u32);
        assert!(original.ptr_eq(&clone));
        assert!(!original.ptr_eq(&other));
        assert_eq!(clone.downcast_ref::<u32>(), Some(&7));
        assert!(clone.downcast_ref::<String>().is_none());
    }
}
