//! Extension data model, catalog and registry.

pub mod catalog;
pub mod descriptor;
pub mod entry;
pub mod registry;
