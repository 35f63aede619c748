//! Core of the extension library loader.
//! This crate is the single source of truth for loader and registry invariants.

pub mod config;
pub mod extension;
pub mod loader;
pub mod logging;

pub use config::{ConcurrencyPolicy, ConfigError, DeclinePolicy, LoaderConfig};
pub use extension::catalog::{install_builtins, Catalog, CatalogError};
pub use extension::descriptor::{DisplayName, ExtensionDescriptor, LibraryItem};
pub use extension::entry::{
    BlockClass, BlockDeclaration, EntryValidationError, ExtensionEntry, LoadedExtension,
};
pub use extension::registry::{
    ExtensionRegistry, ExtensionSource, HostRuntime, RegisteredExtension, RegistryError,
};
pub use loader::dialog::{
    AlertRequest, ConfirmRequest, DialogCancelled, DialogService, PromptRequest,
};
pub use loader::fetcher::{ExtensionFetcher, FetchError, FetchFailure, HttpExtensionFetcher};
pub use loader::messages::MessageCatalog;
pub use loader::resolver::CollisionResolver;
pub use loader::workflow::{
    LoadOutcome, LoadReport, LoaderCollaborators, LoaderState, LoaderWorkflow, SelectionPath,
    SelectionSink,
};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
