//! Extension fetcher contract and HTTP implementation.
//!
//! # Responsibility
//! - Turn an untrusted, user-supplied string into a validated `LoadedExtension`.
//! - Report every failure as a typed `FetchError` carrying the offending URL.
//!
//! # Invariants
//! - Fetching never mutates any registry.
//! - Malformed input is rejected before any network I/O.
//! - The returned `entry.extension_id` is authoritative, whatever the URL says.

use crate::extension::entry::{BlockClass, EntryValidationError, ExtensionEntry, LoadedExtension};
use async_trait::async_trait;
use log::{debug, warn};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Retrieves extension modules by URL.
#[async_trait]
pub trait ExtensionFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<LoadedExtension, FetchError>;
}

/// Failed fetch of one URL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to load extension from `{url}`: {cause}")]
pub struct FetchError {
    pub url: String,
    pub cause: FetchFailure,
}

impl FetchError {
    pub fn new(url: impl Into<String>, cause: FetchFailure) -> Self {
        Self {
            url: url.into(),
            cause,
        }
    }
}

/// Why a fetch failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchFailure {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected http status {0}")]
    Status(u16),
    #[error("malformed extension module: {0}")]
    Parse(String),
    #[error("invalid extension entry: {0}")]
    InvalidEntry(#[from] EntryValidationError),
    #[error("module declares extension `{found}`, expected `{expected}`")]
    IdMismatch { expected: String, found: String },
    #[error("extension `{0}` is already loaded")]
    AlreadyLoaded(String),
}

/// JSON document served at an extension URL.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModuleDocument {
    entry: ExtensionEntry,
    #[serde(default)]
    block_class: serde_json::Value,
}

/// Fetches extension modules over HTTP(S).
///
/// The served `blockClass` JSON value becomes the opaque `BlockClass`
/// (downcast to `serde_json::Value`).
pub struct HttpExtensionFetcher {
    client: reqwest::Client,
}

impl HttpExtensionFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ExtensionFetcher for HttpExtensionFetcher {
    async fn fetch(&self, url: &str) -> Result<LoadedExtension, FetchError> {
        let parsed = parse_extension_url(url)?;
        debug!("event=extension_fetch module=fetcher status=start url={}", parsed);

        let response = self
            .client
            .get(parsed.clone())
            .send()
            .await
            .map_err(|err| FetchError::new(url, FetchFailure::Network(err.to_string())))?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                "event=extension_fetch module=fetcher status=error url={} http_status={}",
                parsed,
                status.as_u16()
            );
            return Err(FetchError::new(url, FetchFailure::Status(status.as_u16())));
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| FetchError::new(url, FetchFailure::Network(err.to_string())))?;
        let extension = parse_module_document(url, &body)?;
        debug!(
            "event=extension_fetch module=fetcher status=ok url={} extension_id={}",
            parsed, extension.entry.extension_id
        );
        Ok(extension)
    }
}

/// Normalizes and checks a user-supplied extension URL.
pub fn parse_extension_url(raw: &str) -> Result<Url, FetchError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(FetchError::new(
            raw,
            FetchFailure::InvalidUrl("url must not be empty".to_string()),
        ));
    }
    let parsed = Url::parse(trimmed)
        .map_err(|err| FetchError::new(raw, FetchFailure::InvalidUrl(err.to_string())))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(FetchError::new(
            raw,
            FetchFailure::InvalidUrl(format!("unsupported scheme `{other}`")),
        )),
    }
}

/// Decodes and validates one served module document.
pub fn parse_module_document(url: &str, body: &[u8]) -> Result<LoadedExtension, FetchError> {
    let document: ModuleDocument = serde_json::from_slice(body)
        .map_err(|err| FetchError::new(url, FetchFailure::Parse(err.to_string())))?;
    document
        .entry
        .validate()
        .map_err(|err| FetchError::new(url, err.into()))?;
    Ok(LoadedExtension::new(
        document.entry,
        BlockClass::new(document.block_class),
    ))
}
