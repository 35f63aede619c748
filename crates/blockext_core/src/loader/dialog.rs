//! Prompt/confirm/alert service contract.
//!
//! The loader depends only on this contract; rendering is the host's concern.
//! Every call is a suspension point the user can cancel by closing the dialog.

use async_trait::async_trait;
use thiserror::Error;

/// The user closed a dialog without choosing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("dialog cancelled by user")]
pub struct DialogCancelled;

/// Text input request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRequest {
    pub title: String,
    pub message: String,
    pub initial_value: String,
}

/// Yes/no request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmRequest {
    pub title: String,
    pub message: String,
}

/// Notification with a single acknowledge action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertRequest {
    pub title: String,
    pub message: String,
}

#[async_trait]
pub trait DialogService: Send + Sync {
    /// Resolves with the entered text; `Err` when the user cancels.
    async fn prompt(&self, request: PromptRequest) -> Result<String, DialogCancelled>;

    /// Resolves with the user's answer; `Err` when the dialog is dismissed.
    async fn confirm(&self, request: ConfirmRequest) -> Result<bool, DialogCancelled>;

    async fn alert(&self, request: AlertRequest);
}
