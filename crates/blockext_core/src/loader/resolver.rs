//! Collision resolution by interactive confirmation.

use crate::extension::descriptor::ExtensionDescriptor;
use crate::loader::dialog::{ConfirmRequest, DialogCancelled, DialogService};
use crate::loader::messages::{MessageCatalog, MSG_CHOOSE_AN_EXTENSION, MSG_CONFIRM_REPLACING};
use log::info;
use std::sync::Arc;

/// Asks the user whether a fetched extension may replace an existing one.
pub struct CollisionResolver {
    dialogs: Arc<dyn DialogService>,
    messages: Arc<MessageCatalog>,
}

impl CollisionResolver {
    pub fn new(dialogs: Arc<dyn DialogService>, messages: Arc<MessageCatalog>) -> Self {
        Self { dialogs, messages }
    }

    /// Returns whether to replace `existing` with the module loaded from `incoming_url`.
    ///
    /// `incoming_name` is logged only; the message names the existing extension,
    /// which is what the user recognizes from the library.
    pub async fn resolve(
        &self,
        existing: &ExtensionDescriptor,
        incoming_name: &str,
        incoming_url: &str,
    ) -> Result<bool, DialogCancelled> {
        let name = self.messages.display_name(&existing.name);
        let message = self.messages.format(
            MSG_CONFIRM_REPLACING,
            &[("name", name.as_str()), ("url", incoming_url)],
        );
        let answer = self
            .dialogs
            .confirm(ConfirmRequest {
                title: self.messages.format(MSG_CHOOSE_AN_EXTENSION, &[]),
                message,
            })
            .await;
        info!(
            "event=extension_collision module=resolver status={} existing={} incoming={} url={}",
            match answer {
                Ok(true) => "replace",
                Ok(false) => "keep",
                Err(_) => "cancelled",
            },
            existing.extension_id.as_deref().unwrap_or_default(),
            incoming_name,
            incoming_url
        );
        answer
    }
}
