//! Extension loader workflow.
//!
//! # Responsibility
//! - Drive one tile selection through prompt, fetch, collision check and
//!   registration as sequential awaits.
//! - Report the result as a value; nothing here is fatal to the session.
//!
//! # Invariants
//! - Every failure exit ends in `Idle` with the registry as it was before.
//! - The selection sink fires at most once per run and never on failure exits.
//! - Runs sharing a selection key never overlap (see `ConcurrencyPolicy`).
//! - A known tile only ever registers its own id; a module declaring another
//!   id is a failed fetch.
//!
//! ```text
//! Idle -> AwaitingUrl -> Fetching -> [ResolvingCollision] -> Registering -> Done
//!             |              |                |
//!             +-> Idle       +-> Idle         +-> Idle
//! ```

use crate::config::{ConcurrencyPolicy, DeclinePolicy, LoaderConfig};
use crate::extension::catalog::Catalog;
use crate::extension::descriptor::{DisplayName, ExtensionDescriptor, LibraryItem};
use crate::extension::registry::{ExtensionSource, HostRuntime};
use crate::loader::dialog::{AlertRequest, DialogService, PromptRequest};
use crate::loader::fetcher::{ExtensionFetcher, FetchError, FetchFailure};
use crate::loader::messages::{
    MessageCatalog, MSG_CHOOSE_AN_EXTENSION, MSG_EXTENSION_URL, MSG_LOAD_FAILED,
};
use crate::loader::resolver::CollisionResolver;
use crate::logging::sanitize_message;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

const CUSTOM_PROMPT_KEY: &str = "custom-prompt";
const MAX_LOGGED_ERROR_CHARS: usize = 200;

/// Receives the id of the extension the library should show as selected.
pub trait SelectionSink: Send + Sync {
    fn on_selected(&self, extension_id: &str);
}

/// Workflow states, in the order a successful custom load visits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderState {
    Idle,
    AwaitingUrl,
    Fetching,
    ResolvingCollision,
    Registering,
    Done,
}

/// How a successful run reached `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPath {
    /// Known id already in the runtime; nothing fetched.
    AlreadyLoaded,
    /// Known id loaded through the runtime's URL loader.
    LoadedByUrl,
    /// Custom URL registered under a new id.
    Registered,
    /// Custom URL replaced an existing id after confirmation.
    Replaced,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Selected {
        extension_id: String,
        via: SelectionPath,
    },
    /// The user kept the existing extension.
    Declined {
        extension_id: String,
        /// Whether the existing extension was selected instead.
        selected_existing: bool,
    },
    /// URL prompt cancelled or left empty.
    Cancelled,
    FetchFailed(FetchError),
    /// Disabled tile.
    NotSelectable,
    /// Same tile still running under `ConcurrencyPolicy::Ignore`.
    Busy,
}

impl LoadOutcome {
    /// Id handed to the selection sink, if any.
    pub fn selected_id(&self) -> Option<&str> {
        match self {
            Self::Selected { extension_id, .. } => Some(extension_id.as_str()),
            Self::Declined {
                extension_id,
                selected_existing: true,
            } => Some(extension_id.as_str()),
            _ => None,
        }
    }
}

/// Result of one `select` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub outcome: LoadOutcome,
    /// States visited, starting at `Idle`.
    pub transitions: Vec<LoaderState>,
}

impl LoadReport {
    pub fn final_state(&self) -> LoaderState {
        self.transitions
            .last()
            .copied()
            .unwrap_or(LoaderState::Idle)
    }
}

/// External collaborators the workflow is wired to.
pub struct LoaderCollaborators {
    pub runtime: Arc<dyn HostRuntime>,
    pub fetcher: Arc<dyn ExtensionFetcher>,
    pub dialogs: Arc<dyn DialogService>,
    pub sink: Arc<dyn SelectionSink>,
}

pub struct LoaderWorkflow {
    runtime: Arc<dyn HostRuntime>,
    fetcher: Arc<dyn ExtensionFetcher>,
    dialogs: Arc<dyn DialogService>,
    sink: Arc<dyn SelectionSink>,
    resolver: CollisionResolver,
    catalog: Arc<Catalog>,
    messages: Arc<MessageCatalog>,
    decline_policy: DeclinePolicy,
    concurrency_policy: ConcurrencyPolicy,
    in_flight: InFlightSlots,
}

struct Run {
    id: Uuid,
    transitions: Vec<LoaderState>,
}

impl Run {
    fn start() -> Self {
        Self {
            id: Uuid::new_v4(),
            transitions: vec![LoaderState::Idle],
        }
    }

    fn enter(&mut self, state: LoaderState) {
        let from = self
            .transitions
            .last()
            .copied()
            .unwrap_or(LoaderState::Idle);
        debug!(
            "event=loader_transition module=workflow run_id={} from={:?} to={:?}",
            self.id, from, state
        );
        self.transitions.push(state);
    }

    fn finish(self, outcome: LoadOutcome) -> LoadReport {
        LoadReport {
            outcome,
            transitions: self.transitions,
        }
    }
}

/// Per-key run slots; a slot lives only while a run holds or awaits it.
#[derive(Default)]
struct InFlightSlots {
    slots: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

struct InFlightGuard<'a> {
    owner: &'a InFlightSlots,
    key: String,
    slot: Arc<AsyncMutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl InFlightSlots {
    async fn acquire(&self, key: &str, policy: ConcurrencyPolicy) -> Option<InFlightGuard<'_>> {
        let slot = self
            .slots
            .lock()
            .entry(key.to_string())
            .or_default()
            .clone();
        let guard = match policy {
            ConcurrencyPolicy::Ignore => slot.clone().try_lock_owned().ok()?,
            ConcurrencyPolicy::Queue => slot.clone().lock_owned().await,
        };
        Some(InFlightGuard {
            owner: self,
            key: key.to_string(),
            slot,
            guard: Some(guard),
        })
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots.lock().len()
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut slots = self.owner.slots.lock();
        // Map entry plus `self.slot`: nobody else holds or waits on it.
        let idle = slots
            .get(&self.key)
            .is_some_and(|slot| Arc::ptr_eq(slot, &self.slot))
            && Arc::strong_count(&self.slot) == 2;
        if idle {
            slots.remove(&self.key);
        }
    }
}

impl LoaderWorkflow {
    pub fn new(
        collaborators: LoaderCollaborators,
        catalog: Arc<Catalog>,
        config: &LoaderConfig,
    ) -> Self {
        let mut messages = config.message_catalog();
        catalog.apply_translations(&mut messages);
        let messages = Arc::new(messages);
        Self {
            resolver: CollisionResolver::new(collaborators.dialogs.clone(), messages.clone()),
            runtime: collaborators.runtime,
            fetcher: collaborators.fetcher,
            dialogs: collaborators.dialogs,
            sink: collaborators.sink,
            catalog,
            messages,
            decline_policy: config.decline_policy,
            concurrency_policy: config.concurrency_policy,
            in_flight: InFlightSlots::default(),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn messages(&self) -> &MessageCatalog {
        &self.messages
    }

    /// Runs the workflow for one tile selection.
    pub async fn select(&self, item: &LibraryItem) -> LoadReport {
        let mut run = Run::start();
        if !item.is_selectable() {
            debug!(
                "event=loader_select module=workflow run_id={} status=not_selectable",
                run.id
            );
            return run.finish(LoadOutcome::NotSelectable);
        }

        let key = match item {
            LibraryItem::KnownExtension { id, .. } => format!("extension:{id}"),
            LibraryItem::CustomExtensionPrompt { .. } => CUSTOM_PROMPT_KEY.to_string(),
        };
        let Some(_guard) = self.in_flight.acquire(&key, self.concurrency_policy).await else {
            info!(
                "event=loader_select module=workflow run_id={} status=busy key={}",
                run.id, key
            );
            return run.finish(LoadOutcome::Busy);
        };

        let outcome = match item {
            LibraryItem::KnownExtension { id, url, .. } => {
                self.select_known(&mut run, id, url).await
            }
            LibraryItem::CustomExtensionPrompt { .. } => self.select_custom(&mut run).await,
        };

        if let Some(extension_id) = outcome.selected_id() {
            self.sink.on_selected(extension_id);
        }
        info!(
            "event=loader_select module=workflow run_id={} status={} extension_id={}",
            run.id,
            outcome_label(&outcome),
            outcome.selected_id().unwrap_or("-")
        );
        run.finish(outcome)
    }

    async fn select_known(&self, run: &mut Run, id: &str, url: &str) -> LoadOutcome {
        if self.runtime.is_loaded(id) {
            run.enter(LoaderState::Done);
            return LoadOutcome::Selected {
                extension_id: id.to_string(),
                via: SelectionPath::AlreadyLoaded,
            };
        }

        run.enter(LoaderState::Fetching);
        let loaded = match self.fetcher.fetch(url).await {
            Ok(loaded) => loaded,
            Err(err) => return self.fail(run, err).await,
        };
        if loaded.entry.extension_id != id {
            let cause = FetchFailure::IdMismatch {
                expected: id.to_string(),
                found: loaded.entry.extension_id.clone(),
            };
            return self.fail(run, FetchError::new(url, cause)).await;
        }

        // Another path may have registered the id while this run was fetching.
        if self.runtime.is_loaded(id) {
            run.enter(LoaderState::Done);
            return LoadOutcome::Selected {
                extension_id: id.to_string(),
                via: SelectionPath::AlreadyLoaded,
            };
        }
        run.enter(LoaderState::Registering);
        self.runtime.register(loaded, ExtensionSource::Url(url.to_string()));
        run.enter(LoaderState::Done);
        LoadOutcome::Selected {
            extension_id: id.to_string(),
            via: SelectionPath::LoadedByUrl,
        }
    }

    async fn select_custom(&self, run: &mut Run) -> LoadOutcome {
        run.enter(LoaderState::AwaitingUrl);
        let answer = self
            .dialogs
            .prompt(PromptRequest {
                title: self.messages.format(MSG_CHOOSE_AN_EXTENSION, &[]),
                message: self.messages.format(MSG_EXTENSION_URL, &[]),
                initial_value: String::new(),
            })
            .await;
        let url = match answer {
            Ok(value) if !value.trim().is_empty() => value.trim().to_string(),
            _ => {
                run.enter(LoaderState::Idle);
                return LoadOutcome::Cancelled;
            }
        };

        run.enter(LoaderState::Fetching);
        let loaded = match self.fetcher.fetch(&url).await {
            Ok(loaded) => loaded,
            Err(err) => return self.fail(run, err).await,
        };
        let id = loaded.entry.extension_id.clone();

        let replacing = match self.existing_descriptor(&id) {
            Some(existing) => {
                run.enter(LoaderState::ResolvingCollision);
                let confirmed = self
                    .resolver
                    .resolve(&existing, loaded.entry.display_name(), &url)
                    .await
                    .unwrap_or(false);
                if !confirmed {
                    run.enter(LoaderState::Idle);
                    let selected_existing = self.decline_policy == DeclinePolicy::SelectExisting
                        && self.runtime.is_loaded(&id);
                    return LoadOutcome::Declined {
                        extension_id: id,
                        selected_existing,
                    };
                }
                true
            }
            None => false,
        };

        run.enter(LoaderState::Registering);
        self.runtime.register(loaded, ExtensionSource::Url(url));
        run.enter(LoaderState::Done);
        LoadOutcome::Selected {
            extension_id: id,
            via: if replacing {
                SelectionPath::Replaced
            } else {
                SelectionPath::Registered
            },
        }
    }

    /// Catalog tile for `id`, or a descriptor synthesized from the loaded entry.
    fn existing_descriptor(&self, id: &str) -> Option<ExtensionDescriptor> {
        if let Some(descriptor) = self.catalog.find(id) {
            return Some(descriptor.clone());
        }
        self.runtime.loaded(id).map(|registered| {
            ExtensionDescriptor::known(id, DisplayName::plain(registered.entry.display_name()))
        })
    }

    async fn fail(&self, run: &mut Run, err: FetchError) -> LoadOutcome {
        warn!(
            "event=loader_fetch module=workflow run_id={} status=error url={} error={}",
            run.id,
            sanitize_message(&err.url, MAX_LOGGED_ERROR_CHARS),
            sanitize_message(&err.cause.to_string(), MAX_LOGGED_ERROR_CHARS)
        );
        let cause = err.cause.to_string();
        self.dialogs
            .alert(AlertRequest {
                title: self.messages.format(MSG_CHOOSE_AN_EXTENSION, &[]),
                message: self.messages.format(
                    MSG_LOAD_FAILED,
                    &[("url", err.url.as_str()), ("error", cause.as_str())],
                ),
            })
            .await;
        run.enter(LoaderState::Idle);
        LoadOutcome::FetchFailed(err)
    }
}

fn outcome_label(outcome: &LoadOutcome) -> &'static str {
    match outcome {
        LoadOutcome::Selected { .. } => "selected",
        LoadOutcome::Declined { .. } => "declined",
        LoadOutcome::Cancelled => "cancelled",
        LoadOutcome::FetchFailed(_) => "fetch_failed",
        LoadOutcome::NotSelectable => "not_selectable",
        LoadOutcome::Busy => "busy",
    }
}

#[cfg(test)]
mod tests {
    use super::{InFlightSlots, LoadOutcome, LoadReport, LoaderState, SelectionPath};
    use crate::config::ConcurrencyPolicy;
    use crate::loader::fetcher::{FetchError, FetchFailure};
    use std::time::Duration;

    #[test]
    fn selected_id_covers_selection_and_select_existing_only() {
        let selected = LoadOutcome::Selected {
            extension_id: "ext1".to_string(),
            via: SelectionPath::Registered,
        };
        assert_eq!(selected.selected_id(), Some("ext1"));

        let kept = LoadOutcome::Declined {
            extension_id: "ext1".to_string(),
            selected_existing: true,
        };
        assert_eq!(kept.selected_id(), Some("ext1"));

        let declined = LoadOutcome::Declined {
            extension_id: "ext1".to_string(),
            selected_existing: false,
        };
        assert_eq!(declined.selected_id(), None);
        assert_eq!(LoadOutcome::Cancelled.selected_id(), None);
        assert_eq!(
            LoadOutcome::FetchFailed(FetchError::new("u", FetchFailure::Status(500))).selected_id(),
            None
        );
    }

    #[test]
    fn final_state_defaults_to_idle() {
        let report = LoadReport {
            outcome: LoadOutcome::NotSelectable,
            transitions: vec![],
        };
        assert_eq!(report.final_state(), LoaderState::Idle);
    }

    #[tokio::test]
    async fn in_flight_slot_is_released_after_run() {
        let slots = InFlightSlots::default();
        let first = slots
            .acquire("extension:pen", ConcurrencyPolicy::Ignore)
            .await
            .expect("free slot");
        assert!(slots
            .acquire("extension:pen", ConcurrencyPolicy::Ignore)
            .await
            .is_none());
        assert_eq!(slots.len(), 1);

        drop(first);
        assert_eq!(slots.len(), 0);
    }

    #[tokio::test]
    async fn in_flight_slot_survives_while_a_run_waits() {
        let slots = InFlightSlots::default();
        let first = slots
            .acquire("custom-prompt", ConcurrencyPolicy::Queue)
            .await
            .expect("free slot");
        let mut waiting = std::pin::pin!(slots.acquire("custom-prompt", ConcurrencyPolicy::Queue));
        assert!(tokio::time::timeout(Duration::from_millis(20), &mut waiting)
            .await
            .is_err());

        drop(first);
        assert_eq!(slots.len(), 1);

        let second = waiting.await.expect("queued run");
        drop(second);
        assert_eq!(slots.len(), 0);
    }
}
