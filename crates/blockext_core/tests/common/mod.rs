//! Scripted collaborators for loader workflow tests.

#![allow(dead_code)]

use async_trait::async_trait;
use blockext_core::{
    AlertRequest, BlockClass, Catalog, ConfirmRequest, DialogCancelled, DialogService,
    ExtensionEntry, ExtensionFetcher, ExtensionSource, FetchError, FetchFailure, HostRuntime,
    LoadedExtension, LoaderCollaborators, LoaderConfig, LoaderWorkflow, PromptRequest,
    RegisteredExtension, SelectionSink,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

pub fn module(id: &str, name: &str) -> LoadedExtension {
    LoadedExtension::new(
        ExtensionEntry::new(id, name),
        BlockClass::new(format!("{id}-class")),
    )
}

/// Fetcher answering from a url -> result table.
#[derive(Default)]
pub struct ScriptedFetcher {
    responses: Mutex<BTreeMap<String, Result<LoadedExtension, FetchError>>>,
    calls: AtomicUsize,
    gate: Option<Arc<Notify>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn respond(self, url: &str, result: Result<LoadedExtension, FetchError>) -> Self {
        self.responses.lock().insert(url.to_string(), result);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExtensionFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<LoadedExtension, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.responses.lock().get(url).cloned().unwrap_or_else(|| {
            Err(FetchError::new(url, FetchFailure::Status(404)))
        })
    }
}

/// Host runtime over a plain map, counting mutations.
pub struct FakeRuntime {
    entries: Mutex<BTreeMap<String, RegisteredExtension>>,
    fetcher: Arc<ScriptedFetcher>,
    registrations: AtomicUsize,
    url_loads: AtomicUsize,
}

impl FakeRuntime {
    pub fn new(fetcher: Arc<ScriptedFetcher>) -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            fetcher,
            registrations: AtomicUsize::new(0),
            url_loads: AtomicUsize::new(0),
        }
    }

    /// Seeds an entry without counting it as a registration.
    pub fn preload(&self, extension: LoadedExtension) {
        self.entries.lock().insert(
            extension.entry.extension_id.clone(),
            RegisteredExtension {
                entry: extension.entry,
                block_class: extension.block_class,
                source: ExtensionSource::Builtin,
            },
        );
    }

    pub fn registrations(&self) -> usize {
        self.registrations.load(Ordering::SeqCst)
    }

    pub fn url_loads(&self) -> usize {
        self.url_loads.load(Ordering::SeqCst)
    }

    pub fn ids(&self) -> Vec<String> {
        self.entries.lock().keys().cloned().collect()
    }
}

#[async_trait]
impl HostRuntime for FakeRuntime {
    fn is_loaded(&self, extension_id: &str) -> bool {
        self.entries.lock().contains_key(extension_id)
    }

    fn loaded(&self, extension_id: &str) -> Option<RegisteredExtension> {
        self.entries.lock().get(extension_id).cloned()
    }

    fn register(&self, extension: LoadedExtension, source: ExtensionSource) {
        self.registrations.fetch_add(1, Ordering::SeqCst);
        self.entries.lock().insert(
            extension.entry.extension_id.clone(),
            RegisteredExtension {
                entry: extension.entry,
                block_class: extension.block_class,
                source,
            },
        );
    }

    async fn load_by_url(&self, url: &str) -> Result<String, FetchError> {
        self.url_loads.fetch_add(1, Ordering::SeqCst);
        let extension = self.fetcher.fetch(url).await?;
        let id = extension.entry.extension_id.clone();
        if self.is_loaded(&id) {
            return Err(FetchError::new(url, FetchFailure::AlreadyLoaded(id)));
        }
        self.register(extension, ExtensionSource::Url(url.to_string()));
        Ok(id)
    }
}

/// Dialogs answering from queues; an exhausted queue means "cancelled".
#[derive(Default)]
pub struct ScriptedDialogs {
    prompts: Mutex<VecDeque<Result<String, DialogCancelled>>>,
    confirms: Mutex<VecDeque<Result<bool, DialogCancelled>>>,
    pub prompt_requests: Mutex<Vec<PromptRequest>>,
    pub confirm_requests: Mutex<Vec<ConfirmRequest>>,
    pub alerts: Mutex<Vec<AlertRequest>>,
}

impl ScriptedDialogs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prompt_answer(self, answer: Result<&str, DialogCancelled>) -> Self {
        self.prompts
            .lock()
            .push_back(answer.map(|value| value.to_string()));
        self
    }

    pub fn confirm_answer(self, answer: Result<bool, DialogCancelled>) -> Self {
        self.confirms.lock().push_back(answer);
        self
    }
}

#[async_trait]
impl DialogService for ScriptedDialogs {
    async fn prompt(&self, request: PromptRequest) -> Result<String, DialogCancelled> {
        self.prompt_requests.lock().push(request);
        self.prompts
            .lock()
            .pop_front()
            .unwrap_or(Err(DialogCancelled))
    }

    async fn confirm(&self, request: ConfirmRequest) -> Result<bool, DialogCancelled> {
        self.confirm_requests.lock().push(request);
        self.confirms
            .lock()
            .pop_front()
            .unwrap_or(Err(DialogCancelled))
    }

    async fn alert(&self, request: AlertRequest) {
        self.alerts.lock().push(request);
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub selected: Mutex<Vec<String>>,
}

impl SelectionSink for RecordingSink {
    fn on_selected(&self, extension_id: &str) {
        self.selected.lock().push(extension_id.to_string());
    }
}

impl RecordingSink {
    pub fn selected(&self) -> Vec<String> {
        self.selected.lock().clone()
    }
}

pub struct Harness {
    pub runtime: Arc<FakeRuntime>,
    pub fetcher: Arc<ScriptedFetcher>,
    pub dialogs: Arc<ScriptedDialogs>,
    pub sink: Arc<RecordingSink>,
    pub workflow: Arc<LoaderWorkflow>,
}

pub fn harness(
    catalog: Catalog,
    config: LoaderConfig,
    dialogs: ScriptedDialogs,
    fetcher: ScriptedFetcher,
) -> Harness {
    let fetcher = Arc::new(fetcher);
    let runtime = Arc::new(FakeRuntime::new(fetcher.clone()));
    let dialogs = Arc::new(dialogs);
    let sink = Arc::new(RecordingSink::default());
    let workflow = Arc::new(LoaderWorkflow::new(
        LoaderCollaborators {
            runtime: runtime.clone(),
            fetcher: fetcher.clone(),
            dialogs: dialogs.clone(),
            sink: sink.clone(),
        },
        Arc::new(catalog),
        &config,
    ));
    Harness {
        runtime,
        fetcher,
        dialogs,
        sink,
        workflow,
    }
}
