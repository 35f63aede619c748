//! Terminal front-end for the extension library.
//!
//! # Responsibility
//! - Render catalog tiles as a numbered list and read selections from stdin.
//! - Provide terminal prompt/confirm/alert dialogs to the loader workflow.

use anyhow::{Context, Result};
use async_trait::async_trait;
use blockext_core::{
    init_logging, install_builtins, AlertRequest, BlockClass, Catalog, ConfirmRequest,
    DialogCancelled, DialogService, ExtensionEntry, ExtensionRegistry, HostRuntime,
    HttpExtensionFetcher, LibraryItem, LoadOutcome, LoadedExtension, LoaderCollaborators,
    LoaderConfig, LoaderWorkflow, MessageCatalog, PromptRequest, SelectionSink,
};
use clap::Parser;
use log::info;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

#[derive(Debug, Parser)]
#[command(name = "blockext", version, about = "Browse and load block extensions")]
struct Args {
    /// JSON catalog of library tiles.
    #[arg(long)]
    catalog: PathBuf,
    /// TOML loader configuration.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Absolute directory for rolling log files; logging is off without it.
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

type Input = Arc<Mutex<Lines<BufReader<Stdin>>>>;

struct TerminalDialogs {
    input: Input,
}

impl TerminalDialogs {
    async fn read_line(&self, label: &str) -> Option<String> {
        print!("{label}");
        let _ = std::io::stdout().flush();
        self.input.lock().await.next_line().await.ok().flatten()
    }
}

#[async_trait]
impl DialogService for TerminalDialogs {
    async fn prompt(&self, request: PromptRequest) -> Result<String, DialogCancelled> {
        println!("\n== {} ==\n{}", request.title, request.message);
        self.read_line("> ").await.ok_or(DialogCancelled)
    }

    async fn confirm(&self, request: ConfirmRequest) -> Result<bool, DialogCancelled> {
        println!("\n== {} ==\n{}", request.title, request.message);
        let answer = self.read_line("[y/N] ").await.ok_or(DialogCancelled)?;
        Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
    }

    async fn alert(&self, request: AlertRequest) {
        println!("\n!! {} !!\n{}", request.title, request.message);
    }
}

struct PrintSink;

impl SelectionSink for PrintSink {
    fn on_selected(&self, extension_id: &str) {
        println!("selected category: {extension_id}");
    }
}

/// Tiles without a module URL stand for extensions bundled with the host.
fn bundled_modules(catalog: &Catalog, messages: &MessageCatalog) -> Vec<LoadedExtension> {
    catalog
        .iter()
        .filter(|d| d.extension_url.is_none())
        .filter_map(|d| {
            let id = d.extension_id.as_deref()?;
            let name = messages.display_name(&d.name);
            Some(LoadedExtension::new(
                ExtensionEntry::new(id, name),
                BlockClass::new(()),
            ))
        })
        .collect()
}

fn print_tiles(workflow: &LoaderWorkflow, registry: &ExtensionRegistry) {
    println!();
    for (index, descriptor) in workflow.catalog().iter().enumerate() {
        let name = workflow.messages().display_name(&descriptor.name);
        let status = match LibraryItem::from_descriptor(descriptor) {
            LibraryItem::KnownExtension { disabled: true, .. }
            | LibraryItem::CustomExtensionPrompt { disabled: true } => "disabled",
            LibraryItem::KnownExtension { id, .. } if registry.is_loaded(&id) => "loaded",
            LibraryItem::KnownExtension { .. } => "",
            LibraryItem::CustomExtensionPrompt { .. } => "custom url",
        };
        println!("{:>3}. {name} {status}", index + 1);
    }
    println!("loaded: {}", registry.extension_ids().join(", "));
}

fn describe(outcome: &LoadOutcome) -> String {
    match outcome {
        LoadOutcome::Selected { extension_id, via } => {
            format!("ok: {extension_id} ({via:?})")
        }
        LoadOutcome::Declined {
            extension_id,
            selected_existing,
        } => format!("kept existing {extension_id} (selected: {selected_existing})"),
        LoadOutcome::Cancelled => "cancelled".to_string(),
        LoadOutcome::FetchFailed(err) => format!("failed: {err}"),
        LoadOutcome::NotSelectable => "tile is not selectable".to_string(),
        LoadOutcome::Busy => "tile is still loading".to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => LoaderConfig::load(path)?,
        None => LoaderConfig::default(),
    };
    if let Some(log_dir) = &args.log_dir {
        init_logging(&config.log_level, log_dir)?;
    }
    info!(
        "event=cli_start module=cli status=ok locale={} catalog={}",
        config.locale,
        args.catalog.display()
    );

    let catalog = Arc::new(Catalog::load(&args.catalog)?);
    let fetcher = Arc::new(
        HttpExtensionFetcher::new(config.fetch_timeout(), &config.user_agent)
            .context("building http client")?,
    );
    let registry = Arc::new(ExtensionRegistry::new(fetcher.clone()));
    let input: Input = Arc::new(Mutex::new(BufReader::new(tokio::io::stdin()).lines()));

    let workflow = LoaderWorkflow::new(
        LoaderCollaborators {
            runtime: registry.clone(),
            fetcher,
            dialogs: Arc::new(TerminalDialogs {
                input: input.clone(),
            }),
            sink: Arc::new(PrintSink),
        },
        catalog.clone(),
        &config,
    );
    let installed = install_builtins(&registry, bundled_modules(&catalog, workflow.messages()));
    info!(
        "event=cli_ready module=cli status=ok tiles={} builtins={}",
        catalog.len(),
        installed
    );

    let items = catalog.items();
    loop {
        print_tiles(&workflow, &registry);
        print!("tile number (q to quit)> ");
        std::io::stdout().flush()?;

        let Some(line) = input.lock().await.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line == "q" {
            break;
        }
        let Some(item) = line
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|index| items.get(index))
        else {
            println!("no tile `{line}`");
            continue;
        };

        let report = workflow.select(item).await;
        println!("{}", describe(&report.outcome));
    }
    info!(
        "event=cli_exit module=cli status=ok loaded={}",
        registry.len()
    );
    Ok(())
}
