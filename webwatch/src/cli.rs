///
/// This module implements the full CLI interface for webwatch: command
/// parsing, argument validation and the async entrypoint used both by
/// `main` and by integration tests.
///
/// All engine logic (record model, diff, reconciliation, dispatch) lives in
/// the `webwatch-core` crate. This module is strictly CLI glue: it loads the
/// config, reads the inbound request from a file, wires up the concrete
/// store and notifier clients and prints the response envelope.
///
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use webwatch_core::dispatch::{self, RunResponse, WatchRequest};
use webwatch_core::reconcile::WritePolicy;
use webwatch_core::sources::SourceRegistry;

use crate::load_config::load_config;
use crate::notify_http::HttpNotifier;
use crate::store::DocumentStore;

/// CLI for webwatch: monitor web sources, diff snapshots and reconcile the
/// document store.
#[derive(Parser)]
#[clap(
    name = "webwatch",
    version,
    about = "Diff a newly captured source snapshot against the persisted one, report the delta and reconcile storage"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one watch invocation from a request file
    Run {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Path to the JSON watch request (the inbound trigger body)
        #[clap(long)]
        request: PathBuf,
    },
    /// List the registered source ids
    Sources,
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run { config, request } => {
            let config = load_config(config)?;
            let raw = std::fs::read_to_string(&request).map_err(|e| {
                anyhow::anyhow!("Failed to read request file {:?}: {}", request, e)
            })?;
            let watch_request: WatchRequest = serde_json::from_str(&raw)
                .map_err(|e| anyhow::anyhow!("Failed to parse watch request JSON: {e}"))?;
            tracing::info!(
                command = "run",
                source_id = %watch_request.source_id,
                "Starting watch invocation"
            );

            let store = DocumentStore::new_from_env(&config.storage)?;
            let notifier = HttpNotifier::new(&config.notify);
            let registry = SourceRegistry::with_default_sources();
            let writes = WritePolicy::default();

            let result =
                dispatch::run(&registry, &store, &notifier, &writes, &watch_request).await;
            let failure = result.as_ref().err().map(|e| e.to_string());
            let response = RunResponse::from(result);
            println!("{}", serde_json::to_string_pretty(&response)?);

            match failure {
                None => {
                    tracing::info!(command = "run", "Watch invocation complete");
                    Ok(())
                }
                Some(message) => {
                    tracing::error!(command = "run", error = %message, "Watch invocation failed");
                    Err(anyhow::Error::msg(message))
                }
            }
        }
        Commands::Sources => {
            let registry = SourceRegistry::with_default_sources();
            for source_id in registry.source_ids() {
                println!("{source_id}");
            }
            Ok(())
        }
    }
}
