//! Pixfan CLI: run the fan-out dispatcher outside the event trigger, for
//! manual re-triggers and reconciliation.
//!
//! Reads the same environment configuration as the API (RUN_URL,
//! GCLOUD_PROJECT, SERVICE_ACCOUNT, TASK_QUEUE_*). Bucket settings are not
//! needed; the CLI never opens storage.

use anyhow::Context;
use clap::{Parser, Subcommand};
use pixfan_cli::{dispatcher_from_config, init_tracing, parse_event};
use pixfan_core::Config;
use std::io::Read;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pixfan", about = "Pixfan conversion fan-out CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enqueue one conversion task per format of an object-finalized event
    Dispatch {
        /// Event JSON file; read from stdin when omitted
        #[arg(long)]
        event: Option<PathBuf>,
    },
}

fn read_input(path: Option<&PathBuf>) -> anyhow::Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read event from stdin")?;
            Ok(buf)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Dispatch { event } => {
            let upload = parse_event(&read_input(event.as_ref())?)?;
            let config = Config::dispatch_from_env().context("Invalid configuration")?;
            let dispatcher = dispatcher_from_config(&config)?;

            let report = dispatcher.dispatch(&upload).await?;
            for task in &report.tasks {
                println!("{}", task.task_name);
            }
            tracing::info!(
                source = %report.source,
                tasks = report.tasks.len(),
                "Dispatch complete"
            );
        }
    }

    Ok(())
}
