//! `orchestrator` CLI entry-point.
//!
//! Available sub-commands:
//! - `validate` — check a workflow definition JSON file and print its step order.
//! - `order`    — print the startup order of a component manifest.

mod manifest;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "orchestrator",
    about = "Component lifecycle orchestrator and workflow engine",
    version
)]
struct Cli {
    /// Log filter, e.g. `info` or `engine=debug`.
    #[arg(long, env = "RUST_LOG", default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a workflow definition JSON file.
    Validate {
        /// Path to the workflow JSON file.
        path: PathBuf,
    },
    /// Compute the startup order of a component manifest JSON file.
    Order {
        /// Path to the manifest (a list of `{name, dependencies}`).
        path: PathBuf,
    },
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match cli.command {
        Command::Validate { path } => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("cannot read file {}", path.display()))?;
            let workflow: engine::WorkflowDefinition =
                serde_json::from_str(&content).context("invalid workflow JSON")?;
            debug!("loaded workflow '{}' with {} steps", workflow.id, workflow.steps.len());

            match engine::validate_workflow(&workflow) {
                Ok(order) => {
                    println!("✅ Workflow is valid. Execution order: {order:?}");
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    eprintln!("❌ Validation failed: {e}");
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Command::Order { path } => {
            let specs = manifest::load(&path)?;
            info!("loaded {} components from {}", specs.len(), path.display());

            match manifest::registry(specs).and_then(|r| r.get_startup_order().map_err(Into::into)) {
                Ok(order) => {
                    println!("✅ Startup order: {order:?}");
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    eprintln!("❌ Invalid manifest: {e}");
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}
