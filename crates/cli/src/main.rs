use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use taskgraph_core::ExecutionMode;

mod commands;
mod config;

use config::CliConfig;

#[derive(Parser, Debug)]
#[command(name = "taskgraph")]
#[command(about = "Run and inspect declarative execution graphs", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "taskgraph.toml", env = "TASKGRAPH_CONFIG")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute a graph and print the final storage
    Run {
        /// Serialized graph (JSON list of node records)
        graph: PathBuf,

        /// Initial storage (JSON object)
        #[arg(short, long)]
        storage: Option<PathBuf>,

        /// Node to start from (defaults to the lowest index)
        #[arg(long)]
        start: Option<i64>,

        /// Run tasks cooperatively instead of blocking
        #[arg(long = "async")]
        cooperative: bool,

        /// Abort after this many nodes
        #[arg(long)]
        max_steps: Option<u64>,
    },

    /// Load a graph and report on its structure
    Validate {
        graph: PathBuf,
    },

    /// Load a graph and print its canonical, index-sorted form
    Normalize {
        graph: PathBuf,

        /// Node to dump from (defaults to the lowest index)
        #[arg(long)]
        start: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = CliConfig::load(&args.config)?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.filter.clone().into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if args.config.exists() {
        tracing::info!("Using configuration file {}", args.config.display());
    } else {
        tracing::info!("Configuration file not found, using defaults");
    }

    match args.command {
        Command::Run {
            graph,
            storage,
            start,
            cooperative,
            max_steps,
        } => {
            let mode = if cooperative {
                ExecutionMode::Cooperative
            } else {
                config.execution.mode
            };
            let mut options = config.execution_options();
            if max_steps.is_some() {
                options.max_steps = max_steps;
            }

            let output = commands::run(&graph, storage.as_deref(), start, mode, options).await?;
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Validate { graph } => {
            let output = commands::validate(&graph)?;
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Normalize { graph, start } => {
            let records = commands::normalize(&graph, start)?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
    }

    Ok(())
}
