//! Depot CLI tool.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use commands::ConfigArgs;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "depot")]
#[command(about = "Resolve and publish build artifacts", long_about = None)]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, env = "DEPOT_JSON_LOGS", global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy artifacts and publish build info
    Publish {
        #[command(flatten)]
        config: ConfigArgs,
        /// Artifact manifest produced by the build
        #[arg(long, short)]
        manifest: PathBuf,
        /// Export build info locally without contacting the server
        #[arg(long)]
        dry_run: bool,
    },
    /// Show what would be deployed
    Plan {
        #[command(flatten)]
        config: ConfigArgs,
        /// Artifact manifest produced by the build
        #[arg(long, short)]
        manifest: PathBuf,
    },
    /// Validate a configuration file
    Validate {
        #[command(flatten)]
        config: ConfigArgs,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    match cli.command {
        Commands::Publish {
            config,
            manifest,
            dry_run,
        } => {
            commands::publish::run(&config, &manifest, dry_run).await?;
        }
        Commands::Plan { config, manifest } => {
            commands::plan::run(&config, &manifest).await?;
        }
        Commands::Validate { config } => {
            commands::validate(&config)?;
        }
    }

    Ok(())
}
