use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fera_common::Priority;
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "fera")]
#[command(version, about = "FERA CRM: leads pipeline, kanban, tasks and reports")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the CRM HTTP and WebSocket server
    Serve {
        /// Port to listen on (overrides fera.toml and FERA_PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// SQLite database path (overrides fera.toml and FERA_DB_PATH)
        #[arg(long)]
        db_path: Option<PathBuf>,

        /// Bind on all interfaces and allow cross-origin requests
        #[arg(long)]
        dev: bool,
    },
    /// Create the .fera directory, default config and database
    Init,
    /// Load the demo account, roster, leads and tasks
    Seed {
        /// Password for the demo account when it is created (default: demo password)
        #[arg(long)]
        password: Option<String>,
    },
    /// Compute a lead score without touching the store
    Score {
        /// Deal value
        #[arg(long, default_value = "0")]
        value: f64,

        /// low, medium or high
        #[arg(long, default_value = "medium")]
        priority: Priority,

        /// Number of logged activities
        #[arg(long, default_value = "0")]
        activities: usize,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the current configuration
    Show,
    /// Validate fera.toml and report warnings
    Validate,
    /// Write a default fera.toml
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    // Missing .env is fine.
    let _ = dotenvy::from_path(project_dir.join(".env"));

    match &cli.command {
        Commands::Serve { port, db_path, dev } => {
            cmd::cmd_serve(&project_dir, cli.verbose, *port, db_path.clone(), *dev).await?
        }
        Commands::Init => cmd::cmd_init(&project_dir, cli.verbose)?,
        Commands::Seed { password } => cmd::cmd_seed(&project_dir, cli.verbose, password.as_deref())?,
        Commands::Score {
            value,
            priority,
            activities,
        } => cmd::cmd_score(*value, *priority, *activities),
        Commands::Config { command } => cmd::cmd_config(&project_dir, command.clone())?,
    }

    Ok(())
}
