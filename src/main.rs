use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod cmd;

#[derive(Parser)]
#[command(name = "night-cycle")]
#[command(version, about = "Ask a language model to improve repository files and open pull requests")]
pub struct Cli {
    /// Debug-level logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Path to the config file (defaults to ./night-cycle.toml)
    #[arg(long, global = true, env = "NIGHT_CYCLE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one night cycle: sample, enumerate, generate, publish
    Run {
        /// Generate improvements but do not create branches or pull requests
        #[arg(long)]
        dry_run: bool,
    },
    /// List the candidate files the cycle would process
    Scan,
    /// Sample recent commits and print the style profile
    Style {
        /// Number of recent commits to sample
        #[arg(long)]
        commits: Option<usize>,
    },
    /// View or initialize configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the effective configuration (secrets redacted)
    Show,
    /// Write a default night-cycle.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose {
        "night_cycle=debug"
    } else {
        "night_cycle=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; real environment variables still apply.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json_logs);

    match &cli.command {
        Commands::Run { dry_run } => cmd::cmd_run(&cli, *dry_run).await?,
        Commands::Scan => cmd::cmd_scan(&cli).await?,
        Commands::Style { commits } => cmd::cmd_style(&cli, *commits).await?,
        Commands::Config { command } => cmd::cmd_config(&cli, command.clone())?,
    }

    Ok(())
}
