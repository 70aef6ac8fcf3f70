//! Tether CLI - Main entry point

mod check;
mod init;
mod serve;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tether_foundation::{JsonStore, TetherConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Tether - run agent CLIs in detached tmux sessions and track them
#[derive(Parser, Debug)]
#[command(name = "tether")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Config file to use instead of the global/project stores
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Launcher program started in each session
    #[arg(long)]
    launcher: Option<String>,

    /// Extra launcher argument, placed before the instruction (repeatable)
    #[arg(long = "launcher-arg", allow_hyphen_values = true)]
    launcher_args: Vec<String>,

    /// Shared token every request must carry
    #[arg(long)]
    auth_token: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve requests as line-delimited JSON on stdin/stdout (default)
    Serve,
    /// Check that tmux is available
    Check,
    /// Print the effective configuration
    Config,
    /// Write a config file with the given launcher/token settings
    Init {
        /// Write the global store instead of ./.tether
        #[arg(short, long)]
        global: bool,

        /// Overwrite an existing config file
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries responses
    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    // Init must work even when the existing config does not load
    if let Some(Command::Init { global, force }) = &args.command {
        let store = if *global {
            JsonStore::global()?
        } else {
            JsonStore::current_project()?
        };
        let config = apply_overrides(TetherConfig::default(), &args);
        let path = init::run(&store, &config, *force)?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    let config = load_config(&args)?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve::run(config).await,
        Command::Check => check::run(&config).await,
        Command::Config => {
            let mut shown = config;
            if shown.auth_token.is_some() {
                shown.auth_token = Some("<redacted>".to_string());
            }
            println!("{}", serde_json::to_string_pretty(&shown)?);
            Ok(())
        }
        Command::Init { .. } => Ok(()),
    }
}

/// Stores (or `--config`), then command-line overrides
fn load_config(args: &Args) -> anyhow::Result<TetherConfig> {
    let config = match &args.config {
        Some(path) => TetherConfig::load_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => TetherConfig::load().context("Failed to load config")?,
    };

    let config = apply_overrides(config, args);
    config.validate().context("Invalid configuration")?;
    tracing::debug!("Launcher: {} {:?}", config.launcher.program, config.launcher.args);
    Ok(config)
}

fn apply_overrides(mut config: TetherConfig, args: &Args) -> TetherConfig {
    if let Some(program) = &args.launcher {
        config = config.launcher(program.clone());
    }
    if !args.launcher_args.is_empty() {
        config.launcher.args = args.launcher_args.clone();
    }
    if let Some(token) = &args.auth_token {
        config = config.auth_token(token.clone());
    }
    config
}
