//! Environment check

use tether_foundation::TetherConfig;
use tether_task::{TmuxConfig, TmuxSessions};

/// Report whether tmux is usable and which launcher would run
pub async fn run(config: &TetherConfig) -> anyhow::Result<()> {
    let tmux = TmuxSessions::new(TmuxConfig::from(config));

    let version = tmux.detect().await;
    match &version {
        Some(version) => println!("✓ {}", version),
        None => println!("✗ tmux not found on PATH"),
    }
    println!("  launcher: {} {}", config.launcher.program, config.launcher.args.join(" "));
    println!("  session prefix: {}", config.session_prefix);

    if version.is_none() {
        anyhow::bail!("tmux is required to run tasks");
    }
    Ok(())
}
