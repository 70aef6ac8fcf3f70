//! Config file initialization

use anyhow::bail;
use std::path::PathBuf;
use tether_foundation::{JsonStore, TetherConfig, TETHER_CONFIG_FILE};

/// Write `config` into `store`, refusing to clobber an existing file
pub fn run(store: &JsonStore, config: &TetherConfig, force: bool) -> anyhow::Result<PathBuf> {
    let path = store.file_path(TETHER_CONFIG_FILE);
    if store.exists(TETHER_CONFIG_FILE) && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }

    config.validate()?;
    store.save(TETHER_CONFIG_FILE, config)?;
    tracing::info!("Initialized config at {}", path.display());
    Ok(path)
}
