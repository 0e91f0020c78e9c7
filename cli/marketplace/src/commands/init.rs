//! `marketplace init`: write a default `marketplace.toml`.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use marketplace_registry::config::CONFIG_FILE;

use crate::config;

/// Create `marketplace.toml` and the registry directory in `dir`.
pub fn run(dir: &Path) -> Result<()> {
    let config_path = dir.join(CONFIG_FILE);
    if config_path.exists() {
        bail!("{} already exists", config_path.display());
    }

    fs::write(&config_path, config::template()?)
        .with_context(|| format!("writing {}", config_path.display()))?;

    let session = config::open(dir, Some(&config_path), None)?;
    fs::create_dir_all(&session.config.root)
        .with_context(|| format!("creating {}", session.config.root.display()))?;

    println!("Created {}", config_path.display());
    println!("  registry root: {}", session.config.root.display());
    Ok(())
}
