//! `marketplace.toml` discovery and registry setup.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use marketplace_registry::config::CONFIG_FILE;
use marketplace_registry::{LocalRegistry, RegistryConfig};

/// Search upward from `start_dir` for a `marketplace.toml` file, parse and
/// return it along with the directory it was found in.
pub fn find_and_load(start_dir: &Path) -> Result<Option<(RegistryConfig, PathBuf)>> {
    let mut dir = start_dir.to_path_buf();
    loop {
        let candidate = dir.join(CONFIG_FILE);
        if candidate.is_file() {
            let config = RegistryConfig::load(&candidate)
                .with_context(|| format!("loading {}", candidate.display()))?;
            return Ok(Some((config, dir)));
        }
        if !dir.pop() {
            break;
        }
    }
    Ok(None)
}

/// The configuration and registry a command runs against.
pub struct Session {
    pub config: RegistryConfig,
    pub registry: LocalRegistry,
}

/// Build a session.
///
/// An explicit `--config` file wins over discovery; without either the
/// defaults apply with `root` relative to `cwd`. `--registry` overrides the
/// configured root.
pub fn open(cwd: &Path, config_path: Option<&Path>, registry: Option<&Path>) -> Result<Session> {
    let mut config = match config_path {
        Some(path) => RegistryConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => match find_and_load(cwd)? {
            Some((config, _)) => config,
            None => {
                let mut config = RegistryConfig::default();
                config.root = cwd.join(&config.root);
                config
            }
        },
    };

    if let Some(root) = registry {
        config.root = cwd.join(root);
    }

    tracing::debug!(root = %config.root.display(), "using registry");
    let registry = LocalRegistry::new(config.root.clone());
    Ok(Session { config, registry })
}

/// Default `marketplace.toml` written by `marketplace init`.
pub fn template() -> Result<String> {
    RegistryConfig::default()
        .to_toml()
        .context("rendering default configuration")
}
