//! Registry configuration (`marketplace.toml`).
//!
//! ```toml
//! [registry]
//! root = ".marketplace-registry"
//! default-protection = "protected"
//! reserved-namespaces = ["system", "admin", "api", "www", "marketplace", "registry"]
//! ```
//!
//! Every key is optional.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::catalog::Protection;
use crate::error::Result;

/// Name of the configuration file.
pub const CONFIG_FILE: &str = "marketplace.toml";

/// Registry policy and storage settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RegistryConfig {
    /// Directory holding the local registry.
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Protection given to namespaces claimed implicitly by a first publish.
    #[serde(default = "default_protection")]
    pub default_protection: Protection,
    /// Names nobody may claim, including their dotted sub-namespaces.
    #[serde(default = "default_reserved")]
    pub reserved_namespaces: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    registry: RegistryConfig,
}

fn default_root() -> PathBuf {
    PathBuf::from(".marketplace-registry")
}

fn default_protection() -> Protection {
    Protection::Protected
}

fn default_reserved() -> Vec<String> {
    ["system", "admin", "api", "www", "marketplace", "registry"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig {
            root: default_root(),
            default_protection: default_protection(),
            reserved_namespaces: default_reserved(),
        }
    }
}

impl RegistryConfig {
    /// Parse a configuration document.
    pub fn parse(input: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(input)?;
        Ok(file.registry)
    }

    /// Load a configuration file. A relative `root` is taken relative to the
    /// file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&content)?;
        if config.root.is_relative() {
            if let Some(dir) = path.parent() {
                config.root = dir.join(&config.root);
            }
        }
        Ok(config)
    }

    /// Whether `namespace` is reserved: an exact match or a dotted child of
    /// a reserved name.
    pub fn is_reserved(&self, namespace: &str) -> bool {
        self.reserved_namespaces.iter().any(|r| {
            namespace == r
                || namespace
                    .strip_prefix(r.as_str())
                    .is_some_and(|rest| rest.starts_with('.'))
        })
    }

    /// Serialize back to the file format.
    pub fn to_toml(&self) -> Result<String> {
        let file = ConfigFile {
            registry: self.clone(),
        };
        toml::to_string_pretty(&file).map_err(|e| crate::error::RegistryError::InvalidRequest {
            detail: format!("failed to serialize configuration: {e}"),
        })
    }
}
