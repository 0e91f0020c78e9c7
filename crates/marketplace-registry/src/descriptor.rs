//! Package descriptors: the TOML document a publisher uploads.
//!
//! ```toml
//! [package]
//! id = "acme.prompts"
//! version = "1.2.0"
//! description = "Prompt pack"
//!
//! [[dependencies]]
//! package = "acme.base"
//! version = "^1.0.0"
//!
//! [content-counts]
//! prompts = 12
//! ```
//!
//! The raw bytes of the document are the package content, so its checksum
//! covers everything the publisher sent.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::catalog::DependencyDeclaration;
use crate::error::{RegistryError, Result};
use crate::identity::PackageId;
use crate::publish::PublishRequest;
use crate::version;

/// A parsed package descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PackageDescriptor {
    pub package: PackageMetadata,
    #[serde(default)]
    pub dependencies: Vec<DependencyEntry>,
    /// Entity kind to count, e.g. `prompts = 12`.
    #[serde(default)]
    pub content_counts: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageMetadata {
    /// `namespace.name`.
    pub id: String,
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Producer signature. Advisory only.
    #[serde(default)]
    pub signature: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyEntry {
    pub package: String,
    /// Version range.
    pub version: String,
}

impl PackageDescriptor {
    /// Parse a descriptor from a TOML string.
    pub fn parse(input: &str) -> Result<Self> {
        let descriptor: PackageDescriptor = toml::from_str(input)?;

        if descriptor.package.id.is_empty() {
            return Err(RegistryError::InvalidRequest {
                detail: "package.id is required".to_string(),
            });
        }
        PackageId::parse(&descriptor.package.id)?;
        version::parse_version(&descriptor.package.version)?;

        Ok(descriptor)
    }

    /// Load a descriptor from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Build a publish request whose content is `raw`, the exact document
    /// text this descriptor was parsed from.
    pub fn into_request(self, raw: &[u8]) -> Result<PublishRequest> {
        let package = PackageId::parse(&self.package.id)?;
        let version = version::parse_version(&self.package.version)?;
        let dependencies = self
            .dependencies
            .into_iter()
            .map(|d| DependencyDeclaration::new(PackageId::parse(&d.package)?, d.version))
            .collect::<Result<Vec<_>>>()?;

        Ok(PublishRequest {
            package,
            version,
            description: self.package.description,
            signature: self.package.signature,
            dependencies,
            content_counts: self.content_counts,
            content: raw.to_vec(),
        })
    }
}

/// Parse a descriptor document and turn it into a publish request.
pub fn request_from_toml(input: &str) -> Result<PublishRequest> {
    PackageDescriptor::parse(input)?.into_request(input.as_bytes())
}
