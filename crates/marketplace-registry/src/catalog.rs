//! Catalog records and the read-only accessor the resolver works against.
//!
//! The records mirror what the registry persists: namespaces, packages,
//! immutable package versions with their declared dependencies, and the
//! yank fields, which are the only mutable part of a version.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, Result};
use crate::identity::{ActorId, PackageId};
use crate::integrity::{Checksum, UNSIGNED};
use crate::manifest::LockedManifest;
use crate::version::{self, Version};

/// Who may publish into (and view) a namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protection {
    /// Anyone may publish.
    Public,
    /// Only the owner publishes; anyone may view.
    Protected,
    /// Only the owner publishes or views.
    Private,
}

impl fmt::Display for Protection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Protection::Public => "public",
            Protection::Protected => "protected",
            Protection::Private => "private",
        })
    }
}

impl FromStr for Protection {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "public" => Ok(Protection::Public),
            "protected" => Ok(Protection::Protected),
            "private" => Ok(Protection::Private),
            other => Err(RegistryError::InvalidRequest {
                detail: format!(
                    "unknown protection level '{other}' (expected public, protected or private)"
                ),
            }),
        }
    }
}

/// A claimed namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    pub name: String,
    pub owner: ActorId,
    pub protection: Protection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A package record. Created on first publish, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub id: PackageId,
    pub owner: ActorId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// "Requires `package` at a version matching `range`."
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyDeclaration {
    pub package: PackageId,
    pub range: String,
}

impl DependencyDeclaration {
    /// Build a declaration, rejecting ranges that do not parse.
    pub fn new(package: PackageId, range: impl Into<String>) -> Result<Self> {
        let range = range.into();
        version::parse_range(&range)?;
        Ok(DependencyDeclaration { package, range })
    }
}

/// Whether a version is eligible for new resolutions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionState {
    Published,
    Yanked,
}

impl fmt::Display for VersionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VersionState::Published => "published",
            VersionState::Yanked => "yanked",
        })
    }
}

/// One published version of a package.
///
/// Everything except `yanked_at` and `yank_reason` is fixed at publish time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageVersion {
    pub package: PackageId,
    pub version: Version,
    /// Location of the content, relative to the registry root.
    pub storage_path: String,
    pub checksum: Checksum,
    pub signature: String,
    pub size_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Entity kind to count. Informational only.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub content_counts: BTreeMap<String, u64>,
    #[serde(default)]
    pub dependencies: Vec<DependencyDeclaration>,
    pub manifest: LockedManifest,
    pub published_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yanked_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yank_reason: Option<String>,
}

impl PackageVersion {
    /// A newly published version of `content`.
    ///
    /// Package and version come from the manifest, and the checksum and size
    /// are computed from the bytes, so the record always describes the
    /// content it was built from.
    pub fn new(
        manifest: LockedManifest,
        storage_path: impl Into<String>,
        dependencies: Vec<DependencyDeclaration>,
        content: &[u8],
    ) -> Self {
        PackageVersion {
            package: manifest.package.clone(),
            version: manifest.version.clone(),
            storage_path: storage_path.into(),
            checksum: Checksum::compute(content),
            signature: UNSIGNED.to_string(),
            size_bytes: content.len() as u64,
            description: None,
            content_counts: BTreeMap::new(),
            dependencies,
            manifest,
            published_at: Utc::now(),
            yanked_at: None,
            yank_reason: None,
        }
    }

    /// Producer signature; versions without one stay [`UNSIGNED`].
    pub fn with_signature(mut self, signature: Option<String>) -> Self {
        if let Some(signature) = signature {
            self.signature = signature;
        }
        self
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn with_content_counts(mut self, counts: BTreeMap<String, u64>) -> Self {
        self.content_counts = counts;
        self
    }

    pub fn state(&self) -> VersionState {
        if self.yanked_at.is_some() {
            VersionState::Yanked
        } else {
            VersionState::Published
        }
    }

    pub fn is_yanked(&self) -> bool {
        self.state() == VersionState::Yanked
    }
}

/// Read-only view of committed catalog state.
///
/// Implementations must only expose committed data: a version is visible
/// together with its declarations and manifest, or not at all.
pub trait CatalogAccessor {
    /// Whether any record exists for the package.
    fn package_exists(&self, id: &PackageId) -> Result<bool>;

    /// Every version that is not yanked, in no particular order.
    fn list_available_versions(&self, id: &PackageId) -> Result<Vec<Version>>;

    /// Declared dependencies of one version. Empty for unknown versions.
    fn declared_dependencies(
        &self,
        id: &PackageId,
        version: &Version,
    ) -> Result<Vec<DependencyDeclaration>>;

    /// Recorded checksum of one version, if the version exists.
    fn checksum(&self, id: &PackageId, version: &Version) -> Result<Option<Checksum>>;

    /// The full version record, yanked or not.
    fn version_record(&self, id: &PackageId, version: &Version)
        -> Result<Option<PackageVersion>>;
}
