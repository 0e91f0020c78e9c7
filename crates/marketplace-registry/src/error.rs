//! Registry error types.
//!
//! Two shapes live here. [`RegistryError`] is the `Result` error for every
//! registry operation: storage failures, malformed requests and rejected
//! state transitions. [`ResolutionIssue`] is *data*: the resolver and the
//! manifest verifier collect issues into lists so a publisher sees every
//! problem in one pass. Issues only cross into [`RegistryError`] wrapped as
//! [`RegistryError::ResolutionFailed`].

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::catalog::VersionState;
use crate::identity::PackageId;

/// Errors that can occur during registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Package not found in the catalog.
    #[error("package not found: {id}")]
    PackageNotFound { id: String },

    /// Requested version not found.
    #[error("version {version} not found for package '{id}'")]
    VersionNotFound { id: String, version: String },

    /// Namespace has never been claimed.
    #[error("namespace not found: {name}")]
    NamespaceNotFound { name: String },

    /// Malformed `namespace.name` identifier.
    #[error("invalid package id '{id}': {detail}")]
    InvalidPackageId { id: String, detail: String },

    /// Malformed namespace name.
    #[error("invalid namespace '{name}': {detail}")]
    InvalidNamespace { name: String, detail: String },

    /// A version range that does not parse.
    #[error("invalid version range '{range}': {detail}")]
    InvalidRange { range: String, detail: String },

    /// Namespace is reserved and cannot be claimed.
    #[error("namespace '{name}' is reserved")]
    ReservedNamespace { name: String },

    /// Namespace already has an owner.
    #[error("namespace '{name}' is already claimed")]
    NamespaceTaken { name: String },

    /// The namespace gate refused a publish.
    #[error(
        "'{actor}' cannot publish to namespace '{namespace}': it is protected or private \
         and owned by someone else, or it is reserved"
    )]
    Unauthorized { actor: String, namespace: String },

    /// Actor is not the owner of a package or namespace.
    #[error("'{actor}' does not own '{target}'")]
    NotOwner { actor: String, target: String },

    /// Version already exists.
    #[error("package '{id}@{version}' already published")]
    AlreadyPublished { id: String, version: String },

    /// Yank/unyank attempted from the wrong state.
    #[error("cannot {action} '{id}@{version}': version is currently {current}")]
    YankState {
        id: String,
        version: String,
        action: &'static str,
        current: VersionState,
    },

    /// Dependency resolution produced one or more issues.
    #[error("dependency resolution failed: {}", summarize(.issues))]
    ResolutionFailed { issues: Vec<ResolutionIssue> },

    /// Publish request failed validation.
    #[error("invalid publish request: {detail}")]
    InvalidRequest { detail: String },

    /// A stored record could not be interpreted.
    #[error("corrupt registry record at {path}: {detail}")]
    CorruptRecord { path: PathBuf, detail: String },

    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Semver parse error.
    #[error("invalid version: {0}")]
    SemverVersion(#[from] semver::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn summarize(issues: &[ResolutionIssue]) -> String {
    issues
        .iter()
        .map(|i| i.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Classification of a resolution or verification problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Package or version absent, or nothing satisfies the constraint.
    NotFound,
    /// Incompatible simultaneous constraints, or checksum drift.
    VersionConflict,
    /// A constraint chain that leads back to itself.
    CircularDependency,
    /// The version has been withdrawn from eligibility.
    Yanked,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            IssueKind::NotFound => "not_found",
            IssueKind::VersionConflict => "version_conflict",
            IssueKind::CircularDependency => "circular_dependency",
            IssueKind::Yanked => "yanked",
        };
        f.write_str(label)
    }
}

/// One problem found while resolving or verifying dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionIssue {
    /// Issue classification.
    #[serde(rename = "type")]
    pub kind: IssueKind,
    /// The package the issue is about.
    pub package: PackageId,
    /// The constraint being resolved, when there was one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<String>,
    /// Human-readable description.
    pub message: String,
    /// Full dependency path, for circular dependencies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<PackageId>>,
}

impl ResolutionIssue {
    pub fn new(kind: IssueKind, package: PackageId, message: impl Into<String>) -> Self {
        ResolutionIssue {
            kind,
            package,
            constraint: None,
            message: message.into(),
            path: None,
        }
    }

    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraint = Some(constraint.into());
        self
    }

    pub fn with_path(mut self, path: Vec<PackageId>) -> Self {
        self.path = Some(path);
        self
    }
}

impl fmt::Display for ResolutionIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}
