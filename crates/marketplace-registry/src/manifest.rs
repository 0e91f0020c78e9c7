//! Locked manifests: the frozen result of a resolution.
//!
//! A manifest is built once, when its version is published, and is never
//! regenerated. The verifier re-checks a stored manifest against the live
//! catalog without mutating anything.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::CatalogAccessor;
use crate::error::{IssueKind, ResolutionIssue, Result};
use crate::identity::PackageId;
use crate::integrity::Checksum;
use crate::version::Version;

/// One concrete, checksummed dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedDependency {
    pub package: PackageId,
    pub version: Version,
    pub checksum: Checksum,
    /// Ids of the packages this version itself declares.
    #[serde(default)]
    pub dependencies: Vec<PackageId>,
}

/// The flat, immutable dependency set of one published version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedManifest {
    pub package: PackageId,
    pub version: Version,
    pub resolved_at: DateTime<Utc>,
    #[serde(default)]
    pub dependencies: Vec<LockedDependency>,
}

impl LockedManifest {
    pub fn new(
        package: PackageId,
        version: Version,
        resolved_at: DateTime<Utc>,
        dependencies: Vec<LockedDependency>,
    ) -> Self {
        LockedManifest {
            package,
            version,
            resolved_at,
            dependencies,
        }
    }

    /// Serialize to the wire/storage JSON shape.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn dependency(&self, id: &PackageId) -> Option<&LockedDependency> {
        self.dependencies.iter().find(|d| &d.package == id)
    }
}

/// Freeze a resolution into a manifest stamped with the current time.
pub fn build(
    package: PackageId,
    version: Version,
    dependencies: Vec<LockedDependency>,
) -> LockedManifest {
    LockedManifest::new(package, version, Utc::now(), dependencies)
}

/// Result of re-checking a manifest against the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    pub valid: bool,
    pub issues: Vec<ResolutionIssue>,
}

/// Re-check every locked dependency.
///
/// Reports a version that no longer exists as `not_found`, a yanked version
/// as `yanked`, and a checksum that no longer matches as `version_conflict`.
pub fn verify(manifest: &LockedManifest, catalog: &dyn CatalogAccessor) -> Result<Verification> {
    let mut issues = Vec::new();

    for locked in &manifest.dependencies {
        let pinned = format!("{}@{}", locked.package, locked.version);

        let Some(record) = catalog.version_record(&locked.package, &locked.version)? else {
            issues.push(ResolutionIssue::new(
                IssueKind::NotFound,
                locked.package.clone(),
                format!("Locked version {pinned} no longer exists"),
            ));
            continue;
        };

        if record.is_yanked() {
            let reason = record.yank_reason.as_deref().unwrap_or("no reason given");
            issues.push(ResolutionIssue::new(
                IssueKind::Yanked,
                locked.package.clone(),
                format!("{pinned} has been yanked: {reason}"),
            ));
            continue;
        }

        if record.checksum != locked.checksum {
            issues.push(ResolutionIssue::new(
                IssueKind::VersionConflict,
                locked.package.clone(),
                format!(
                    "Checksum mismatch for {pinned}. Expected {}, got {}",
                    locked.checksum, record.checksum
                ),
            ));
        }
    }

    for issue in &issues {
        tracing::warn!(
            root = %manifest.package,
            package = %issue.package,
            kind = %issue.kind,
            "manifest verification issue: {}",
            issue.message
        );
    }

    Ok(Verification {
        valid: issues.is_empty(),
        issues,
    })
}
