//! Registry storage: the write-side trait and the local filesystem backend.
//!
//! The `RegistryStore` trait abstracts over storage implementations. The
//! `LocalRegistry` keeps everything under one directory and gets its
//! atomicity from the filesystem: a version is staged privately and made
//! visible with a single `rename`, and records that must be created at most
//! once are linked into place with `hard_link`, which fails if the target
//! exists.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::{
    CatalogAccessor, DependencyDeclaration, Namespace, Package, PackageVersion, VersionState,
};
use crate::error::{RegistryError, Result};
use crate::identity::PackageId;
use crate::integrity::{check_content, Checksum, ContentCheck};
use crate::version::{self, Version};

/// Storage operations the publish flow, the namespace gate and the lifecycle
/// manager are built on. Reads come from [`CatalogAccessor`].
pub trait RegistryStore: CatalogAccessor + Send + Sync {
    /// Look up a namespace.
    fn namespace(&self, name: &str) -> Result<Option<Namespace>>;

    /// Create a namespace. Fails with `NamespaceTaken` if it already exists.
    fn create_namespace(&self, namespace: &Namespace) -> Result<()>;

    /// Replace an existing namespace record.
    fn update_namespace(&self, namespace: &Namespace) -> Result<()>;

    /// Look up a package record.
    fn package(&self, id: &PackageId) -> Result<Option<Package>>;

    /// Create a package record unless one exists. Returns the record that is
    /// stored afterwards, which is the earlier one if another writer won.
    fn create_package(&self, package: &Package) -> Result<Package>;

    /// Every version of a package, yanked or not, oldest first.
    fn list_versions(&self, id: &PackageId) -> Result<Vec<PackageVersion>>;

    /// Atomically make a version, its declarations, manifest and content
    /// visible. Fails with `AlreadyPublished` if the version exists.
    fn commit_version(&self, record: &PackageVersion, content: &[u8]) -> Result<()>;

    /// Move a version to `target` if it is currently in the other state.
    ///
    /// Check and write happen as one step, also across processes sharing
    /// the store; the updated record is returned.
    fn transition(
        &self,
        id: &PackageId,
        version: &Version,
        target: VersionState,
        reason: Option<&str>,
    ) -> Result<PackageVersion>;

    fn read_content(&self, id: &PackageId, version: &Version) -> Result<Vec<u8>>;

    /// Re-hash stored content against the recorded checksum.
    fn audit_content(&self, id: &PackageId, version: &Version) -> Result<ContentCheck> {
        let record =
            self.version_record(id, version)?
                .ok_or_else(|| RegistryError::VersionNotFound {
                    id: id.to_string(),
                    version: version.to_string(),
                })?;
        let content = self.read_content(id, version)?;
        Ok(check_content(&record.checksum, &content))
    }
}

/// Yank fields, stored beside the immutable version record.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct YankRecord {
    yanked_at: DateTime<Utc>,
    reason: Option<String>,
}

const NAMESPACE_FILE_EXT: &str = "json";
const PACKAGE_FILE: &str = "package.json";
const VERSION_FILE: &str = "version.json";
const CONTENT_FILE: &str = "content";
const YANK_FILE: &str = "yank.json";

/// A local filesystem registry.
///
/// Layout:
/// ```text
/// <root>/
///   namespaces/<namespace>.json
///   packages/<namespace>/<name>/
///     package.json
///     <version>/
///       version.json
///       content
///       yank.json        (only while yanked)
///   staging/             (private scratch space)
/// ```
pub struct LocalRegistry {
    root: PathBuf,
}

impl LocalRegistry {
    /// Create a local registry rooted at the given directory.
    pub fn new(root: PathBuf) -> Self {
        LocalRegistry { root }
    }

    /// Get the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn namespace_path(&self, name: &str) -> PathBuf {
        self.root
            .join("namespaces")
            .join(format!("{name}.{NAMESPACE_FILE_EXT}"))
    }

    fn package_dir(&self, id: &PackageId) -> PathBuf {
        self.root
            .join("packages")
            .join(id.namespace())
            .join(id.name())
    }

    fn version_dir(&self, id: &PackageId, version: &Version) -> PathBuf {
        self.package_dir(id).join(version.to_string())
    }

    /// Content location relative to the root, as recorded in the version.
    pub fn storage_path(id: &PackageId, version: &Version) -> String {
        format!(
            "packages/{}/{}/{version}/{CONTENT_FILE}",
            id.namespace(),
            id.name()
        )
    }

    fn staging_path(&self) -> Result<PathBuf> {
        let staging = self.root.join("staging");
        fs::create_dir_all(&staging)?;
        Ok(staging.join(Uuid::new_v4().to_string()))
    }

    /// Write `value` to a fresh staging file and link it to `path`.
    /// Returns `false` if `path` already existed.
    fn create_exclusive<T: Serialize>(&self, path: &Path, value: &T) -> Result<bool> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.staging_path()?;
        fs::write(&tmp, serde_json::to_vec_pretty(value)?)?;
        let linked = fs::hard_link(&tmp, path);
        fs::remove_file(&tmp)?;
        match linked {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace `path` with `value` in one rename.
    fn replace<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let tmp = self.staging_path()?;
        fs::write(&tmp, serde_json::to_vec_pretty(value)?)?;
        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    fn read_version(&self, id: &PackageId, version: &Version) -> Result<Option<PackageVersion>> {
        let dir = self.version_dir(id, version);
        let Some(mut record) = read_json::<PackageVersion>(&dir.join(VERSION_FILE))? else {
            return Ok(None);
        };
        if let Some(yank) = read_json::<YankRecord>(&dir.join(YANK_FILE))? {
            record.yanked_at = Some(yank.yanked_at);
            record.yank_reason = yank.reason;
        }
        Ok(Some(record))
    }

    /// Committed version numbers, in directory order.
    fn committed_versions(&self, id: &PackageId) -> Result<Vec<Version>> {
        let dir = self.package_dir(id);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut versions = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.path().join(VERSION_FILE).is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if let Ok(v) = Version::parse(name) {
                    versions.push(v);
                }
            }
        }
        Ok(versions)
    }
}

/// Read and decode a JSON record. A missing file is `None`.
fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_slice(&data)
        .map(Some)
        .map_err(|e| RegistryError::CorruptRecord {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
}

impl CatalogAccessor for LocalRegistry {
    fn package_exists(&self, id: &PackageId) -> Result<bool> {
        Ok(self.package_dir(id).join(PACKAGE_FILE).is_file())
    }

    fn list_available_versions(&self, id: &PackageId) -> Result<Vec<Version>> {
        let mut available: Vec<Version> = self
            .committed_versions(id)?
            .into_iter()
            .filter(|v| !self.version_dir(id, v).join(YANK_FILE).exists())
            .collect();
        available.sort_by(version::total_cmp);
        Ok(available)
    }

    fn declared_dependencies(
        &self,
        id: &PackageId,
        version: &Version,
    ) -> Result<Vec<DependencyDeclaration>> {
        Ok(self
            .read_version(id, version)?
            .map(|r| r.dependencies)
            .unwrap_or_default())
    }

    fn checksum(&self, id: &PackageId, version: &Version) -> Result<Option<Checksum>> {
        Ok(self.read_version(id, version)?.map(|r| r.checksum))
    }

    fn version_record(
        &self,
        id: &PackageId,
        version: &Version,
    ) -> Result<Option<PackageVersion>> {
        self.read_version(id, version)
    }
}

impl RegistryStore for LocalRegistry {
    fn namespace(&self, name: &str) -> Result<Option<Namespace>> {
        read_json(&self.namespace_path(name))
    }

    fn create_namespace(&self, namespace: &Namespace) -> Result<()> {
        if self.create_exclusive(&self.namespace_path(&namespace.name), namespace)? {
            Ok(())
        } else {
            Err(RegistryError::NamespaceTaken {
                name: namespace.name.clone(),
            })
        }
    }

    fn update_namespace(&self, namespace: &Namespace) -> Result<()> {
        let path = self.namespace_path(&namespace.name);
        if !path.is_file() {
            return Err(RegistryError::NamespaceNotFound {
                name: namespace.name.clone(),
            });
        }
        self.replace(&path, namespace)
    }

    fn package(&self, id: &PackageId) -> Result<Option<Package>> {
        read_json(&self.package_dir(id).join(PACKAGE_FILE))
    }

    fn create_package(&self, package: &Package) -> Result<Package> {
        let path = self.package_dir(&package.id).join(PACKAGE_FILE);
        if self.create_exclusive(&path, package)? {
            return Ok(package.clone());
        }
        read_json(&path)?.ok_or_else(|| RegistryError::PackageNotFound {
            id: package.id.to_string(),
        })
    }

    fn list_versions(&self, id: &PackageId) -> Result<Vec<PackageVersion>> {
        let mut versions = self.committed_versions(id)?;
        versions.sort_by(version::total_cmp);

        let mut records = Vec::with_capacity(versions.len());
        for v in &versions {
            if let Some(record) = self.read_version(id, v)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn commit_version(&self, record: &PackageVersion, content: &[u8]) -> Result<()> {
        let final_dir = self.version_dir(&record.package, &record.version);
        let already_published = || RegistryError::AlreadyPublished {
            id: record.package.to_string(),
            version: record.version.to_string(),
        };
        if final_dir.join(VERSION_FILE).is_file() {
            return Err(already_published());
        }

        let staging = self.staging_path()?;
        let staged = (|| -> Result<()> {
            fs::create_dir_all(&staging)?;
            fs::write(staging.join(CONTENT_FILE), content)?;
            fs::write(
                staging.join(VERSION_FILE),
                serde_json::to_vec_pretty(record)?,
            )?;
            if let Some(parent) = final_dir.parent() {
                fs::create_dir_all(parent)?;
            }
            Ok(())
        })();
        if let Err(e) = staged {
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }

        match fs::rename(&staging, &final_dir) {
            Ok(()) => Ok(()),
            Err(e) => {
                let _ = fs::remove_dir_all(&staging);
                if final_dir.join(VERSION_FILE).is_file() {
                    Err(already_published())
                } else {
                    Err(e.into())
                }
            }
        }
    }

    fn transition(
        &self,
        id: &PackageId,
        version: &Version,
        target: VersionState,
        reason: Option<&str>,
    ) -> Result<PackageVersion> {
        let mut record =
            self.read_version(id, version)?
                .ok_or_else(|| RegistryError::VersionNotFound {
                    id: id.to_string(),
                    version: version.to_string(),
                })?;

        let rejected = |current: VersionState| RegistryError::YankState {
            id: id.to_string(),
            version: version.to_string(),
            action: match target {
                VersionState::Yanked => "yank",
                VersionState::Published => "unyank",
            },
            current,
        };
        if record.state() == target {
            return Err(rejected(target));
        }

        // The yank file's existence is the state; creating or removing it is
        // the compare-and-set, so concurrent writers cannot both succeed.
        let yank_path = self.version_dir(id, version).join(YANK_FILE);
        match target {
            VersionState::Yanked => {
                let yank = YankRecord {
                    yanked_at: Utc::now(),
                    reason: reason.map(str::to_string),
                };
                if !self.create_exclusive(&yank_path, &yank)? {
                    return Err(rejected(VersionState::Yanked));
                }
                record.yanked_at = Some(yank.yanked_at);
                record.yank_reason = yank.reason;
            }
            VersionState::Published => {
                match fs::remove_file(&yank_path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {
                        return Err(rejected(VersionState::Published));
                    }
                    Err(e) => return Err(e.into()),
                }
                record.yanked_at = None;
                record.yank_reason = None;
            }
        }
        Ok(record)
    }

    fn read_content(&self, id: &PackageId, version: &Version) -> Result<Vec<u8>> {
        let path = self.version_dir(id, version).join(CONTENT_FILE);
        match fs::read(&path) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(RegistryError::VersionNotFound {
                id: id.to_string(),
                version: version.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Protection;
    use crate::identity::ActorId;
    use crate::manifest::LockedManifest;

    fn id(s: &str) -> PackageId {
        PackageId::parse(s).unwrap()
    }

    fn make_version(package: &str, version: &str, content: &[u8]) -> PackageVersion {
        let package = id(package);
        let version = Version::parse(version).unwrap();
        PackageVersion::new(
            LockedManifest::new(package.clone(), version.clone(), Utc::now(), vec![]),
            LocalRegistry::storage_path(&package, &version),
            vec![],
            content,
        )
    }

    fn make_package(s: &str) -> Package {
        Package {
            id: id(s),
            owner: ActorId::new("alice"),
            description: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn commit_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let registry = LocalRegistry::new(dir.path().to_path_buf());
        registry.create_package(&make_package("ns.a")).unwrap();

        let record = make_version("ns.a", "1.0.0", b"content");
        registry.commit_version(&record, b"content").unwrap();

        let v = Version::new(1, 0, 0);
        assert!(registry.package_exists(&id("ns.a")).unwrap());
        assert_eq!(registry.version_record(&id("ns.a"), &v).unwrap(), Some(record.clone()));
        assert_eq!(registry.read_content(&id("ns.a"), &v).unwrap(), b"content");
        assert_eq!(registry.checksum(&id("ns.a"), &v).unwrap(), Some(record.checksum));
        assert!(dir.path().join(&record.storage_path).is_file());
    }

    #[test]
    fn reject_duplicate_commit() {
        let dir = tempfile::tempdir().unwrap();
        let registry = LocalRegistry::new(dir.path().to_path_buf());

        let record = make_version("ns.dup", "1.0.0", b"one");
        registry.commit_version(&record, b"one").unwrap();
        let err = registry.commit_version(&record, b"two").unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyPublished { .. }));
        assert_eq!(
            registry
                .read_content(&id("ns.dup"), &Version::new(1, 0, 0))
                .unwrap(),
            b"one"
        );
    }

    #[test]
    fn staging_is_cleaned_up() {
        let dir = tempfile::tempdir().unwrap();
        let registry = LocalRegistry::new(dir.path().to_path_buf());

        let record = make_version("ns.a", "1.0.0", b"x");
        registry.commit_version(&record, b"x").unwrap();
        let _ = registry.commit_version(&record, b"x");

        let leftovers = fs::read_dir(dir.path().join("staging")).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn versions_sorted_and_yanks_hidden() {
        let dir = tempfile::tempdir().unwrap();
        let registry = LocalRegistry::new(dir.path().to_path_buf());
        for v in ["2.0.0", "1.0.0", "1.1.0"] {
            registry
                .commit_version(&make_version("ns.m", v, v.as_bytes()), v.as_bytes())
                .unwrap();
        }

        let all: Vec<String> = registry
            .list_versions(&id("ns.m"))
            .unwrap()
            .iter()
            .map(|r| r.version.to_string())
            .collect();
        assert_eq!(all, vec!["1.0.0", "1.1.0", "2.0.0"]);

        registry
            .transition(&id("ns.m"), &Version::new(1, 1, 0), VersionState::Yanked, Some("bad"))
            .unwrap();
        let available = registry.list_available_versions(&id("ns.m")).unwrap();
        assert_eq!(available, vec![Version::new(1, 0, 0), Version::new(2, 0, 0)]);
        assert_eq!(registry.list_versions(&id("ns.m")).unwrap().len(), 3);
    }

    #[test]
    fn transition_is_conditional() {
        let dir = tempfile::tempdir().unwrap();
        let registry = LocalRegistry::new(dir.path().to_path_buf());
        registry
            .commit_version(&make_version("ns.a", "1.0.0", b"x"), b"x")
            .unwrap();
        let (a, v) = (id("ns.a"), Version::new(1, 0, 0));

        let err = registry
            .transition(&a, &v, VersionState::Published, None)
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::YankState { current: VersionState::Published, .. }
        ));

        let yanked = registry
            .transition(&a, &v, VersionState::Yanked, Some("broken"))
            .unwrap();
        assert_eq!(yanked.yank_reason.as_deref(), Some("broken"));
        assert!(registry.version_record(&a, &v).unwrap().unwrap().is_yanked());

        let err = registry
            .transition(&a, &v, VersionState::Yanked, Some("again"))
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::YankState { current: VersionState::Yanked, .. }
        ));

        let restored = registry
            .transition(&a, &v, VersionState::Published, None)
            .unwrap();
        assert!(restored.yanked_at.is_none());
        assert!(restored.yank_reason.is_none());
    }

    #[test]
    fn concurrent_transitions_from_separate_handles() {
        let dir = tempfile::tempdir().unwrap();
        LocalRegistry::new(dir.path().to_path_buf())
            .commit_version(&make_version("ns.a", "1.0.0", b"x"), b"x")
            .unwrap();
        let (a, v) = (id("ns.a"), Version::new(1, 0, 0));

        // Each thread opens its own handle, as separate processes would.
        let race = |target: VersionState| -> Vec<Result<PackageVersion>> {
            std::thread::scope(|scope| {
                let handles: Vec<_> = (0..4)
                    .map(|_| {
                        scope.spawn(|| {
                            LocalRegistry::new(dir.path().to_path_buf())
                                .transition(&a, &v, target, Some("race"))
                        })
                    })
                    .collect();
                handles.into_iter().map(|h| h.join().unwrap()).collect()
            })
        };

        for target in [VersionState::Yanked, VersionState::Published] {
            let results = race(target);
            assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
            for result in results.into_iter().filter_map(|r| r.err()) {
                match result {
                    RegistryError::YankState { current, .. } => assert_eq!(current, target),
                    other => panic!("expected a yank state error, got {other}"),
                }
            }
            let stored = LocalRegistry::new(dir.path().to_path_buf())
                .version_record(&a, &v)
                .unwrap()
                .unwrap();
            assert_eq!(stored.state(), target);
        }
    }

    #[test]
    fn transition_unknown_version() {
        let dir = tempfile::tempdir().unwrap();
        let registry = LocalRegistry::new(dir.path().to_path_buf());
        let err = registry
            .transition(&id("ns.a"), &Version::new(9, 9, 9), VersionState::Yanked, None)
            .unwrap_err();
        assert!(matches!(err, RegistryError::VersionNotFound { .. }));
    }

    #[test]
    fn namespace_created_once() {
        let dir = tempfile::tempdir().unwrap();
        let registry = LocalRegistry::new(dir.path().to_path_buf());
        let ns = Namespace {
            name: "acme".to_string(),
            owner: ActorId::new("alice"),
            protection: Protection::Protected,
            description: None,
            created_at: Utc::now(),
        };
        registry.create_namespace(&ns).unwrap();
        let err = registry.create_namespace(&ns).unwrap_err();
        assert!(matches!(err, RegistryError::NamespaceTaken { .. }));

        let mut updated = ns.clone();
        updated.protection = Protection::Public;
        registry.update_namespace(&updated).unwrap();
        assert_eq!(registry.namespace("acme").unwrap(), Some(updated));
        assert_eq!(registry.namespace("other").unwrap(), None);
    }

    #[test]
    fn first_package_record_wins() {
        let dir = tempfile::tempdir().unwrap();
        let registry = LocalRegistry::new(dir.path().to_path_buf());
        let first = make_package("ns.a");
        let mut second = make_package("ns.a");
        second.owner = ActorId::new("bob");

        registry.create_package(&first).unwrap();
        let stored = registry.create_package(&second).unwrap();
        assert_eq!(stored.owner, ActorId::new("alice"));
    }

    #[test]
    fn audit_detects_drift() {
        let dir = tempfile::tempdir().unwrap();
        let registry = LocalRegistry::new(dir.path().to_path_buf());
        let record = make_version("ns.a", "1.0.0", b"original");
        registry.commit_version(&record, b"original").unwrap();
        let v = Version::new(1, 0, 0);

        assert!(registry.audit_content(&id("ns.a"), &v).unwrap().is_intact());
        fs::write(dir.path().join(&record.storage_path), b"tampered").unwrap();
        assert!(!registry.audit_content(&id("ns.a"), &v).unwrap().is_intact());
    }

    #[test]
    fn corrupt_record_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let registry = LocalRegistry::new(dir.path().to_path_buf());
        let record = make_version("ns.a", "1.0.0", b"x");
        registry.commit_version(&record, b"x").unwrap();
        let path = registry
            .version_dir(&id("ns.a"), &Version::new(1, 0, 0))
            .join(VERSION_FILE);
        fs::write(&path, b"{ not json").unwrap();

        let err = registry
            .version_record(&id("ns.a"), &Version::new(1, 0, 0))
            .unwrap_err();
        assert!(matches!(err, RegistryError::CorruptRecord { .. }));
    }

    #[test]
    fn empty_registry() {
        let dir = tempfile::tempdir().unwrap();
        let registry = LocalRegistry::new(dir.path().to_path_buf());
        assert!(!registry.package_exists(&id("ns.any")).unwrap());
        assert!(registry.list_available_versions(&id("ns.any")).unwrap().is_empty());
        assert!(registry.list_versions(&id("ns.any")).unwrap().is_empty());
        assert!(registry.package(&id("ns.any")).unwrap().is_none());
    }
}
