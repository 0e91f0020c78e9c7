//! Package publishing workflow.
//!
//! Validates a request, checks namespace and package ownership, resolves the
//! declared dependencies into a locked manifest and commits the new version
//! atomically. Nothing is written unless resolution succeeds, and a dry run
//! stops right before the first write.

use std::collections::BTreeMap;

use chrono::Utc;

use crate::catalog::{DependencyDeclaration, Package, PackageVersion};
use crate::config::RegistryConfig;
use crate::error::{RegistryError, Result};
use crate::identity::{validate_namespace_name, ActorId, PackageId};
use crate::manifest;
use crate::namespace::{may_publish, NamespaceGate};
use crate::resolution;
use crate::store::{LocalRegistry, RegistryStore};
use crate::version::{self, Version};

/// Options for the publish operation.
#[derive(Debug, Clone, Default)]
pub struct PublishOptions {
    /// Perform all checks and resolution but don't write anything.
    pub dry_run: bool,
}

/// Everything needed to publish one version.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub package: PackageId,
    pub version: Version,
    pub description: Option<String>,
    pub signature: Option<String>,
    pub dependencies: Vec<DependencyDeclaration>,
    /// Informational entity counts.
    pub content_counts: BTreeMap<String, u64>,
    /// Raw content; its checksum is recorded.
    pub content: Vec<u8>,
}

impl PublishRequest {
    pub fn new(package: PackageId, version: Version, content: impl Into<Vec<u8>>) -> Self {
        PublishRequest {
            package,
            version,
            description: None,
            signature: None,
            dependencies: Vec::new(),
            content_counts: BTreeMap::new(),
            content: content.into(),
        }
    }

    pub fn with_dependency(mut self, declaration: DependencyDeclaration) -> Self {
        self.dependencies.push(declaration);
        self
    }
}

/// Check a request's shape before touching the store.
pub fn validate(request: &PublishRequest) -> Result<()> {
    let invalid = |detail: String| RegistryError::InvalidRequest { detail };

    validate_namespace_name(request.package.namespace())?;

    for dep in &request.dependencies {
        if dep.package == request.package {
            return Err(invalid(format!("{} cannot depend on itself", request.package)));
        }
        version::parse_range(&dep.range)?;
    }
    Ok(())
}

/// Publish a version.
///
/// Returns the committed record, or with `dry_run` the record that would
/// have been committed.
pub fn publish<S: RegistryStore>(
    store: &S,
    config: &RegistryConfig,
    actor: &ActorId,
    request: PublishRequest,
    options: &PublishOptions,
) -> Result<PackageVersion> {
    validate(&request)?;

    let id = &request.package;
    let namespace = id.namespace();
    let gate = NamespaceGate::new(store, config);

    if !gate.can_publish(namespace, actor)? {
        return Err(RegistryError::Unauthorized {
            actor: actor.to_string(),
            namespace: namespace.to_string(),
        });
    }

    if let Some(existing) = store.package(id)? {
        if &existing.owner != actor {
            return Err(RegistryError::NotOwner {
                actor: actor.to_string(),
                target: id.to_string(),
            });
        }
    }

    if store.version_record(id, &request.version)?.is_some() {
        return Err(RegistryError::AlreadyPublished {
            id: id.to_string(),
            version: request.version.to_string(),
        });
    }

    let locked = resolution::resolve(id, &request.dependencies, store)?.into_result()?;
    let manifest = manifest::build(id.clone(), request.version.clone(), locked);

    let record = PackageVersion::new(
        manifest,
        LocalRegistry::storage_path(id, &request.version),
        request.dependencies.clone(),
        &request.content,
    )
    .with_signature(request.signature.clone())
    .with_description(request.description.clone())
    .with_content_counts(request.content_counts.clone());

    if options.dry_run {
        tracing::debug!(package = %id, version = %request.version, "dry run; nothing written");
        return Ok(record);
    }

    // Another actor may have claimed the namespace since the gate check.
    let claimed = gate.auto_claim(namespace, actor)?;
    if !may_publish(Some(&claimed), false, actor) {
        return Err(RegistryError::Unauthorized {
            actor: actor.to_string(),
            namespace: namespace.to_string(),
        });
    }
    let package = store.create_package(&Package {
        id: id.clone(),
        owner: actor.clone(),
        description: request.description.clone(),
        created_at: Utc::now(),
    })?;
    if &package.owner != actor {
        return Err(RegistryError::NotOwner {
            actor: actor.to_string(),
            target: id.to_string(),
        });
    }

    store.commit_version(&record, &request.content)?;
    tracing::info!(
        package = %id,
        version = %record.version,
        checksum = %record.checksum,
        dependencies = record.manifest.dependencies.len(),
        "published version"
    );
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogAccessor, Protection};
    use crate::error::IssueKind;
    use crate::integrity::UNSIGNED;

    fn id(s: &str) -> PackageId {
        PackageId::parse(s).unwrap()
    }

    fn request(package: &str, version: &str, deps: &[(&str, &str)]) -> PublishRequest {
        let mut req = PublishRequest::new(
            id(package),
            Version::parse(version).unwrap(),
            format!("{package}@{version}"),
        );
        for (p, r) in deps {
            req = req.with_dependency(DependencyDeclaration::new(id(p), *r).unwrap());
        }
        req
    }

    fn setup() -> (tempfile::TempDir, LocalRegistry, RegistryConfig) {
        let dir = tempfile::tempdir().unwrap();
        let registry = LocalRegistry::new(dir.path().to_path_buf());
        (dir, registry, RegistryConfig::default())
    }

    #[test]
    fn publish_new_package() {
        let (_dir, registry, config) = setup();
        let alice = ActorId::new("alice");

        let record = publish(
            &registry,
            &config,
            &alice,
            request("acme.base", "1.0.0", &[]),
            &PublishOptions::default(),
        )
        .unwrap();

        assert_eq!(record.signature, UNSIGNED);
        assert!(record.manifest.dependencies.is_empty());
        assert!(registry.package_exists(&id("acme.base")).unwrap());

        let ns = registry.namespace("acme").unwrap().unwrap();
        assert_eq!(ns.owner, alice);
        assert_eq!(ns.protection, Protection::Protected);
    }

    #[test]
    fn publish_with_dependencies_locks_them() {
        let (_dir, registry, config) = setup();
        let alice = ActorId::new("alice");
        let opts = PublishOptions::default();

        let base = publish(&registry, &config, &alice, request("acme.base", "1.0.0", &[]), &opts)
            .unwrap();
        let top = publish(
            &registry,
            &config,
            &alice,
            request("acme.top", "1.0.0", &[("acme.base", "^1.0.0")]),
            &opts,
        )
        .unwrap();

        let locked = &top.manifest.dependencies;
        assert_eq!(locked.len(), 1);
        assert_eq!(locked[0].package, id("acme.base"));
        assert_eq!(locked[0].checksum, base.checksum);

        let stored = registry
            .version_record(&id("acme.top"), &Version::new(1, 0, 0))
            .unwrap()
            .unwrap();
        assert_eq!(stored.manifest, top.manifest);
    }

    #[test]
    fn unresolvable_publish_writes_nothing() {
        let (_dir, registry, config) = setup();
        let err = publish(
            &registry,
            &config,
            &ActorId::new("alice"),
            request("acme.top", "1.0.0", &[("acme.missing", "^1.0.0")]),
            &PublishOptions::default(),
        )
        .unwrap_err();

        match err {
            RegistryError::ResolutionFailed { issues } => {
                assert_eq!(issues.len(), 1);
                assert_eq!(issues[0].kind, IssueKind::NotFound);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!registry.package_exists(&id("acme.top")).unwrap());
        assert!(registry.namespace("acme").unwrap().is_none());
    }

    #[test]
    fn dry_run_does_not_publish() {
        let (_dir, registry, config) = setup();
        let record = publish(
            &registry,
            &config,
            &ActorId::new("alice"),
            request("acme.dry", "1.0.0", &[]),
            &PublishOptions { dry_run: true },
        )
        .unwrap();

        assert_eq!(record.version, Version::new(1, 0, 0));
        assert!(!registry.package_exists(&id("acme.dry")).unwrap());
        assert!(registry.namespace("acme").unwrap().is_none());
    }

    #[test]
    fn reject_duplicate_version() {
        let (_dir, registry, config) = setup();
        let alice = ActorId::new("alice");
        let opts = PublishOptions::default();
        publish(&registry, &config, &alice, request("acme.a", "1.0.0", &[]), &opts).unwrap();

        let err = publish(&registry, &config, &alice, request("acme.a", "1.0.0", &[]), &opts)
            .unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyPublished { .. }));
    }

    #[test]
    fn namespace_gate_blocks_strangers() {
        let (_dir, registry, config) = setup();
        let opts = PublishOptions::default();
        publish(
            &registry,
            &config,
            &ActorId::new("alice"),
            request("acme.a", "1.0.0", &[]),
            &opts,
        )
        .unwrap();

        let err = publish(
            &registry,
            &config,
            &ActorId::new("mallory"),
            request("acme.b", "1.0.0", &[]),
            &opts,
        )
        .unwrap_err();
        assert!(matches!(err, RegistryError::Unauthorized { .. }));

        let err = publish(
            &registry,
            &config,
            &ActorId::new("mallory"),
            request("system.a", "1.0.0", &[]),
            &opts,
        )
        .unwrap_err();
        assert!(matches!(err, RegistryError::Unauthorized { .. }));
    }

    #[test]
    fn public_namespace_still_protects_packages() {
        let (_dir, registry, config) = setup();
        let opts = PublishOptions::default();
        let alice = ActorId::new("alice");
        let bob = ActorId::new("bob");
        NamespaceGate::new(&registry, &config)
            .claim("commons", &alice, Protection::Public, None)
            .unwrap();

        publish(&registry, &config, &alice, request("commons.a", "1.0.0", &[]), &opts).unwrap();
        publish(&registry, &config, &bob, request("commons.b", "1.0.0", &[]), &opts).unwrap();

        let err = publish(&registry, &config, &bob, request("commons.a", "1.1.0", &[]), &opts)
            .unwrap_err();
        assert!(matches!(err, RegistryError::NotOwner { .. }));
    }

    #[test]
    fn racing_for_a_fresh_namespace_has_one_owner() {
        let (_dir, registry, config) = setup();
        let opts = PublishOptions::default();
        let alice = ActorId::new("alice");
        let bob = ActorId::new("bob");

        for round in 0..32 {
            let namespace = format!("race{round}");
            let attempt = |actor: &ActorId, name: &str| {
                let req = request(&format!("{namespace}.{name}"), "1.0.0", &[]);
                publish(&registry, &config, actor, req, &opts)
            };
            let (a, b) = std::thread::scope(|scope| {
                let a = scope.spawn(|| attempt(&alice, "a"));
                let b = scope.spawn(|| attempt(&bob, "b"));
                (a.join().unwrap(), b.join().unwrap())
            });

            let (winner, loser, lost_package) = match (&a, &b) {
                (Ok(_), Err(e)) => (&alice, e, "b"),
                (Err(e), Ok(_)) => (&bob, e, "a"),
                _ => panic!("round {round}: expected exactly one publish to succeed"),
            };
            assert!(matches!(loser, RegistryError::Unauthorized { .. }), "round {round}: {loser}");

            let ns = registry.namespace(&namespace).unwrap().unwrap();
            assert_eq!(&ns.owner, winner);
            let lost = id(&format!("{namespace}.{lost_package}"));
            assert!(!registry.package_exists(&lost).unwrap());
        }
    }

    #[test]
    fn validation_rejects_bad_requests() {
        let self_dep = request("acme.a", "1.0.0", &[("acme.a", "^1.0.0")]);
        assert!(matches!(validate(&self_dep), Err(RegistryError::InvalidRequest { .. })));

        // Repeated entries are left to resolution, which merges or rejects them.
        let repeated = request("acme.a", "1.0.0", &[("acme.b", "^1.0.0"), ("acme.b", "^1.2.0")]);
        assert!(validate(&repeated).is_ok());

        let mut raw_range = request("acme.a", "1.0.0", &[]);
        raw_range.dependencies.push(DependencyDeclaration {
            package: id("acme.b"),
            range: "nonsense".to_string(),
        });
        assert!(matches!(validate(&raw_range), Err(RegistryError::InvalidRange { .. })));

        let short_ns = request("a.pkg", "1.0.0", &[]);
        assert!(matches!(validate(&short_ns), Err(RegistryError::InvalidNamespace { .. })));
    }
}
