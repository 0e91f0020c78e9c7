//! Read-only views of the registry: versions, manifests, verification,
//! install order and content audits.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use marketplace_registry::{
    install_order, verify, ActorId, CatalogAccessor, ContentCheck, LockedManifest,
    NamespaceGate, PackageId, RegistryError, RegistryStore, Version,
};

use super::{parse_format, parse_target, print_issues, print_json, Format};
use crate::config::Session;

/// Packages in private namespaces look absent to anyone but the owner.
fn ensure_visible(session: &Session, actor: Option<&ActorId>, id: &PackageId) -> Result<()> {
    let gate = NamespaceGate::new(&session.registry, &session.config);
    if !gate.can_view(id.namespace(), actor)? {
        bail!("package not found: {id}");
    }
    Ok(())
}

fn stored_manifest(session: &Session, id: &PackageId, version: &Version) -> Result<LockedManifest> {
    let record = session
        .registry
        .version_record(id, version)?
        .ok_or_else(|| RegistryError::VersionNotFound {
            id: id.to_string(),
            version: version.to_string(),
        })?;
    Ok(record.manifest)
}

/// List every version of a package, yanked ones included.
pub fn versions(
    session: &Session,
    actor: Option<&ActorId>,
    package: &str,
    format: Option<&str>,
) -> Result<()> {
    let format = parse_format(format)?;
    let id = PackageId::parse(package)?;
    ensure_visible(session, actor, &id)?;
    if !session.registry.package_exists(&id)? {
        bail!("package not found: {id}");
    }

    let records = session.registry.list_versions(&id)?;
    if format == Format::Json {
        return print_json(&records);
    }

    println!("{id}:");
    for record in &records {
        match &record.yank_reason {
            Some(reason) => println!("  {} (yanked: {reason})", record.version),
            None => println!("  {}", record.version),
        }
    }
    Ok(())
}

pub fn manifest(
    session: &Session,
    actor: Option<&ActorId>,
    package: &str,
    version: &str,
) -> Result<()> {
    let (id, version) = parse_target(package, version)?;
    ensure_visible(session, actor, &id)?;
    let manifest = stored_manifest(session, &id, &version)?;
    println!("{}", manifest.to_json()?);
    Ok(())
}

/// Re-check a manifest, either the stored one for `package@version` or
/// one read from `manifest_file`.
pub fn verify_manifest(
    session: &Session,
    actor: Option<&ActorId>,
    target: Option<(&str, &str)>,
    manifest_file: Option<&Path>,
    format: Option<&str>,
) -> Result<()> {
    let format = parse_format(format)?;
    let manifest = match (target, manifest_file) {
        (_, Some(path)) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            LockedManifest::from_json(&text)
                .with_context(|| format!("parsing {}", path.display()))?
        }
        (Some((package, version)), None) => {
            let (id, version) = parse_target(package, version)?;
            ensure_visible(session, actor, &id)?;
            stored_manifest(session, &id, &version)?
        }
        (None, None) => bail!("pass <PACKAGE> <VERSION> or --manifest <FILE>"),
    };

    let report = verify(&manifest, &session.registry)?;
    if format == Format::Json {
        print_json(&report)?;
    } else if report.valid {
        println!(
            "{}@{}: {} locked dependencies verified",
            manifest.package,
            manifest.version,
            manifest.dependencies.len()
        );
    } else {
        eprintln!("{}@{}: manifest is no longer valid", manifest.package, manifest.version);
        print_issues(&report.issues);
    }

    if !report.valid {
        bail!("{} verification issue(s)", report.issues.len());
    }
    Ok(())
}

pub fn order(
    session: &Session,
    actor: Option<&ActorId>,
    package: &str,
    version: &str,
    format: Option<&str>,
) -> Result<()> {
    let format = parse_format(format)?;
    let (id, version) = parse_target(package, version)?;
    ensure_visible(session, actor, &id)?;
    let manifest = stored_manifest(session, &id, &version)?;

    let order = install_order(&manifest);
    if format == Format::Json {
        return print_json(&order);
    }
    for (i, package) in order.iter().enumerate() {
        let version = manifest
            .dependency(package)
            .map(|d| d.version.to_string())
            .unwrap_or_else(|| "?".to_string());
        println!("{:>3}. {package} {version}", i + 1);
    }
    Ok(())
}

/// Re-hash stored content against its recorded checksum.
pub fn audit(session: &Session, package: &str, version: &str) -> Result<()> {
    let (id, version) = parse_target(package, version)?;
    match session.registry.audit_content(&id, &version)? {
        ContentCheck::Intact => {
            println!("{id}@{version}: content intact");
            Ok(())
        }
        ContentCheck::Drifted { expected, actual } => {
            bail!("{id}@{version}: content drifted (expected {expected}, got {actual})")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;
    use marketplace_registry::{
        publish, yank, DependencyDeclaration, NamespaceGate, Protection, PublishOptions,
        PublishRequest,
    };

    fn seed(session: &Session) {
        let alice = ActorId::new("alice");
        let base = PackageId::parse("acme.base").unwrap();
        let app = PackageId::parse("acme.app").unwrap();
        publish(
            &session.registry,
            &session.config,
            &alice,
            PublishRequest::new(base.clone(), Version::new(1, 0, 0), "base"),
            &PublishOptions::default(),
        )
        .unwrap();
        publish(
            &session.registry,
            &session.config,
            &alice,
            PublishRequest::new(app, Version::new(2, 0, 0), "app")
                .with_dependency(DependencyDeclaration::new(base, "^1.0.0").unwrap()),
            &PublishOptions::default(),
        )
        .unwrap();
    }

    #[test]
    fn views_on_published_packages() {
        let dir = tempfile::tempdir().unwrap();
        let session = config::open(dir.path(), None, None).unwrap();
        seed(&session);
        let alice = ActorId::new("alice");

        versions(&session, Some(&alice), "acme.base", None).unwrap();
        manifest(&session, Some(&alice), "acme.app", "2.0.0").unwrap();
        order(&session, Some(&alice), "acme.app", "2.0.0", Some("json")).unwrap();
        audit(&session, "acme.base", "1.0.0").unwrap();
        verify_manifest(&session, Some(&alice), Some(("acme.app", "2.0.0")), None, None).unwrap();

        assert!(versions(&session, None, "acme.nothing", None).is_err());
    }

    #[test]
    fn verify_fails_after_yank() {
        let dir = tempfile::tempdir().unwrap();
        let session = config::open(dir.path(), None, None).unwrap();
        seed(&session);
        let alice = ActorId::new("alice");

        yank(
            &session.registry,
            &alice,
            &PackageId::parse("acme.base").unwrap(),
            &Version::new(1, 0, 0),
            "broken",
        )
        .unwrap();

        let err = verify_manifest(&session, Some(&alice), Some(("acme.app", "2.0.0")), None, None)
            .unwrap_err();
        assert!(err.to_string().contains("verification issue"));
    }

    #[test]
    fn verify_manifest_file() {
        let dir = tempfile::tempdir().unwrap();
        let session = config::open(dir.path(), None, None).unwrap();
        seed(&session);

        let app = PackageId::parse("acme.app").unwrap();
        let stored = stored_manifest(&session, &app, &Version::new(2, 0, 0)).unwrap();
        let path = dir.path().join("lock.json");
        fs::write(&path, stored.to_json().unwrap()).unwrap();

        verify_manifest(&session, None, None, Some(&path), Some("json")).unwrap();
        assert!(verify_manifest(&session, None, None, None, None).is_err());
    }

    #[test]
    fn private_packages_hidden() {
        let dir = tempfile::tempdir().unwrap();
        let session = config::open(dir.path(), None, None).unwrap();
        seed(&session);
        let alice = ActorId::new("alice");
        NamespaceGate::new(&session.registry, &session.config)
            .update(
                "acme",
                &alice,
                marketplace_registry::NamespaceUpdate {
                    protection: Some(Protection::Private),
                    description: None,
                },
            )
            .unwrap();

        let err = versions(&session, Some(&ActorId::new("bob")), "acme.base", None).unwrap_err();
        assert!(err.to_string().contains("not found"));
        versions(&session, Some(&alice), "acme.base", None).unwrap();
    }
}
