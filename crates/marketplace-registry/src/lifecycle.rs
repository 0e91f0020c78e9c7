//! Version lifecycle: `published <-> yanked`.
//!
//! Published content never changes. Yanking only sets the yank timestamp and
//! reason, which takes the version out of new resolutions; unyanking clears
//! them. Only the package owner may do either.

use crate::catalog::{PackageVersion, VersionState};
use crate::error::{RegistryError, Result};
use crate::identity::{ActorId, PackageId};
use crate::store::RegistryStore;
use crate::version::Version;

/// Withdraw a version from new resolutions.
pub fn yank(
    store: &dyn RegistryStore,
    actor: &ActorId,
    id: &PackageId,
    version: &Version,
    reason: &str,
) -> Result<PackageVersion> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(RegistryError::InvalidRequest {
            detail: "a yank reason is required".to_string(),
        });
    }
    require_owner(store, actor, id)?;

    let record = store.transition(id, version, VersionState::Yanked, Some(reason))?;
    tracing::info!(package = %id, version = %version, actor = %actor, reason, "yanked version");
    Ok(record)
}

/// Restore a yanked version.
pub fn unyank(
    store: &dyn RegistryStore,
    actor: &ActorId,
    id: &PackageId,
    version: &Version,
) -> Result<PackageVersion> {
    require_owner(store, actor, id)?;

    let record = store.transition(id, version, VersionState::Published, None)?;
    tracing::info!(package = %id, version = %version, actor = %actor, "unyanked version");
    Ok(record)
}

fn require_owner(store: &dyn RegistryStore, actor: &ActorId, id: &PackageId) -> Result<()> {
    let package = store
        .package(id)?
        .ok_or_else(|| RegistryError::PackageNotFound { id: id.to_string() })?;
    if &package.owner != actor {
        return Err(RegistryError::NotOwner {
            actor: actor.to_string(),
            target: id.to_string(),
        });
    }
    Ok(())
}
