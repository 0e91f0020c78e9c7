//! `marketplace yank` / `marketplace unyank`.

use anyhow::Result;
use marketplace_registry::ActorId;

use super::parse_target;
use crate::config::Session;

pub fn yank(
    session: &Session,
    actor: &ActorId,
    package: &str,
    version: &str,
    reason: &str,
) -> Result<()> {
    let (id, version) = parse_target(package, version)?;
    let record = marketplace_registry::yank(&session.registry, actor, &id, &version, reason)?;
    println!(
        "Yanked {}@{}: {}",
        record.package,
        record.version,
        record.yank_reason.as_deref().unwrap_or_default()
    );
    Ok(())
}

pub fn unyank(session: &Session, actor: &ActorId, package: &str, version: &str) -> Result<()> {
    let (id, version) = parse_target(package, version)?;
    let record = marketplace_registry::unyank(&session.registry, actor, &id, &version)?;
    println!("Restored {}@{}", record.package, record.version);
    Ok(())
}
