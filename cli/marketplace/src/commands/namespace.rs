//! `marketplace namespace`: claim, show and update namespaces.

use anyhow::{bail, Result};
use marketplace_registry::{ActorId, NamespaceGate, NamespaceUpdate, Protection};

use super::{parse_format, print_json, Format};
use crate::config::Session;

pub fn claim(
    session: &Session,
    actor: &ActorId,
    name: &str,
    protection: Option<&str>,
    description: Option<String>,
) -> Result<()> {
    let protection = match protection {
        Some(p) => p.parse::<Protection>()?,
        None => session.config.default_protection,
    };
    let gate = NamespaceGate::new(&session.registry, &session.config);
    let namespace = gate.claim(name, actor, protection, description)?;
    println!(
        "Claimed namespace '{}' ({}) for {}",
        namespace.name, namespace.protection, namespace.owner
    );
    Ok(())
}

/// Private namespaces look absent to anyone but their owner.
pub fn show(
    session: &Session,
    actor: Option<&ActorId>,
    name: &str,
    format: Option<&str>,
) -> Result<()> {
    let format = parse_format(format)?;
    let gate = NamespaceGate::new(&session.registry, &session.config);

    let namespace = match gate.get(name)? {
        Some(ns) if gate.can_view(name, actor)? => ns,
        _ => bail!("namespace not found: {name}"),
    };

    match format {
        Format::Json => print_json(&namespace),
        Format::Human => {
            println!("Namespace: {}", namespace.name);
            println!("  owner:      {}", namespace.owner);
            println!("  protection: {}", namespace.protection);
            if let Some(description) = &namespace.description {
                println!("  description: {description}");
            }
            println!("  created:    {}", namespace.created_at.to_rfc3339());
            Ok(())
        }
    }
}

pub fn update(
    session: &Session,
    actor: &ActorId,
    name: &str,
    protection: Option<&str>,
    description: Option<String>,
) -> Result<()> {
    if protection.is_none() && description.is_none() {
        bail!("nothing to update: pass --protection or --description");
    }
    let changes = NamespaceUpdate {
        protection: protection.map(str::parse::<Protection>).transpose()?,
        description,
    };
    let gate = NamespaceGate::new(&session.registry, &session.config);
    let namespace = gate.update(name, actor, changes)?;
    println!("Updated namespace '{}' ({})", namespace.name, namespace.protection);
    Ok(())
}
