//! `marketplace publish`: publish a package descriptor.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use marketplace_registry::{publish, request_from_toml, ActorId, PublishOptions, RegistryError};

use super::{parse_format, print_issues, print_json, Format};
use crate::config::Session;

pub fn run(
    session: &Session,
    actor: &ActorId,
    descriptor: &Path,
    dry_run: bool,
    format: Option<&str>,
) -> Result<()> {
    let format = parse_format(format)?;
    let input = fs::read_to_string(descriptor)
        .with_context(|| format!("reading {}", descriptor.display()))?;
    let request = request_from_toml(&input)
        .with_context(|| format!("parsing {}", descriptor.display()))?;

    let id = request.package.clone();
    let version = request.version.clone();
    let options = PublishOptions { dry_run };

    let record = match publish(&session.registry, &session.config, actor, request, &options) {
        Ok(record) => record,
        Err(RegistryError::ResolutionFailed { issues }) => {
            eprintln!("Cannot publish {id}@{version}: dependency resolution failed");
            print_issues(&issues);
            bail!("{} resolution issue(s)", issues.len());
        }
        Err(e) => return Err(e.into()),
    };

    if format == Format::Json {
        return print_json(&record);
    }

    let verb = if dry_run { "Would publish" } else { "Published" };
    println!("{verb} {}@{}", record.package, record.version);
    println!("  checksum: {}", record.checksum);
    println!("  size:     {} bytes", record.size_bytes);
    if record.manifest.dependencies.is_empty() {
        println!("  no dependencies");
    } else {
        println!("  locked dependencies:");
        for dep in &record.manifest.dependencies {
            println!("    {} {} ({})", dep.package, dep.version, dep.checksum);
        }
    }
    Ok(())
}
