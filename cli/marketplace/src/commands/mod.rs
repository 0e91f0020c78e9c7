//! CLI command implementations.

pub mod init;
pub mod inspect;
pub mod lifecycle;
pub mod namespace;
pub mod publish;

use anyhow::{bail, Context, Result};
use marketplace_registry::{PackageId, ResolutionIssue, Version};

/// Report format for commands that can emit JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Human,
    Json,
}

pub fn parse_format(format: Option<&str>) -> Result<Format> {
    match format {
        None | Some("human") => Ok(Format::Human),
        Some("json") => Ok(Format::Json),
        Some(other) => bail!("unknown format: '{other}' (expected human or json)"),
    }
}

/// Parse a `<package> <version>` pair from the command line.
pub fn parse_target(package: &str, version: &str) -> Result<(PackageId, Version)> {
    let id = PackageId::parse(package).with_context(|| format!("invalid package '{package}'"))?;
    let version = marketplace_registry::parse_version(version)
        .with_context(|| format!("invalid version '{version}'"))?;
    Ok((id, version))
}

pub fn print_issues(issues: &[ResolutionIssue]) {
    for issue in issues {
        eprintln!("  {issue}");
        if let Some(path) = &issue.path {
            let rendered: Vec<String> = path.iter().map(ToString::to_string).collect();
            eprintln!("    path: {}", rendered.join(" -> "));
        }
    }
}

pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
