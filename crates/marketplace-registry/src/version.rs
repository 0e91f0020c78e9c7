//! Semantic versions and dependency ranges.
//!
//! Wraps the `semver` crate. Dependency declarations use the familiar
//! node-style range grammar (`^1.2.0`, `~1.2`, `1.x`, `>= 1.0 < 2`,
//! `1.2.3 - 2.3`, `a || b`), which is translated here into `semver`
//! comparators. A bare version means exactly that version, not a caret range.

use std::cmp::Ordering;
use std::fmt;

use crate::error::{RegistryError, Result};

/// A parsed semantic version.
pub type Version = semver::Version;

/// A parsed dependency range: one or more `||` alternatives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    source: String,
    alternatives: Vec<semver::VersionReq>,
}

impl VersionRange {
    /// Parse a range expression.
    pub fn parse(s: &str) -> Result<Self> {
        let alternatives = s
            .split("||")
            .map(|alt| parse_alternative(s, alt))
            .collect::<Result<Vec<_>>>()?;
        Ok(VersionRange {
            source: s.to_string(),
            alternatives,
        })
    }

    /// Whether `version` falls in any alternative.
    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|req| req.matches(version))
    }

    /// The text the range was parsed from.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Parse a version string like "1.2.3".
pub fn parse_version(s: &str) -> Result<Version> {
    let trimmed = s.trim();
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
    Ok(Version::parse(trimmed)?)
}

/// Parse a range string like "^1.2.0" or ">=1.0.0 <2.0.0".
pub fn parse_range(s: &str) -> Result<VersionRange> {
    VersionRange::parse(s)
}

pub fn is_valid_range(s: &str) -> bool {
    VersionRange::parse(s).is_ok()
}

pub fn satisfies(version: &Version, range: &VersionRange) -> bool {
    range.matches(version)
}

/// Highest-precedence version in `versions` that satisfies `range`.
pub fn max_satisfying<'a, I>(versions: I, range: &VersionRange) -> Option<Version>
where
    I: IntoIterator<Item = &'a Version>,
{
    versions
        .into_iter()
        .filter(|v| range.matches(v))
        .max_by(|a, b| total_cmp(a, b))
        .cloned()
}

/// Semver precedence. Build metadata does not participate.
pub fn compare(a: &Version, b: &Version) -> Ordering {
    a.cmp_precedence(b)
}

/// Precedence, with build metadata breaking ties so that distinct versions
/// never compare equal. Used wherever versions are sorted or a single one
/// is picked.
pub fn total_cmp(a: &Version, b: &Version) -> Ordering {
    compare(a, b).then_with(|| a.cmp(b))
}

const OPERATORS: [&str; 7] = [">=", "<=", ">", "<", "=", "^", "~"];

fn parse_alternative(full: &str, alt: &str) -> Result<semver::VersionReq> {
    let invalid = |detail: String| RegistryError::InvalidRange {
        range: full.to_string(),
        detail,
    };

    let tokens = tokenize(alt);
    let mut comparators = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        if tokens.get(i + 1).map(String::as_str) == Some("-") {
            let upper = tokens
                .get(i + 2)
                .ok_or_else(|| invalid("hyphen range is missing its upper bound".to_string()))?;
            comparators.extend(translate(&format!(">={}", tokens[i])).map_err(&invalid)?);
            comparators.extend(translate(&format!("<={upper}")).map_err(&invalid)?);
            i += 3;
            continue;
        }
        comparators.extend(translate(&tokens[i]).map_err(&invalid)?);
        i += 1;
    }

    if comparators.is_empty() {
        return Ok(semver::VersionReq::STAR);
    }
    semver::VersionReq::parse(&comparators.join(", ")).map_err(|e| invalid(e.to_string()))
}

/// Split on whitespace and commas, gluing a bare operator to the version
/// that follows it (`>= 1.2` becomes `>=1.2`).
fn tokenize(alt: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    let mut pending_op: Option<String> = None;
    for raw in alt.split(|c: char| c.is_whitespace() || c == ',') {
        if raw.is_empty() {
            continue;
        }
        if OPERATORS.contains(&raw) {
            pending_op = Some(raw.to_string());
            continue;
        }
        match pending_op.take() {
            Some(op) => tokens.push(format!("{op}{raw}")),
            None => tokens.push(raw.to_string()),
        }
    }
    if let Some(op) = pending_op {
        tokens.push(op);
    }
    tokens
}

/// Translate one comparator into `semver` syntax. `None` means "any version".
fn translate(token: &str) -> std::result::Result<Option<String>, String> {
    let op = OPERATORS
        .iter()
        .find(|op| token.starts_with(**op))
        .copied()
        .unwrap_or("");
    let rest = token[op.len()..].trim();
    let rest = rest.strip_prefix('v').unwrap_or(rest);

    let version = truncate_wildcards(rest)?;
    if version.is_empty() {
        return match op {
            ">" | "<" => Err(format!("'{token}' can never match")),
            _ => Ok(None),
        };
    }

    let op = if op.is_empty() { "=" } else { op };
    Ok(Some(format!("{op}{version}")))
}

/// Drop build metadata and cut the version at the first `x`, `X` or `*`
/// component. A truncated version loses its prerelease.
fn truncate_wildcards(v: &str) -> std::result::Result<String, String> {
    let v = v.split_once('+').map_or(v, |(core, _)| core);
    let (core, pre) = match v.split_once('-') {
        Some((core, pre)) => (core, Some(pre)),
        None => (v, None),
    };
    if core.is_empty() {
        return Ok(String::new());
    }

    let parts: Vec<&str> = core.split('.').collect();
    if parts.len() > 3 {
        return Err(format!("'{v}' has too many components"));
    }
    let kept: Vec<&str> = parts
        .iter()
        .take_while(|p| !matches!(**p, "x" | "X" | "*"))
        .copied()
        .collect();

    let mut out = kept.join(".");
    if kept.len() == 3 {
        if let Some(pre) = pre {
            out.push('-');
            out.push_str(pre);
        }
    }
    Ok(out)
}
