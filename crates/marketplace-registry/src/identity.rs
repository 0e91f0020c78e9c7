//! Package, namespace and actor identifiers.
//!
//! A package is addressed as `namespace.name`. Namespaces may themselves
//! contain dots (`featured.midjourney`), so the *last* segment is always the
//! package name and everything before it is the namespace.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, Result};

/// Globally unique package identity: `(namespace, name)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackageId {
    namespace: String,
    name: String,
}

impl PackageId {
    /// Build an id from its parts, validating both.
    pub fn new(namespace: &str, name: &str) -> Result<Self> {
        let id = format!("{namespace}.{name}");
        let invalid = |detail: &str| RegistryError::InvalidPackageId {
            id: id.clone(),
            detail: detail.to_string(),
        };

        if namespace.is_empty() {
            return Err(invalid("namespace is empty"));
        }
        if !namespace.split('.').all(is_valid_segment) {
            return Err(invalid(
                "namespace segments must be non-empty and use only a-z, 0-9 and '-'",
            ));
        }
        if !is_valid_segment(name) {
            return Err(invalid(
                "name must be non-empty and use only a-z, 0-9 and '-'",
            ));
        }

        Ok(PackageId {
            namespace: namespace.to_string(),
            name: name.to_string(),
        })
    }

    /// Parse `namespace.name`.
    pub fn parse(s: &str) -> Result<Self> {
        match s.rsplit_once('.') {
            Some((namespace, name)) => PackageId::new(namespace, name),
            None => Err(RegistryError::InvalidPackageId {
                id: s.to_string(),
                detail: "expected 'namespace.name'".to_string(),
            }),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

impl FromStr for PackageId {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        PackageId::parse(s)
    }
}

impl TryFrom<String> for PackageId {
    type Error = RegistryError;

    fn try_from(s: String) -> Result<Self> {
        PackageId::parse(&s)
    }
}

impl From<PackageId> for String {
    fn from(id: PackageId) -> String {
        id.to_string()
    }
}

/// The identity credential of whoever publishes, owns or yanks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(String);

impl ActorId {
    pub fn new(id: impl Into<String>) -> Self {
        ActorId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Check the namespace naming rules.
///
/// 2-256 characters of `a-z`, `0-9`, `.` and `-`; starts with a letter, ends
/// with a letter or digit, and never has two separators in a row.
pub fn validate_namespace_name(name: &str) -> Result<()> {
    let invalid = |detail: &str| RegistryError::InvalidNamespace {
        name: name.to_string(),
        detail: detail.to_string(),
    };

    if name.len() < 2 || name.len() > 256 {
        return Err(invalid("length must be between 2 and 256 characters"));
    }

    let bytes = name.as_bytes();
    if !bytes[0].is_ascii_lowercase() {
        return Err(invalid("must start with a lowercase letter"));
    }

    let last = bytes[bytes.len() - 1];
    if !(last.is_ascii_lowercase() || last.is_ascii_digit()) {
        return Err(invalid("must end with a letter or digit"));
    }

    let is_separator = |b: u8| b == b'.' || b == b'-';
    if !bytes
        .iter()
        .all(|&b| b.is_ascii_lowercase() || b.is_ascii_digit() || is_separator(b))
    {
        return Err(invalid("only a-z, 0-9, '.' and '-' are allowed"));
    }

    if bytes
        .windows(2)
        .any(|w| is_separator(w[0]) && is_separator(w[1]))
    {
        return Err(invalid("consecutive '.' or '-' characters are not allowed"));
    }

    Ok(())
}
