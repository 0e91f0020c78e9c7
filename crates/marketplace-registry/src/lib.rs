//! Package registry core for the content marketplace.
//!
//! Publishers push versioned, namespaced packages that declare semver-range
//! dependencies on other packages. At publish time the registry resolves
//! those ranges into one concrete, checksummed version per transitive
//! package and stores the result as an immutable locked manifest.
//!
//! # Architecture
//!
//! - **Version matching** ([`version`]): ranges, satisfaction, precedence
//! - **Catalog** ([`catalog`], [`store`]): typed records, the read-only
//!   accessor the resolver uses, and the local filesystem store
//! - **Namespace gate** ([`namespace`]): who may publish into or view a namespace
//! - **Resolution** ([`resolution`]): the dependency resolver
//! - **Manifests** ([`manifest`], [`install_order`]): locked manifest
//!   verification and install ordering
//! - **Lifecycle** ([`lifecycle`]): yank and unyank
//! - **Publishing** ([`publish`], [`descriptor`]): the end-to-end publish flow
//!
//! Published content is immutable; yanking is the only retraction.

pub mod catalog;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod identity;
pub mod install_order;
pub mod integrity;
pub mod lifecycle;
pub mod manifest;
pub mod namespace;
pub mod publish;
pub mod resolution;
pub mod store;
pub mod version;

// Re-exports for convenience.
pub use catalog::{
    CatalogAccessor, DependencyDeclaration, Namespace, Package, PackageVersion, Protection,
    VersionState,
};
pub use config::RegistryConfig;
pub use descriptor::{request_from_toml, PackageDescriptor};
pub use error::{IssueKind, RegistryError, ResolutionIssue, Result};
pub use identity::{ActorId, PackageId};
pub use install_order::install_order;
pub use integrity::{Checksum, ContentCheck};
pub use lifecycle::{unyank, yank};
pub use manifest::{verify, LockedDependency, LockedManifest, Verification};
pub use namespace::{NamespaceGate, NamespaceUpdate};
pub use publish::{publish, PublishOptions, PublishRequest};
pub use resolution::{resolve, ResolutionResult};
pub use store::{LocalRegistry, RegistryStore};
pub use version::{parse_range, parse_version, Version, VersionRange};
