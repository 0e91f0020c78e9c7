//! Dependency resolution with semantic versioning.
//!
//! Resolves the declared dependencies of a package version into exactly one
//! concrete version per transitive package. Each dependency gets the highest
//! non-yanked version satisfying its range; the first pick of a package wins
//! and every later constraint on that package must accept it.
//!
//! Resolution is all-or-nothing. Problems are collected as
//! [`ResolutionIssue`]s so a publisher sees every independent failure at
//! once; a failure inside one top-level dependency abandons the rest of that
//! branch, but the remaining top-level dependencies are still attempted.
//!
//! The walk uses an explicit work stack, so chain depth is bounded by heap,
//! not by the call stack.

use std::collections::{HashMap, HashSet};

use crate::catalog::{CatalogAccessor, DependencyDeclaration};
use crate::error::{IssueKind, RegistryError, ResolutionIssue, Result};
use crate::identity::PackageId;
use crate::integrity::Checksum;
use crate::manifest::LockedDependency;
use crate::version::{self, Version};

/// The outcome of a resolution run.
///
/// `dependencies` is populated only when `issues` is empty.
#[derive(Debug, Clone, Default)]
pub struct ResolutionResult {
    /// Flat list of locked dependencies, in discovery order.
    pub dependencies: Vec<LockedDependency>,
    /// Every problem found.
    pub issues: Vec<ResolutionIssue>,
}

impl ResolutionResult {
    pub fn is_resolved(&self) -> bool {
        self.issues.is_empty()
    }

    /// Convert into a `Result`, wrapping issues in
    /// [`RegistryError::ResolutionFailed`].
    pub fn into_result(self) -> Result<Vec<LockedDependency>> {
        if self.issues.is_empty() {
            Ok(self.dependencies)
        } else {
            Err(RegistryError::ResolutionFailed {
                issues: self.issues,
            })
        }
    }
}

/// Resolve the declared dependencies of `root` against the catalog.
///
/// `root` is the package being published; it heads every reported cycle
/// path. Catalog failures abort the run with an `Err`; dependency problems
/// are returned as issues.
pub fn resolve(
    root: &PackageId,
    declarations: &[DependencyDeclaration],
    catalog: &dyn CatalogAccessor,
) -> Result<ResolutionResult> {
    let mut ctx = Context::new(root, catalog);

    for decl in declarations {
        match ctx.enter(decl, &[])? {
            Step::Satisfied | Step::Failed => {}
            Step::Descend(frame) => ctx.walk(frame)?,
        }
    }

    if !ctx.issues.is_empty() {
        for issue in &ctx.issues {
            tracing::warn!(
                root = %root,
                package = %issue.package,
                kind = %issue.kind,
                "resolution issue: {}",
                issue.message
            );
        }
        return Ok(ResolutionResult {
            dependencies: Vec::new(),
            issues: ctx.issues,
        });
    }

    let dependencies = ctx.flatten()?;
    tracing::debug!(root = %root, count = dependencies.len(), "resolution converged");
    Ok(ResolutionResult {
        dependencies,
        issues: Vec::new(),
    })
}

struct Pick {
    version: Version,
    checksum: Checksum,
}

/// A package whose declarations are being walked.
struct Frame {
    /// `(package, constraint)` that led here; held in `visiting` while the
    /// frame is on the stack.
    key: (PackageId, String),
    pending: std::vec::IntoIter<DependencyDeclaration>,
}

enum Step {
    /// Already resolved to a compatible version.
    Satisfied,
    /// An issue was recorded; abandon the branch.
    Failed,
    /// Newly picked; walk its declarations.
    Descend(Frame),
}

/// Per-run state. Nothing here outlives one call to [`resolve`].
struct Context<'a> {
    root: &'a PackageId,
    catalog: &'a dyn CatalogAccessor,
    /// Package to index into `picks`.
    resolved: HashMap<PackageId, usize>,
    /// Picks in discovery order.
    picks: Vec<(PackageId, Pick)>,
    visiting: HashSet<(PackageId, String)>,
    issues: Vec<ResolutionIssue>,
}

impl<'a> Context<'a> {
    fn new(root: &'a PackageId, catalog: &'a dyn CatalogAccessor) -> Self {
        Context {
            root,
            catalog,
            resolved: HashMap::new(),
            picks: Vec::new(),
            visiting: HashSet::new(),
            issues: Vec::new(),
        }
    }

    /// Walk a top-level branch to completion or first failure.
    fn walk(&mut self, frame: Frame) -> Result<()> {
        let mut stack = vec![frame];

        loop {
            let Some(top) = stack.last_mut() else {
                return Ok(());
            };
            let Some(decl) = top.pending.next() else {
                if let Some(done) = stack.pop() {
                    self.visiting.remove(&done.key);
                }
                continue;
            };

            match self.enter(&decl, &stack)? {
                Step::Satisfied => {}
                Step::Descend(child) => stack.push(child),
                Step::Failed => {
                    for abandoned in stack.drain(..) {
                        self.visiting.remove(&abandoned.key);
                    }
                    return Ok(());
                }
            }
        }
    }

    /// Resolve one declaration reached through `ancestors`.
    fn enter(&mut self, decl: &DependencyDeclaration, ancestors: &[Frame]) -> Result<Step> {
        let package = &decl.package;
        let key = (package.clone(), decl.range.clone());

        if self.visiting.contains(&key) {
            let mut path = self.path_to(ancestors);
            path.push(package.clone());
            let rendered = path
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" -> ");
            self.fail(
                ResolutionIssue::new(
                    IssueKind::CircularDependency,
                    package.clone(),
                    format!("Circular dependency detected: {rendered}"),
                )
                .with_constraint(&decl.range)
                .with_path(path),
            );
            return Ok(Step::Failed);
        }

        let range = match version::parse_range(&decl.range) {
            Ok(range) => range,
            Err(e) => {
                self.fail(
                    ResolutionIssue::new(IssueKind::NotFound, package.clone(), e.to_string())
                        .with_constraint(&decl.range),
                );
                return Ok(Step::Failed);
            }
        };

        if let Some(&index) = self.resolved.get(package) {
            let existing = &self.picks[index].1.version;
            if range.matches(existing) {
                return Ok(Step::Satisfied);
            }
            let message = format!(
                "Version conflict for {package}: {existing} already resolved, but {range} is required"
            );
            self.fail(
                ResolutionIssue::new(IssueKind::VersionConflict, package.clone(), message)
                    .with_constraint(&decl.range),
            );
            return Ok(Step::Failed);
        }

        if !self.catalog.package_exists(package)? {
            self.fail(
                ResolutionIssue::new(
                    IssueKind::NotFound,
                    package.clone(),
                    format!("Package not found: {package}"),
                )
                .with_constraint(&decl.range),
            );
            return Ok(Step::Failed);
        }

        let mut available = self.catalog.list_available_versions(package)?;
        let Some(best) = version::max_satisfying(&available, &range) else {
            available.sort_by(version::total_cmp);
            let listed = if available.is_empty() {
                "none".to_string()
            } else {
                available
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            self.fail(
                ResolutionIssue::new(
                    IssueKind::NotFound,
                    package.clone(),
                    format!("No version of {package} satisfies {range}. Available: {listed}"),
                )
                .with_constraint(&decl.range),
            );
            return Ok(Step::Failed);
        };

        // The available list can be stale by the time the record is read.
        let Some(record) = self.catalog.version_record(package, &best)? else {
            self.fail(
                ResolutionIssue::new(
                    IssueKind::NotFound,
                    package.clone(),
                    format!("Version {best} of {package} not found"),
                )
                .with_constraint(&decl.range),
            );
            return Ok(Step::Failed);
        };
        if record.is_yanked() {
            self.fail(
                ResolutionIssue::new(
                    IssueKind::Yanked,
                    package.clone(),
                    format!("{package}@{best} has been yanked"),
                )
                .with_constraint(&decl.range),
            );
            return Ok(Step::Failed);
        }

        tracing::debug!(package = %package, range = %range, version = %best, "picked version");
        self.resolved.insert(package.clone(), self.picks.len());
        self.picks.push((
            package.clone(),
            Pick {
                version: best.clone(),
                checksum: record.checksum,
            },
        ));

        let children = self.catalog.declared_dependencies(package, &best)?;
        self.visiting.insert(key.clone());
        Ok(Step::Descend(Frame {
            key,
            pending: children.into_iter(),
        }))
    }

    /// Root followed by every package on the stack.
    fn path_to(&self, ancestors: &[Frame]) -> Vec<PackageId> {
        std::iter::once(self.root.clone())
            .chain(ancestors.iter().map(|f| f.key.0.clone()))
            .collect()
    }

    fn fail(&mut self, issue: ResolutionIssue) {
        self.issues.push(issue);
    }

    fn flatten(&self) -> Result<Vec<LockedDependency>> {
        self.picks
            .iter()
            .map(|(package, pick)| {
                let dependencies = self
                    .catalog
                    .declared_dependencies(package, &pick.version)?
                    .into_iter()
                    .map(|d| d.package)
                    .collect();
                Ok(LockedDependency {
                    package: package.clone(),
                    version: pick.version.clone(),
                    checksum: pick.checksum.clone(),
                    dependencies,
                })
            })
            .collect()
    }
}
