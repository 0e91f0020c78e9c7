//! Install ordering for locked manifests.
//!
//! Edges run from dependency to dependent, so Kahn's algorithm emits every
//! package after everything it depends on. Ready nodes are taken in the
//! order they were first seen in the manifest.

use std::collections::{HashMap, VecDeque};

use crate::identity::PackageId;
use crate::manifest::LockedManifest;

/// Dependency graph of one manifest, in discovery order.
pub struct InstallGraph {
    nodes: Vec<PackageId>,
    index: HashMap<PackageId, usize>,
    /// Node to the nodes that depend on it.
    dependents: Vec<Vec<usize>>,
    in_degree: Vec<usize>,
}

impl InstallGraph {
    /// Build the graph. Packages named only as someone's dependency are
    /// still nodes.
    pub fn from_manifest(manifest: &LockedManifest) -> Self {
        let mut graph = InstallGraph {
            nodes: Vec::new(),
            index: HashMap::new(),
            dependents: Vec::new(),
            in_degree: Vec::new(),
        };

        for locked in &manifest.dependencies {
            let dependent = graph.node(&locked.package);
            for child in &locked.dependencies {
                let dependency = graph.node(child);
                graph.dependents[dependency].push(dependent);
                graph.in_degree[dependent] += 1;
            }
        }

        graph
    }

    fn node(&mut self, id: &PackageId) -> usize {
        if let Some(&i) = self.index.get(id) {
            return i;
        }
        let i = self.nodes.len();
        self.nodes.push(id.clone());
        self.index.insert(id.clone(), i);
        self.dependents.push(Vec::new());
        self.in_degree.push(0);
        i
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Topological order via Kahn's algorithm.
    ///
    /// Nodes caught in a cycle never reach in-degree zero and are left out,
    /// so a cyclic manifest yields a shorter order instead of an error.
    pub fn order(&self) -> Vec<PackageId> {
        let mut in_degree = self.in_degree.clone();
        let mut queue: VecDeque<usize> = (0..self.nodes.len())
            .filter(|&i| in_degree[i] == 0)
            .collect();
        let mut result = Vec::with_capacity(self.nodes.len());

        while let Some(i) = queue.pop_front() {
            result.push(self.nodes[i].clone());
            for &dependent in &self.dependents[i] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    queue.push_back(dependent);
                }
            }
        }

        if result.len() < self.nodes.len() {
            tracing::warn!(
                expected = self.nodes.len(),
                ordered = result.len(),
                "install order is incomplete; manifest contains a cycle"
            );
        }
        result
    }
}

/// Install order for a manifest: dependencies before dependents.
pub fn install_order(manifest: &LockedManifest) -> Vec<PackageId> {
    InstallGraph::from_manifest(manifest).order()
}
