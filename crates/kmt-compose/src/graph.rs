//! Dependency graph of a resolved service set, using `petgraph`.
//!
//! Orders resolved services so that dependencies come before the services
//! depending on them. Cycles are legal in a resolved set (two services may
//! depend on each other with compatible ranges); members of a cycle are
//! grouped together instead of failing the ordering.

use std::collections::HashMap;

use petgraph::graph::NodeIndex;

use crate::resolver::ResolvedServices;

/// A dependency graph of resolved services.
#[derive(Debug)]
pub struct DependencyGraph {
    /// Edges point from a dependent to its dependency.
    graph: petgraph::Graph<String, ()>,
}

impl DependencyGraph {
    /// Creates an empty dependency graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            graph: petgraph::Graph::new(),
        }
    }

    /// Builds the graph of a resolved set.
    ///
    /// Only dependencies present in the set become edges.
    #[must_use]
    pub fn from_resolved(resolved: &ResolvedServices) -> Self {
        let mut graph = Self::new();
        let nodes: HashMap<&str, NodeIndex> = resolved
            .keys()
            .map(|name| (name.as_str(), graph.add_service(name.as_str())))
            .collect();
        for service in resolved.values() {
            for dependency in &service.dependencies {
                if let (Some(&dependent), Some(&target)) = (
                    nodes.get(service.name.as_str()),
                    nodes.get(dependency.name.as_str()),
                ) {
                    graph.add_dependency(dependent, target);
                }
            }
        }
        graph
    }

    /// Adds a service node to the graph.
    pub fn add_service(&mut self, name: impl Into<String>) -> NodeIndex {
        self.graph.add_node(name.into())
    }

    /// Adds a dependency edge: `dependent` depends on `dependency`.
    pub fn add_dependency(&mut self, dependent: NodeIndex, dependency: NodeIndex) {
        let _ = self.graph.update_edge(dependent, dependency, ());
    }

    /// Returns the strongly connected groups, dependencies first.
    ///
    /// Each group holds a single service unless services depend on each
    /// other; names inside a group are sorted.
    #[must_use]
    pub fn ordered_groups(&self) -> Vec<Vec<String>> {
        petgraph::algo::tarjan_scc(&self.graph)
            .into_iter()
            .map(|component| {
                let mut names: Vec<String> = component
                    .iter()
                    .filter_map(|&idx| self.graph.node_weight(idx).cloned())
                    .collect();
                names.sort();
                names
            })
            .collect()
    }

    /// Returns every service, dependencies before their dependents.
    #[must_use]
    pub fn resolve_order(&self) -> Vec<String> {
        self.ordered_groups().into_iter().flatten().collect()
    }

    /// Returns the groups of services that depend on each other.
    #[must_use]
    pub fn cycles(&self) -> Vec<Vec<String>> {
        self.ordered_groups()
            .into_iter()
            .filter(|group| group.len() > 1)
            .collect()
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}
