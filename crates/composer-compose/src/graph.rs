//! Dependency graph management using `petgraph`.
//!
//! Builds a directed graph from the services' `depends_on` lists. Edges
//! point from a dependency to its dependent, so a service's incoming edges
//! are exactly the services it waits for.

use std::collections::{BTreeMap, BTreeSet};

use composer_common::error::{ComposerError, Result};
use petgraph::Direction;
use petgraph::graph::NodeIndex;

use crate::model::CompositionSpec;

/// A dependency graph over service names.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// Internal petgraph representation.
    graph: petgraph::Graph<String, ()>,
    /// Node lookup by service name.
    nodes: BTreeMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Creates an empty dependency graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            graph: petgraph::Graph::new(),
            nodes: BTreeMap::new(),
        }
    }

    /// Builds the graph of a composition.
    ///
    /// # Errors
    ///
    /// Returns [`ComposerError::UnknownDependency`] for the first service,
    /// in name order, that lists a dependency absent from the composition.
    pub fn build(spec: &CompositionSpec) -> Result<Self> {
        let mut graph = Self::new();
        for name in spec.service_names() {
            let _ = graph.add_service(name);
        }
        for service in spec.services.values() {
            let dependent = graph.nodes[&service.name];
            for dependency in &service.depends_on {
                let Some(&dep_idx) = graph.nodes.get(dependency) else {
                    return Err(ComposerError::UnknownDependency {
                        service: service.name.clone(),
                        dependency: dependency.clone(),
                    });
                };
                graph.add_dependency(dependent, dep_idx);
            }
        }
        tracing::debug!(
            services = graph.graph.node_count(),
            edges = graph.graph.edge_count(),
            "dependency graph built"
        );
        Ok(graph)
    }

    /// Adds a service node, returning the existing node if already present.
    pub fn add_service(&mut self, name: impl Into<String>) -> NodeIndex {
        let name = name.into();
        if let Some(&idx) = self.nodes.get(&name) {
            return idx;
        }
        let idx = self.graph.add_node(name.clone());
        let _ = self.nodes.insert(name, idx);
        idx
    }

    /// Adds a dependency edge: `dependent` depends on `dependency`.
    ///
    /// Adding the same edge twice has no effect.
    pub fn add_dependency(&mut self, dependent: NodeIndex, dependency: NodeIndex) {
        let _ = self.graph.update_edge(dependency, dependent, ());
    }

    /// Returns the number of services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns whether the graph has no services.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns whether a service is part of the graph.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Returns all service names in sorted order.
    pub fn service_names(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Returns the services `name` depends on, sorted.
    #[must_use]
    pub fn dependencies_of(&self, name: &str) -> Vec<&str> {
        let Some(&idx) = self.nodes.get(name) else {
            return Vec::new();
        };
        let mut names: Vec<&str> = self
            .graph
            .neighbors_directed(idx, Direction::Incoming)
            .map(|n| self.graph[n].as_str())
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    /// Returns the requested services plus all their transitive dependencies.
    ///
    /// # Errors
    ///
    /// Returns [`ComposerError::UnknownService`] if a requested name is not
    /// in the graph.
    pub fn closure<S: AsRef<str>>(&self, requested: &[S]) -> Result<BTreeSet<String>> {
        let mut selected = BTreeSet::new();
        let mut stack = Vec::with_capacity(requested.len());
        for name in requested {
            let name = name.as_ref();
            if !self.contains(name) {
                return Err(ComposerError::UnknownService { name: name.into() });
            }
            stack.push(name);
        }
        while let Some(name) = stack.pop() {
            if selected.insert(name.to_string()) {
                stack.extend(self.dependencies_of(name));
            }
        }
        Ok(selected)
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_str;

    #[test]
    fn empty_graph_has_no_services() {
        let graph = DependencyGraph::new();
        assert!(graph.is_empty());
        assert_eq!(graph.service_names().count(), 0);
    }

    #[test]
    fn add_service_is_idempotent() {
        let mut graph = DependencyGraph::new();
        let a = graph.add_service("api");
        let b = graph.add_service("api");
        assert_eq!(a, b);
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn edges_point_from_dependency_to_dependent() {
        let mut graph = DependencyGraph::new();
        let web = graph.add_service("web");
        let db = graph.add_service("db");
        graph.add_dependency(web, db);
        graph.add_dependency(web, db);

        assert_eq!(graph.dependencies_of("web"), vec!["db"]);
        assert!(graph.dependencies_of("db").is_empty());
    }

    #[test]
    fn build_rejects_unknown_dependency() {
        let spec = load_str(
            r"
services:
  web:
    image: nginx
    depends_on: [ghost]
",
        )
        .expect("load");
        let err = DependencyGraph::build(&spec).unwrap_err();
        match err {
            ComposerError::UnknownDependency {
                service,
                dependency,
            } => {
                assert_eq!(service, "web");
                assert_eq!(dependency, "ghost");
            }
            other => panic!("expected UnknownDependency, got {other:?}"),
        }
    }

    #[test]
    fn closure_pulls_in_transitive_dependencies() {
        let spec = load_str(
            r"
services:
  web:
    image: nginx
    depends_on: [api]
  api:
    image: node
    depends_on: [db]
  db:
    image: postgres
  docs:
    image: httpd
",
        )
        .expect("load");
        let graph = DependencyGraph::build(&spec).expect("graph");
        let selected = graph.closure(&["web"]).expect("closure");
        let names: Vec<&str> = selected.iter().map(String::as_str).collect();
        assert_eq!(names, vec!["api", "db", "web"]);
    }

    #[test]
    fn closure_rejects_unknown_service() {
        let graph = DependencyGraph::new();
        let err = graph.closure(&["nope"]).unwrap_err();
        assert!(matches!(err, ComposerError::UnknownService { name } if name == "nope"));
    }

    #[test]
    fn self_dependency_is_recorded() {
        let mut graph = DependencyGraph::new();
        let a = graph.add_service("a");
        graph.add_dependency(a, a);
        assert_eq!(graph.dependencies_of("a"), vec!["a"]);
    }
}
