//! Batched start plans.
//!
//! A [`StartPlan`] layers the dependency graph with Kahn's algorithm: each
//! batch holds every service whose dependencies all sit in earlier batches.
//! Services within a batch may start concurrently and are kept name-sorted
//! so plans are reproducible.

use std::collections::{BTreeMap, BTreeSet};

use composer_common::error::{ComposerError, Result};
use petgraph::graphmap::DiGraphMap;
use serde::Serialize;

use crate::graph::DependencyGraph;

/// Ordered batches of services to start.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StartPlan {
    batches: Vec<Vec<String>>,
}

impl StartPlan {
    /// Computes the plan for every service of the graph.
    ///
    /// # Errors
    ///
    /// Returns [`ComposerError::CyclicDependency`] if the graph has a cycle.
    pub fn compute(graph: &DependencyGraph) -> Result<Self> {
        let all: BTreeSet<String> = graph.service_names().map(String::from).collect();
        Self::compute_for(graph, &all)
    }

    /// Computes the plan for a subset of the graph.
    ///
    /// Only edges between selected services are considered; callers pass a
    /// set closed under dependencies (see [`DependencyGraph::closure`]).
    ///
    /// # Errors
    ///
    /// Returns [`ComposerError::UnknownService`] if a selected name is not in
    /// the graph, or [`ComposerError::CyclicDependency`] naming the services
    /// on a cycle.
    pub fn compute_for(graph: &DependencyGraph, selection: &BTreeSet<String>) -> Result<Self> {
        let mut in_degree: BTreeMap<&str, usize> = BTreeMap::new();
        let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for name in selection {
            if !graph.contains(name) {
                return Err(ComposerError::UnknownService { name: name.clone() });
            }
            let deps = graph
                .dependencies_of(name)
                .into_iter()
                .filter(|dep| selection.contains(*dep))
                .collect::<Vec<_>>();
            let _ = in_degree.insert(name.as_str(), deps.len());
            for dep in deps {
                dependents.entry(dep).or_default().push(name.as_str());
            }
        }

        let mut batches = Vec::new();
        while !in_degree.is_empty() {
            let batch: Vec<&str> = in_degree
                .iter()
                .filter(|&(_, &degree)| degree == 0)
                .map(|(&name, _)| name)
                .collect();
            if batch.is_empty() {
                return Err(cycle_error(graph, &in_degree));
            }
            for name in &batch {
                let _ = in_degree.remove(name);
                for dependent in dependents.get(name).into_iter().flatten() {
                    if let Some(degree) = in_degree.get_mut(dependent) {
                        *degree -= 1;
                    }
                }
            }
            batches.push(batch.into_iter().map(String::from).collect());
        }

        let plan = Self { batches };
        tracing::info!(batches = plan.len(), services = plan.service_count(), "start plan computed");
        Ok(plan)
    }

    /// Returns the batches in start order.
    #[must_use]
    pub fn batches(&self) -> &[Vec<String>] {
        &self.batches
    }

    /// Returns the number of batches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    /// Returns whether the plan starts nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Returns the total number of services in the plan.
    #[must_use]
    pub fn service_count(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }

    /// Returns all services in start order.
    pub fn services(&self) -> impl Iterator<Item = &str> {
        self.batches.iter().flatten().map(String::as_str)
    }

    /// Returns the index of the batch containing `name`.
    #[must_use]
    pub fn batch_index(&self, name: &str) -> Option<usize> {
        self.batches
            .iter()
            .position(|batch| batch.iter().any(|s| s == name))
    }
}

/// Names the services on a cycle among the services that could not be placed.
///
/// Nodes left over by Kahn's algorithm are either on a cycle or downstream of
/// one; only strongly connected components with more than one member, or a
/// self-dependency, are actual cycles.
fn cycle_error(graph: &DependencyGraph, remaining: &BTreeMap<&str, usize>) -> ComposerError {
    let mut stuck: DiGraphMap<&str, ()> = DiGraphMap::new();
    for &name in remaining.keys() {
        let _ = stuck.add_node(name);
        for dep in graph.dependencies_of(name) {
            if remaining.contains_key(dep) {
                let _ = stuck.add_edge(dep, name, ());
            }
        }
    }

    let mut services: Vec<String> = petgraph::algo::tarjan_scc(&stuck)
        .into_iter()
        .filter(|scc| scc.len() > 1 || scc.first().is_some_and(|&n| stuck.contains_edge(n, n)))
        .flatten()
        .map(String::from)
        .collect();
    services.sort_unstable();

    tracing::warn!(?services, "cyclic dependency detected");
    ComposerError::CyclicDependency { services }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_str;

    fn plan_for(yaml: &str) -> Result<StartPlan> {
        let spec = load_str(yaml).expect("load");
        let graph = DependencyGraph::build(&spec)?;
        StartPlan::compute(&graph)
    }

    fn cycle_members(err: ComposerError) -> Vec<String> {
        match err {
            ComposerError::CyclicDependency { services } => services,
            other => panic!("expected CyclicDependency, got {other:?}"),
        }
    }

    #[test]
    fn empty_graph_gives_empty_plan() {
        let plan = StartPlan::compute(&DependencyGraph::new()).expect("plan");
        assert!(plan.is_empty());
    }

    #[test]
    fn independent_services_share_one_sorted_batch() {
        let plan = plan_for(
            r"
services:
  c: { image: busybox }
  a: { image: busybox }
  b: { image: busybox }
",
        )
        .expect("plan");
        assert_eq!(plan.batches(), &[vec!["a", "b", "c"]]);
    }

    #[test]
    fn web_starts_after_db() {
        let plan = plan_for(
            r"
services:
  web:
    image: nginx
    depends_on: [db]
  db:
    image: postgres
    depends_on: []
",
        )
        .expect("plan");
        assert_eq!(plan.batches(), &[vec!["db"], vec!["web"]]);
    }

    #[test]
    fn diamond_dependency() {
        let plan = plan_for(
            r"
services:
  a: { image: x, depends_on: [b, c] }
  b: { image: x, depends_on: [d] }
  c: { image: x, depends_on: [d] }
  d: { image: x }
",
        )
        .expect("plan");
        assert_eq!(plan.batches(), &[vec!["d"], vec!["b", "c"], vec!["a"]]);
    }

    #[test]
    fn two_node_cycle_names_both() {
        let err = plan_for(
            r"
services:
  a: { image: x, depends_on: [b] }
  b: { image: x, depends_on: [a] }
",
        )
        .unwrap_err();
        assert_eq!(cycle_members(err), vec!["a", "b"]);
    }

    #[test]
    fn cycle_excludes_downstream_services() {
        let err = plan_for(
            r"
services:
  a: { image: x, depends_on: [c] }
  b: { image: x, depends_on: [a] }
  c: { image: x, depends_on: [b] }
  web: { image: x, depends_on: [a] }
  db: { image: x }
",
        )
        .unwrap_err();
        assert_eq!(cycle_members(err), vec!["a", "b", "c"]);
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let err = plan_for(
            r"
services:
  loop: { image: x, depends_on: [loop] }
",
        )
        .unwrap_err();
        assert_eq!(cycle_members(err), vec!["loop"]);
    }

    #[test]
    fn selection_restricts_plan() {
        let spec = load_str(
            r"
services:
  web: { image: x, depends_on: [db] }
  db: { image: x }
  docs: { image: x }
",
        )
        .expect("load");
        let graph = DependencyGraph::build(&spec).expect("graph");
        let selection = graph.closure(&["web"]).expect("closure");
        let plan = StartPlan::compute_for(&graph, &selection).expect("plan");
        assert_eq!(plan.batches(), &[vec!["db"], vec!["web"]]);
        assert_eq!(plan.batch_index("docs"), None);
    }

    #[test]
    fn recomputing_is_idempotent() {
        let spec = load_str(
            r"
services:
  web: { image: x, depends_on: [api, cache] }
  api: { image: x, depends_on: [db] }
  cache: { image: x }
  db: { image: x }
  worker: { image: x, depends_on: [db, cache] }
",
        )
        .expect("load");
        let graph = DependencyGraph::build(&spec).expect("graph");
        let first = StartPlan::compute(&graph).expect("plan");
        let second = StartPlan::compute(&DependencyGraph::build(&spec).expect("graph"))
            .expect("plan");
        assert_eq!(first, second);
    }

    /// Builds pseudo-random DAGs (edges only towards lower indices) and
    /// checks that every dependency lands in a strictly earlier batch.
    #[test]
    fn dependencies_always_precede_dependents() {
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = move || {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            seed
        };

        for _ in 0..50 {
            let size = usize::try_from(next() % 12).expect("small") + 1;
            let mut graph = DependencyGraph::new();
            let nodes: Vec<_> = (0..size)
                .map(|i| graph.add_service(format!("svc{i:02}")))
                .collect();
            let mut edges = Vec::new();
            for i in 1..size {
                for j in 0..i {
                    if next() % 3 == 0 {
                        graph.add_dependency(nodes[i], nodes[j]);
                        edges.push((format!("svc{i:02}"), format!("svc{j:02}")));
                    }
                }
            }

            let plan = StartPlan::compute(&graph).expect("acyclic graph must plan");
            assert_eq!(plan.service_count(), size);
            let unique: BTreeSet<&str> = plan.services().collect();
            assert_eq!(unique.len(), size, "service placed twice: {plan:?}");
            for (dependent, dependency) in &edges {
                let a = plan.batch_index(dependent).expect("dependent placed");
                let b = plan.batch_index(dependency).expect("dependency placed");
                assert!(b < a, "{dependency} must precede {dependent}: {plan:?}");
            }
            for batch in plan.batches() {
                let mut sorted = batch.clone();
                sorted.sort();
                assert_eq!(&sorted, batch);
            }
        }
    }
}
