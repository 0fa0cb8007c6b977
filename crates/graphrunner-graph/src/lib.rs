//! Step dependency graph (spec §4.4): a DAG where an edge `a -> b` means
//! *b depends on a*. Built once per run from the declared steps;
//! exposes roots, dependents, and a cursor the scheduler drives forward
//! as steps terminate.
//!
//! Grounded on the teacher's `connection::graph` module
//! (`map_connections_by_destination`, `topological_sort`): same
//! in-degree/Kahn's-algorithm shape, generalized from "sort everything up
//! front" to "advance incrementally as the caller reports terminations",
//! since the scheduler needs to interleave graph progress with async step
//! execution rather than consume a precomputed order.

mod error;

use std::collections::{HashMap, HashSet, VecDeque};

pub use error::GraphError;
use graphrunner_model::Step;

/// The step dependency DAG. Immutable once built.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    ids: Vec<String>,
    depends_on: HashMap<String, Vec<String>>,
    dependents: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    /// Build the graph from a run's declared steps, rejecting unknown
    /// dependency references and cycles (spec §4.4).
    pub fn build(steps: &[Step]) -> Result<Self, GraphError> {
        let ids: Vec<String> = steps.iter().map(|s| s.id.clone()).collect();
        let id_set: HashSet<&str> = ids.iter().map(|s| s.as_str()).collect();

        let mut seen = HashSet::new();
        for id in &ids {
            if !seen.insert(id.clone()) {
                return Err(GraphError::DuplicateStepId(id.clone()));
            }
        }

        let mut depends_on: HashMap<String, Vec<String>> = HashMap::new();
        let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
        for id in &ids {
            depends_on.entry(id.clone()).or_default();
            dependents.entry(id.clone()).or_default();
        }

        for step in steps {
            for dep in &step.depends_on {
                if !id_set.contains(dep.as_str()) {
                    return Err(GraphError::UnknownDependency(step.id.clone(), dep.clone()));
                }
                depends_on.get_mut(&step.id).unwrap().push(dep.clone());
                dependents.get_mut(dep).unwrap().push(step.id.clone());
            }
        }

        let graph = DependencyGraph {
            ids,
            depends_on,
            dependents,
        };
        graph.check_acyclic()?;
        Ok(graph)
    }

    fn check_acyclic(&self) -> Result<(), GraphError> {
        let mut in_degree: HashMap<&str, usize> = self
            .ids
            .iter()
            .map(|id| (id.as_str(), self.depends_on[id].len()))
            .collect();

        let mut queue: VecDeque<&str> = in_degree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(id, _)| *id)
            .collect();

        let mut visited = 0usize;
        while let Some(id) = queue.pop_front() {
            visited += 1;
            for dependent in &self.dependents[id] {
                let deg = in_degree.get_mut(dependent.as_str()).unwrap();
                *deg -= 1;
                if *deg == 0 {
                    queue.push_back(dependent.as_str());
                }
            }
        }

        if visited != self.ids.len() {
            let cyclic: Vec<String> = in_degree
                .into_iter()
                .filter(|(_, deg)| *deg > 0)
                .map(|(id, _)| id.to_string())
                .collect();
            return Err(GraphError::CyclicDependency(cyclic));
        }
        Ok(())
    }

    /// Steps with no dependencies — runnable before anything else terminates.
    pub fn roots(&self) -> Vec<&str> {
        self.ids
            .iter()
            .filter(|id| self.depends_on[id.as_str()].is_empty())
            .map(|id| id.as_str())
            .collect()
    }

    /// Steps that directly depend on `id`.
    pub fn dependents_of(&self, id: &str) -> &[String] {
        self.dependents
            .get(id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Steps `id` directly depends on.
    pub fn dependencies_of(&self, id: &str) -> &[String] {
        self.depends_on.get(id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn step_ids(&self) -> &[String] {
        &self.ids
    }

    /// A fresh cursor for walking the graph as steps terminate.
    pub fn cursor(&self) -> TopologicalCursor<'_> {
        let remaining = self
            .ids
            .iter()
            .map(|id| (id.clone(), self.depends_on[id].len()))
            .collect();
        TopologicalCursor {
            graph: self,
            remaining,
        }
    }
}

/// Tracks, as the caller reports step terminations, which steps become
/// runnable. A step is runnable once every dependency has reached *any*
/// terminal status (spec §4.4: "in any terminal status").
pub struct TopologicalCursor<'g> {
    graph: &'g DependencyGraph,
    remaining: HashMap<String, usize>,
}

impl<'g> TopologicalCursor<'g> {
    /// Steps runnable with no prior terminations: the graph's roots.
    pub fn initial_runnable(&self) -> Vec<&str> {
        self.graph.roots()
    }

    /// Report that `id` has reached a terminal status. Returns the ids of
    /// any dependents that have just become runnable (all of their
    /// dependencies are now terminal).
    pub fn mark_terminal(&mut self, id: &str) -> Vec<String> {
        let mut newly_runnable = Vec::new();
        for dependent in self.graph.dependents_of(id) {
            if let Some(count) = self.remaining.get_mut(dependent) {
                *count -= 1;
                if *count == 0 {
                    newly_runnable.push(dependent.clone());
                }
            }
        }
        newly_runnable
    }
}
