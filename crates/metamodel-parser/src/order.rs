//! Dependency graph and emission ordering
//!
//! An edge `source -> target` means the source can only be emitted once the
//! target has been. Ordering peels off, round by round, every node that has
//! no outstanding outgoing edge.

use indexmap::{IndexMap, IndexSet};
use std::collections::HashSet;

/// Node identifier (entity name)
pub type NodeId = String;

/// Dependency graph built while references are validated
///
/// Ordering never mutates the graph, so it stays queryable and can be
/// ordered again.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    /// All nodes in insertion order
    nodes: IndexSet<NodeId>,

    /// Forward edges: node -> nodes it depends on
    edges: IndexMap<NodeId, IndexSet<NodeId>>,
}

impl DependencyGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a graph with the given nodes and no edges
    pub fn with_nodes<I, S>(nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<NodeId>,
    {
        Self {
            nodes: nodes.into_iter().map(Into::into).collect(),
            edges: IndexMap::new(),
        }
    }

    /// Register a node
    pub fn add_node(&mut self, node: impl Into<NodeId>) {
        self.nodes.insert(node.into());
    }

    /// Record that `source` depends on `target`
    pub fn record_dependency(&mut self, source: impl Into<NodeId>, target: impl Into<NodeId>) {
        self.edges
            .entry(source.into())
            .or_default()
            .insert(target.into());
    }

    /// Get all nodes in insertion order
    pub fn nodes(&self) -> Vec<&NodeId> {
        self.nodes.iter().collect()
    }

    /// Get the recorded edges
    pub fn edges(&self) -> &IndexMap<NodeId, IndexSet<NodeId>> {
        &self.edges
    }

    /// Get immediate dependencies of a node
    pub fn dependencies(&self, node: &str) -> Vec<&NodeId> {
        self.edges
            .get(node)
            .map(|targets| targets.iter().collect())
            .unwrap_or_default()
    }

    /// Get immediate dependents of a node
    pub fn dependents(&self, node: &str) -> Vec<&NodeId> {
        self.edges
            .iter()
            .filter(|(_, targets)| targets.contains(node))
            .map(|(source, _)| source)
            .collect()
    }

    /// Number of recorded edges
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(IndexSet::len).sum()
    }

    /// Compute the emission order of all nodes
    pub fn compute_order(&self) -> Result<Vec<NodeId>, CycleDetected> {
        compute_order(self.nodes.iter().map(String::as_str), &self.edges)
    }
}

/// No progress could be made while ordering
///
/// `unresolved` holds every node that is part of, or depends on, a cycle
/// (or on a target that is not a node at all).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "Cyclic references detected. Could not order {} of {} objects (done: [{}], unresolved: [{}])",
    .unresolved.len(),
    .resolved.len() + .unresolved.len(),
    .resolved.join(", "),
    .unresolved.join(", ")
)]
pub struct CycleDetected {
    /// Nodes placed before ordering stalled, in emission order
    pub resolved: Vec<NodeId>,

    /// Nodes that could not be placed, in input order
    pub unresolved: Vec<NodeId>,
}

impl CycleDetected {
    /// Multi-line description for terminal output
    pub fn diagnostic(&self) -> String {
        let mut lines = Vec::new();
        lines.push("These objects are done:".to_string());
        lines.extend(self.resolved.iter().map(|n| format!("  {n}")));
        lines.push("These objects could not be ordered:".to_string());
        lines.extend(self.unresolved.iter().map(|n| format!("  {n}")));
        lines.join("\n")
    }
}

/// Order `nodes` so that every edge target precedes its source
///
/// Runs in rounds against out-degree: each round emits every node with no
/// remaining outgoing edge, in input order, then drops edges pointing at the
/// nodes just emitted. Edges whose source is not a node are ignored; an edge
/// to a target that is not a node can never be satisfied.
pub fn compute_order<'a, I>(
    nodes: I,
    edges: &IndexMap<NodeId, IndexSet<NodeId>>,
) -> Result<Vec<NodeId>, CycleDetected>
where
    I: IntoIterator<Item = &'a str>,
{
    // Arena of names; node ids come first, unknown targets after them
    let mut names: IndexSet<&str> = nodes.into_iter().collect();
    let node_count = names.len();

    let mut outgoing: Vec<HashSet<usize>> = vec![HashSet::new(); node_count];
    for (source, targets) in edges {
        let Some(source_id) = names.get_index_of(source.as_str()) else {
            continue;
        };
        if source_id >= node_count {
            continue;
        }
        for target in targets {
            let (target_id, _) = names.insert_full(target.as_str());
            outgoing[source_id].insert(target_id);
        }
    }

    let mut order: Vec<usize> = Vec::with_capacity(node_count);
    let mut remaining: Vec<usize> = (0..node_count).collect();

    while !remaining.is_empty() {
        let (ready, blocked): (Vec<usize>, Vec<usize>) =
            remaining.into_iter().partition(|&id| outgoing[id].is_empty());

        if ready.is_empty() {
            return Err(CycleDetected {
                resolved: order.iter().map(|&id| names[id].to_string()).collect(),
                unresolved: blocked.iter().map(|&id| names[id].to_string()).collect(),
            });
        }

        let emitted: HashSet<usize> = ready.iter().copied().collect();
        for &id in &blocked {
            outgoing[id].retain(|target| !emitted.contains(target));
        }

        order.extend(ready);
        remaining = blocked;
    }

    Ok(order.into_iter().map(|id| names[id].to_string()).collect())
}
