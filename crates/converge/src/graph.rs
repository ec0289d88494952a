//! Dependency graph with cycle-safe topological ordering
//!
//! Nodes are plain string ids. Each node keeps two edge lists: outgoing
//! (the nodes it depends on) and incoming (the nodes that depend on it).
//! The graph knows nothing about resources; the orchestrator builds one
//! instance per traversal direction.

use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Errors raised by graph mutation and traversal
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// An edge or query referenced a node that was never added
    #[error("unknown node: {0}")]
    UnknownNode(String),

    /// A traversal revisited a node on its own path
    ///
    /// The path starts and ends with the repeated node.
    #[error("dependency cycle: {}", .0.join(" -> "))]
    Cycle(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EdgeDirection {
    Outgoing,
    Incoming,
}

/// Directed graph over string ids
///
/// Node iteration follows insertion order, so orderings are deterministic
/// for a given sequence of mutations.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: Vec<String>,
    outgoing: HashMap<String, Vec<String>>,
    incoming: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate node ids in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(String::as_str)
    }

    /// Add a node; does nothing if it already exists
    pub fn add_node(&mut self, id: impl Into<String>) {
        let id = id.into();
        if self.outgoing.contains_key(&id) {
            return;
        }
        self.outgoing.insert(id.clone(), Vec::new());
        self.incoming.insert(id.clone(), Vec::new());
        self.nodes.push(id);
    }

    /// Remove a node and every edge touching it; does nothing if absent
    pub fn remove_node(&mut self, id: &str) {
        if self.outgoing.remove(id).is_none() {
            return;
        }
        self.incoming.remove(id);
        self.nodes.retain(|n| n != id);

        for edges in self
            .outgoing
            .values_mut()
            .chain(self.incoming.values_mut())
        {
            edges.retain(|n| n != id);
        }
    }

    /// Check if a node exists
    pub fn has_node(&self, id: &str) -> bool {
        self.outgoing.contains_key(id)
    }

    /// Record that `from` depends on `to`
    ///
    /// Both nodes must exist. Adding the same edge twice has no effect.
    pub fn add_dependency(&mut self, from: &str, to: &str) -> Result<(), GraphError> {
        self.require(from)?;
        self.require(to)?;

        if let Some(edges) = self.outgoing.get_mut(from)
            && !edges.iter().any(|n| n == to)
        {
            edges.push(to.to_string());
        }
        if let Some(edges) = self.incoming.get_mut(to)
            && !edges.iter().any(|n| n == from)
        {
            edges.push(from.to_string());
        }
        Ok(())
    }

    /// Remove the edge `from -> to` if present
    pub fn remove_dependency(&mut self, from: &str, to: &str) {
        if let Some(edges) = self.outgoing.get_mut(from) {
            edges.retain(|n| n != to);
        }
        if let Some(edges) = self.incoming.get_mut(to) {
            edges.retain(|n| n != from);
        }
    }

    /// Nodes that `node` depends on directly
    pub fn direct_dependencies_of(&self, node: &str) -> Result<&[String], GraphError> {
        self.require(node)?;
        Ok(self.edges(node, EdgeDirection::Outgoing))
    }

    /// Nodes that depend on `node` directly
    pub fn direct_dependants_of(&self, node: &str) -> Result<&[String], GraphError> {
        self.require(node)?;
        Ok(self.edges(node, EdgeDirection::Incoming))
    }

    /// Transitive dependencies of `node`, dependencies first
    ///
    /// With `leaves_only`, only nodes that have no dependencies of their own
    /// are returned.
    pub fn dependencies_of(&self, node: &str, leaves_only: bool) -> Result<Vec<String>, GraphError> {
        self.closure(node, EdgeDirection::Outgoing, leaves_only)
    }

    /// Transitive dependants of `node`, the furthest dependants first
    ///
    /// With `leaves_only`, only nodes that nothing else depends on are
    /// returned.
    pub fn dependants_of(&self, node: &str, leaves_only: bool) -> Result<Vec<String>, GraphError> {
        self.closure(node, EdgeDirection::Incoming, leaves_only)
    }

    /// Check the whole graph for cycles
    ///
    /// Every node is used as a starting point, so a cycle in a component
    /// without roots is still found.
    pub fn validate(&self) -> Result<(), GraphError> {
        let mut finished = HashSet::new();
        let mut discard = Vec::new();
        for node in &self.nodes {
            let mut path = Vec::new();
            self.walk(
                node,
                EdgeDirection::Outgoing,
                &mut path,
                &mut finished,
                &mut discard,
            )?;
        }
        Ok(())
    }

    /// Order every node so that each appears after all of its dependencies
    ///
    /// The graph is validated first; a cycle anywhere fails the call before
    /// any order is produced. Traversal starts from nodes with no dependants,
    /// in insertion order, so disconnected subgraphs are all covered.
    pub fn overall_order(&self, leaves_only: bool) -> Result<Vec<String>, GraphError> {
        self.validate()?;

        let mut visited = HashSet::new();
        let mut order = Vec::with_capacity(self.nodes.len());
        for root in self.nodes.iter().filter(|n| {
            self.edges(n, EdgeDirection::Incoming).is_empty()
        }) {
            let mut path = Vec::new();
            self.walk(
                root,
                EdgeDirection::Outgoing,
                &mut path,
                &mut visited,
                &mut order,
            )?;
        }

        if leaves_only {
            order.retain(|n| self.edges(n, EdgeDirection::Outgoing).is_empty());
        }
        Ok(order)
    }

    fn require(&self, id: &str) -> Result<(), GraphError> {
        if self.has_node(id) {
            Ok(())
        } else {
            Err(GraphError::UnknownNode(id.to_string()))
        }
    }

    fn edges(&self, node: &str, direction: EdgeDirection) -> &[String] {
        let map = match direction {
            EdgeDirection::Outgoing => &self.outgoing,
            EdgeDirection::Incoming => &self.incoming,
        };
        map.get(node).map(Vec::as_slice).unwrap_or_default()
    }

    fn closure(
        &self,
        node: &str,
        direction: EdgeDirection,
        leaves_only: bool,
    ) -> Result<Vec<String>, GraphError> {
        let (start, _) = self
            .outgoing
            .get_key_value(node)
            .ok_or_else(|| GraphError::UnknownNode(node.to_string()))?;

        let mut path = Vec::new();
        let mut visited = HashSet::new();
        let mut result = Vec::new();
        self.walk(start, direction, &mut path, &mut visited, &mut result)?;

        // Post-order emission puts the start node last
        result.pop();
        if leaves_only {
            result.retain(|n| self.edges(n, direction).is_empty());
        }
        Ok(result)
    }

    /// Depth-first walk emitting nodes in post-order
    fn walk<'a>(
        &'a self,
        node: &'a str,
        direction: EdgeDirection,
        path: &mut Vec<&'a str>,
        visited: &mut HashSet<&'a str>,
        out: &mut Vec<String>,
    ) -> Result<(), GraphError> {
        if let Some(start) = path.iter().position(|n| *n == node) {
            let mut cycle: Vec<String> = path[start..].iter().map(|n| (*n).to_string()).collect();
            cycle.push(node.to_string());
            return Err(GraphError::Cycle(cycle));
        }
        if visited.contains(node) {
            return Ok(());
        }

        path.push(node);
        for next in self.edges(node, direction) {
            self.walk(next, direction, path, visited, out)?;
        }
        path.pop();

        visited.insert(node);
        out.push(node.to_string());
        Ok(())
    }
}
