//! Update Scheduler
//!
//! Nodes pull their children on `update()`, so a single call on the root of
//! a graph is enough to bring it up to date. The scheduler is the
//! orchestrated alternative: it discovers everything reachable from a set of
//! roots and updates each node exactly once, children before parents.
//!
//! # Algorithm
//!
//! 1. Walk the input wiring from the roots and record every edge
//!    child -> parent.
//! 2. Sort the discovered nodes topologically (Kahn's algorithm). Nodes left
//!    over once the queue drains sit on a cycle, which is reported as an
//!    error before anything is updated.
//! 3. Update nodes in order. Each parent re-polls its children, which are
//!    already current and return `false`; the parent still notices their new
//!    revision and recomputes.
//!
//! Step 3 relies on revision tracking. A node switched to
//! [`ChangeTracking::OneShot`](crate::node::ChangeTracking) only sees the
//! boolean of its own poll and misses children the scheduler updated first.

use std::collections::{HashMap, VecDeque};

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{NodeError, Result};
use crate::node::NodeRef;

use super::node::{GraphNode, NodeId};

/// The update scheduler holds the discovered graph and coordinates passes.
#[derive(Debug, Default)]
pub struct UpdateScheduler {
    /// All nodes in the graph, indexed by ID, in discovery order.
    nodes: IndexMap<NodeId, GraphNode>,
    roots: Vec<NodeId>,
}

impl UpdateScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a scheduler over everything reachable from `roots`.
    pub fn from_roots<'a>(roots: impl IntoIterator<Item = &'a NodeRef>) -> Self {
        let mut scheduler = Self::new();
        for root in roots {
            scheduler.add_root(root);
        }
        scheduler
    }

    /// Add a root and discover its subgraph.
    ///
    /// The wiring is captured as it is now; rewiring node inputs afterwards
    /// requires calling this again (or building a new scheduler).
    pub fn add_root(&mut self, root: &NodeRef) {
        if !self.roots.contains(&root.id()) {
            self.roots.push(root.id());
        }

        let mut stack = vec![root.clone()];
        while let Some(node) = stack.pop() {
            let id = node.id();
            if self.nodes.contains_key(&id) {
                continue;
            }
            let children = node.children();
            self.nodes.insert(id, GraphNode::new(node));

            for child in children {
                self.add_edge(child.id(), id);
                if !self.nodes.contains_key(&child.id()) {
                    stack.push(child);
                }
            }
        }
        self.relink();
    }

    /// Record `dependent` polling `dependency`. Endpoints not yet discovered
    /// are linked once they are.
    fn add_edge(&mut self, dependency: NodeId, dependent: NodeId) {
        if let Some(dep_node) = self.nodes.get_mut(&dependency) {
            dep_node.add_dependent(dependent);
        }
        if let Some(dependent_node) = self.nodes.get_mut(&dependent) {
            dependent_node.add_dependency(dependency);
        }
    }

    /// Complete the reverse edges towards children discovered after their
    /// parents.
    fn relink(&mut self) {
        let edges: Vec<(NodeId, NodeId)> = self
            .nodes
            .values()
            .flat_map(|node| {
                let parent = node.id();
                node.dependencies().iter().map(move |&child| (child, parent))
            })
            .collect();
        for (child, parent) in edges {
            if let Some(child_node) = self.nodes.get_mut(&child) {
                child_node.add_dependent(parent);
            }
        }
    }

    pub fn get_node(&self, node_id: NodeId) -> Option<&GraphNode> {
        self.nodes.get(&node_id)
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Get the total number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Nodes in update order: every child before all of its parents.
    pub fn order(&self) -> Result<Vec<NodeId>> {
        let mut in_degree: HashMap<NodeId, usize> = HashMap::new();
        let mut result = Vec::with_capacity(self.nodes.len());
        let mut queue = VecDeque::new();

        for (&node_id, node) in &self.nodes {
            let degree = node.dependencies().len();
            in_degree.insert(node_id, degree);
            if degree == 0 {
                queue.push_back(node_id);
            }
        }

        // Kahn's algorithm
        while let Some(node_id) = queue.pop_front() {
            result.push(node_id);

            if let Some(node) = self.nodes.get(&node_id) {
                for &dependent_id in node.dependents() {
                    if let Some(degree) = in_degree.get_mut(&dependent_id) {
                        *degree = degree.saturating_sub(1);
                        if *degree == 0 {
                            queue.push_back(dependent_id);
                        }
                    }
                }
            }
        }

        if result.len() < self.nodes.len() {
            let stuck = self
                .nodes
                .keys()
                .find(|id| in_degree.get(id).is_some_and(|&d| d > 0))
                .copied()
                .unwrap_or_default();
            return Err(NodeError::Cycle { node: stuck.raw() });
        }
        Ok(result)
    }

    /// Update every node once in dependency order.
    ///
    /// Returns the nodes that recomputed, in the order they did. The first
    /// failing node aborts the pass with its error.
    pub fn update_all(&self) -> Result<Vec<NodeId>> {
        let order = self.order()?;
        let mut recomputed = Vec::new();
        for id in order {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            if node.node().update()? {
                recomputed.push(id);
            }
        }
        debug!(
            nodes = self.nodes.len(),
            recomputed = recomputed.len(),
            "scheduled pass finished"
        );
        Ok(recomputed)
    }
}
