//! Graph Nodes
//!
//! Identity of calculator nodes and the adjacency the scheduler builds over
//! them.

use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexSet;

use crate::node::NodeRef;

/// Unique identifier for a node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// A calculator node as seen by the scheduler.
#[derive(Debug)]
pub struct GraphNode {
    node: NodeRef,

    /// Children: nodes held in this node's inputs.
    dependencies: IndexSet<NodeId>,

    /// Parents: nodes holding this node in one of their inputs.
    dependents: IndexSet<NodeId>,
}

impl GraphNode {
    pub fn new(node: NodeRef) -> Self {
        Self {
            node,
            dependencies: IndexSet::new(),
            dependents: IndexSet::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.node.id()
    }

    pub fn node(&self) -> &NodeRef {
        &self.node
    }

    /// Add a dependency (a child this node polls).
    pub fn add_dependency(&mut self, node_id: NodeId) {
        self.dependencies.insert(node_id);
    }

    pub fn dependencies(&self) -> &IndexSet<NodeId> {
        &self.dependencies
    }

    /// Add a dependent (a parent that polls this node).
    pub fn add_dependent(&mut self, node_id: NodeId) {
        self.dependents.insert(node_id);
    }

    pub fn dependents(&self) -> &IndexSet<NodeId> {
        &self.dependents
    }

    /// Leaves have no children.
    pub fn is_leaf(&self) -> bool {
        self.dependencies.is_empty()
    }
}
