//! Dependency Graph
//!
//! The graph formed by calculator nodes holding other nodes in their inputs.
//!
//! # Overview
//!
//! - Nodes are calculator nodes, identified by [`NodeId`]
//! - Edges are input wiring: if input `I` of node `A` holds node `B`, there
//!   is an edge from `B` to `A`
//!
//! Nodes do not need the graph to update; each one pulls its own children.
//! [`UpdateScheduler`] materialises the graph when a caller wants a single
//! ordered pass over many roots, or wants cycles reported up front.

mod node;
mod scheduler;

pub use node::{GraphNode, NodeId};
pub use scheduler::UpdateScheduler;
