//! Nodes and the Update Contract
//!
//! A node pairs a [`VariableRegistry`] with a [`Calculator`], the
//! node-specific recomputation body. Drivers and parent nodes hold it through
//! a shared [`NodeRef`].
//!
//! # The update contract
//!
//! `update()` is the only state transition a node exposes:
//!
//! 1. If a required input is still unset, fail with a missing-collaborator
//!    error. No change flag is consumed, so a retry fails the same way.
//! 2. Poll every child node (node-valued input) in declaration order.
//! 3. Recompute if any input was written or any child changed. Otherwise
//!    return `false` without running the body.
//! 4. Run the body once. Outputs it publishes are committed only if it
//!    succeeds.
//! 5. Clear all change flags, whether or not the body succeeded.
//!
//! # Change tracking
//!
//! How a parent decides that a child changed depends on [`ChangeTracking`].
//! With revisions (the default), each successful recomputation bumps the
//! node's revision and every parent slot remembers the revision it consumed,
//! so a child shared by two parents is seen as changed by both. The one-shot
//! mode trusts only the boolean returned by `child.update()`, so the second
//! parent polling a shared child in the same pass sees no change.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::{ConfigurationError, NodeError, Result};
use crate::graph::NodeId;

use super::config::Config;
use super::context::{Context, Publisher, UpdateFrame};
use super::registry::{check_reserved, VariableRegistry};
use super::value::Value;

/// The recomputation body of a node.
pub trait Calculator: Send + 'static {
    /// Type name used in logs and error messages.
    fn kind(&self) -> &'static str;

    /// Declare the node's input and output slots.
    fn declare(&self, vars: &mut VariableRegistry) -> Result<()>;

    /// Read inputs from `cx` and publish outputs through `out`.
    fn recompute(&mut self, cx: &Context<'_>, out: &mut Publisher<'_>) -> Result<()>;
}

/// How a parent detects that a child node changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChangeTracking {
    /// Compare the child's revision with the one last consumed.
    #[default]
    Revision,
    /// Use the boolean returned by the child's `update()` only.
    OneShot,
}

/// A node: declared variables plus the body that recomputes its outputs.
struct Node {
    id: NodeId,
    kind: &'static str,
    vars: VariableRegistry,
    calculator: Box<dyn Calculator>,
    revision: Arc<AtomicU64>,
    tracking: ChangeTracking,
}

impl Node {
    fn update(&mut self) -> Result<bool> {
        if let Some(variable) = self.vars.missing_required() {
            return Err(NodeError::MissingCollaborator {
                node: self.kind,
                variable: variable.to_string(),
            });
        }

        let mut changed_children = Vec::new();
        for (name, child, seen) in self.vars.children() {
            let polled = child.update()?;
            let changed = match self.tracking {
                ChangeTracking::OneShot => polled,
                ChangeTracking::Revision => polled || seen != Some(child.revision()),
            };
            trace!(node = self.kind, child = %name, polled, changed, "polled child");
            if changed {
                changed_children.push(name);
            }
        }

        if !self.vars.is_any_changed() && changed_children.is_empty() {
            trace!(node = self.kind, id = self.id.raw(), "nothing changed");
            return Ok(false);
        }

        let result = {
            let cx = Context::new(self.kind, &self.vars, &changed_children);
            let mut out = Publisher::new(&self.vars);
            self.calculator
                .recompute(&cx, &mut out)
                .map(|()| out.into_staged())
        };
        self.vars.settle();

        let staged = result.inspect_err(|err| {
            debug!(node = self.kind, id = self.id.raw(), error = %err, "recomputation failed");
        })?;
        for (name, value) in staged {
            self.vars.write_output_internal(&name, value)?;
        }
        let revision = self.revision.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(
            node = self.kind,
            id = self.id.raw(),
            revision,
            depth = UpdateFrame::depth(),
            children = ?changed_children,
            "recomputed"
        );
        Ok(true)
    }
}

/// Shared handle to a node.
///
/// Cloning the handle shares the node; a child referenced by several parents
/// is the same node for all of them.
#[derive(Clone)]
pub struct NodeRef {
    id: NodeId,
    kind: &'static str,
    revision: Arc<AtomicU64>,
    inner: Arc<Mutex<Node>>,
}

impl NodeRef {
    /// Create a node with the calculator's declared initial values.
    pub fn new<C: Calculator>(calculator: C) -> Result<Self> {
        let kind = calculator.kind();
        let mut vars = VariableRegistry::new();
        calculator.declare(&mut vars)?;

        let id = NodeId::new();
        let revision = Arc::new(AtomicU64::new(0));
        let node = Node {
            id,
            kind,
            vars,
            calculator: Box::new(calculator),
            revision: Arc::clone(&revision),
            tracking: ChangeTracking::default(),
        };
        Ok(Self {
            id,
            kind,
            revision,
            inner: Arc::new(Mutex::new(node)),
        })
    }

    /// Create a node and assign the inputs named in `config`.
    ///
    /// Every key must be a declared input. Assigned inputs start out changed,
    /// so the first `update()` recomputes.
    pub fn with_config<C: Calculator>(calculator: C, config: Config) -> Result<Self> {
        let node = Self::new(calculator)?;
        {
            let mut inner = node.inner.lock();
            for (key, value) in config {
                check_reserved(&key)?;
                if inner.vars.has_output(&key) {
                    return Err(ConfigurationError::OutputWrite { name: key }.into());
                }
                if !inner.vars.has_input(&key) {
                    return Err(ConfigurationError::UnrecognizedKey {
                        node: node.kind,
                        key,
                    }
                    .into());
                }
                inner.vars.write_input(&key, value)?;
            }
        }
        Ok(node)
    }

    /// Switch how this node detects changes in its children.
    pub fn with_tracking(self, tracking: ChangeTracking) -> Self {
        self.inner.lock().tracking = tracking;
        self
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Number of successful recomputations so far.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Relaxed)
    }

    pub fn tracking(&self) -> ChangeTracking {
        self.inner.lock().tracking
    }

    /// Whether both handles refer to the same node.
    pub fn ptr_eq(&self, other: &NodeRef) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Bring the node's outputs up to date. Returns whether it recomputed.
    pub fn update(&self) -> Result<bool> {
        let _frame = UpdateFrame::enter(self.id)?;
        self.inner.lock().update()
    }

    /// Assign an input and mark it changed.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.inner.lock().vars.write_input(name, value)
    }

    /// Current value of an input or output.
    pub fn get(&self, name: &str) -> Result<Value> {
        self.inner.lock().vars.read(name).cloned()
    }

    /// Last published value of an output.
    pub fn output(&self, name: &str) -> Result<Value> {
        self.inner.lock().vars.read_output(name).cloned()
    }

    /// Output `name` as a scalar.
    pub fn scalar(&self, name: &str) -> Result<f64> {
        self.output(name)?.expect_scalar(name)
    }

    pub fn is_changed(&self, name: &str) -> Result<bool> {
        self.inner.lock().vars.is_changed(name)
    }

    pub fn is_any_changed(&self) -> bool {
        self.inner.lock().vars.is_any_changed()
    }

    /// Attribute-style access; see [`VariableRegistry::lookup`].
    pub fn lookup(&self, name: &str) -> Result<Value> {
        self.inner.lock().vars.lookup(name)
    }

    pub fn input_names(&self) -> Vec<String> {
        self.inner.lock().vars.input_names().map(String::from).collect()
    }

    pub fn output_names(&self) -> Vec<String> {
        self.inner.lock().vars.output_names().map(String::from).collect()
    }

    /// Child nodes currently wired into this node's inputs, in declaration
    /// order.
    pub fn children(&self) -> Vec<NodeRef> {
        self.inner
            .lock()
            .vars
            .children()
            .into_iter()
            .map(|(_, child, _)| child)
            .collect()
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.id.raw())
            .field("kind", &self.kind)
            .field("revision", &self.revision())
            .finish()
    }
}
