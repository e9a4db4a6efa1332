//! Update Context
//!
//! Two pieces of state live here:
//!
//! - The update stack: a thread-local record of which nodes are currently
//!   inside `update()`. Entering a node that is already on the stack means
//!   the wiring contains a cycle, and the update fails instead of recursing
//!   forever.
//!
//! - The view a recomputation body gets of its node: [`Context`] for reading
//!   inputs and change information, [`Publisher`] for staging outputs. Staged
//!   outputs are committed by the update driver only when the body succeeds.

use std::cell::RefCell;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::emf::EmfData;
use crate::error::{NodeError, Result};
use crate::graph::NodeId;

use super::handle::NodeRef;
use super::registry::VariableRegistry;
use super::value::{Matrix, Table, Value};

thread_local! {
    static UPDATE_STACK: RefCell<Vec<NodeId>> = const { RefCell::new(Vec::new()) };
}

/// Guard that keeps a node on the update stack until dropped.
pub(crate) struct UpdateFrame {
    node: NodeId,
}

impl UpdateFrame {
    /// Push `node` onto the update stack, failing if it is already there.
    pub(crate) fn enter(node: NodeId) -> Result<Self> {
        UPDATE_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.contains(&node) {
                return Err(NodeError::Cycle { node: node.raw() });
            }
            stack.push(node);
            Ok(Self { node })
        })
    }

    /// Number of nodes currently updating on this thread.
    pub(crate) fn depth() -> usize {
        UPDATE_STACK.with(|stack| stack.borrow().len())
    }
}

impl Drop for UpdateFrame {
    fn drop(&mut self) {
        UPDATE_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();
            debug_assert_eq!(
                popped,
                Some(self.node),
                "update stack mismatch: expected {:?}, got {:?}",
                self.node,
                popped
            );
        });
    }
}

/// Read access to a node's variables during recomputation.
pub struct Context<'a> {
    kind: &'static str,
    vars: &'a VariableRegistry,
    changed_children: &'a [String],
}

impl<'a> Context<'a> {
    pub(crate) fn new(
        kind: &'static str,
        vars: &'a VariableRegistry,
        changed_children: &'a [String],
    ) -> Self {
        Self {
            kind,
            vars,
            changed_children,
        }
    }

    /// Whether input `name` changed in this pass, either because it was
    /// written or because the child node it holds recomputed. Fails for
    /// names that are not declared inputs.
    pub fn changed(&self, name: &str) -> Result<bool> {
        let written = self.vars.is_changed(name)?;
        Ok(written || self.changed_children.iter().any(|child| child == name))
    }

    /// Whether any input was written since the last update.
    pub fn any_input_written(&self) -> bool {
        self.vars.is_any_changed()
    }

    /// Raw value of an input, which may be [`Value::Unset`].
    pub fn raw(&self, name: &str) -> Result<&'a Value> {
        self.vars.read_input(name)
    }

    /// Value of an input that must be set.
    pub fn input(&self, name: &str) -> Result<&'a Value> {
        let value = self.vars.read_input(name)?;
        if value.is_unset() {
            return Err(NodeError::MissingCollaborator {
                node: self.kind,
                variable: name.to_string(),
            });
        }
        Ok(value)
    }

    /// Last published value of one of the node's own outputs.
    pub fn previous(&self, name: &str) -> Result<&'a Value> {
        self.vars.read_output(name)
    }

    pub fn scalar(&self, name: &str) -> Result<f64> {
        self.input(name)?.expect_scalar(name)
    }

    pub fn array(&self, name: &str) -> Result<Arc<Vec<f64>>> {
        self.input(name)?.expect_array(name)
    }

    pub fn matrix(&self, name: &str) -> Result<Arc<Matrix>> {
        self.input(name)?.expect_matrix(name)
    }

    pub fn table(&self, name: &str) -> Result<Arc<Table>> {
        self.input(name)?.expect_table(name)
    }

    pub fn node(&self, name: &str) -> Result<NodeRef> {
        self.input(name)?.expect_node(name)
    }

    /// A node-valued input that may legitimately be left unset.
    pub fn optional_node(&self, name: &str) -> Result<Option<NodeRef>> {
        match self.raw(name)? {
            Value::Unset => Ok(None),
            value => value.expect_node(name).map(Some),
        }
    }

    pub fn emf(&self, name: &str) -> Result<Arc<EmfData>> {
        self.input(name)?.expect_emf(name)
    }
}

/// Staging area for the outputs a recomputation body publishes.
pub struct Publisher<'a> {
    vars: &'a VariableRegistry,
    staged: IndexMap<String, Value>,
}

impl<'a> Publisher<'a> {
    pub(crate) fn new(vars: &'a VariableRegistry) -> Self {
        Self {
            vars,
            staged: IndexMap::new(),
        }
    }

    /// Stage a new value for output `name`.
    pub fn publish(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        if !self.vars.has_output(name) {
            return Err(NodeError::unknown(name));
        }
        self.staged.insert(name.to_string(), value.into());
        Ok(())
    }

    pub(crate) fn into_staged(self) -> IndexMap<String, Value> {
        self.staged
    }
}
