//! Variable Registry
//!
//! Per-node storage of named input and output slots plus one change flag per
//! input.
//!
//! # Access rules
//!
//! - Inputs are written by drivers through [`VariableRegistry::write_input`].
//!   Every write sets the input's change flag, even when the new value equals
//!   the old one.
//! - Outputs are only written through the protected channel
//!   ([`VariableRegistry::write_output_internal`]), which the update driver
//!   uses to commit what a recomputation body published.
//! - Input and output names are disjoint, and no name may collide with the
//!   reserved attribute-style names understood by [`VariableRegistry::lookup`].

use indexmap::IndexMap;

use crate::error::{ConfigurationError, NodeError, Result};

use super::handle::NodeRef;
use super::value::Value;

/// Prefix reserved for the protected output-write channel.
pub const INTERNAL_PREFIX: &str = "internal_";

/// Prefix reserved for per-variable change queries.
pub const CHANGED_PREFIX: &str = "changed_";

/// Name reserved for the aggregate change flag.
pub const AGGREGATE_FLAG: &str = "changed";

/// Reject names that collide with the reserved lookup vocabulary.
pub fn check_reserved(name: &str) -> Result<(), ConfigurationError> {
    let reason = if name.starts_with(INTERNAL_PREFIX) {
        "names starting with 'internal_' are reserved"
    } else if name.starts_with(CHANGED_PREFIX) {
        "names starting with 'changed_' are reserved"
    } else if name == AGGREGATE_FLAG {
        "'changed' is the aggregate change flag"
    } else {
        return Ok(());
    };
    Err(ConfigurationError::ReservedName {
        name: name.to_string(),
        reason,
    })
}

#[derive(Debug)]
struct InputSlot {
    value: Value,
    changed: bool,
    required: bool,
    /// Revision of the child node held in this slot when it was last consumed.
    seen_revision: Option<u64>,
}

/// Named input/output slots of one node.
#[derive(Debug, Default)]
pub struct VariableRegistry {
    inputs: IndexMap<String, InputSlot>,
    outputs: IndexMap<String, Value>,
}

impl VariableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_new(&self, name: &str) -> Result<()> {
        check_reserved(name)?;
        if self.inputs.contains_key(name) || self.outputs.contains_key(name) {
            return Err(ConfigurationError::Duplicate {
                name: name.to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn insert_input(&mut self, name: &str, value: Value, required: bool) -> Result<()> {
        self.check_new(name)?;
        let seen_revision = value.as_node().map(NodeRef::revision);
        self.inputs.insert(
            name.to_string(),
            InputSlot {
                value,
                changed: false,
                required,
                seen_revision,
            },
        );
        Ok(())
    }

    /// Register an input slot with an initial value. Its change flag starts
    /// cleared.
    pub fn declare_input(&mut self, name: &str, initial: impl Into<Value>) -> Result<()> {
        self.insert_input(name, initial.into(), false)
    }

    /// Register an input slot that must be written before the node can
    /// update. It starts [`Value::Unset`].
    pub fn require_input(&mut self, name: &str) -> Result<()> {
        self.insert_input(name, Value::Unset, true)
    }

    /// Register an output slot.
    pub fn declare_output(&mut self, name: &str, initial: impl Into<Value>) -> Result<()> {
        self.check_new(name)?;
        self.outputs.insert(name.to_string(), initial.into());
        Ok(())
    }

    pub fn has_input(&self, name: &str) -> bool {
        self.inputs.contains_key(name)
    }

    pub fn has_output(&self, name: &str) -> bool {
        self.outputs.contains_key(name)
    }

    /// Input names in declaration order.
    pub fn input_names(&self) -> impl Iterator<Item = &str> {
        self.inputs.keys().map(String::as_str)
    }

    /// Output names in declaration order.
    pub fn output_names(&self) -> impl Iterator<Item = &str> {
        self.outputs.keys().map(String::as_str)
    }

    /// Current value of an input or output.
    pub fn read(&self, name: &str) -> Result<&Value> {
        self.inputs
            .get(name)
            .map(|slot| &slot.value)
            .or_else(|| self.outputs.get(name))
            .ok_or_else(|| NodeError::unknown(name))
    }

    pub fn read_input(&self, name: &str) -> Result<&Value> {
        self.inputs
            .get(name)
            .map(|slot| &slot.value)
            .ok_or_else(|| NodeError::unknown(name))
    }

    pub fn read_output(&self, name: &str) -> Result<&Value> {
        self.outputs.get(name).ok_or_else(|| NodeError::unknown(name))
    }

    /// Assign an input and mark it changed.
    pub fn write_input(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let Some(slot) = self.inputs.get_mut(name) else {
            if self.outputs.contains_key(name) {
                return Err(ConfigurationError::OutputWrite {
                    name: name.to_string(),
                }
                .into());
            }
            return Err(NodeError::unknown(name));
        };
        slot.value = value.into();
        slot.changed = true;
        slot.seen_revision = None;
        Ok(())
    }

    /// Protected channel: set an output without touching any change flag.
    pub(crate) fn write_output_internal(&mut self, name: &str, value: Value) -> Result<()> {
        let slot = self
            .outputs
            .get_mut(name)
            .ok_or_else(|| NodeError::unknown(name))?;
        *slot = value;
        Ok(())
    }

    /// Whether input `name` was written since the last update.
    pub fn is_changed(&self, name: &str) -> Result<bool> {
        self.inputs
            .get(name)
            .map(|slot| slot.changed)
            .ok_or_else(|| NodeError::unknown(name))
    }

    /// OR over all input change flags.
    pub fn is_any_changed(&self) -> bool {
        self.inputs.values().any(|slot| slot.changed)
    }

    /// Attribute-style access.
    ///
    /// `changed` yields the aggregate flag, `changed_<x>` the flag of input
    /// `<x>`, and any other name reads the variable itself.
    pub fn lookup(&self, name: &str) -> Result<Value> {
        if name == AGGREGATE_FLAG {
            return Ok(Value::Bool(self.is_any_changed()));
        }
        if let Some(variable) = name.strip_prefix(CHANGED_PREFIX) {
            return self.is_changed(variable).map(Value::Bool);
        }
        self.read(name).cloned()
    }

    /// First required input still unset, if any.
    pub(crate) fn missing_required(&self) -> Option<&str> {
        self.inputs
            .iter()
            .find(|(_, slot)| slot.required && slot.value.is_unset())
            .map(|(name, _)| name.as_str())
    }

    /// Node-valued inputs in declaration order, with the revision last
    /// consumed from each.
    pub(crate) fn children(&self) -> Vec<(String, NodeRef, Option<u64>)> {
        self.inputs
            .iter()
            .filter_map(|(name, slot)| {
                slot.value
                    .as_node()
                    .map(|node| (name.clone(), node.clone(), slot.seen_revision))
            })
            .collect()
    }

    /// Clear every change flag and remember the current revision of each
    /// child as consumed.
    pub(crate) fn settle(&mut self) {
        for slot in self.inputs.values_mut() {
            slot.changed = false;
            slot.seen_revision = slot.value.as_node().map(NodeRef::revision);
        }
    }
}
