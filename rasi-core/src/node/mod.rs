//! Calculator Nodes
//!
//! Every computed quantity is a node with named inputs and named outputs.
//! Nodes are wired into a dependency graph by storing one node in another
//! node's input, and a node recomputes its outputs only when something it
//! depends on has changed.
//!
//! # Concepts
//!
//! ## Variables
//!
//! Each node owns a [`VariableRegistry`]: input slots written by drivers,
//! output slots written only by the node's own recomputation body, and one
//! change flag per input. Writing an input always sets its flag.
//!
//! ## Updates
//!
//! [`NodeRef::update`] polls the node's children, decides whether anything
//! changed and, if so, runs the node's [`Calculator`] once. It returns
//! whether the node recomputed, so calling it twice in a row without
//! touching any input yields `true` then `false`.
//!
//! ## Composites
//!
//! A composite is a node whose inputs hold other nodes. Children are polled
//! in declaration order before the parent decides whether to recompute; the
//! body then reads the children's current outputs.
//!
//! # Example
//!
//! ```rust,ignore
//! use rasi_core::node::{Config, NodeRef};
//! use rasi_core::rates::TabulatedTimeConstants;
//! use rasi_core::experiments::StaticTdds4State;
//!
//! let rates = NodeRef::with_config(TabulatedTimeConstants, Config::new().with("values", table))?;
//! let tdds = NodeRef::with_config(
//!     StaticTdds4State,
//!     Config::new().with("microscopic_rate_calculator", &rates),
//! )?;
//!
//! tdds.update()?;
//! let tauc = tdds.scalar("tauc")?;
//! ```

mod config;
mod context;
mod handle;
mod registry;
mod value;

pub use config::Config;
pub use context::{Context, Publisher};
pub use handle::{Calculator, ChangeTracking, NodeRef};
pub use registry::{check_reserved, VariableRegistry, AGGREGATE_FLAG, CHANGED_PREFIX, INTERNAL_PREFIX};
pub use value::{Curve, Matrix, Table, Value};
