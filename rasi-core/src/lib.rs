//! RASI Core
//!
//! This crate provides an incremental calculator graph for computing charge
//! transition rates of defects at semiconductor interfaces. It implements:
//!
//! - Calculator nodes with named inputs, outputs and change tracking
//! - Demand-driven updates that short-circuit when nothing changed
//! - Lineshape, EMF and charge transfer models
//! - Four-state rate calculators and TDDS experiment observables
//! - Fit variables mapping parameters onto optimizer coordinates
//!
//! The crate is designed to be used both as a native Rust library and as a
//! Python extension module via PyO3 (feature `python`).
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `node`: Calculator nodes, variable registries and the update protocol
//! - `graph`: Dependency discovery and bulk updates in topological order
//! - `lineshape`, `emf`, `nmp`: Physics of the charge transfer reactions
//! - `rates`, `experiments`: The four-state defect model and its observables
//! - `fit`: Parameter scaling for optimizers
//! - `catalog`: Construction of nodes by kind name
//!
//! # Example
//!
//! ```rust,ignore
//! use rasi_core::catalog;
//! use rasi_core::node::Config;
//!
//! let rates = catalog::build_json("TabulatedTimeConstants", r#"{ "values": { ... } }"#)?;
//! let tdds = catalog::build(
//!     "StaticTdds4State",
//!     Config::new().with("microscopic_rate_calculator", &rates),
//! )?;
//!
//! assert!(tdds.update()?);   // first update computes
//! assert!(!tdds.update()?);  // nothing changed since
//!
//! rates.set("values", new_values)?;
//! assert!(tdds.update()?);   // child change propagates
//! ```

pub mod catalog;
pub mod constants;
pub mod emf;
pub mod error;
pub mod experiments;
pub mod fit;
pub mod graph;
pub mod lineshape;
pub mod nmp;
pub mod node;
pub mod rates;

#[cfg(feature = "python")]
mod python;

pub use error::{ConfigurationError, DomainError, FitError, NodeError, Result};
pub use node::{Calculator, Config, Context, NodeRef, Publisher, Value};
