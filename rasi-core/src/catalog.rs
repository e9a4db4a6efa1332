//! Node Catalog
//!
//! Construction of nodes by kind name, for drivers that assemble graphs from
//! data (JSON files, the Python bindings).

use crate::emf::EmfPositionInterpolator;
use crate::error::{ConfigurationError, Result};
use crate::experiments::StaticTdds4State;
use crate::lineshape::{
    ClassicalLineShape, DiscreteLineShape, SchmidtOverlaps, SmearedLineShape, TabulatedOverlaps,
};
use crate::nmp::{ColdCarrierTransition, FullNmpTransition};
use crate::node::{Config, NodeRef};
use crate::rates::{RateCalculator4State, TabulatedTimeConstants};

/// Every kind [`build`] understands.
pub const KINDS: &[&str] = &[
    "ClassicalLineShape",
    "TabulatedOverlaps",
    "SchmidtOverlaps",
    "DiscreteLineShape",
    "SmearedLineShape",
    "EmfPositionInterpolator",
    "FullNmpTransition",
    "ColdCarrierTransition",
    "RateCalculator4State",
    "TabulatedTimeConstants",
    "StaticTdds4State",
];

/// Construct a node of kind `kind` with initial inputs from `config`.
pub fn build(kind: &str, config: Config) -> Result<NodeRef> {
    match kind {
        "ClassicalLineShape" => NodeRef::with_config(ClassicalLineShape, config),
        "TabulatedOverlaps" => NodeRef::with_config(TabulatedOverlaps, config),
        "SchmidtOverlaps" => NodeRef::with_config(SchmidtOverlaps, config),
        "DiscreteLineShape" => NodeRef::with_config(DiscreteLineShape, config),
        "SmearedLineShape" => NodeRef::with_config(SmearedLineShape, config),
        "EmfPositionInterpolator" => NodeRef::with_config(EmfPositionInterpolator, config),
        "FullNmpTransition" => NodeRef::with_config(FullNmpTransition, config),
        "ColdCarrierTransition" => NodeRef::with_config(ColdCarrierTransition, config),
        "RateCalculator4State" => NodeRef::with_config(RateCalculator4State, config),
        "TabulatedTimeConstants" => NodeRef::with_config(TabulatedTimeConstants, config),
        "StaticTdds4State" => NodeRef::with_config(StaticTdds4State, config),
        _ => Err(ConfigurationError::UnknownKind(kind.to_string()).into()),
    }
}

/// Construct a node from a JSON object of initial inputs.
pub fn build_json(kind: &str, json: &str) -> Result<NodeRef> {
    build(kind, Config::from_json_str(json)?)
}
