//! Error Taxonomy
//!
//! Every fallible operation in the crate returns [`NodeError`]. The variants
//! follow the propagation policy of the calculator graph:
//!
//! - configuration and unknown-variable errors are raised eagerly, at
//!   declaration or access time, and never swallowed;
//! - a missing collaborator is reported by `update()` before any change
//!   flag is consumed, so retrying reports the same error again;
//! - domain errors that reach the caller are fatal inconsistencies between
//!   collaborators. Benign domain conditions are converted to a fallback
//!   inside the node that detects them and never show up here.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = NodeError> = std::result::Result<T, E>;

/// Top-level error for node construction, access and updates.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NodeError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("unknown variable '{name}'")]
    UnknownVariable { name: String },

    #[error("{node} cannot update: required input '{variable}' is not set")]
    MissingCollaborator { node: &'static str, variable: String },

    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("cyclic update: node {node} is already being updated")]
    Cycle { node: u64 },
}

impl NodeError {
    pub(crate) fn unknown(name: impl Into<String>) -> Self {
        Self::UnknownVariable { name: name.into() }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    pub fn is_unknown_variable(&self) -> bool {
        matches!(self, Self::UnknownVariable { .. })
    }

    pub fn is_missing_collaborator(&self) -> bool {
        matches!(self, Self::MissingCollaborator { .. })
    }

    pub fn is_domain(&self) -> bool {
        matches!(self, Self::Domain(_))
    }
}

/// Misuse of a node's variable surface.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("variable name '{name}' is reserved: {reason}")]
    ReservedName { name: String, reason: &'static str },

    #[error("variable '{name}' is already declared")]
    Duplicate { name: String },

    #[error("'{name}' is an output; outputs can only be published by the node itself")]
    OutputWrite { name: String },

    #[error("'{key}' is not an input of {node}")]
    UnrecognizedKey { node: &'static str, key: String },

    #[error("variable '{name}' holds {found}, expected {expected}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("unknown node kind '{0}'")]
    UnknownKind(String),

    #[error("invalid JSON configuration: {0}")]
    Json(String),
}

/// Conditions raised by the physics inside a recomputation body.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// The two parabolas do not intersect at the requested energy. Benign:
    /// lineshapes turn this into a zero contribution.
    #[error("parabolas have no real-valued crossing")]
    NoRealCrossing,

    #[error("defect position {position} outside of simulated interval ({lower}, {upper})")]
    PositionOutOfRange { position: f64, lower: f64, upper: f64 },

    #[error("{side} reservoirs of neighbouring defect records differ")]
    ReservoirMismatch { side: &'static str },

    #[error("energy grids of reservoir '{reservoir}' don't match")]
    GridMismatch { reservoir: String },

    #[error("shape mismatch in '{what}': expected {expected}, got {actual}")]
    ShapeMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    #[error("no time constant for transition {0}")]
    MissingTransition(String),

    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// Invalid settings or values of a fit variable.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    #[error("fit variable '{name}': either a value or limits have to be given")]
    Underdetermined { name: String },

    #[error("fit variable '{name}': invalid limits ({lower}, {upper})")]
    InvalidLimits { name: String, lower: f64, upper: f64 },

    #[error("fit variable '{name}': {reason}")]
    Degenerate { name: String, reason: &'static str },

    #[error("fit variable '{name}': value {value} is not finite")]
    NotFinite { name: String, value: f64 },

    #[error("fit variable '{name}': value {value} {} allowed region ({lower}, {upper})", bound_side(.above))]
    OutOfBounds {
        name: String,
        value: f64,
        lower: f64,
        upper: f64,
        above: bool,
    },
}

fn bound_side(above: &bool) -> &'static str {
    if *above {
        "above"
    } else {
        "below"
    }
}

impl DomainError {
    /// Whether the condition has a defined benign fallback.
    pub fn is_benign(&self) -> bool {
        matches!(self, Self::NoRealCrossing)
    }
}
