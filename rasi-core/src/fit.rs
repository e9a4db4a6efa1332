//! Fit Variables
//!
//! Model parameters exposed to an optimizer. Each variable maps its physical
//! value onto a dimensionless optimizer coordinate of order one:
//!
//! - with limits `(lower, upper)`: `scale = 1 / (upper - lower)` and
//!   `shift = -(upper + lower) / 2`, so the allowed region maps onto
//!   `[-1/2, 1/2]`;
//! - without limits: `scale = 1 / base` and `shift = 0`.
//!
//! The optimizer coordinate is `scale * (f(value) + shift)`, where `f` is the
//! identity for linear variables and `ln` for logarithmic ones (applied to
//! the limits and base as well).

use serde::{Deserialize, Serialize};

use crate::error::FitError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scaling {
    #[default]
    Linear,
    Logarithmic,
}

impl Scaling {
    fn forward(self, v: f64) -> f64 {
        match self {
            Scaling::Linear => v,
            Scaling::Logarithmic => v.ln(),
        }
    }

    fn inverse(self, v: f64) -> f64 {
        match self {
            Scaling::Linear => v,
            Scaling::Logarithmic => v.exp(),
        }
    }
}

/// Serialized description of a fit variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitVariableSpec {
    pub name: String,
    #[serde(default)]
    pub scaling: Scaling,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub limits: Option<(f64, f64)>,
}

/// A parameter with a physical value and an optimizer coordinate kept in
/// sync.
#[derive(Debug, Clone, PartialEq)]
pub struct FitVariable {
    name: String,
    scaling: Scaling,
    base_value: Option<f64>,
    limits: Option<(f64, f64)>,
    scale: f64,
    shift: f64,
    value: f64,
    optimizer_value: f64,
}

impl FitVariable {
    /// Create a variable from a starting value, limits, or both. Without a
    /// value the variable starts in the middle of its limits.
    pub fn new(
        name: impl Into<String>,
        scaling: Scaling,
        value: Option<f64>,
        limits: Option<(f64, f64)>,
    ) -> Result<Self, FitError> {
        let name = name.into();
        let (scale, shift) = match (limits, value) {
            (Some((lower, upper)), _) => {
                if !(lower < upper) || (scaling == Scaling::Logarithmic && !(lower > 0.0)) {
                    return Err(FitError::InvalidLimits { name, lower, upper });
                }
                let (l, u) = (scaling.forward(lower), scaling.forward(upper));
                ((u - l).recip(), -0.5 * (u + l))
            }
            (None, Some(base)) => {
                let b = scaling.forward(base);
                if b == 0.0 || !b.is_finite() {
                    return Err(FitError::Degenerate {
                        name,
                        reason: "base value maps to a zero or non-finite scale",
                    });
                }
                (b.recip(), 0.0)
            }
            (None, None) => return Err(FitError::Underdetermined { name }),
        };

        let mut variable = Self {
            name,
            scaling,
            base_value: value,
            limits,
            scale,
            shift,
            value: f64::NAN,
            optimizer_value: f64::NAN,
        };
        match value {
            Some(v) => variable.set_value(v)?,
            None => variable.set_optimizer_value(0.0)?,
        }
        Ok(variable)
    }

    pub fn linear(name: impl Into<String>, value: f64) -> Result<Self, FitError> {
        Self::new(name, Scaling::Linear, Some(value), None)
    }

    pub fn logarithmic(name: impl Into<String>, value: f64) -> Result<Self, FitError> {
        Self::new(name, Scaling::Logarithmic, Some(value), None)
    }

    /// Replace the limits of an existing variable.
    pub fn with_limits(self, lower: f64, upper: f64) -> Result<Self, FitError> {
        Self::new(self.name, self.scaling, Some(self.value), Some((lower, upper)))
    }

    pub fn from_spec(spec: FitVariableSpec) -> Result<Self, FitError> {
        Self::new(spec.name, spec.scaling, spec.value, spec.limits)
    }

    pub fn to_spec(&self) -> FitVariableSpec {
        FitVariableSpec {
            name: self.name.clone(),
            scaling: self.scaling,
            value: Some(self.value),
            limits: self.limits,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scaling(&self) -> Scaling {
        self.scaling
    }

    pub fn base_value(&self) -> Option<f64> {
        self.base_value
    }

    pub fn limits(&self) -> Option<(f64, f64)> {
        self.limits
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn optimizer_value(&self) -> f64 {
        self.optimizer_value
    }

    fn check_limits(&self, value: f64) -> Result<(), FitError> {
        if !value.is_finite() {
            return Err(FitError::NotFinite {
                name: self.name.clone(),
                value,
            });
        }
        let Some((lower, upper)) = self.limits else {
            return Ok(());
        };
        if value > upper || value < lower {
            return Err(FitError::OutOfBounds {
                name: self.name.clone(),
                value,
                lower,
                upper,
                above: value > upper,
            });
        }
        Ok(())
    }

    /// Set the physical value. Non-finite or out-of-bounds values are
    /// rejected and leave the variable unchanged.
    pub fn set_value(&mut self, value: f64) -> Result<(), FitError> {
        self.check_limits(value)?;
        if self.scaling == Scaling::Logarithmic && !(value > 0.0) {
            return Err(FitError::Degenerate {
                name: self.name.clone(),
                reason: "logarithmic variables must stay positive",
            });
        }
        self.value = value;
        self.optimizer_value = self.scale * (self.scaling.forward(value) + self.shift);
        Ok(())
    }

    /// Set the optimizer coordinate. Coordinates mapping outside the limits
    /// are rejected and leave the variable unchanged.
    pub fn set_optimizer_value(&mut self, optimizer_value: f64) -> Result<(), FitError> {
        let value = self.scaling.inverse(optimizer_value / self.scale - self.shift);
        self.check_limits(value)?;
        self.value = value;
        self.optimizer_value = optimizer_value;
        Ok(())
    }
}
