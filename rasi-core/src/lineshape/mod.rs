//! Lineshapes
//!
//! A lineshape describes how the vibrational motion of a defect broadens
//! its electronic transitions. Going from the occupied to the unoccupied
//! defect state is an *oxidation*, the reverse a *reduction*; every lineshape
//! node publishes one function of transition energy for each direction.
//!
//! - [`ClassicalLineShape`]: two classical parabolas, evaluated at their
//!   crossings.
//! - [`TabulatedOverlaps`], [`DiscreteLineShape`], [`SmearedLineShape`]:
//!   quantum-mechanical vibrational overlaps turned into discrete lines and
//!   then into a smooth curve.
//! - [`SchmidtOverlaps`]: the same overlaps computed for two displaced
//!   harmonic oscillators instead of read from a table.

mod classical;
mod discrete;
mod harmonic;
mod schmidt;

pub use classical::{ClassicalLineShape, Parabolas};
pub use discrete::{gaussian, DiscreteLineShape, SmearedLineShape, TabulatedOverlaps};
pub use harmonic::harmonic_partition_function;
pub use schmidt::{franck_condon_overlaps, oscillator_levels, SchmidtOverlaps};

use crate::error::{DomainError, Result};
use crate::node::Context;

/// Read `temperature` and reject non-positive values.
pub(crate) fn temperature(cx: &Context<'_>) -> Result<f64> {
    let t = cx.scalar("temperature")?;
    if !(t > 0.0) {
        return Err(DomainError::InvalidParameter {
            name: "temperature",
            reason: format!("must be positive, got {t}"),
        }
        .into());
    }
    Ok(t)
}
