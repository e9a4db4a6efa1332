//! Classical Lineshape
//!
//! The defect's vibrational mode is a parabola in each charge state:
//! `k0 Q^2` when occupied and `kp (Q - s)^2 + E - lvl` when unoccupied.
//! Transitions happen where the two cross, weighted by the Boltzmann
//! population of the starting parabola at the crossing.

use smallvec::{smallvec, SmallVec};
use tracing::trace;

use crate::constants::{classical_partition_function, thermal_energy};
use crate::error::{DomainError, Result};
use crate::node::{Calculator, Context, Curve, Publisher, Value, VariableRegistry};

use super::temperature;

/// Crossing coordinates at one energy; there are at most two.
pub type Crossings = SmallVec<[f64; 2]>;

/// The two parabolas of a classical lineshape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Parabolas {
    pub k_occupied: f64,
    pub k_unoccupied: f64,
    pub equilibrium_shift: f64,
    pub thermodynamic_level: f64,
}

impl Parabolas {
    /// Configuration coordinates where the parabolas intersect at transition
    /// energy `energy`.
    pub fn crossings(&self, energy: f64) -> Result<Crossings, DomainError> {
        let k0 = self.k_occupied;
        let kp = self.k_unoccupied;
        let s = self.equilibrium_shift;
        let de = energy - self.thermodynamic_level;

        if k0 == kp {
            if s == 0.0 {
                return Err(DomainError::NoRealCrossing);
            }
            return Ok(smallvec![(k0 * s * s + de) / (2.0 * k0 * s)]);
        }

        // (a +/- sqrt(b)) / d
        let a = kp * s;
        let b = k0 * kp * s * s + (k0 - kp) * de;
        let d = kp - k0;
        if b < 0.0 {
            return Err(DomainError::NoRealCrossing);
        }
        let root = b.sqrt();
        Ok(smallvec![(a + root) / d, (a - root) / d])
    }

    fn denominator(&self, q: f64) -> f64 {
        let m0 = 2.0 * self.k_occupied;
        let mp = 2.0 * self.k_unoccupied;
        (m0 * q + mp * (self.equilibrium_shift - q)).abs()
    }

    /// Oxidation lineshape at `energy`; zero where the parabolas don't cross.
    pub fn oxidation(&self, energy: f64, temperature: f64) -> f64 {
        let kt = thermal_energy(temperature);
        let z = classical_partition_function(2.0 * self.k_occupied, temperature);
        self.sum_over_crossings(energy, |q| {
            (-self.k_occupied * q * q / kt).exp() / self.denominator(q)
        }) / z
    }

    /// Reduction lineshape at `energy`; zero where the parabolas don't cross.
    pub fn reduction(&self, energy: f64, temperature: f64) -> f64 {
        let kt = thermal_energy(temperature);
        let z = classical_partition_function(2.0 * self.k_unoccupied, temperature);
        let s = self.equilibrium_shift;
        self.sum_over_crossings(energy, |q| {
            (-self.k_unoccupied * (q - s) * (q - s) / kt).exp() / self.denominator(q)
        }) / z
    }

    fn sum_over_crossings(&self, energy: f64, term: impl Fn(f64) -> f64) -> f64 {
        match self.crossings(energy) {
            Ok(qs) => qs.into_iter().map(term).sum(),
            Err(err) => {
                trace!(energy, error = %err, "no crossing, zero contribution");
                0.0
            }
        }
    }
}

/// Classical two-parabola lineshape.
///
/// Inputs: `k_occupied`, `k_unoccupied`, `equilibrium_shift`,
/// `thermodynamic_level`, `temperature`. Outputs: `oxidation`, `reduction`.
#[derive(Debug, Default)]
pub struct ClassicalLineShape;

impl Calculator for ClassicalLineShape {
    fn kind(&self) -> &'static str {
        "ClassicalLineShape"
    }

    fn declare(&self, vars: &mut VariableRegistry) -> Result<()> {
        for name in [
            "k_occupied",
            "k_unoccupied",
            "equilibrium_shift",
            "thermodynamic_level",
            "temperature",
        ] {
            vars.require_input(name)?;
        }
        vars.declare_output("oxidation", Value::Unset)?;
        vars.declare_output("reduction", Value::Unset)
    }

    fn recompute(&mut self, cx: &Context<'_>, out: &mut Publisher<'_>) -> Result<()> {
        let parabolas = Parabolas {
            k_occupied: cx.scalar("k_occupied")?,
            k_unoccupied: cx.scalar("k_unoccupied")?,
            equilibrium_shift: cx.scalar("equilibrium_shift")?,
            thermodynamic_level: cx.scalar("thermodynamic_level")?,
        };
        for (name, k) in [
            ("k_occupied", parabolas.k_occupied),
            ("k_unoccupied", parabolas.k_unoccupied),
        ] {
            if !(k > 0.0) {
                return Err(DomainError::InvalidParameter {
                    name,
                    reason: format!("spring constant must be positive, got {k}"),
                }
                .into());
            }
        }
        let t = temperature(cx)?;

        out.publish("oxidation", Curve::new(move |e| parabolas.oxidation(e, t)))?;
        out.publish("reduction", Curve::new(move |e| parabolas.reduction(e, t)))
    }
}
