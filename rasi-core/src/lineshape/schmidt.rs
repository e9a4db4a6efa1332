//! Harmonic Franck-Condon Overlaps
//!
//! Overlap integrals `I[m][n] = <m|n'>` between the eigenstates of two
//! displaced harmonic oscillators, one per charge state, computed by
//! recursion from the ground state overlap. With `a = M w / hbar`,
//! `a' = M w' / hbar` and shift `d`:
//!
//! ```text
//! I[0][0] = sqrt(2 sqrt(a a') / (a + a')) exp(-a a' d^2 / (2 (a + a')))
//! ```
//!
//! The edges `I[m][0]` and `I[0][n]` follow two-term recursions; every
//! interior element is a combination of its eight neighbours up and left.

use tracing::debug;

use crate::constants::HBAR;
use crate::error::{DomainError, Result};
use crate::node::{Calculator, Context, Matrix, Publisher, Value, VariableRegistry};

/// Default number of levels kept per oscillator.
pub const DEFAULT_STATES: usize = 200;

/// Overlap matrix of `n_occupied x n_unoccupied` oscillator states.
///
/// `a` and `a_prime` are the inverse squared oscillator lengths of the
/// occupied and unoccupied state, `shift` the displacement between them.
pub fn franck_condon_overlaps(
    a: f64,
    a_prime: f64,
    shift: f64,
    n_occupied: usize,
    n_unoccupied: usize,
) -> Vec<Vec<f64>> {
    let mut overlaps = vec![vec![0.0; n_unoccupied]; n_occupied];
    if n_occupied == 0 || n_unoccupied == 0 {
        return overlaps;
    }

    let sum = a + a_prime;
    let diff = (a - a_prime) / sum;
    let d = shift;

    overlaps[0][0] =
        (2.0 * (a * a_prime).sqrt() / sum).sqrt() * (-(a * a_prime * d * d) / (2.0 * sum)).exp();

    // Edges
    if n_occupied > 1 {
        overlaps[1][0] = (2.0 * a).sqrt() * a_prime / sum * d * overlaps[0][0];
    }
    for m in 0..n_occupied.saturating_sub(2) {
        let mf = m as f64;
        overlaps[m + 2][0] = ((mf + 1.0) / (mf + 2.0)).sqrt() * diff * overlaps[m][0]
            + (2.0 / (mf + 2.0)).sqrt() * a.sqrt() * a_prime / sum * d * overlaps[m + 1][0];
    }
    if n_unoccupied > 1 {
        overlaps[0][1] = -(2.0 * a_prime).sqrt() * a / sum * d * overlaps[0][0];
    }
    for n in 0..n_unoccupied.saturating_sub(2) {
        let nf = n as f64;
        overlaps[0][n + 2] = -((nf + 1.0) / (nf + 2.0)).sqrt() * diff * overlaps[0][n]
            - (2.0 / (nf + 2.0)).sqrt() * a * a_prime.sqrt() / sum * d * overlaps[0][n + 1];
    }

    // Interior, row by row: I[m+1][n+1] only needs rows m-1..=m+1 and
    // columns n-1..=n+1 to the upper left of it.
    let c_occ = a * a_prime.sqrt() * d / (std::f64::consts::SQRT_2 * sum);
    let c_unocc = a.sqrt() * a_prime * d / (std::f64::consts::SQRT_2 * sum);
    let c_diag = 2.0 * (a * a_prime).sqrt() / sum;
    for i in 1..n_occupied {
        for j in 1..n_unoccupied {
            let (m, n) = (i - 1, j - 1);
            let (mf, nf) = ((m + 1) as f64, (n + 1) as f64);
            let at = |r: usize, c: usize, dr: usize, dc: usize| -> f64 {
                if r < dr || c < dc {
                    0.0
                } else {
                    overlaps[r - dr][c - dc]
                }
            };

            let value = -c_occ * nf.recip().sqrt() * at(m + 1, n, 0, 0)
                - diff * ((nf - 1.0) / nf).sqrt() * at(m + 1, n, 0, 1)
                + c_unocc * mf.recip().sqrt() * at(m, n + 1, 0, 0)
                + c_diag * (mf * nf).recip().sqrt() * at(m, n, 0, 0)
                - c_unocc * ((nf - 1.0) / (mf * nf)).sqrt() * at(m, n, 0, 1)
                + diff * ((mf - 1.0) / mf).sqrt() * at(m, n + 1, 1, 0)
                + c_occ * ((mf - 1.0) / (mf * nf)).sqrt() * at(m, n, 1, 0)
                + (((mf - 1.0) * (nf - 1.0)) / (mf * nf)).sqrt() * at(m, n, 1, 1);
            overlaps[i][j] = value;
        }
    }
    overlaps
}

/// Energies `(n + 1/2) hbar omega` of the lowest `count` oscillator levels.
pub fn oscillator_levels(omega: f64, count: usize) -> Vec<f64> {
    (0..count).map(|n| (n as f64 + 0.5) * HBAR * omega).collect()
}

fn positive(cx: &Context<'_>, name: &'static str) -> Result<f64> {
    let x = cx.scalar(name)?;
    if !(x > 0.0) || !x.is_finite() {
        return Err(DomainError::InvalidParameter {
            name,
            reason: format!("must be positive, got {x}"),
        }
        .into());
    }
    Ok(x)
}

fn level_count(cx: &Context<'_>, name: &'static str) -> Result<usize> {
    let n = cx.scalar(name)?;
    if !(n >= 1.0) || n.fract() != 0.0 || !n.is_finite() {
        return Err(DomainError::InvalidParameter {
            name,
            reason: format!("must be a positive whole number, got {n}"),
        }
        .into());
    }
    Ok(n as usize)
}

/// Vibrational overlaps of two displaced harmonic oscillators.
///
/// Inputs: `omega_occupied`, `omega_unoccupied`, `mass`,
/// `equilibrium_shift` (required), `n_states_occupied`,
/// `n_states_unoccupied` (default 200). Outputs match
/// [`TabulatedOverlaps`](super::TabulatedOverlaps): `occupied_energies`,
/// `unoccupied_energies`, `overlaps`, `occupied_frequency`,
/// `unoccupied_frequency`.
#[derive(Debug, Default)]
pub struct SchmidtOverlaps;

impl Calculator for SchmidtOverlaps {
    fn kind(&self) -> &'static str {
        "SchmidtOverlaps"
    }

    fn declare(&self, vars: &mut VariableRegistry) -> Result<()> {
        vars.require_input("omega_occupied")?;
        vars.require_input("omega_unoccupied")?;
        vars.require_input("mass")?;
        vars.require_input("equilibrium_shift")?;
        vars.declare_input("n_states_occupied", DEFAULT_STATES as f64)?;
        vars.declare_input("n_states_unoccupied", DEFAULT_STATES as f64)?;
        for name in [
            "occupied_energies",
            "unoccupied_energies",
            "overlaps",
            "occupied_frequency",
            "unoccupied_frequency",
        ] {
            vars.declare_output(name, Value::Unset)?;
        }
        Ok(())
    }

    fn recompute(&mut self, cx: &Context<'_>, out: &mut Publisher<'_>) -> Result<()> {
        let omega = positive(cx, "omega_occupied")?;
        let omega_prime = positive(cx, "omega_unoccupied")?;
        let mass = positive(cx, "mass")?;
        let shift = cx.scalar("equilibrium_shift")?;
        let n_occ = level_count(cx, "n_states_occupied")?;
        let n_unocc = level_count(cx, "n_states_unoccupied")?;

        let rows = franck_condon_overlaps(
            mass * omega / HBAR,
            mass * omega_prime / HBAR,
            shift,
            n_occ,
            n_unocc,
        );
        let matrix = Matrix::from_rows(rows).ok_or_else(|| DomainError::InvalidParameter {
            name: "n_states_unoccupied",
            reason: "overlap rows differ in length".into(),
        })?;
        debug!(n_occ, n_unocc, "franck-condon overlaps");

        out.publish("occupied_energies", oscillator_levels(omega, n_occ))?;
        out.publish("unoccupied_energies", oscillator_levels(omega_prime, n_unocc))?;
        out.publish("overlaps", matrix)?;
        out.publish("occupied_frequency", omega)?;
        out.publish("unoccupied_frequency", omega_prime)
    }
}
