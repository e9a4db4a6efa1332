//! Non-radiative Multi-Phonon Transitions
//!
//! Charge transfer rates between a defect and its carrier reservoirs,
//! combining a lineshape with the reservoir coupling.

use tracing::debug;

use crate::constants::thermal_energy;
use crate::emf::ReservoirSet;
use crate::error::{DomainError, Result};
use crate::node::{Calculator, Context, Curve, NodeRef, Publisher, Value, VariableRegistry};

/// Trapezoidal integral of samples `y` over grid `x`.
pub fn trapz(y: &[f64], x: &[f64]) -> Result<f64, DomainError> {
    if y.len() != x.len() {
        return Err(DomainError::ShapeMismatch {
            what: "integrand".into(),
            expected: x.len(),
            actual: y.len(),
        });
    }
    Ok(x.windows(2)
        .zip(y.windows(2))
        .map(|(x, y)| 0.5 * (x[1] - x[0]) * (y[0] + y[1]))
        .sum())
}

fn curve(node: &NodeRef, name: &str) -> Result<Curve> {
    node.output(name)?.expect_curve(name)
}

/// `sum over reservoirs of mlambda * trapz(d(E) * lsf(E - ev), E)`.
fn reservoir_rate(reservoirs: &ReservoirSet, lsf: &Curve, ev: f64, mlambda: f64) -> Result<f64> {
    let mut rate = 0.0;
    for reservoir in reservoirs.values() {
        let integrand: Vec<f64> = reservoir
            .energies()
            .iter()
            .zip(reservoir.density())
            .map(|(&e, &d)| d * lsf.eval(e - ev))
            .collect();
        rate += mlambda * trapz(&integrand, reservoir.energies())?;
    }
    Ok(rate)
}

/// Full NMP rates from a lineshape and an electronic matrix element.
///
/// Inputs: `lineshape` (node publishing `oxidation`/`reduction` curves),
/// `electronic_matrix_element` (node publishing `ev` and the two reservoir
/// sets), `mlambda`. Outputs: `oxidation_rate`, `reduction_rate`.
#[derive(Debug, Default)]
pub struct FullNmpTransition;

impl Calculator for FullNmpTransition {
    fn kind(&self) -> &'static str {
        "FullNmpTransition"
    }

    fn declare(&self, vars: &mut VariableRegistry) -> Result<()> {
        vars.require_input("lineshape")?;
        vars.require_input("electronic_matrix_element")?;
        vars.require_input("mlambda")?;
        vars.declare_output("oxidation_rate", Value::Unset)?;
        vars.declare_output("reduction_rate", Value::Unset)
    }

    fn recompute(&mut self, cx: &Context<'_>, out: &mut Publisher<'_>) -> Result<()> {
        let lineshape = cx.node("lineshape")?;
        let eme = cx.node("electronic_matrix_element")?;
        let mlambda = cx.scalar("mlambda")?;

        let ev = eme.scalar("ev")?;
        let oxidation = eme
            .output("oxidation_reservoir")?
            .expect_reservoirs("oxidation_reservoir")?;
        let reduction = eme
            .output("reduction_reservoir")?
            .expect_reservoirs("reduction_reservoir")?;

        let oxidation_rate =
            reservoir_rate(&oxidation, &curve(&lineshape, "oxidation")?, ev, mlambda)?;
        let reduction_rate =
            reservoir_rate(&reduction, &curve(&lineshape, "reduction")?, ev, mlambda)?;
        debug!(oxidation_rate, reduction_rate, "nmp rates");

        out.publish("oxidation_rate", oxidation_rate)?;
        out.publish("reduction_rate", reduction_rate)
    }
}

/// Capture and emission by cold carriers at the band edges, balanced in
/// detail.
///
/// Inputs: `cbe_interface`, `vbe_interface`, `vbe_defect`,
/// `thermodynamic_level`, `temperature`, `electron_density`,
/// `hole_density`, `tunneling_factor`, `lineshape` (node). Outputs:
/// `oxidation_rate`, `reduction_rate`.
#[derive(Debug, Default)]
pub struct ColdCarrierTransition;

const COLD_CARRIER_SCALARS: [&str; 8] = [
    "cbe_interface",
    "vbe_interface",
    "vbe_defect",
    "thermodynamic_level",
    "temperature",
    "electron_density",
    "hole_density",
    "tunneling_factor",
];

impl Calculator for ColdCarrierTransition {
    fn kind(&self) -> &'static str {
        "ColdCarrierTransition"
    }

    fn declare(&self, vars: &mut VariableRegistry) -> Result<()> {
        for name in COLD_CARRIER_SCALARS {
            vars.require_input(name)?;
        }
        vars.require_input("lineshape")?;
        vars.declare_output("oxidation_rate", Value::Unset)?;
        vars.declare_output("reduction_rate", Value::Unset)
    }

    fn recompute(&mut self, cx: &Context<'_>, out: &mut Publisher<'_>) -> Result<()> {
        let eci = cx.scalar("cbe_interface")?;
        let evi = cx.scalar("vbe_interface")?;
        let evd = cx.scalar("vbe_defect")?;
        let et = cx.scalar("thermodynamic_level")?;
        let n = cx.scalar("electron_density")?;
        let p = cx.scalar("hole_density")?;
        let tf = cx.scalar("tunneling_factor")?;
        let kt = thermal_energy(crate::lineshape::temperature(cx)?);

        let lineshape = cx.node("lineshape")?;
        let c_p = p * tf * curve(&lineshape, "oxidation")?.eval(evi - evd);
        let c_n = n * tf * curve(&lineshape, "reduction")?.eval(eci - evd);

        out.publish("oxidation_rate", c_p + c_n * (-(eci - et) / kt).exp())?;
        out.publish("reduction_rate", c_n + c_p * (-(et - evi) / kt).exp())
    }
}
