//! Discrete and smeared lineshapes built from vibrational overlaps.

use std::f64::consts::PI;
use std::sync::Arc;

use crate::constants::thermal_energy;
use crate::error::{DomainError, Result};
use crate::node::{Calculator, Context, Curve, Matrix, NodeRef, Publisher, Value, VariableRegistry};

use super::{harmonic_partition_function, temperature};

/// Vibrational levels of both charge states and their overlap matrix,
/// supplied as data.
///
/// Inputs: `energies_occupied`, `energies_unoccupied`, `overlap_matrix`
/// (`n_occupied x n_unoccupied`), plus optional `omega_occupied` and
/// `omega_unoccupied` for harmonic modes. Outputs: `occupied_energies`,
/// `unoccupied_energies`, `overlaps`, `occupied_frequency`,
/// `unoccupied_frequency`.
#[derive(Debug, Default)]
pub struct TabulatedOverlaps;

impl Calculator for TabulatedOverlaps {
    fn kind(&self) -> &'static str {
        "TabulatedOverlaps"
    }

    fn declare(&self, vars: &mut VariableRegistry) -> Result<()> {
        vars.require_input("energies_occupied")?;
        vars.require_input("energies_unoccupied")?;
        vars.require_input("overlap_matrix")?;
        vars.declare_input("omega_occupied", Value::Unset)?;
        vars.declare_input("omega_unoccupied", Value::Unset)?;
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
        let occupied = cx.array("energies_occupied")?;
        let unoccupied = cx.array("energies_unoccupied")?;
        let matrix = cx.matrix("overlap_matrix")?;

        check_shape(&matrix, occupied.len(), unoccupied.len())?;

        out.publish("occupied_energies", Value::Array(occupied))?;
        out.publish("unoccupied_energies", Value::Array(unoccupied))?;
        out.publish("overlaps", Value::Matrix(matrix))?;
        out.publish("occupied_frequency", cx.raw("omega_occupied")?.clone())?;
        out.publish("unoccupied_frequency", cx.raw("omega_unoccupied")?.clone())
    }
}

/// Overlap matrices are `n_occupied x n_unoccupied`: rows are occupied
/// levels, columns unoccupied ones.
pub(crate) fn check_shape(
    matrix: &Matrix,
    occupied: usize,
    unoccupied: usize,
) -> Result<(), DomainError> {
    if matrix.rows() != occupied {
        return Err(DomainError::ShapeMismatch {
            what: "overlap matrix rows".into(),
            expected: occupied,
            actual: matrix.rows(),
        });
    }
    if matrix.cols() != unoccupied {
        return Err(DomainError::ShapeMismatch {
            what: "overlap matrix columns".into(),
            expected: unoccupied,
            actual: matrix.cols(),
        });
    }
    Ok(())
}

/// Normalised Boltzmann populations of `levels`. A harmonic `omega` replaces
/// the level sum by the oscillator partition function.
fn populations(levels: &[f64], omega: Option<f64>, temperature: f64) -> Vec<f64> {
    let kt = thermal_energy(temperature);
    let weights: Vec<f64> = levels.iter().map(|e| (-e / kt).exp()).collect();
    let z = match omega {
        Some(omega) => harmonic_partition_function(omega, temperature),
        None => weights.iter().sum(),
    };
    weights.into_iter().map(|w| w / z).collect()
}

fn sorted_lines(mut lines: Vec<(f64, f64)>) -> (Vec<f64>, Vec<f64>) {
    lines.sort_by(|a, b| a.0.total_cmp(&b.0));
    lines.into_iter().unzip()
}

/// Lines `(energy, weight)` from a set of vibrational overlaps.
///
/// Inputs: `overlaps` (node with the outputs of [`TabulatedOverlaps`]),
/// `thermodynamic_level`, `temperature`. Outputs: `oxidation_energies`,
/// `oxidation_weights`, `reduction_energies`, `reduction_weights`, each
/// sorted by energy.
#[derive(Debug, Default)]
pub struct DiscreteLineShape;

impl Calculator for DiscreteLineShape {
    fn kind(&self) -> &'static str {
        "DiscreteLineShape"
    }

    fn declare(&self, vars: &mut VariableRegistry) -> Result<()> {
        vars.require_input("overlaps")?;
        vars.require_input("thermodynamic_level")?;
        vars.require_input("temperature")?;
        for name in [
            "oxidation_energies",
            "oxidation_weights",
            "reduction_energies",
            "reduction_weights",
        ] {
            vars.declare_output(name, Value::Unset)?;
        }
        Ok(())
    }

    fn recompute(&mut self, cx: &Context<'_>, out: &mut Publisher<'_>) -> Result<()> {
        let overlaps = cx.node("overlaps")?;
        let level = cx.scalar("thermodynamic_level")?;
        let t = temperature(cx)?;

        let e_occ = overlaps.output("occupied_energies")?.expect_array("occupied_energies")?;
        let e_unocc = overlaps
            .output("unoccupied_energies")?
            .expect_array("unoccupied_energies")?;
        let s = overlaps.output("overlaps")?.expect_matrix("overlaps")?;
        check_shape(&s, e_occ.len(), e_unocc.len())?;
        let omega_occ = overlaps.output("occupied_frequency")?.as_scalar();
        let omega_unocc = overlaps.output("unoccupied_frequency")?.as_scalar();

        let p_occ = populations(&e_occ, omega_occ, t);
        let p_unocc = populations(&e_unocc, omega_unocc, t);

        let mut oxidation = Vec::with_capacity(e_occ.len() * e_unocc.len());
        let mut reduction = Vec::with_capacity(e_occ.len() * e_unocc.len());
        for (i, e_i) in e_occ.iter().enumerate() {
            for (j, e_j) in e_unocc.iter().enumerate() {
                let energy = level + e_i - e_j;
                let s2 = s.get(i, j).powi(2);
                oxidation.push((energy, p_occ[i] * s2));
                reduction.push((energy, p_unocc[j] * s2));
            }
        }

        let (energies, weights) = sorted_lines(oxidation);
        out.publish("oxidation_energies", energies)?;
        out.publish("oxidation_weights", weights)?;
        let (energies, weights) = sorted_lines(reduction);
        out.publish("reduction_energies", energies)?;
        out.publish("reduction_weights", weights)
    }
}

/// Normal distribution with standard deviation `sigma` centred at `x0`.
pub fn gaussian(sigma: f64, x0: f64, x: f64) -> f64 {
    (-(x - x0).powi(2) / (2.0 * sigma * sigma)).exp() / (2.0 * PI * sigma * sigma).sqrt()
}

fn smeared(energies: Arc<Vec<f64>>, weights: Arc<Vec<f64>>, sigma: f64) -> Curve {
    Curve::new(move |e| {
        energies
            .iter()
            .zip(weights.iter())
            .map(|(&e0, &w)| w * gaussian(sigma, e0, e))
            .sum()
    })
}

fn lines(node: &NodeRef, side: &str) -> Result<(Arc<Vec<f64>>, Arc<Vec<f64>>)> {
    let energies = format!("{side}_energies");
    let weights = format!("{side}_weights");
    let e = node.output(&energies)?.expect_array(&energies)?;
    let w = node.output(&weights)?.expect_array(&weights)?;
    Ok((e, w))
}

/// Discrete lines broadened by Gaussians of width `smearing`.
///
/// Inputs: `discrete_lineshape` (node), `smearing`. Outputs: `oxidation`,
/// `reduction`.
#[derive(Debug, Default)]
pub struct SmearedLineShape;

impl Calculator for SmearedLineShape {
    fn kind(&self) -> &'static str {
        "SmearedLineShape"
    }

    fn declare(&self, vars: &mut VariableRegistry) -> Result<()> {
        vars.require_input("discrete_lineshape")?;
        vars.require_input("smearing")?;
        vars.declare_output("oxidation", Value::Unset)?;
        vars.declare_output("reduction", Value::Unset)
    }

    fn recompute(&mut self, cx: &Context<'_>, out: &mut Publisher<'_>) -> Result<()> {
        let discrete = cx.node("discrete_lineshape")?;
        let sigma = cx.scalar("smearing")?;
        if !(sigma > 0.0) {
            return Err(DomainError::InvalidParameter {
                name: "smearing",
                reason: format!("must be positive, got {sigma}"),
            }
            .into());
        }

        let (energies, weights) = lines(&discrete, "oxidation")?;
        out.publish("oxidation", smeared(energies, weights, sigma))?;
        let (energies, weights) = lines(&discrete, "reduction")?;
        out.publish("reduction", smeared(energies, weights, sigma))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::BOLTZMANN;
    use crate::error::NodeError;
    use crate::node::Config;

    const T: f64 = 300.0;

    fn overlaps(matrix: Vec<Vec<f64>>) -> NodeRef {
        let kt = BOLTZMANN * T;
        let config = Config::new()
            .with("energies_occupied", vec![0.0, kt * 3f64.ln()])
            .with("energies_unoccupied", vec![0.0])
            .with("overlap_matrix", Matrix::from_rows(matrix).unwrap());
        NodeRef::with_config(TabulatedOverlaps, config).unwrap()
    }

    fn discrete(overlaps: &NodeRef) -> NodeRef {
        let config = Config::new()
            .with("overlaps", overlaps)
            .with("thermodynamic_level", 0.0)
            .with("temperature", T);
        NodeRef::with_config(DiscreteLineShape, config).unwrap()
    }

    fn array(node: &NodeRef, name: &str) -> Vec<f64> {
        node.output(name).unwrap().expect_array(name).unwrap().to_vec()
    }

    #[test]
    fn overlap_matrix_shape_is_checked() {
        let node = overlaps(vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        let err = node.update().unwrap_err();
        assert!(err.is_domain());
    }

    /// Overlaps source whose matrix disagrees with its level lists.
    struct MisshapenOverlaps;

    impl Calculator for MisshapenOverlaps {
        fn kind(&self) -> &'static str {
            "MisshapenOverlaps"
        }

        fn declare(&self, vars: &mut VariableRegistry) -> Result<()> {
            vars.declare_input("levels", 2.0)?;
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
            let n = cx.scalar("levels")? as usize;
            out.publish("occupied_energies", vec![0.0; n])?;
            out.publish("unoccupied_energies", vec![0.0; n])?;
            out.publish("overlaps", Matrix::from_rows(vec![vec![1.0]]).unwrap())
        }
    }

    #[test]
    fn mismatched_overlaps_are_a_domain_error() {
        let source = NodeRef::with_config(MisshapenOverlaps, Config::new().with("levels", 2.0))
            .unwrap();
        let node = discrete(&source);
        let err = node.update().unwrap_err();
        assert_eq!(
            err,
            NodeError::from(DomainError::ShapeMismatch {
                what: "overlap matrix rows".into(),
                expected: 2,
                actual: 1,
            })
        );
        assert!(node.output("oxidation_weights").unwrap().is_unset());
    }

    #[test]
    fn lines_carry_boltzmann_weights() {
        let overlaps = overlaps(vec![vec![1.0], vec![0.5]]);
        let node = discrete(&overlaps);
        assert!(node.update().unwrap());

        let kt = BOLTZMANN * T;
        let energies = array(&node, "oxidation_energies");
        assert_eq!(energies[0], 0.0);
        assert!((energies[1] / (kt * 3f64.ln()) - 1.0).abs() < 1e-12);

        let weights = array(&node, "oxidation_weights");
        assert!((weights[0] - 0.75).abs() < 1e-12);
        assert!((weights[1] - 0.25 * 0.25).abs() < 1e-12);

        let weights = array(&node, "reduction_weights");
        assert!((weights[0] - 1.0).abs() < 1e-12);
        assert!((weights[1] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn lines_are_sorted_by_energy() {
        let kt = BOLTZMANN * T;
        let config = Config::new()
            .with("energies_occupied", vec![0.0])
            .with("energies_unoccupied", vec![0.0, kt, 2.0 * kt])
            .with("overlap_matrix", Matrix::from_rows(vec![vec![1.0, 1.0, 1.0]]).unwrap());
        let overlaps = NodeRef::with_config(TabulatedOverlaps, config).unwrap();
        let node = discrete(&overlaps);
        node.update().unwrap();

        let energies = array(&node, "reduction_energies");
        assert!(energies.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn overlap_changes_reach_the_lineshape() {
        let overlaps = overlaps(vec![vec![1.0], vec![0.5]]);
        let node = discrete(&overlaps);
        assert!(node.update().unwrap());
        assert!(!node.update().unwrap());

        let matrix = Matrix::from_rows(vec![vec![0.0], vec![1.0]]).unwrap();
        overlaps.set("overlap_matrix", matrix).unwrap();
        assert!(node.update().unwrap());
        assert_eq!(array(&node, "oxidation_weights")[0], 0.0);
    }

    #[test]
    fn smeared_curve_integrates_to_total_weight() {
        let overlaps = overlaps(vec![vec![1.0], vec![1.0]]);
        let discrete = discrete(&overlaps);
        let sigma = 0.1;
        let smeared = NodeRef::with_config(
            SmearedLineShape,
            Config::new()
                .with("discrete_lineshape", &discrete)
                .with("smearing", sigma),
        )
        .unwrap();
        assert!(smeared.update().unwrap());

        let curve = smeared.output("oxidation").unwrap().expect_curve("oxidation").unwrap();
        let de = sigma / 50.0;
        let integral: f64 = (0..1000)
            .map(|k| curve.eval(-10.0 * sigma + k as f64 * de) * de)
            .sum();
        assert!((integral - 1.0).abs() < 1e-6);
    }

    #[test]
    fn zero_smearing_is_rejected() {
        let overlaps = overlaps(vec![vec![1.0], vec![1.0]]);
        let smeared = NodeRef::with_config(
            SmearedLineShape,
            Config::new()
                .with("discrete_lineshape", discrete(&overlaps))
                .with("smearing", 0.0),
        )
        .unwrap();
        let err = smeared.update().unwrap_err();
        assert!(err.is_domain());
    }

    #[test]
    fn harmonic_frequency_sets_the_partition_function() {
        let populations = populations(&[0.0], Some(1e13), T);
        let z = harmonic_partition_function(1e13, T);
        assert!((populations[0] - 1.0 / z).abs() < 1e-12);
    }
}
