//! Four-State Rate Calculators
//!
//! The defect model has two stable states (1, 2) and two metastable states
//! (1', 2'); transitions are keyed by strings like `"1->2'"`. A microscopic
//! rate calculator publishes a `timeconstants` table consumed by the
//! experiment nodes.

use tracing::trace;

use crate::constants::thermal_energy;
use crate::error::Result;
use crate::node::{Calculator, Context, Publisher, Table, Value, VariableRegistry};

/// Transition names of the four-state model.
pub mod transitions {
    pub const STATE1_TO_2P: &str = "1->2'";
    pub const STATE2P_TO_1: &str = "2'->1";
    pub const STATE2P_TO_2: &str = "2'->2";
    pub const STATE2_TO_2P: &str = "2->2'";
    pub const STATE2_TO_1P: &str = "2->1'";
    pub const STATE1P_TO_2: &str = "1'->2";
    pub const STATE1P_TO_1: &str = "1'->1";
}

use transitions::*;

fn time_constants(rates: &Table) -> Table {
    rates
        .iter()
        .map(|(transition, rate)| (transition.clone(), rate.recip()))
        .collect()
}

/// Rates of the four-state model from charge transfer nodes and thermally
/// activated barriers.
///
/// Inputs: `recharge_primary` and `recharge_secondary` (optional nodes
/// publishing `oxidation_rate`/`reduction_rate`), `nu` (attempt frequency),
/// `energies` (barrier per transition), `temperature`. Outputs: `rates`,
/// `timeconstants`.
///
/// Only the parts whose inputs changed are recomputed; the other rates keep
/// their previous values.
#[derive(Debug, Default)]
pub struct RateCalculator4State;

impl RateCalculator4State {
    fn recharge(
        cx: &Context<'_>,
        rates: &mut Table,
        input: &str,
        oxidation: &str,
        reduction: &str,
    ) -> Result<bool> {
        if !cx.changed(input)? {
            return Ok(false);
        }
        if let Some(node) = cx.optional_node(input)? {
            rates.insert(oxidation.to_string(), node.scalar("oxidation_rate")?);
            rates.insert(reduction.to_string(), node.scalar("reduction_rate")?);
        }
        trace!(input, "recharge rates refreshed");
        Ok(true)
    }
}

impl Calculator for RateCalculator4State {
    fn kind(&self) -> &'static str {
        "RateCalculator4State"
    }

    fn declare(&self, vars: &mut VariableRegistry) -> Result<()> {
        vars.declare_input("recharge_primary", Value::Unset)?;
        vars.declare_input("recharge_secondary", Value::Unset)?;
        vars.declare_input("nu", 0.0)?;
        vars.declare_input("energies", Table::new())?;
        vars.declare_input("temperature", Value::Unset)?;
        vars.declare_output("rates", Table::new())?;
        vars.declare_output("timeconstants", Table::new())
    }

    fn recompute(&mut self, cx: &Context<'_>, out: &mut Publisher<'_>) -> Result<()> {
        let mut rates = Table::clone(&*cx.previous("rates")?.expect_table("rates")?);

        let mut changed =
            Self::recharge(cx, &mut rates, "recharge_primary", STATE1_TO_2P, STATE2P_TO_1)?;
        changed |=
            Self::recharge(cx, &mut rates, "recharge_secondary", STATE1P_TO_2, STATE2_TO_1P)?;

        if cx.changed("energies")? || cx.changed("nu")? || cx.changed("temperature")? {
            let energies = cx.table("energies")?;
            if !energies.is_empty() {
                let nu = cx.scalar("nu")?;
                let kt = thermal_energy(cx.scalar("temperature")?);
                for (transition, barrier) in energies.iter() {
                    rates.insert(transition.clone(), nu * (-barrier / kt).exp());
                }
            }
            changed = true;
        }

        if changed {
            out.publish("timeconstants", time_constants(&rates))?;
            out.publish("rates", rates)?;
        }
        Ok(())
    }
}

/// Time constants supplied as data.
///
/// Input: `values`. Output: `timeconstants`.
#[derive(Debug, Default)]
pub struct TabulatedTimeConstants;

impl Calculator for TabulatedTimeConstants {
    fn kind(&self) -> &'static str {
        "TabulatedTimeConstants"
    }

    fn declare(&self, vars: &mut VariableRegistry) -> Result<()> {
        vars.require_input("values")?;
        vars.declare_output("timeconstants", Table::new())
    }

    fn recompute(&mut self, cx: &Context<'_>, out: &mut Publisher<'_>) -> Result<()> {
        out.publish("timeconstants", Value::Table(cx.table("values")?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::BOLTZMANN;
    use crate::node::{Config, NodeRef};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Charge transfer stand-in with settable rates.
    struct FixedTransition {
        runs: Arc<AtomicUsize>,
    }

    impl Calculator for FixedTransition {
        fn kind(&self) -> &'static str {
            "FixedTransition"
        }

        fn declare(&self, vars: &mut VariableRegistry) -> Result<()> {
            vars.declare_input("ox", 0.0)?;
            vars.declare_input("red", 0.0)?;
            vars.declare_output("oxidation_rate", Value::Unset)?;
            vars.declare_output("reduction_rate", Value::Unset)
        }

        fn recompute(&mut self, cx: &Context<'_>, out: &mut Publisher<'_>) -> Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            out.publish("oxidation_rate", cx.scalar("ox")?)?;
            out.publish("reduction_rate", cx.scalar("red")?)
        }
    }

    fn transition(ox: f64, red: f64) -> (NodeRef, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        let config = Config::new().with("ox", ox).with("red", red);
        let node = NodeRef::with_config(FixedTransition { runs: runs.clone() }, config).unwrap();
        (node, runs)
    }

    fn table(node: &NodeRef, name: &str) -> Table {
        Table::clone(&node.output(name).unwrap().expect_table(name).unwrap())
    }

    #[test]
    fn recharge_nodes_fill_their_transitions() {
        let (primary, _) = transition(2.0, 4.0);
        let (secondary, _) = transition(5.0, 10.0);
        let config = Config::new()
            .with("recharge_primary", &primary)
            .with("recharge_secondary", &secondary);
        let node = NodeRef::with_config(RateCalculator4State, config).unwrap();

        assert!(node.update().unwrap());
        let rates = table(&node, "rates");
        assert_eq!(rates[STATE1_TO_2P], 2.0);
        assert_eq!(rates[STATE2P_TO_1], 4.0);
        assert_eq!(rates[STATE1P_TO_2], 5.0);
        assert_eq!(rates[STATE2_TO_1P], 10.0);

        let tau = table(&node, "timeconstants");
        assert_eq!(tau[STATE2_TO_1P], 0.1);
    }

    #[test]
    fn only_changed_parts_are_refreshed() {
        let (primary, primary_runs) = transition(2.0, 4.0);
        let (secondary, secondary_runs) = transition(5.0, 10.0);
        let config = Config::new()
            .with("recharge_primary", &primary)
            .with("recharge_secondary", &secondary);
        let node = NodeRef::with_config(RateCalculator4State, config).unwrap();
        node.update().unwrap();

        primary.set("ox", 8.0).unwrap();
        assert!(node.update().unwrap());
        let rates = table(&node, "rates");
        assert_eq!(rates[STATE1_TO_2P], 8.0);
        assert_eq!(rates[STATE1P_TO_2], 5.0);
        assert_eq!(primary_runs.load(Ordering::SeqCst), 2);
        assert_eq!(secondary_runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn barriers_are_thermally_activated() {
        let t = 300.0;
        let kt = BOLTZMANN * t;
        let energies: Table = [(STATE2P_TO_2.to_string(), kt), (STATE1P_TO_1.to_string(), 0.0)]
            .into_iter()
            .collect();
        let config = Config::new()
            .with("nu", 1e13)
            .with("energies", energies)
            .with("temperature", t);
        let node = NodeRef::with_config(RateCalculator4State, config).unwrap();
        assert!(node.update().unwrap());

        let rates = table(&node, "rates");
        assert!((rates[STATE2P_TO_2] / (1e13 * (-1.0f64).exp()) - 1.0).abs() < 1e-12);
        assert_eq!(rates[STATE1P_TO_1], 1e13);

        // Rates from barriers persist when only the temperature changes.
        node.set("temperature", 2.0 * t).unwrap();
        assert!(node.update().unwrap());
        let rates = table(&node, "rates");
        assert!((rates[STATE2P_TO_2] / (1e13 * (-0.5f64).exp()) - 1.0).abs() < 1e-12);
        assert_eq!(rates.len(), 2);
    }

    #[test]
    fn previous_rates_survive_partial_updates() {
        let (primary, _) = transition(2.0, 4.0);
        let energies: Table = [(STATE2_TO_2P.to_string(), 0.0)].into_iter().collect();
        let config = Config::new()
            .with("recharge_primary", &primary)
            .with("nu", 3.0)
            .with("energies", energies)
            .with("temperature", 300.0);
        let node = NodeRef::with_config(RateCalculator4State, config).unwrap();
        node.update().unwrap();

        node.set("nu", 6.0).unwrap();
        node.update().unwrap();
        let rates = table(&node, "rates");
        assert_eq!(rates[STATE2_TO_2P], 6.0);
        assert_eq!(rates[STATE1_TO_2P], 2.0);
    }

    #[test]
    fn tabulated_time_constants_pass_through() {
        let values: Table = [("1->2'".to_string(), 2.0)].into_iter().collect();
        let node =
            NodeRef::with_config(TabulatedTimeConstants, Config::new().with("values", values))
                .unwrap();
        assert!(node.update().unwrap());
        assert_eq!(table(&node, "timeconstants")["1->2'"], 2.0);
    }
}
