//! Experiments
//!
//! Observables of measurement setups, computed from the time constants a
//! microscopic rate calculator publishes.

use tracing::debug;

use crate::error::{DomainError, Result};
use crate::node::{Calculator, Context, Publisher, Table, Value, VariableRegistry};
use crate::rates::transitions::*;

fn tau(table: &Table, transition: &str) -> Result<f64, DomainError> {
    table
        .get(transition)
        .copied()
        .ok_or_else(|| DomainError::MissingTransition(transition.to_string()))
}

/// Effective capture and emission times of a four-state defect in a static
/// time-dependent defect spectroscopy (TDDS) measurement.
///
/// Input: `microscopic_rate_calculator` (node publishing `timeconstants`).
/// Outputs: `tauc`, `taue`, `taue1`, `taue2`.
#[derive(Debug, Default)]
pub struct StaticTdds4State;

impl Calculator for StaticTdds4State {
    fn kind(&self) -> &'static str {
        "StaticTdds4State"
    }

    fn declare(&self, vars: &mut VariableRegistry) -> Result<()> {
        vars.require_input("microscopic_rate_calculator")?;
        for name in ["tauc", "taue", "taue1", "taue2"] {
            vars.declare_output(name, Value::Unset)?;
        }
        Ok(())
    }

    fn recompute(&mut self, cx: &Context<'_>, out: &mut Publisher<'_>) -> Result<()> {
        let rates = cx.node("microscopic_rate_calculator")?;
        let t = rates.output("timeconstants")?.expect_table("timeconstants")?;

        let t_1_2p = tau(&t, STATE1_TO_2P)?;
        let t_2p_2 = tau(&t, STATE2P_TO_2)?;
        let t_2p_1 = tau(&t, STATE2P_TO_1)?;
        let t_2_2p = tau(&t, STATE2_TO_2P)?;
        let t_2_1p = tau(&t, STATE2_TO_1P)?;
        let t_1p_1 = tau(&t, STATE1P_TO_1)?;
        let t_1p_2 = tau(&t, STATE1P_TO_2)?;

        let tauc = t_1_2p + t_2p_2 * (1.0 + t_1_2p / t_2p_1);
        let taue1 = t_2_2p + t_2p_1 * (1.0 + t_2_2p / t_2p_2);
        let taue2 = t_2_1p + t_1p_1 * (1.0 + t_2_1p / t_1p_2);
        let taue = (taue1.recip() + taue2.recip()).recip();
        debug!(tauc, taue, taue1, taue2, "tdds time constants");

        out.publish("tauc", tauc)?;
        out.publish("taue", taue)?;
        out.publish("taue1", taue1)?;
        out.publish("taue2", taue2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NodeError;
    use crate::node::{Config, NodeRef};
    use crate::rates::TabulatedTimeConstants;

    fn time_constants(entries: &[(&str, f64)]) -> NodeRef {
        let values: Table = entries.iter().map(|&(k, v)| (k.to_string(), v)).collect();
        NodeRef::with_config(TabulatedTimeConstants, Config::new().with("values", values)).unwrap()
    }

    fn tdds(rates: &NodeRef) -> NodeRef {
        let config = Config::new().with("microscopic_rate_calculator", rates);
        NodeRef::with_config(StaticTdds4State, config).unwrap()
    }

    #[test]
    fn time_constants_combine_into_observables() {
        let rates = time_constants(&[
            ("1->2'", 2.0),
            ("2'->2", 3.0),
            ("2'->1", 5.0),
            ("2->2'", 4.0),
            ("2->1'", 6.0),
            ("1'->1", 7.0),
            ("1'->2", 8.0),
        ]);
        let node = tdds(&rates);
        assert!(node.update().unwrap());

        assert!((node.scalar("tauc").unwrap() - 6.2).abs() < 1e-12);
        assert!((node.scalar("taue1").unwrap() - 47.0 / 3.0).abs() < 1e-12);
        assert!((node.scalar("taue2").unwrap() - 18.25).abs() < 1e-12);
        let taue1 = 47.0 / 3.0;
        let expected = 1.0 / (1.0 / taue1 + 1.0 / 18.25);
        assert!((node.scalar("taue").unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn missing_transition_is_fatal() {
        let rates = time_constants(&[("1->2'", 2.0)]);
        let err = tdds(&rates).update().unwrap_err();
        assert_eq!(err, NodeError::from(DomainError::MissingTransition("2'->2".into())));
    }

    #[test]
    fn unset_rate_calculator_is_reported() {
        let node = NodeRef::new(StaticTdds4State).unwrap();
        for _ in 0..2 {
            let err = node.update().unwrap_err();
            assert!(err.is_missing_collaborator());
        }
    }
}
