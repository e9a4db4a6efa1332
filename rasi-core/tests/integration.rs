//! Integration Tests for the Calculator Graph
//!
//! These tests verify that nodes, composites and the physics models work
//! together through the public API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rasi_core::constants::BOLTZMANN;
use rasi_core::emf::{DefectRecord, EmfData, EmfMetadata, Reservoir, ReservoirSet};
use rasi_core::experiments::StaticTdds4State;
use rasi_core::graph::UpdateScheduler;
use rasi_core::lineshape::ClassicalLineShape;
use rasi_core::nmp::FullNmpTransition;
use rasi_core::node::{ChangeTracking, Table, VariableRegistry};
use rasi_core::rates::{RateCalculator4State, TabulatedTimeConstants};
use rasi_core::{catalog, Calculator, Config, Context, NodeError, NodeRef, Publisher, Result, Value};

/// Publishes `value = scale * (x + sum of child values)`, counting runs.
struct Scaled {
    runs: Arc<AtomicUsize>,
}

impl Calculator for Scaled {
    fn kind(&self) -> &'static str {
        "Scaled"
    }

    fn declare(&self, vars: &mut VariableRegistry) -> Result<()> {
        vars.declare_input("x", 0.0)?;
        vars.declare_input("scale", 1.0)?;
        vars.declare_input("left", Value::Unset)?;
        vars.declare_input("right", Value::Unset)?;
        vars.declare_output("value", Value::Unset)
    }

    fn recompute(&mut self, cx: &Context<'_>, out: &mut Publisher<'_>) -> Result<()> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let mut total = cx.scalar("x")?;
        for name in ["left", "right"] {
            if let Some(child) = cx.optional_node(name)? {
                total += child.scalar("value")?;
            }
        }
        out.publish("value", cx.scalar("scale")? * total)
    }
}

fn scaled(config: Config) -> (NodeRef, Arc<AtomicUsize>) {
    let runs = Arc::new(AtomicUsize::new(0));
    let node = NodeRef::with_config(Scaled { runs: runs.clone() }, config).unwrap();
    (node, runs)
}

fn runs(counter: &Arc<AtomicUsize>) -> usize {
    counter.load(Ordering::SeqCst)
}

/// Test that a second update without input changes does nothing.
#[test]
fn update_is_idempotent() {
    let (node, counter) = scaled(Config::new().with("x", 2.0));

    assert!(node.update().unwrap());
    assert!(!node.update().unwrap());
    assert!(!node.update().unwrap());
    assert_eq!(runs(&counter), 1);
    assert_eq!(node.scalar("value").unwrap(), 2.0);
}

/// Test that writing an input marks it changed even when the value is equal.
#[test]
fn writes_always_mark_changed() {
    let (node, counter) = scaled(Config::new().with("x", 2.0));
    node.update().unwrap();

    node.set("x", 2.0).unwrap();
    assert!(node.is_changed("x").unwrap());
    assert!(node.update().unwrap());
    assert_eq!(runs(&counter), 2);
}

/// Test that outputs cannot be written from outside.
#[test]
fn outputs_are_read_only() {
    let (node, _) = scaled(Config::new());
    let err = node.set("value", 1.0).unwrap_err();
    assert!(err.is_configuration());
    assert!(node.output("value").unwrap().is_unset());
}

/// Test that unknown names fail eagerly.
#[test]
fn unknown_variables_are_reported() {
    let (node, _) = scaled(Config::new());
    assert!(node.set("y", 1.0).unwrap_err().is_unknown_variable());
    assert!(node.get("y").unwrap_err().is_unknown_variable());
    assert!(node.is_changed("value").unwrap_err().is_unknown_variable());
    assert!(node.lookup("changed_y").unwrap_err().is_unknown_variable());
}

/// Test attribute-style access to flags and variables.
#[test]
fn lookup_reads_flags_and_variables() {
    let (node, _) = scaled(Config::new());
    assert_eq!(node.lookup("changed").unwrap().as_bool(), Some(false));

    node.set("scale", 3.0).unwrap();
    assert_eq!(node.lookup("changed").unwrap().as_bool(), Some(true));
    assert_eq!(node.lookup("changed_scale").unwrap().as_bool(), Some(true));
    assert_eq!(node.lookup("changed_x").unwrap().as_bool(), Some(false));
    assert_eq!(node.lookup("scale").unwrap().as_scalar(), Some(3.0));

    node.update().unwrap();
    assert_eq!(node.lookup("value").unwrap().as_scalar(), Some(0.0));
    assert_eq!(node.lookup("changed").unwrap().as_bool(), Some(false));
}

/// Test that an unchanged subtree is not recomputed.
#[test]
fn unchanged_children_short_circuit() {
    let (left, left_runs) = scaled(Config::new().with("x", 1.0));
    let (right, right_runs) = scaled(Config::new().with("x", 2.0));
    let (root, root_runs) = scaled(Config::new().with("left", &left).with("right", &right));

    assert!(root.update().unwrap());
    assert_eq!(root.scalar("value").unwrap(), 3.0);

    right.set("x", 5.0).unwrap();
    assert!(root.update().unwrap());
    assert_eq!(root.scalar("value").unwrap(), 6.0);
    assert_eq!(runs(&left_runs), 1);
    assert_eq!(runs(&right_runs), 2);
    assert_eq!(runs(&root_runs), 2);

    assert!(!root.update().unwrap());
    assert_eq!(runs(&root_runs), 2);
}

/// Build `root <- {left, right} <- shared` with the given tracking on the
/// two middle nodes.
fn diamond(tracking: ChangeTracking) -> (NodeRef, NodeRef, NodeRef) {
    let (shared, _) = scaled(Config::new().with("x", 1.0));
    let (left, _) = scaled(Config::new().with("left", &shared));
    let (right, _) = scaled(Config::new().with("left", &shared).with("scale", 10.0));
    let left = left.with_tracking(tracking);
    let right = right.with_tracking(tracking);
    let (root, _) = scaled(Config::new().with("left", &left).with("right", &right));
    (root, shared, right)
}

/// Test that a shared child is seen as changed by every parent.
#[test]
fn shared_child_reaches_every_parent() {
    let (root, shared, right) = diamond(ChangeTracking::Revision);
    root.update().unwrap();
    assert_eq!(root.scalar("value").unwrap(), 11.0);

    shared.set("x", 2.0).unwrap();
    assert!(root.update().unwrap());
    assert_eq!(right.scalar("value").unwrap(), 20.0);
    assert_eq!(root.scalar("value").unwrap(), 22.0);
}

/// Test that one-shot tracking loses the change for the second parent.
#[test]
fn one_shot_tracking_misses_shared_child() {
    let (root, shared, right) = diamond(ChangeTracking::OneShot);
    root.update().unwrap();

    shared.set("x", 2.0).unwrap();
    assert!(root.update().unwrap());
    assert_eq!(right.scalar("value").unwrap(), 10.0);
    assert_eq!(root.scalar("value").unwrap(), 12.0);

    // Nothing left to pick up the change later.
    assert!(!root.update().unwrap());
    assert_eq!(right.scalar("value").unwrap(), 10.0);
}

/// Test that two parents polled one after the other both see a shared
/// child's change only with revision tracking.
#[test]
fn sibling_parents_polled_in_sequence() {
    for (tracking, second_sees_change) in
        [(ChangeTracking::OneShot, false), (ChangeTracking::Revision, true)]
    {
        let (shared, _) = scaled(Config::new().with("x", 1.0));
        let (p1, _) = scaled(Config::new().with("left", &shared));
        let (p2, p2_runs) = scaled(Config::new().with("left", &shared));
        let p1 = p1.with_tracking(tracking);
        let p2 = p2.with_tracking(tracking);
        p1.update().unwrap();
        p2.update().unwrap();

        shared.set("x", 3.0).unwrap();
        assert!(p1.update().unwrap());
        assert_eq!(p2.update().unwrap(), second_sees_change);
        assert_eq!(runs(&p2_runs), if second_sees_change { 2 } else { 1 });
    }
}

/// Test that a cycle through node inputs fails instead of deadlocking.
#[test]
fn cyclic_wiring_is_detected() {
    let (a, _) = scaled(Config::new());
    let (b, _) = scaled(Config::new().with("left", &a));
    a.set("left", &b).unwrap();

    let err = a.update().unwrap_err();
    assert_eq!(err, NodeError::Cycle { node: a.id().raw() });

    let scheduler = UpdateScheduler::from_roots([&a]);
    assert!(matches!(scheduler.order(), Err(NodeError::Cycle { .. })));

    a.set("left", Value::Unset).unwrap();
    assert!(a.update().unwrap());
}

/// Test that a missing collaborator is reported on every attempt.
#[test]
fn missing_collaborator_is_raised_repeatedly() {
    let node = NodeRef::new(StaticTdds4State).unwrap();
    let first = node.update().unwrap_err();
    assert!(first.is_missing_collaborator());
    assert_eq!(node.update().unwrap_err(), first);

    let rates = catalog::build_json(
        "TabulatedTimeConstants",
        r#"{ "values": { "1->2'": 2.0, "2'->2": 3.0, "2'->1": 5.0, "2->2'": 4.0,
                         "2->1'": 6.0, "1'->1": 7.0, "1'->2": 8.0 } }"#,
    )
    .unwrap();
    node.set("microscopic_rate_calculator", &rates).unwrap();
    assert!(node.update().unwrap());
}

/// Test the TDDS observables end to end, including a change in the
/// tabulated time constants.
#[test]
fn tdds_follows_time_constant_changes() {
    let mut values: Table = [
        ("1->2'", 2.0),
        ("2'->2", 3.0),
        ("2'->1", 5.0),
        ("2->2'", 4.0),
        ("2->1'", 6.0),
        ("1'->1", 7.0),
        ("1'->2", 8.0),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();
    let rates = NodeRef::with_config(
        TabulatedTimeConstants,
        Config::new().with("values", values.clone()),
    )
    .unwrap();
    let tdds = NodeRef::with_config(
        StaticTdds4State,
        Config::new().with("microscopic_rate_calculator", &rates),
    )
    .unwrap();

    assert!(tdds.update().unwrap());
    assert!((tdds.scalar("tauc").unwrap() - 6.2).abs() < 1e-12);
    assert!(!tdds.update().unwrap());

    values.insert("2'->2".to_string(), 5.0);
    rates.set("values", values).unwrap();
    assert!(tdds.update().unwrap());
    // 2 + 5 * (1 + 2 / 5)
    assert!((tdds.scalar("tauc").unwrap() - 9.0).abs() < 1e-12);
}

fn emf_dataset(kt: f64) -> EmfData {
    let reservoirs = || {
        let mut set = ReservoirSet::new();
        set.insert(
            "substrate".into(),
            Reservoir::new(vec![0.0, kt, 2.0 * kt], vec![1.0, 1.0, 1.0]).unwrap(),
        );
        set
    };
    let record = |position: f64| DefectRecord {
        position,
        ec: 1.0,
        ev: 0.0,
        phi: 0.0,
        oxidation_reservoir: reservoirs(),
        reduction_reservoir: reservoirs(),
    };
    EmfData::new(EmfMetadata::default(), vec![record(0.0), record(1.0)]).unwrap()
}

/// Test the full chain from a lineshape to TDDS time constants.
#[test]
fn lineshape_to_tdds_chain() {
    let t = 300.0;
    let kt = BOLTZMANN * t;

    let lineshape = NodeRef::with_config(
        ClassicalLineShape,
        Config::new()
            .with("k_occupied", kt)
            .with("k_unoccupied", kt)
            .with("equilibrium_shift", 1.0)
            .with("thermodynamic_level", 0.0)
            .with("temperature", t),
    )
    .unwrap();
    let eme = catalog::build(
        "EmfPositionInterpolator",
        Config::new().with("emf", emf_dataset(kt)).with("position", 0.5),
    )
    .unwrap();
    let transition = |mlambda: f64| {
        NodeRef::with_config(
            FullNmpTransition,
            Config::new()
                .with("lineshape", &lineshape)
                .with("electronic_matrix_element", &eme)
                .with("mlambda", mlambda),
        )
        .unwrap()
    };
    let primary = transition(1.0);
    let secondary = transition(2.0);

    let energies: Table = [("2'->2", 0.0), ("2->2'", 0.0), ("1'->1", 0.0)]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    let rates = NodeRef::with_config(
        RateCalculator4State,
        Config::new()
            .with("recharge_primary", &primary)
            .with("recharge_secondary", &secondary)
            .with("nu", 1.0)
            .with("energies", energies)
            .with("temperature", t),
    )
    .unwrap();
    let tdds = NodeRef::with_config(
        StaticTdds4State,
        Config::new().with("microscopic_rate_calculator", &rates),
    )
    .unwrap();

    let mut scheduler = UpdateScheduler::new();
    scheduler.add_root(&tdds);
    assert_eq!(scheduler.node_count(), 6);
    assert_eq!(scheduler.update_all().unwrap().len(), 6);

    let ox = primary.scalar("oxidation_rate").unwrap();
    let red = primary.scalar("reduction_rate").unwrap();
    assert!(ox > 0.0 && ox.is_finite());
    assert!(red > 0.0 && red.is_finite());
    assert!((secondary.scalar("oxidation_rate").unwrap() - 2.0 * ox).abs() <= 1e-12 * ox);

    let tau = rates.output("timeconstants").unwrap().expect_table("timeconstants").unwrap();
    assert_eq!(tau.len(), 7);
    let expected = tau["1->2'"] + tau["2'->2"] * (1.0 + tau["1->2'"] / tau["2'->1"]);
    let tauc = tdds.scalar("tauc").unwrap();
    assert!((tauc - expected).abs() <= 1e-12 * expected);

    // Both transitions share the lineshape; both must pick up the change.
    lineshape.set("temperature", 350.0).unwrap();
    assert!(tdds.update().unwrap());
    assert_eq!(primary.revision(), 2);
    assert_eq!(secondary.revision(), 2);
    assert_eq!(eme.revision(), 1);
    assert_ne!(tdds.scalar("tauc").unwrap(), tauc);

    assert!(scheduler.update_all().unwrap().is_empty());
}
