//! A two-train system: each train fails when its valve or its pump fails,
//! and the system fails when both trains fail.

use fta_rs::analysis::{Analysis, FaultTreeResult, Warning};
use fta_rs::expression::{Deviate, Expression};
use fta_rs::importance::ImportanceRecord;
use fta_rs::model::{Formula, Model, ModelBuilder};
use fta_rs::probability::Approximation;
use fta_rs::settings::Settings;

const VALVE: f64 = 0.5;
const PUMP: f64 = 0.7;

fn two_train(uncertain_valve: bool) -> Model {
    let mut b = ModelBuilder::new("two-train");
    let ft = b.add_fault_tree("TwoTrain").unwrap();
    let mut trains = Vec::new();
    for train in ["One", "Two"] {
        let valve = b
            .add_basic_event(format!("Valve{}", train), Expression::Constant(VALVE))
            .unwrap();
        let pump = b
            .add_basic_event(format!("Pump{}", train), Expression::Constant(PUMP))
            .unwrap();
        trains.push(
            b.add_gate(ft, format!("Train{}", train), Formula::or([valve.into(), pump.into()]))
                .unwrap(),
        );
    }
    b.add_gate(ft, "TopEvent", Formula::and([trains[0].into(), trains[1].into()]))
        .unwrap();
    if uncertain_valve {
        let valve = b.lookup("ValveOne").unwrap();
        b.set_uncertainty(valve, Deviate::Uniform { min: 0.4, max: 0.6 }).unwrap();
    }
    b.build()
}

fn run(model: &Model, settings: Settings) -> FaultTreeResult {
    let report = Analysis::new(settings).run(model);
    report.get("TwoTrain").unwrap().as_ref().unwrap().clone()
}

fn train_failure() -> f64 {
    1.0 - (1.0 - VALVE) * (1.0 - PUMP)
}

// ─── Products ──────────────────────────────────────────────────────────────────

#[test]
fn minimal_cut_sets() {
    let result = run(&two_train(false), Settings::default());
    assert_eq!(result.top_gate, "TopEvent");
    let names: Vec<String> = result.products.iter().map(|p| p.to_string()).collect();
    assert_eq!(
        names,
        vec![
            "{PumpOne, PumpTwo}",
            "{PumpOne, ValveTwo}",
            "{PumpTwo, ValveOne}",
            "{ValveOne, ValveTwo}",
        ]
    );
    assert_eq!(result.products.distribution(), vec![0, 4]);
    assert_eq!(result.products.max_order(), 2);
}

#[test]
fn prime_implicants_of_a_coherent_tree_are_its_cut_sets() {
    let settings = Settings::default().with_prime_implicants(true).unwrap();
    let prime = run(&two_train(false), settings);
    let cut_sets = run(&two_train(false), Settings::default());
    assert_eq!(prime.products, cut_sets.products);
}

// ─── Probability ───────────────────────────────────────────────────────────────

#[test]
fn exact_probability() {
    let result = run(&two_train(false), Settings::default().with_probability_analysis(true));
    let q = result.probability.unwrap();
    assert!((q - 0.7225).abs() < 1e-12);
    assert!(result.warnings.is_empty());

    // Contributions of overlapping products do not sum to 1.
    let sum: f64 = result.products.iter().map(|p| p.contribution.unwrap()).sum();
    assert!((sum - 1.44 / 0.7225).abs() < 1e-9);
}

#[test]
fn rare_event_is_clamped() {
    let settings = Settings::default()
        .with_probability_analysis(true)
        .with_approximation(Approximation::RareEvent)
        .unwrap();
    let result = run(&two_train(false), settings);
    assert_eq!(result.probability, Some(1.0));
    match &result.warnings[..] {
        [Warning::ProbabilityOutOfRange { value }, Warning::RareEventDivergence { exact, .. }] => {
            assert!((value - 1.44).abs() < 1e-12);
            assert!((exact - 0.7225).abs() < 1e-12);
        }
        other => panic!("unexpected warnings {:?}", other),
    }
}

#[test]
fn mcub_probability() {
    let settings = Settings::default()
        .with_probability_analysis(true)
        .with_approximation(Approximation::Mcub)
        .unwrap();
    let result = run(&two_train(false), settings);
    let expected = 1.0 - (1.0 - 0.25) * (1.0 - 0.35) * (1.0 - 0.35) * (1.0 - 0.49);
    assert!((result.probability.unwrap() - expected).abs() < 1e-12);
    assert!(result.warnings.is_empty());
}

// ─── Importance ────────────────────────────────────────────────────────────────

#[test]
fn importance_of_valve() {
    let settings = Settings::default().with_importance_analysis(true);
    let result = run(&two_train(false), settings);
    let importance = result.importance.unwrap();
    assert_eq!(importance.len(), 4);

    let q = 0.7225;
    let t = train_failure();
    let q0 = PUMP * t;
    let q1 = t;
    let valve = importance["ValveOne"];
    assert_eq!(valve.occurrence, 2);
    assert!((valve.mif - (q1 - q0)).abs() < 1e-12);
    assert!((valve.cif - (q1 - q0) * VALVE / q).abs() < 1e-12);
    assert!((valve.dif - VALVE * q1 / q).abs() < 1e-12);
    assert!((valve.raw - q1 / q).abs() < 1e-12);
    assert!((valve.rrw - q / q0).abs() < 1e-12);

    // Symmetric trains have identical records.
    assert_eq!(importance["ValveOne"], importance["ValveTwo"]);
    assert_eq!(importance["PumpOne"], importance["PumpTwo"]);
    assert_ne!(importance["PumpOne"], ImportanceRecord::NEUTRAL);
}

// ─── Uncertainty ───────────────────────────────────────────────────────────────

#[test]
fn uncertainty_of_valve() {
    let settings = Settings::default()
        .with_uncertainty_analysis(true)
        .with_num_trials(4000)
        .unwrap()
        .with_num_bins(10)
        .unwrap();
    let result = run(&two_train(true), settings.clone());
    let uncertainty = result.uncertainty.unwrap();

    assert_eq!(uncertainty.num_trials, 4000);
    // The top event is linear in the valve probability, whose mean is 0.5.
    assert!((uncertainty.mean - 0.7225).abs() < 0.005, "mean = {}", uncertainty.mean);
    assert!(uncertainty.sigma > 0.0);
    let (lo, hi) = uncertainty.confidence_interval;
    assert!(lo < uncertainty.mean && uncertainty.mean < hi);
    assert_eq!(uncertainty.histogram.len(), 10);
    // Bounds of the top event when the valve ranges over [0.4, 0.6].
    let low = (1.0 - 0.6 * 0.3) * train_failure();
    let high = (1.0 - 0.4 * 0.3) * train_failure();
    assert!(uncertainty.histogram[0].lower >= low - 1e-12);
    assert!(uncertainty.histogram[9].upper <= high + 1e-12);

    let again = run(&two_train(true), settings);
    assert_eq!(again.uncertainty, Some(uncertainty));
}

#[test]
fn uncertainty_without_distributions_is_degenerate() {
    let settings = Settings::default().with_uncertainty_analysis(true);
    let result = run(&two_train(false), settings);
    let uncertainty = result.uncertainty.unwrap();
    assert!((uncertainty.mean - 0.7225).abs() < 1e-12);
    assert_eq!(uncertainty.histogram.len(), 1);
    assert_eq!(uncertainty.histogram[0].density, 1.0);
}
