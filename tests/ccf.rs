//! Common-cause failure groups expanded into the analysis.

use fta_rs::analysis::Analysis;
use fta_rs::ccf::{CcfGroup, CcfModel};
use fta_rs::error::{AnalysisError, ValidationError};
use fta_rs::expression::Expression;
use fta_rs::model::{Formula, Model, ModelBuilder};
use fta_rs::settings::Settings;

const Q: f64 = 0.1;
const BETA: f64 = 0.2;

fn pumps(model: CcfModel, factors: Vec<f64>) -> Model {
    let mut b = ModelBuilder::new("pumps");
    let ft = b.add_fault_tree("Pumps").unwrap();
    // Member expressions are superseded by the group distribution.
    let a = b.add_basic_event("PumpA", Expression::Constant(0.5)).unwrap();
    let c = b.add_basic_event("PumpB", Expression::Constant(0.5)).unwrap();
    b.add_gate(ft, "BothPumps", Formula::and([a.into(), c.into()])).unwrap();

    let other = b.add_fault_tree("Power").unwrap();
    let grid = b.add_basic_event("Grid", Expression::Constant(0.01)).unwrap();
    let diesel = b.add_basic_event("Diesel", Expression::Constant(0.05)).unwrap();
    b.add_gate(other, "NoPower", Formula::and([grid.into(), diesel.into()]))
        .unwrap();

    b.add_ccf_group(CcfGroup::new(
        "PumpCcf",
        model,
        [a, c],
        Expression::Constant(Q),
        factors,
    ))
    .unwrap();
    b.build()
}

#[test]
fn beta_factor_products() {
    let report = Analysis::default().run(&pumps(CcfModel::BetaFactor, vec![BETA]));
    let result = report.get("Pumps").unwrap().as_ref().unwrap();
    let names: Vec<String> = result.products.iter().map(|p| p.to_string()).collect();
    assert_eq!(names, vec!["{[PumpA PumpB]}", "{[PumpA], [PumpB]}"]);
}

#[test]
fn beta_factor_probability() {
    let settings = Settings::default().with_importance_analysis(true);
    let report = Analysis::new(settings).run(&pumps(CcfModel::BetaFactor, vec![BETA]));
    let result = report.get("Pumps").unwrap().as_ref().unwrap();

    let independent = (1.0 - BETA) * Q;
    let common = BETA * Q;
    let expected = common + independent * independent - common * independent * independent;
    assert!((result.probability.unwrap() - expected).abs() < 1e-12);

    let importance = result.importance.as_ref().unwrap();
    let keys: Vec<&str> = importance.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["[PumpA PumpB]", "[PumpA]", "[PumpB]"]);
    assert_eq!(importance["[PumpA PumpB]"].occurrence, 1);
    assert!(importance["[PumpA PumpB]"].dif > importance["[PumpA]"].dif);
}

#[test]
fn mgl_matches_beta_factor_for_two_members() {
    let beta = Settings::default().with_probability_analysis(true);
    let a = Analysis::new(beta.clone()).run(&pumps(CcfModel::BetaFactor, vec![BETA]));
    let b = Analysis::new(beta).run(&pumps(CcfModel::Mgl, vec![BETA]));
    let qa = a.get("Pumps").unwrap().as_ref().unwrap().probability.unwrap();
    let qb = b.get("Pumps").unwrap().as_ref().unwrap().probability.unwrap();
    assert!((qa - qb).abs() < 1e-12);
}

#[test]
fn invalid_group_fails_only_its_fault_trees() {
    // Beta factor takes a single factor.
    let report = Analysis::default().run(&pumps(CcfModel::BetaFactor, vec![0.1, 0.2]));
    match report.get("Pumps").unwrap() {
        Err(AnalysisError::Validation(ValidationError::CcfGroup { group, .. })) => {
            assert_eq!(group, "PumpCcf");
        }
        other => panic!("unexpected {:?}", other),
    }
    let power = report.get("Power").unwrap().as_ref().unwrap();
    assert_eq!(power.products.len(), 1);
}
