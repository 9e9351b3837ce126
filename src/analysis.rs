//! Analysis runs over every fault tree of a model.
//!
//! Each fault tree goes through the same pipeline on its own worker:
//! validation, normal form, BDD, products (ZDD), then optionally the top
//! event probability, importance measures and uncertainty analysis. Every
//! worker owns its decision-diagram managers; only the immutable [`Model`]
//! and the CCF expansion are shared.
//!
//! ```
//! use fta_rs::analysis::Analysis;
//! use fta_rs::expression::Expression;
//! use fta_rs::model::{Formula, ModelBuilder};
//! use fta_rs::settings::Settings;
//!
//! let mut b = ModelBuilder::new("demo");
//! let ft = b.add_fault_tree("FT")?;
//! let a = b.add_basic_event("A", Expression::Constant(0.1))?;
//! let c = b.add_basic_event("B", Expression::Constant(0.2))?;
//! b.add_gate(ft, "Top", Formula::and([a.into(), c.into()]))?;
//! let model = b.build();
//!
//! let report = Analysis::new(Settings::default().with_probability_analysis(true)).run(&model);
//! let result = report.results["FT"].as_ref().unwrap();
//! assert_eq!(result.products.len(), 1);
//! assert!((result.probability.unwrap() - 0.02).abs() < 1e-12);
//! # Ok::<(), fta_rs::error::ValidationError>(())
//! ```

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::rc::Rc;
use std::time::Instant;

use log::{debug, info, warn};
use num_bigint::BigUint;
use rayon::prelude::*;

use crate::bdd::Bdd;
use crate::budget::{Budget, CancelToken, Interrupt};
use crate::ccf::CcfExpansion;
use crate::error::{AnalysisError, Limit, ValidationError};
use crate::expression::Sampler;
use crate::importance::{self, ImportanceRecord};
use crate::model::{FaultTree, Model};
use crate::normalize::{NormalForm, Normalizer, Source};
use crate::probability::{
    above_cut_off, clamp_probability, relative_error, Approximation, Exact, Mcub, Quantify, RareEvent,
};
use crate::products::{ProductGenerator, ProductSet};
use crate::reference::Ref;
use crate::settings::Settings;
use crate::types::Lit;
use crate::uncertainty::{UncertaintyAnalysis, UncertaintyResult};
use crate::zdd::Zdd;

/// Initial size of the unique tables, in bits.
const STORAGE_BITS: usize = 16;

/// Non-fatal findings attached to a result.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// The computed probability was outside `[0, 1]` and has been clamped.
    ProbabilityOutOfRange { value: f64 },
    /// The rare-event approximation exceeds the exact value by more than the
    /// configured threshold.
    RareEventDivergence {
        approximate: f64,
        exact: f64,
        relative_error: f64,
    },
    /// Products above the order limit were dropped.
    Truncated { limit_order: usize },
}

impl Display for Warning {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::ProbabilityOutOfRange { value } => {
                write!(f, "probability {} is outside [0, 1] and was clamped", value)
            }
            Warning::RareEventDivergence {
                approximate,
                exact,
                relative_error,
            } => write!(
                f,
                "rare-event approximation {} diverges from the exact value {} by {:.1}%",
                approximate,
                exact,
                relative_error * 100.0
            ),
            Warning::Truncated { limit_order } => {
                write!(f, "products of order above {} were dropped", limit_order)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FaultTreeResult {
    pub fault_tree: String,
    pub top_gate: String,
    pub products: ProductSet,
    pub probability: Option<f64>,
    pub importance: Option<BTreeMap<String, ImportanceRecord>>,
    pub uncertainty: Option<UncertaintyResult>,
    pub warnings: Vec<Warning>,
    pub truncated: bool,
}

impl FaultTreeResult {
    fn new(fault_tree: &str, top_gate: &str) -> Self {
        Self {
            fault_tree: fault_tree.to_string(),
            top_gate: top_gate.to_string(),
            products: ProductSet::default(),
            probability: None,
            importance: None,
            uncertainty: None,
            warnings: Vec::new(),
            truncated: false,
        }
    }
}

/// Outcome of every fault tree, keyed by fault tree name.
#[derive(Debug)]
pub struct AnalysisReport {
    pub results: BTreeMap<String, Result<FaultTreeResult, AnalysisError>>,
}

impl AnalysisReport {
    pub fn get(&self, fault_tree: &str) -> Option<&Result<FaultTreeResult, AnalysisError>> {
        self.results.get(fault_tree)
    }

    /// Whether every fault tree was analyzed successfully.
    pub fn is_success(&self) -> bool {
        self.results.values().all(|r| r.is_ok())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Analysis {
    settings: Settings,
    token: CancelToken,
}

impl Analysis {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            token: CancelToken::new(),
        }
    }

    /// Use `token` to cancel this analysis from another thread.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.token = token;
        self
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.token
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Analyze every fault tree of `model` in parallel. The time limit, if
    /// any, applies to the whole run.
    pub fn run(&self, model: &Model) -> AnalysisReport {
        let start = Instant::now();
        let deadline = self.settings.time_limit().map(|limit| start + limit);
        let ccf = CcfExpansion::new(model);

        let results: BTreeMap<String, Result<FaultTreeResult, AnalysisError>> = model
            .fault_trees()
            .par_iter()
            .map(|tree| (tree.name.clone(), self.analyze(model, tree, &ccf, deadline)))
            .collect();

        info!(
            "analyzed {} fault tree(s) of `{}` in {:?}",
            results.len(),
            model.name(),
            start.elapsed()
        );
        AnalysisReport { results }
    }

    /// Analyze a single fault tree of `model`.
    pub fn analyze_fault_tree(
        &self,
        model: &Model,
        tree: &FaultTree,
        ccf: &CcfExpansion,
    ) -> Result<FaultTreeResult, AnalysisError> {
        let deadline = self.settings.time_limit().map(|limit| Instant::now() + limit);
        self.analyze(model, tree, ccf, deadline)
    }

    fn analyze(
        &self,
        model: &Model,
        tree: &FaultTree,
        ccf: &CcfExpansion,
        deadline: Option<Instant>,
    ) -> Result<FaultTreeResult, AnalysisError> {
        let s = &self.settings;
        let top = crate::validate::validate_fault_tree(model, tree)?;
        let mut result = FaultTreeResult::new(&tree.name, &model.event(top).name);
        info!("analyzing fault tree `{}` with top gate `{}`", tree.name, result.top_gate);

        let prime = s.prime_implicants();
        let form = Normalizer::new(model, ccf, !prime).run(top)?;
        let p = if s.probability_analysis() {
            Some(self.probabilities(model, ccf, &form)?)
        } else {
            None
        };

        let budget = Rc::new(Budget::new(self.token.clone(), deadline, s.node_limit()));
        if let Err(reason) = budget.check() {
            return Err(interrupted(reason, result));
        }
        let bdd = Bdd::with_budget(STORAGE_BITS, Rc::clone(&budget));
        let zdd = Zdd::with_budget(STORAGE_BITS, Rc::clone(&budget));

        let f = match form.to_bdd(&bdd) {
            Ok(f) => f,
            Err(reason) => return Err(interrupted(reason, result)),
        };
        info!("BDD of `{}`: {} nodes", tree.name, bdd.size(f));

        let mut generator = ProductGenerator::new(&bdd, &zdd, s.limit_order());
        let family = if prime {
            generator.prime_implicants(f)
        } else {
            generator.minimal_cut_sets(f)
        };
        if let Some(reason) = budget.interrupted() {
            return Err(interrupted(reason, result));
        }
        result.truncated = generator.is_truncated();

        if let Some(limit) = s.product_limit() {
            let count = zdd.count(family);
            if count > BigUint::from(limit) {
                warn!("fault tree `{}` has {} products, more than {}", tree.name, count, limit);
                result.products = ProductSet::extract(&zdd, family, &form, prime, true, Some(limit));
                result.truncated = true;
                return Err(AnalysisError::LimitExceeded {
                    limit: Limit::Products,
                    partial: Box::new(result),
                });
            }
        }
        result.products = ProductSet::extract(&zdd, family, &form, prime, result.truncated, None);
        if result.truncated {
            warn!(
                "fault tree `{}`: products above order {} were dropped",
                tree.name,
                s.limit_order()
            );
            result.warnings.push(Warning::Truncated {
                limit_order: s.limit_order(),
            });
        }

        let Some(p) = p else {
            return Ok(result);
        };

        let quantify: Box<dyn Quantify> = match s.approximation() {
            Approximation::Exact => match self.exact(&bdd, f, &result.products) {
                Ok(exact) => Box::new(exact),
                Err(reason) => return Err(interrupted(reason, result)),
            },
            Approximation::RareEvent => Box::new(RareEvent::new(self.kept_products(&result.products, &p))),
            Approximation::Mcub => Box::new(Mcub::new(self.kept_products(&result.products, &p))),
        };

        let raw = quantify.probability(&p);
        let (q, clamped) = clamp_probability(raw);
        if clamped {
            result.warnings.push(Warning::ProbabilityOutOfRange { value: raw });
        }

        if let (Approximation::RareEvent, Some(threshold)) = (s.approximation(), s.rare_event_divergence()) {
            let exact = match self.exact(&bdd, f, &result.products) {
                Ok(exact) => exact.probability(&p),
                Err(reason) => return Err(interrupted(reason, result)),
            };
            if let Some(error) = relative_error(raw, exact) {
                if error > threshold {
                    warn!(
                        "fault tree `{}`: rare-event approximation {} diverges from exact {}",
                        tree.name, raw, exact
                    );
                    result.warnings.push(Warning::RareEventDivergence {
                        approximate: raw,
                        exact,
                        relative_error: error,
                    });
                }
            }
        }

        for product in result.products.products_mut() {
            let probability = product.compute_probability(&p);
            product.probability = Some(probability);
            product.contribution = if q > 0.0 { Some(probability / q) } else { None };
        }
        result.probability = Some(q);
        info!("probability of `{}`: {:.6e}", tree.name, q);

        if s.importance_analysis() {
            let records = importance::compute(
                quantify.as_ref(),
                &form,
                &result.products,
                &p,
                raw,
                budget.watchdog(),
            );
            match records {
                Ok(records) => result.importance = Some(records),
                Err(reason) => return Err(interrupted(reason, result)),
            }
        }

        if s.uncertainty_analysis() {
            let samplers = self.samplers(model, &form, &p)?;
            let analysis =
                UncertaintyAnalysis::new(quantify.as_ref(), &samplers).with_watchdog(budget.watchdog().clone());
            match analysis.run(s.num_trials(), s.num_bins(), s.seed()) {
                Ok(uncertainty) => result.uncertainty = Some(uncertainty),
                Err(reason) => return Err(interrupted(reason, result)),
            }
        }

        Ok(result)
    }

    /// Nominal probability of every variable of `form`.
    fn probabilities(&self, model: &Model, ccf: &CcfExpansion, form: &NormalForm) -> Result<Vec<f64>, AnalysisError> {
        let t = self.settings.mission_time();
        form.variables()
            .iter()
            .map(|variable| -> Result<f64, AnalysisError> {
                match variable.source {
                    Source::Basic(id) => {
                        let event = model.event(id);
                        let basic = event
                            .basic()
                            .ok_or_else(|| ValidationError::NotABasicEvent(event.name.clone()))?;
                        if self.settings.uncertainty_analysis() {
                            if let Some(deviate) = &basic.uncertainty {
                                deviate.validate(&event.name)?;
                            }
                        }
                        Ok(basic.expression.probability(&event.name, t)?)
                    }
                    Source::Ccf(index) => Ok(ccf.event(index).probability(t)?),
                }
            })
            .collect()
    }

    fn samplers(&self, model: &Model, form: &NormalForm, p: &[f64]) -> Result<Vec<Sampler>, AnalysisError> {
        let t = self.settings.mission_time();
        form.variables()
            .iter()
            .zip(p)
            .map(|(variable, &nominal)| -> Result<Sampler, AnalysisError> {
                match variable.source {
                    Source::Basic(id) => {
                        let event = model.event(id);
                        let basic = event
                            .basic()
                            .ok_or_else(|| ValidationError::NotABasicEvent(event.name.clone()))?;
                        Ok(Sampler::new(&basic.expression, basic.uncertainty, nominal, t))
                    }
                    Source::Ccf(_) => Ok(Sampler::Fixed(nominal)),
                }
            })
            .collect()
    }

    fn kept_products(&self, products: &ProductSet, p: &[f64]) -> Vec<Vec<Lit>> {
        let kept = above_cut_off(products.iter().map(|product| product.lits()), p, self.settings.cut_off());
        debug!("{} of {} products above the cut-off", kept.len(), products.len());
        kept
    }

    /// Exact quantifier: the formula itself, unless cut sets were truncated,
    /// in which case the union of the products that were kept.
    fn exact(&self, bdd: &Bdd, f: Ref, products: &ProductSet) -> Result<Exact, Interrupt> {
        if self.settings.prime_implicants() || !products.is_truncated() {
            return Ok(Exact::new(bdd, f));
        }
        let cubes: Vec<Ref> = products
            .iter()
            .map(|product| bdd.cube(product.lits().iter().map(|lit| lit.to_dimacs())))
            .collect();
        let union = bdd.apply_or_many(cubes);
        match bdd.interrupted() {
            Some(reason) => Err(reason),
            None => Ok(Exact::new(bdd, union)),
        }
    }
}

fn interrupted(reason: Interrupt, mut partial: FaultTreeResult) -> AnalysisError {
    warn!("fault tree `{}` interrupted: {}", partial.fault_tree, reason);
    partial.truncated = true;
    AnalysisError::interrupted(reason, partial)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use test_log::test;

    use super::*;
    use crate::expression::Expression;
    use crate::model::{Formula, ModelBuilder};

    fn or_of_and() -> Model {
        let mut b = ModelBuilder::new("m");
        let ft = b.add_fault_tree("FT").unwrap();
        let a = b.add_basic_event("A", Expression::Constant(0.1)).unwrap();
        let c = b.add_basic_event("B", Expression::Constant(0.2)).unwrap();
        let d = b.add_basic_event("C", Expression::Constant(0.3)).unwrap();
        b.add_gate(ft, "Top", Formula::or([a.into(), Formula::and([c.into(), d.into()]).into()]))
            .unwrap();
        b.build()
    }

    #[test]
    fn test_products_only() {
        let report = Analysis::default().run(&or_of_and());
        let result = report.get("FT").unwrap().as_ref().unwrap();
        assert_eq!(result.top_gate, "Top");
        assert_eq!(result.products.len(), 2);
        assert_eq!(result.probability, None);
        assert!(result.products.iter().all(|p| p.probability.is_none()));
    }

    #[test]
    fn test_contributions() {
        let settings = Settings::default().with_probability_analysis(true);
        let report = Analysis::new(settings).run(&or_of_and());
        let result = report.get("FT").unwrap().as_ref().unwrap();
        let q = result.probability.unwrap();
        assert!((q - 0.154).abs() < 1e-12);
        let first = &result.products.products()[0];
        assert_eq!(first.probability, Some(0.1));
        assert!((first.contribution.unwrap() - 0.1 / q).abs() < 1e-12);
    }

    #[test]
    fn test_rare_event_divergence_warning() {
        let settings = Settings::default()
            .with_probability_analysis(true)
            .with_approximation(Approximation::RareEvent)
            .unwrap();
        let report = Analysis::new(settings.clone()).run(&or_of_and());
        let result = report.get("FT").unwrap().as_ref().unwrap();
        assert!((result.probability.unwrap() - 0.16).abs() < 1e-12);
        // (0.16 - 0.154) / 0.154 is about 3.9%.
        assert!(result.warnings.is_empty());

        let settings = settings.with_rare_event_divergence(Some(0.01)).unwrap();
        let report = Analysis::new(settings).run(&or_of_and());
        let result = report.get("FT").unwrap().as_ref().unwrap();
        assert!(matches!(result.warnings[..], [Warning::RareEventDivergence { .. }]));
    }

    #[test]
    fn test_expression_error_names_event() {
        let mut b = ModelBuilder::new("m");
        let ft = b.add_fault_tree("FT").unwrap();
        let a = b.add_basic_event("A", Expression::Exponential { rate: -1.0 }).unwrap();
        let c = b.add_basic_event("B", Expression::Constant(0.2)).unwrap();
        b.add_gate(ft, "Top", Formula::or([a.into(), c.into()])).unwrap();
        let model = b.build();

        let report = Analysis::default().run(&model);
        assert!(report.is_success());

        let report = Analysis::new(Settings::default().with_probability_analysis(true)).run(&model);
        let err = report.get("FT").unwrap().as_ref().unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidExpression(_)));
        assert!(err.to_string().contains("`A`"));
    }

    #[test]
    fn test_time_limit() {
        let settings = Settings::default().with_time_limit(Some(Duration::ZERO));
        let report = Analysis::new(settings).run(&or_of_and());
        match report.get("FT").unwrap() {
            Err(AnalysisError::LimitExceeded { limit, partial }) => {
                assert_eq!(*limit, Limit::Time);
                assert!(partial.truncated);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_product_limit() {
        let settings = Settings::default().with_product_limit(Some(1)).unwrap();
        let report = Analysis::new(settings).run(&or_of_and());
        match report.get("FT").unwrap() {
            Err(AnalysisError::LimitExceeded { limit, partial }) => {
                assert_eq!(*limit, Limit::Products);
                assert_eq!(partial.products.len(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_warning_messages() {
        let w = Warning::Truncated { limit_order: 3 };
        assert_eq!(w.to_string(), "products of order above 3 were dropped");
    }
}
