//! # fta-rs: Fault Tree Quantification in Rust
//!
//! **`fta-rs`** is the quantification engine of a fault tree analysis tool.
//! Given a model of events and Boolean gate formulas, it computes minimal cut
//! sets or prime implicants, the probability of each fault tree's top event,
//! importance measures of the basic events, and Monte Carlo uncertainty
//! bounds.
//!
//! ## How it works
//!
//! Every fault tree goes through the same pipeline:
//!
//! 1. **Validation** ([`validate`]): arity, duplicate arguments, cycles and
//!    the top gate are checked. Defects are reported, never corrected.
//! 2. **Normal form** ([`normalize`]): the formula under the top gate is
//!    rewritten into a hash-consed AND/OR DAG over literals. House events
//!    become constants, XOR/NAND/NOR/ATLEAST are expanded, and common-cause
//!    groups ([`ccf`]) replace their members by generated CCF events.
//! 3. **BDD** ([`bdd`]): the normal form is compiled into a reduced ordered
//!    BDD with complement edges.
//! 4. **Products** ([`products`]): minimal cut sets or prime implicants are
//!    extracted from the BDD into a ZDD ([`zdd`]), up to a limit order.
//! 5. **Quantification** ([`probability`], [`importance`], [`uncertainty`]):
//!    exact (BDD), rare-event or MCUB probability, importance factors and
//!    Monte Carlo propagation of parameter uncertainty.
//!
//! Fault trees are analyzed in parallel. Each worker owns its own
//! decision-diagram managers; the [`Model`][crate::model::Model] is
//! immutable and shared by reference.
//!
//! ## Basic Usage
//!
//! ```rust
//! use fta_rs::analysis::Analysis;
//! use fta_rs::expression::Expression;
//! use fta_rs::model::{Formula, ModelBuilder};
//! use fta_rs::settings::Settings;
//!
//! // 1. Describe the model
//! let mut b = ModelBuilder::new("pumps");
//! let ft = b.add_fault_tree("LossOfFlow")?;
//! let a = b.add_basic_event("PumpA", Expression::Constant(0.1))?;
//! let c = b.add_basic_event("PumpB", Expression::Constant(0.2))?;
//! let v = b.add_basic_event("Valve", Expression::Constant(0.3))?;
//! let pumps = b.add_gate(ft, "Pumps", Formula::and([a.into(), c.into()]))?;
//! b.add_gate(ft, "Top", Formula::or([pumps.into(), v.into()]))?;
//! let model = b.build();
//!
//! // 2. Run the analysis
//! let settings = Settings::default().with_probability_analysis(true);
//! let report = Analysis::new(settings).run(&model);
//!
//! // 3. Inspect the results
//! let result = report.results["LossOfFlow"].as_ref().unwrap();
//! let products: Vec<String> = result.products.iter().map(|p| p.to_string()).collect();
//! assert_eq!(products, vec!["{Valve}", "{PumpA, PumpB}"]);
//! assert!((result.probability.unwrap() - 0.314).abs() < 1e-12);
//! # Ok::<(), fta_rs::error::ValidationError>(())
//! ```
//!
//! ## Core Components
//!
//! - **[`analysis`]**: Entry point. [`Analysis`][crate::analysis::Analysis] runs every fault tree and returns an [`AnalysisReport`][crate::analysis::AnalysisReport].
//! - **[`model`]**: Events, formulas and fault trees, built with [`ModelBuilder`][crate::model::ModelBuilder].
//! - **[`settings`]**: Validated analysis options.
//! - **[`bdd`]** and **[`zdd`]**: The decision-diagram kernel.
//!
//! Long runs are bounded by [`budget`]: a cancel token, a deadline and a node
//! limit are checked cooperatively by the decision-diagram operations.

pub mod analysis;
pub mod bdd;
pub mod budget;
pub mod cache;
pub mod ccf;
pub mod error;
pub mod expression;
pub mod importance;
pub mod model;
pub mod node;
pub mod normalize;
pub mod probability;
pub mod products;
pub mod reference;
pub mod settings;
pub mod table;
pub mod types;
pub mod uncertainty;
pub mod utils;
pub mod validate;
pub mod zdd;
