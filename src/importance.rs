//! Importance measures of the decision-diagram variables.

use std::collections::BTreeMap;

use log::debug;
use rayon::prelude::*;

use crate::budget::{Interrupt, Watchdog};
use crate::normalize::NormalForm;
use crate::probability::Quantify;
use crate::products::ProductSet;
use crate::types::Var;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ImportanceRecord {
    /// Number of products the event appears in.
    pub occurrence: usize,
    /// Marginal (Birnbaum) importance factor.
    pub mif: f64,
    /// Critical importance factor.
    pub cif: f64,
    /// Diagnosis importance factor (Fussell-Vesely).
    pub dif: f64,
    /// Risk achievement worth.
    pub raw: f64,
    /// Risk reduction worth.
    pub rrw: f64,
}

impl ImportanceRecord {
    pub const NEUTRAL: ImportanceRecord = ImportanceRecord {
        occurrence: 0,
        mif: 0.0,
        cif: 0.0,
        dif: 0.0,
        raw: 1.0,
        rrw: 1.0,
    };

    fn new(occurrence: usize, p: f64, q: f64, q0: f64, q1: f64) -> Self {
        let mif = q1 - q0;
        Self {
            occurrence,
            mif,
            cif: mif * p / q,
            dif: p * q1 / q,
            raw: q1 / q,
            rrw: if q0 == 0.0 { f64::INFINITY } else { q / q0 },
        }
    }
}

/// Compute one record per variable of `form`, keyed by variable name.
///
/// `q` is the top event probability under `p` as returned by `quantify`.
/// `watchdog` is polled before every variable; the computation stops at the
/// first interruption.
pub fn compute(
    quantify: &dyn Quantify,
    form: &NormalForm,
    products: &ProductSet,
    p: &[f64],
    q: f64,
    watchdog: &Watchdog,
) -> Result<BTreeMap<String, ImportanceRecord>, Interrupt> {
    let records: Vec<(String, ImportanceRecord)> = form
        .variables()
        .par_iter()
        .enumerate()
        .map(|(index, variable)| -> Result<(String, ImportanceRecord), Interrupt> {
            watchdog.check()?;
            let var = Var::new(index as u32 + 1);
            let occurrence = products.iter().filter(|product| product.contains(var)).count();
            if occurrence == 0 || q == 0.0 {
                return Ok((variable.name.clone(), ImportanceRecord::NEUTRAL));
            }
            let nominal = p[index];
            let mut p = p.to_vec();
            p[index] = 0.0;
            let q0 = quantify.probability(&p);
            p[index] = 1.0;
            let q1 = quantify.probability(&p);
            let record = ImportanceRecord::new(occurrence, nominal, q, q0, q1);
            Ok((variable.name.clone(), record))
        })
        .collect::<Result<_, Interrupt>>()?;
    debug!("computed importance of {} events", records.len());
    Ok(records.into_iter().collect())
}
