//! Top event probability.
//!
//! Every quantifier takes the per-variable probabilities `p`, indexed by
//! [`Var::index`](crate::types::Var::index), and returns the probability of
//! the top event. Quantifiers are plain data, so one instance can be shared
//! by the importance and uncertainty workers.

use std::collections::HashMap;

use log::{debug, warn};

use crate::bdd::Bdd;
use crate::products::product_probability;
use crate::reference::Ref;
use crate::types::Lit;

pub trait Quantify: Send + Sync {
    fn probability(&self, p: &[f64]) -> f64;
}

/// Which quantifier computes the top event probability.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum Approximation {
    /// Shannon decomposition over the BDD.
    #[default]
    Exact,
    /// Sum of product probabilities.
    RareEvent,
    /// Min-cut upper bound: `1 - Π(1 - P(product))`.
    Mcub,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
struct Edge {
    /// Position in [`Exact::nodes`]; 0 is the terminal.
    node: u32,
    negated: bool,
}

#[derive(Debug, Copy, Clone)]
struct FrozenNode {
    index: usize,
    low: Edge,
    high: Edge,
}

/// Exact probability of a BDD, frozen into a flat post-order array so that
/// it no longer borrows the (single-threaded) manager.
#[derive(Debug, Clone)]
pub struct Exact {
    /// Children come before their parents; slot 0 is the terminal `one`.
    nodes: Vec<FrozenNode>,
    root: Edge,
}

impl Exact {
    pub fn new(bdd: &Bdd, f: Ref) -> Self {
        let mut nodes = vec![FrozenNode {
            index: 0,
            low: Edge { node: 0, negated: false },
            high: Edge { node: 0, negated: false },
        }];
        let mut positions = HashMap::new();
        positions.insert(bdd.one.index(), 0u32);
        let root = Self::freeze(bdd, f, &mut nodes, &mut positions);
        debug!("frozen BDD with {} nodes", nodes.len());
        Self { nodes, root }
    }

    fn freeze(bdd: &Bdd, f: Ref, nodes: &mut Vec<FrozenNode>, positions: &mut HashMap<u32, u32>) -> Edge {
        let negated = f.is_negated();
        if let Some(&node) = positions.get(&f.index()) {
            return Edge { node, negated };
        }
        let i = f.index();
        let low = Self::freeze(bdd, bdd.low(i), nodes, positions);
        let high = Self::freeze(bdd, bdd.high(i), nodes, positions);
        let node = nodes.len() as u32;
        nodes.push(FrozenNode {
            index: bdd.variable(i) as usize - 1,
            low,
            high,
        });
        positions.insert(i, node);
        Edge { node, negated }
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }
}

impl Quantify for Exact {
    fn probability(&self, p: &[f64]) -> f64 {
        let mut values = vec![1.0; self.nodes.len()];
        let value = |values: &[f64], edge: Edge| {
            let v = values[edge.node as usize];
            if edge.negated {
                1.0 - v
            } else {
                v
            }
        };
        for (i, node) in self.nodes.iter().enumerate().skip(1) {
            let q = p[node.index];
            values[i] = q * value(&values, node.high) + (1.0 - q) * value(&values, node.low);
        }
        value(&values, self.root)
    }
}

/// Sum of product probabilities.
#[derive(Debug, Clone, Default)]
pub struct RareEvent {
    products: Vec<Vec<Lit>>,
}

impl RareEvent {
    pub fn new(products: Vec<Vec<Lit>>) -> Self {
        Self { products }
    }
}

impl Quantify for RareEvent {
    fn probability(&self, p: &[f64]) -> f64 {
        self.products.iter().map(|lits| product_probability(lits, p)).sum()
    }
}

/// Min-cut upper bound.
#[derive(Debug, Clone, Default)]
pub struct Mcub {
    products: Vec<Vec<Lit>>,
}

impl Mcub {
    pub fn new(products: Vec<Vec<Lit>>) -> Self {
        Self { products }
    }
}

impl Quantify for Mcub {
    fn probability(&self, p: &[f64]) -> f64 {
        let none: f64 = self
            .products
            .iter()
            .map(|lits| 1.0 - product_probability(lits, p))
            .product();
        1.0 - none
    }
}

/// Products whose nominal probability reaches `cut_off`.
pub fn above_cut_off<'a>(products: impl IntoIterator<Item = &'a [Lit]>, p: &[f64], cut_off: f64) -> Vec<Vec<Lit>> {
    products
        .into_iter()
        .filter(|lits| cut_off <= 0.0 || product_probability(lits, p) >= cut_off)
        .map(|lits| lits.to_vec())
        .collect()
}

/// Clamp `value` into `[0, 1]`; the flag tells whether it was outside.
pub fn clamp_probability(value: f64) -> (f64, bool) {
    if (0.0..=1.0).contains(&value) {
        (value, false)
    } else {
        warn!("top event probability {} is outside [0, 1] and was clamped", value);
        (value.clamp(0.0, 1.0), true)
    }
}

/// Relative excess of an approximation over the exact value, or `None` when
/// the exact value is zero.
pub fn relative_error(approximate: f64, exact: f64) -> Option<f64> {
    if exact == 0.0 {
        None
    } else {
        Some((approximate - exact) / exact)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::types::Var;

    fn lit(v: u32) -> Lit {
        Var::new(v).pos()
    }

    #[test]
    fn test_exact_or_of_and() {
        let bdd = Bdd::default();
        let a = bdd.mk_var(1);
        let b = bdd.mk_var(2);
        let c = bdd.mk_var(3);
        let bc = bdd.apply_and(b, c);
        let f = bdd.apply_or(a, bc);

        let exact = Exact::new(&bdd, f);
        let q = exact.probability(&[0.1, 0.2, 0.3]);
        assert!((q - 0.154).abs() < 1e-12, "q = {}", q);
    }

    #[test]
    fn test_exact_complement_edges() {
        let bdd = Bdd::default();
        let a = bdd.mk_var(1);
        let b = bdd.mk_var(2);
        let f = bdd.apply_ite(a, -b, b);
        let p = [0.3, 0.6];

        let q = Exact::new(&bdd, f).probability(&p);
        assert!((q - (0.3 * 0.4 + 0.7 * 0.6)).abs() < 1e-12);
        let nq = Exact::new(&bdd, -f).probability(&p);
        assert!((q + nq - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_exact_terminals() {
        let bdd = Bdd::default();
        assert_eq!(Exact::new(&bdd, bdd.one).probability(&[]), 1.0);
        assert_eq!(Exact::new(&bdd, bdd.zero).probability(&[]), 0.0);
    }

    #[test]
    fn test_approximations() {
        let products = vec![vec![lit(1)], vec![lit(2), lit(3)]];
        let p = [0.1, 0.2, 0.3];

        let rare = RareEvent::new(products.clone()).probability(&p);
        assert!((rare - 0.16).abs() < 1e-12);
        let mcub = Mcub::new(products).probability(&p);
        assert!((mcub - (1.0 - 0.9 * 0.94)).abs() < 1e-12);
        assert!(mcub <= rare);
    }

    #[test]
    fn test_cut_off() {
        let products = [vec![lit(1)], vec![lit(2), lit(3)]];
        let p = [0.1, 0.2, 0.3];
        let kept = above_cut_off(products.iter().map(|v| v.as_slice()), &p, 0.07);
        assert_eq!(kept, vec![vec![lit(1)]]);
        let kept = above_cut_off(products.iter().map(|v| v.as_slice()), &p, 0.0);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp_probability(0.5), (0.5, false));
        assert_eq!(clamp_probability(1.7), (1.0, true));
        assert_eq!(relative_error(0.16, 0.0), None);
    }

    #[test]
    fn test_monotonicity() {
        let bdd = Bdd::default();
        let vars: Vec<Ref> = (1..=4).map(|v| bdd.mk_var(v)).collect();
        let left = bdd.apply_and(vars[0], vars[1]);
        let right = bdd.apply_and(vars[2], vars[3]);
        let f = bdd.apply_or(left, right);
        let exact = Exact::new(&bdd, f);

        let mut p = vec![0.1, 0.2, 0.3, 0.4];
        let mut last = exact.probability(&p);
        for step in 1..=10 {
            p[2] = 0.3 + 0.07 * step as f64;
            let q = exact.probability(&p);
            assert!(q >= last);
            last = q;
        }
    }
}
