//! Minimal cut sets and prime implicants.
//!
//! Products are generated from the BDD of the normal form and collected as a
//! family of sets in a ZDD, which makes subsumption checks cheap:
//!
//! ```text
//! MCS(f, k) = MCS(f0, k) ∪ x·(MCS(f1, k-1) without MCS(f0, k))
//! PI(f, k)  = P ∪ x·(PI(f1, k-1) ∖ P) ∪ ¬x·(PI(f0, k-1) ∖ P),  P = PI(f0 ∧ f1, k)
//! ```
//!
//! For prime implicants each BDD variable `v` is split into two ZDD
//! variables: `2v - 1` for the positive literal and `2v` for the negative one.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use log::{debug, info};

use crate::bdd::Bdd;
use crate::normalize::NormalForm;
use crate::reference::Ref;
use crate::types::{Lit, Var};
use crate::zdd::Zdd;

pub struct ProductGenerator<'a> {
    bdd: &'a Bdd,
    zdd: &'a Zdd,
    limit_order: usize,
    truncated: bool,
    memo: HashMap<(Ref, usize), Ref>,
}

impl<'a> ProductGenerator<'a> {
    pub fn new(bdd: &'a Bdd, zdd: &'a Zdd, limit_order: usize) -> Self {
        Self {
            bdd,
            zdd,
            limit_order,
            truncated: false,
            memo: HashMap::new(),
        }
    }

    /// Whether the order limit cut off a non-constant sub-function.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    fn interrupted(&self) -> bool {
        self.bdd.interrupted().is_some() || self.zdd.interrupted().is_some()
    }

    /// Family of minimal cut sets of the monotone function `f`.
    pub fn minimal_cut_sets(&mut self, f: Ref) -> Ref {
        self.memo.clear();
        let res = self.mcs(f, self.limit_order);
        debug!("minimal cut sets: {} ZDD nodes", self.zdd.size(res));
        res
    }

    fn mcs(&mut self, f: Ref, k: usize) -> Ref {
        if self.bdd.is_zero(f) {
            return self.zdd.zero();
        }
        if self.bdd.is_one(f) {
            return self.zdd.one();
        }
        if k == 0 {
            self.truncated = true;
            return self.zdd.zero();
        }
        if let Some(&res) = self.memo.get(&(f, k)) {
            return res;
        }

        let v = self.bdd.variable(f.index());
        let f0 = self.bdd.low_node(f);
        let f1 = self.bdd.high_node(f);

        let k0 = self.mcs(f0, k);
        let k1 = self.mcs(f1, k - 1);
        let k1 = self.zdd.without(k1, k0);
        let res = self.zdd.mk_node(v, k0, k1);

        if !self.interrupted() {
            self.memo.insert((f, k), res);
        }
        res
    }

    /// Family of prime implicants of `f`, two ZDD variables per BDD variable.
    pub fn prime_implicants(&mut self, f: Ref) -> Ref {
        self.memo.clear();
        let res = self.pi(f, self.limit_order);
        debug!("prime implicants: {} ZDD nodes", self.zdd.size(res));
        res
    }

    fn pi(&mut self, f: Ref, k: usize) -> Ref {
        if self.bdd.is_zero(f) {
            return self.zdd.zero();
        }
        if self.bdd.is_one(f) {
            return self.zdd.one();
        }
        if k == 0 {
            self.truncated = true;
            return self.zdd.zero();
        }
        if let Some(&res) = self.memo.get(&(f, k)) {
            return res;
        }

        let v = self.bdd.variable(f.index());
        let f0 = self.bdd.low_node(f);
        let f1 = self.bdd.high_node(f);

        let consensus = self.bdd.apply_and(f0, f1);
        let p = self.pi(consensus, k);
        let p1 = self.pi(f1, k - 1);
        let p1 = self.zdd.diff(p1, p);
        let p0 = self.pi(f0, k - 1);
        let p0 = self.zdd.diff(p0, p);

        let neg = self.zdd.mk_node(2 * v, p, p0);
        let res = self.zdd.mk_node(2 * v - 1, neg, p1);

        if !self.interrupted() {
            self.memo.insert((f, k), res);
        }
        res
    }
}

/// One literal of a product, as reported to the caller.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Literal {
    /// Name of the basic event, or of the generated CCF event.
    pub event: String,
    pub complement: bool,
}

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.complement {
            write!(f, "~{}", self.event)
        } else {
            write!(f, "{}", self.event)
        }
    }
}

/// A minimal cut set or a prime implicant.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    /// Sorted by event name; a negative literal follows the positive one of
    /// the same event.
    pub literals: Vec<Literal>,
    pub probability: Option<f64>,
    /// Share of the top event probability.
    pub contribution: Option<f64>,
    lits: Vec<Lit>,
}

impl Product {
    fn new(lits: Vec<Lit>, form: &NormalForm) -> Self {
        let mut pairs: Vec<(Literal, Lit)> = lits
            .into_iter()
            .map(|lit| {
                let literal = Literal {
                    event: form.variable(lit.var()).name.clone(),
                    complement: !lit.is_positive(),
                };
                (literal, lit)
            })
            .collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        let (literals, lits) = pairs.into_iter().unzip();
        Self {
            literals,
            probability: None,
            contribution: None,
            lits,
        }
    }

    pub fn order(&self) -> usize {
        self.literals.len()
    }

    /// The empty product, which makes the top event certain.
    pub fn is_unity(&self) -> bool {
        self.literals.is_empty()
    }

    /// Literals over the decision-diagram variables, parallel to
    /// [`Product::literals`].
    pub fn lits(&self) -> &[Lit] {
        &self.lits
    }

    pub fn contains(&self, var: Var) -> bool {
        self.lits.iter().any(|lit| lit.var() == var)
    }

    /// Product of literal probabilities under `p` (indexed by variable).
    pub fn compute_probability(&self, p: &[f64]) -> f64 {
        product_probability(&self.lits, p)
    }
}

impl Display for Product {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, literal) in self.literals.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", literal)?;
        }
        write!(f, "}}")
    }
}

pub fn product_probability(lits: &[Lit], p: &[f64]) -> f64 {
    lits.iter().map(|lit| lit.probability(p)).product()
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ProductStatus {
    /// The top event is certain: a single empty product.
    Unity,
    /// The top event is impossible: no products.
    Null,
    /// The order limit dropped some products.
    Truncated,
    Complete,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductSet {
    products: Vec<Product>,
    truncated: bool,
}

impl ProductSet {
    /// Collect the family `family` into sorted products. With a `limit`,
    /// only the first `limit` products in that order are kept.
    pub fn extract(
        zdd: &Zdd,
        family: Ref,
        form: &NormalForm,
        prime_implicants: bool,
        truncated: bool,
        limit: Option<usize>,
    ) -> Self {
        let mut products: Vec<Product> = Vec::new();
        for set in zdd.combinations(family) {
            let lits = set
                .into_iter()
                .map(|z| {
                    if !prime_implicants {
                        Var::new(z).pos()
                    } else if z % 2 == 1 {
                        Var::new((z + 1) / 2).pos()
                    } else {
                        Var::new(z / 2).neg()
                    }
                })
                .collect();
            products.push(Product::new(lits, form));
            // Keep memory bounded by the limit while scanning the whole family.
            if let Some(limit) = limit {
                if products.len() >= limit.saturating_mul(2).max(limit + 1) {
                    sort_products(&mut products);
                    products.truncate(limit);
                }
            }
        }
        sort_products(&mut products);
        if let Some(limit) = limit {
            products.truncate(limit);
        }
        info!("extracted {} products (truncated: {})", products.len(), truncated);
        Self { products, truncated }
    }

    pub fn truncated(products: Vec<Product>) -> Self {
        Self {
            products,
            truncated: true,
        }
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn products_mut(&mut self) -> &mut [Product] {
        &mut self.products
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Product> {
        self.products.iter()
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn status(&self) -> ProductStatus {
        match self.products.as_slice() {
            [single] if single.is_unity() => ProductStatus::Unity,
            _ if self.truncated => ProductStatus::Truncated,
            [] => ProductStatus::Null,
            _ => ProductStatus::Complete,
        }
    }

    pub fn max_order(&self) -> usize {
        self.products.iter().map(Product::order).max().unwrap_or(0)
    }

    /// Number of products of each order; index `i` counts products of
    /// order `i + 1`.
    pub fn distribution(&self) -> Vec<usize> {
        let mut counts = vec![0; self.max_order()];
        for product in &self.products {
            if product.order() > 0 {
                counts[product.order() - 1] += 1;
            }
        }
        counts
    }
}

fn sort_products(products: &mut [Product]) {
    products.sort_by(|a, b| a.order().cmp(&b.order()).then_with(|| a.literals.cmp(&b.literals)));
}

impl<'a> IntoIterator for &'a ProductSet {
    type Item = &'a Product;
    type IntoIter = std::slice::Iter<'a, Product>;

    fn into_iter(self) -> Self::IntoIter {
        self.products.iter()
    }
}
