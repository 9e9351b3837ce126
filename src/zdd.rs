//! Zero-suppressed decision diagrams for families of sets.
//!
//! A ZDD node `(v, low, high)` denotes `low ∪ { {v} ∪ s | s ∈ high }`.
//! Nodes whose high edge is the empty family are suppressed. Variables are
//! ordered by index: smaller indices sit closer to the root.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use log::debug;
use num_bigint::BigUint;

use crate::budget::{Budget, Interrupt};
use crate::cache::Cache;
use crate::node::Node;
use crate::reference::Ref;
use crate::table::Table;
use crate::utils::{pairing2, MyHash};

type Storage = Table<Node>;

#[derive(Debug, Eq, PartialEq, Clone)]
pub enum OpKey {
    Diff(Ref, Ref),
    Without(Ref, Ref),
}

impl MyHash for OpKey {
    fn hash(&self) -> u64 {
        let (tag, f, g) = match self {
            OpKey::Diff(f, g) => (0, f, g),
            OpKey::Without(f, g) => (1, f, g),
        };
        pairing2(pairing2(f.index() as u64, g.index() as u64), tag)
    }
}

pub struct Zdd {
    storage: RefCell<Storage>,
    cache: RefCell<Cache<OpKey, Ref>>,
    count_cache: RefCell<HashMap<Ref, BigUint>>,
    budget: Rc<Budget>,
    zero: Ref,
    one: Ref,
}

impl Zdd {
    pub fn new(storage_bits: usize) -> Self {
        Self::with_budget(storage_bits, Rc::new(Budget::unlimited()))
    }

    pub fn with_budget(storage_bits: usize, budget: Rc<Budget>) -> Self {
        let mut storage = Storage::new(storage_bits);

        let zero = Ref::positive(storage.add(Node::default()) as u32);
        let one = Ref::positive(storage.add(Node::default()) as u32);

        Self {
            storage: RefCell::new(storage),
            cache: RefCell::new(Cache::new(storage_bits.min(16))),
            count_cache: RefCell::new(HashMap::new()),
            budget,
            zero,
            one,
        }
    }
}

impl Default for Zdd {
    fn default() -> Self {
        Self::new(16)
    }
}

// List of basic operations over ZDD:
//   Here, P and Q are families of sets.
//   P.diff(Q) -- the sets of P that are not in Q.
//   P.without(Q) -- the sets of P that contain no set of Q.
//   P.count -- the number of sets in P.

impl Zdd {
    pub fn variable(&self, index: u32) -> u32 {
        self.storage.borrow().value(index as usize).variable
    }
    pub fn low(&self, index: u32) -> Ref {
        self.storage.borrow().value(index as usize).low
    }
    pub fn high(&self, index: u32) -> Ref {
        self.storage.borrow().value(index as usize).high
    }

    pub fn zero(&self) -> Ref {
        self.zero
    }
    pub fn one(&self) -> Ref {
        self.one
    }

    pub fn is_zero(&self, node: Ref) -> bool {
        node == self.zero
    }
    pub fn is_one(&self, node: Ref) -> bool {
        node == self.one
    }
    pub fn is_terminal(&self, node: Ref) -> bool {
        self.is_zero(node) || self.is_one(node)
    }

    pub fn num_nodes(&self) -> usize {
        self.storage.borrow().size()
    }

    pub fn interrupted(&self) -> Option<Interrupt> {
        self.budget.interrupted()
    }

    /// Top variable of `node`; terminals sort below every variable.
    fn top(&self, node: Ref) -> u32 {
        if self.is_terminal(node) {
            u32::MAX
        } else {
            self.variable(node.index())
        }
    }

    pub fn mk_node(&self, var: u32, low: Ref, high: Ref) -> Ref {
        assert_ne!(var, 0, "Variable index should not be zero");
        debug_assert!(!low.is_negated() && !high.is_negated());
        debug_assert!(var < self.top(low) && var < self.top(high));

        // Zero-suppression
        if self.is_zero(high) {
            return low;
        }

        let i = self.storage.borrow_mut().put(Node { variable: var, low, high });
        Ref::positive(i as u32)
    }

    fn cached(&self, key: &OpKey) -> Option<Ref> {
        self.cache.borrow().get(key).copied()
    }

    fn remember(&self, key: OpKey, res: Ref) -> Ref {
        if self.interrupted().is_some() {
            return self.zero;
        }
        self.cache.borrow_mut().insert(key, res);
        res
    }

    pub fn diff(&self, f: Ref, g: Ref) -> Ref {
        debug!("diff({}, {})", f, g);

        if self.is_zero(f) || f == g {
            return self.zero;
        }
        if self.is_zero(g) {
            return f;
        }

        let key = OpKey::Diff(f, g);
        if let Some(res) = self.cached(&key) {
            return res;
        }
        if !self.budget.tick(self.num_nodes()) {
            return self.zero;
        }

        let i = self.top(f);
        let j = self.top(g);
        let res = if i < j {
            let low = self.diff(self.low(f.index()), g);
            self.mk_node(i, low, self.high(f.index()))
        } else if i > j {
            self.diff(f, self.low(g.index()))
        } else {
            // Equal tops of two distinct non-empty families are variables.
            let low = self.diff(self.low(f.index()), self.low(g.index()));
            let high = self.diff(self.high(f.index()), self.high(g.index()));
            self.mk_node(i, low, high)
        };

        self.remember(key, res)
    }

    /// Does the family contain the empty set?
    pub fn contains_empty(&self, f: Ref) -> bool {
        let mut node = f;
        while !self.is_terminal(node) {
            node = self.low(node.index());
        }
        self.is_one(node)
    }

    /// Remove from `f` every set that is a superset of some set of `g`.
    pub fn without(&self, f: Ref, g: Ref) -> Ref {
        debug!("without({}, {})", f, g);

        if self.is_zero(f) {
            return self.zero;
        }
        if self.is_zero(g) {
            return f;
        }
        if f == g || self.is_one(g) {
            return self.zero;
        }
        if self.is_one(f) {
            return if self.contains_empty(g) { self.zero } else { self.one };
        }

        let key = OpKey::Without(f, g);
        if let Some(res) = self.cached(&key) {
            return res;
        }
        if !self.budget.tick(self.num_nodes()) {
            return self.zero;
        }

        let i = self.top(f);
        let j = self.top(g);
        let res = if i < j {
            let low = self.without(self.low(f.index()), g);
            let high = self.without(self.high(f.index()), g);
            self.mk_node(i, low, high)
        } else if i > j {
            self.without(f, self.low(g.index()))
        } else {
            let g0 = self.low(g.index());
            let g1 = self.high(g.index());
            let low = self.without(self.low(f.index()), g0);
            let high = self.without(self.high(f.index()), g1);
            let high = self.without(high, g0);
            self.mk_node(i, low, high)
        };

        self.remember(key, res)
    }

    /// Number of sets in the family.
    pub fn count(&self, f: Ref) -> BigUint {
        if self.is_zero(f) {
            return BigUint::from(0u32);
        }
        if self.is_one(f) {
            return BigUint::from(1u32);
        }

        if let Some(res) = self.count_cache.borrow().get(&f) {
            return res.clone();
        }

        let index = f.index();
        let res = self.count(self.low(index)) + self.count(self.high(index));

        self.count_cache.borrow_mut().insert(f, res.clone());
        res
    }

    /// Number of nodes in the diagram of `f`, terminals excluded.
    pub fn size(&self, f: Ref) -> usize {
        let mut visited = HashSet::new();
        let mut stack = vec![f];
        while let Some(node) = stack.pop() {
            if self.is_terminal(node) || !visited.insert(node.index()) {
                continue;
            }
            stack.push(self.low(node.index()));
            stack.push(self.high(node.index()));
        }
        visited.len()
    }

    /// Iterate over the sets of the family, each as an ascending list of
    /// variables.
    pub fn combinations(&self, node: Ref) -> ZddCombinations<'_> {
        ZddCombinations::new(self, node)
    }
}

pub struct ZddCombinations<'a> {
    zdd: &'a Zdd,
    stack: Vec<(Ref, Vec<u32>)>,
}

impl<'a> ZddCombinations<'a> {
    pub fn new(zdd: &'a Zdd, node: Ref) -> Self {
        let stack = vec![(node, vec![])];
        ZddCombinations { zdd, stack }
    }
}

impl Iterator for ZddCombinations<'_> {
    type Item = Vec<u32>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((node, subset)) = self.stack.pop() {
            if self.zdd.is_zero(node) {
                continue;
            } else if self.zdd.is_one(node) {
                return Some(subset);
            } else {
                let index = node.index();
                let v = self.zdd.variable(index);

                self.stack.push((self.zdd.low(index), subset.clone()));

                let mut subset = subset;
                subset.push(v);
                self.stack.push((self.zdd.high(index), subset));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn family(zdd: &Zdd, sets: &[&[u32]]) -> Ref {
        let sets: Vec<Vec<u32>> = sets.iter().map(|s| s.to_vec()).collect();
        build(zdd, sets)
    }

    /// Split on the lowest variable: sets holding it go high, the rest low.
    fn build(zdd: &Zdd, sets: Vec<Vec<u32>>) -> Ref {
        if sets.is_empty() {
            return zdd.zero();
        }
        let Some(var) = sets.iter().flatten().copied().min() else {
            return zdd.one();
        };
        let (high, low): (Vec<_>, Vec<_>) = sets.into_iter().partition(|s| s.contains(&var));
        let high: Vec<Vec<u32>> = high
            .into_iter()
            .map(|s| s.into_iter().filter(|&v| v != var).collect())
            .collect();
        let low = build(zdd, low);
        let high = build(zdd, high);
        zdd.mk_node(var, low, high)
    }

    fn sorted(zdd: &Zdd, f: Ref) -> Vec<Vec<u32>> {
        let mut sets: Vec<Vec<u32>> = zdd.combinations(f).collect();
        sets.sort();
        sets
    }

    #[test]
    fn test_terminals() {
        let zdd = Zdd::default();

        assert_eq!(zdd.count(zdd.zero()), BigUint::from(0u32));
        assert_eq!(zdd.count(zdd.one()), BigUint::from(1u32));
        assert!(zdd.contains_empty(zdd.one()));
        assert!(!zdd.contains_empty(zdd.zero()));
    }

    #[test]
    fn test_family() {
        let zdd = Zdd::default();

        let f = family(&zdd, &[&[1], &[2, 3], &[3]]);
        assert_eq!(zdd.count(f), BigUint::from(3u32));
        assert_eq!(sorted(&zdd, f), vec![vec![1], vec![2, 3], vec![3]]);
        assert_eq!(family(&zdd, &[&[3], &[1], &[3, 2]]), f);

        let g = family(&zdd, &[&[], &[1], &[2, 3], &[3]]);
        assert!(zdd.contains_empty(g));
        assert_eq!(zdd.count(g), BigUint::from(4u32));
        assert_eq!(zdd.diff(g, f), zdd.one());
    }

    #[test]
    fn test_diff() {
        let zdd = Zdd::default();

        let f = family(&zdd, &[&[1], &[2, 3], &[3]]);
        let g = family(&zdd, &[&[2, 3], &[4]]);
        assert_eq!(sorted(&zdd, zdd.diff(f, g)), vec![vec![1], vec![3]]);
        assert_eq!(zdd.diff(f, f), zdd.zero());
        assert_eq!(zdd.diff(f, zdd.zero()), f);
    }

    #[test]
    fn test_without() {
        let zdd = Zdd::default();

        let f = family(&zdd, &[&[1, 2], &[2, 3], &[3], &[1, 4]]);
        let g = family(&zdd, &[&[2], &[4]]);
        assert_eq!(sorted(&zdd, zdd.without(f, g)), vec![vec![3]]);

        let g = family(&zdd, &[&[1, 2, 5]]);
        assert_eq!(zdd.without(f, g), f);

        // The empty set is a subset of everything.
        let g = family(&zdd, &[&[], &[7]]);
        assert_eq!(zdd.without(f, g), zdd.zero());
        assert_eq!(zdd.without(zdd.one(), family(&zdd, &[&[1]])), zdd.one());
    }

    #[test]
    fn test_budget_stops_work() {
        use crate::budget::CancelToken;

        let budget = Rc::new(Budget::new(CancelToken::new(), None, 3));
        let zdd = Zdd::with_budget(4, budget);
        let f = family(&zdd, &[&[1, 2], &[2, 3], &[3, 4], &[1, 4]]);
        let g = family(&zdd, &[&[2, 3]]);
        assert_eq!(zdd.diff(f, g), zdd.zero());
        assert_eq!(zdd.interrupted(), Some(Interrupt::NodeLimit));
    }
}
