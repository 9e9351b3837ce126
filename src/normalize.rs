//! Lowering of gate formulas into a simplified negation normal form.
//!
//! The [`NormalForm`] is a hash-consed DAG over four node kinds. Negation
//! only appears on literals; XOR, NAND, NOR, NULL and ATLEAST are rewritten
//! into AND/OR; house events are folded away as constants. Every AND/OR
//! node built through the arena is locally simplified:
//!
//! - constants are absorbed (`x ∧ 0 = 0`, `x ∨ 1 = 1`) or dropped;
//! - nested nodes of the same kind are flattened;
//! - duplicate arguments are merged, keeping first-occurrence order;
//! - complementary literals collapse (`x ∧ ¬x = 0`, `x ∨ ¬x = 1`);
//! - zero or one remaining argument collapses the node.

use std::collections::{HashMap, HashSet};
use std::fmt::{Display, Formatter};

use log::{debug, info};

use crate::bdd::Bdd;
use crate::budget::Interrupt;
use crate::ccf::CcfExpansion;
use crate::error::ValidationError;
use crate::model::{Arg, Connective, EventKind, Formula, Model};
use crate::reference::Ref;
use crate::types::{EventId, Lit, Var};
use crate::utils::{binomial, combinations};

/// Above this many combinations an ATLEAST gate is encoded with shared
/// threshold sub-formulas instead of an explicit OR of ANDs.
pub const ATLEAST_EXPANSION_LIMIT: u64 = 64;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ExprId(u32);

impl ExprId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum Expr {
    Constant(bool),
    Literal(Lit),
    And(Vec<ExprId>),
    Or(Vec<ExprId>),
}

/// Where the probability of a variable comes from.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Source {
    Basic(EventId),
    /// Index into [`CcfExpansion::events`].
    Ccf(usize),
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Variable {
    pub name: String,
    pub source: Source,
}

#[derive(Debug, Clone, Default)]
pub struct NormalForm {
    exprs: Vec<Expr>,
    index: HashMap<Expr, ExprId>,
    root: Option<ExprId>,
    variables: Vec<Variable>,
}

impl PartialEq for NormalForm {
    fn eq(&self, other: &Self) -> bool {
        self.exprs == other.exprs && self.root == other.root && self.variables == other.variables
    }
}

impl NormalForm {
    pub fn root(&self) -> ExprId {
        self.root.unwrap_or(ExprId(0))
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.index()]
    }

    /// Number of nodes in the arena.
    pub fn len(&self) -> usize {
        self.exprs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }

    /// Variables in BDD order: `variables()[v.index()]` describes `v`.
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn variable(&self, var: Var) -> &Variable {
        &self.variables[var.index()]
    }

    /// The root, if it is a constant.
    pub fn as_constant(&self) -> Option<bool> {
        match self.exprs.get(self.root().index()) {
            Some(Expr::Constant(b)) => Some(*b),
            _ => None,
        }
    }

    fn intern(&mut self, expr: Expr) -> ExprId {
        if let Some(&id) = self.index.get(&expr) {
            return id;
        }
        let id = ExprId(self.exprs.len() as u32);
        self.exprs.push(expr.clone());
        self.index.insert(expr, id);
        id
    }

    pub fn constant(&mut self, value: bool) -> ExprId {
        self.intern(Expr::Constant(value))
    }

    pub fn literal(&mut self, lit: Lit) -> ExprId {
        self.intern(Expr::Literal(lit))
    }

    pub fn and(&mut self, args: impl IntoIterator<Item = ExprId>) -> ExprId {
        self.nary(true, args)
    }

    pub fn or(&mut self, args: impl IntoIterator<Item = ExprId>) -> ExprId {
        self.nary(false, args)
    }

    fn nary(&mut self, conjunction: bool, args: impl IntoIterator<Item = ExprId>) -> ExprId {
        // Absorbing element: false for AND, true for OR.
        let absorbing = !conjunction;

        let mut flat = Vec::new();
        let mut seen = HashSet::new();
        let mut lits = HashSet::new();
        for arg in args {
            let children = match self.expr(arg) {
                Expr::Constant(b) if *b == absorbing => return self.constant(absorbing),
                Expr::Constant(_) => continue,
                Expr::And(children) if conjunction => children.clone(),
                Expr::Or(children) if !conjunction => children.clone(),
                _ => vec![arg],
            };
            for child in children {
                if !seen.insert(child) {
                    continue;
                }
                if let Expr::Literal(lit) = self.expr(child) {
                    if lits.contains(&-*lit) {
                        return self.constant(absorbing);
                    }
                    lits.insert(*lit);
                }
                flat.push(child);
            }
        }

        match flat.len() {
            0 => self.constant(!absorbing),
            1 => flat[0],
            _ if conjunction => self.intern(Expr::And(flat)),
            _ => self.intern(Expr::Or(flat)),
        }
    }

    /// At least `k` of `args` are true.
    pub fn atleast(&mut self, k: usize, args: &[ExprId]) -> ExprId {
        let n = args.len();
        if k == 0 {
            return self.constant(true);
        }
        if k > n {
            return self.constant(false);
        }
        if k == n {
            return self.and(args.iter().copied());
        }
        if k == 1 {
            return self.or(args.iter().copied());
        }

        if binomial(n as u64, k as u64) <= ATLEAST_EXPANSION_LIMIT {
            let terms: Vec<ExprId> = combinations(n, k)
                .into_iter()
                .map(|c| self.and(c.into_iter().map(|i| args[i])))
                .collect();
            return self.or(terms);
        }

        // Threshold encoding: t[j] holds T(j, i) for the current suffix i,
        // where T(j, i) = (x_i ∧ T(j-1, i+1)) ∨ T(j, i+1).
        let mut t: Vec<ExprId> = (0..=k).map(|j| self.constant(j == 0)).collect();
        for i in (0..n).rev() {
            let mut next = t.clone();
            for j in 1..=k {
                if n - i < j {
                    continue;
                }
                let take = self.and([args[i], t[j - 1]]);
                next[j] = self.or([take, t[j]]);
            }
            t = next;
        }
        t[k]
    }

    /// Rebuild the reachable part of the form, re-applying every
    /// simplification. The result is a fixpoint: normalizing it again yields
    /// an identical form.
    pub fn normalize(&self) -> NormalForm {
        let mut out = NormalForm {
            variables: self.variables.clone(),
            ..NormalForm::default()
        };
        if self.root.is_none() {
            return out;
        }
        let mut memo = HashMap::new();
        let root = self.rebuild(self.root(), &mut out, &mut memo);
        out.root = Some(root);
        out
    }

    fn rebuild(&self, id: ExprId, out: &mut NormalForm, memo: &mut HashMap<ExprId, ExprId>) -> ExprId {
        if let Some(&res) = memo.get(&id) {
            return res;
        }
        let res = match self.expr(id) {
            Expr::Constant(b) => out.constant(*b),
            Expr::Literal(lit) => out.literal(*lit),
            Expr::And(args) => {
                let args: Vec<ExprId> = args.iter().map(|&a| self.rebuild(a, out, memo)).collect();
                out.and(args)
            }
            Expr::Or(args) => {
                let args: Vec<ExprId> = args.iter().map(|&a| self.rebuild(a, out, memo)).collect();
                out.or(args)
            }
        };
        memo.insert(id, res);
        res
    }

    /// Build the BDD of the root. Variable `v` of the form becomes BDD
    /// variable `v`.
    pub fn to_bdd(&self, bdd: &Bdd) -> Result<Ref, Interrupt> {
        let mut memo: Vec<Option<Ref>> = vec![None; self.exprs.len()];
        let res = self.build(self.root(), bdd, &mut memo)?;
        debug!("normal form converted to a BDD of {} nodes", bdd.size(res));
        Ok(res)
    }

    fn build(&self, id: ExprId, bdd: &Bdd, memo: &mut [Option<Ref>]) -> Result<Ref, Interrupt> {
        if let Some(res) = memo[id.index()] {
            return Ok(res);
        }
        let res = match self.expr(id) {
            Expr::Constant(true) => bdd.one,
            Expr::Constant(false) => bdd.zero,
            Expr::Literal(lit) => {
                let x = bdd.mk_var(lit.var().id());
                if lit.is_positive() {
                    x
                } else {
                    -x
                }
            }
            Expr::And(args) => {
                let mut acc = bdd.one;
                for &arg in args {
                    let f = self.build(arg, bdd, memo)?;
                    acc = bdd.apply_and(acc, f);
                }
                acc
            }
            Expr::Or(args) => {
                let mut acc = bdd.zero;
                for &arg in args {
                    let f = self.build(arg, bdd, memo)?;
                    acc = bdd.apply_or(acc, f);
                }
                acc
            }
        };
        if let Some(reason) = bdd.interrupted() {
            return Err(reason);
        }
        memo[id.index()] = Some(res);
        Ok(res)
    }

    fn fmt_expr(&self, id: ExprId, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.expr(id) {
            Expr::Constant(b) => write!(f, "{}", if *b { "1" } else { "0" }),
            Expr::Literal(lit) => {
                let name = &self.variable(lit.var()).name;
                if lit.is_positive() {
                    write!(f, "{}", name)
                } else {
                    write!(f, "~{}", name)
                }
            }
            Expr::And(args) | Expr::Or(args) => {
                let op = if matches!(self.expr(id), Expr::And(_)) { " & " } else { " | " };
                write!(f, "(")?;
                for (i, &arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, "{}", op)?;
                    }
                    self.fmt_expr(arg, f)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl Display for NormalForm {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.root.is_none() {
            return write!(f, "<empty>");
        }
        self.fmt_expr(self.root(), f)
    }
}

/// Lowers the formula DAG under one top gate into a [`NormalForm`].
pub struct Normalizer<'a> {
    model: &'a Model,
    ccf: &'a CcfExpansion,
    /// Cut-set mode: negative literals are replaced by `true`.
    coherent: bool,
    form: NormalForm,
    gates: HashMap<(EventId, bool), ExprId>,
    basic_vars: HashMap<EventId, Var>,
    ccf_vars: HashMap<usize, Var>,
}

impl<'a> Normalizer<'a> {
    pub fn new(model: &'a Model, ccf: &'a CcfExpansion, coherent: bool) -> Self {
        Self {
            model,
            ccf,
            coherent,
            form: NormalForm::default(),
            gates: HashMap::new(),
            basic_vars: HashMap::new(),
            ccf_vars: HashMap::new(),
        }
    }

    /// Lower the (validated) formula rooted at `top`.
    pub fn run(mut self, top: EventId) -> Result<NormalForm, ValidationError> {
        let root = self.event(top, true)?;
        self.form.root = Some(root);
        info!(
            "normal form of `{}`: {} nodes, {} variables",
            self.model.event(top).name,
            self.form.len(),
            self.form.variables.len()
        );
        Ok(self.form)
    }

    fn new_var(&mut self, name: String, source: Source) -> Var {
        self.form.variables.push(Variable { name, source });
        Var::new(self.form.variables.len() as u32)
    }

    fn literal(&mut self, var: Var, positive: bool) -> ExprId {
        if positive {
            self.form.literal(var.pos())
        } else if self.coherent {
            self.form.constant(true)
        } else {
            self.form.literal(var.neg())
        }
    }

    fn event(&mut self, id: EventId, positive: bool) -> Result<ExprId, ValidationError> {
        let event = self.model.try_event(id)?;
        match &event.kind {
            EventKind::House(state) => Ok(self.form.constant(*state == positive)),
            EventKind::Basic(_) => match self.ccf.replacement(id) {
                Some(Err(e)) => Err(e),
                Some(Ok(events)) => {
                    let lits: Vec<ExprId> = events
                        .iter()
                        .map(|&i| {
                            let var = self.ccf_var(i);
                            self.literal(var, positive)
                        })
                        .collect();
                    Ok(if positive { self.form.or(lits) } else { self.form.and(lits) })
                }
                None => {
                    let var = match self.basic_vars.get(&id) {
                        Some(&var) => var,
                        None => {
                            let var = self.new_var(event.name.clone(), Source::Basic(id));
                            self.basic_vars.insert(id, var);
                            var
                        }
                    };
                    Ok(self.literal(var, positive))
                }
            },
            EventKind::Gate(formula) => {
                if let Some(&res) = self.gates.get(&(id, positive)) {
                    return Ok(res);
                }
                let res = self.formula(formula, positive)?;
                self.gates.insert((id, positive), res);
                Ok(res)
            }
        }
    }

    fn ccf_var(&mut self, index: usize) -> Var {
        if let Some(&var) = self.ccf_vars.get(&index) {
            return var;
        }
        let name = self.ccf.event(index).name.clone();
        let var = self.new_var(name, Source::Ccf(index));
        self.ccf_vars.insert(index, var);
        var
    }

    fn arg(&mut self, arg: &Arg, positive: bool) -> Result<ExprId, ValidationError> {
        match arg {
            Arg::Event(id) => self.event(*id, positive),
            Arg::Formula(f) => self.formula(f, positive),
        }
    }

    fn args(&mut self, formula: &Formula, positive: bool) -> Result<Vec<ExprId>, ValidationError> {
        formula.args.iter().map(|a| self.arg(a, positive)).collect()
    }

    fn formula(&mut self, formula: &Formula, positive: bool) -> Result<ExprId, ValidationError> {
        let res = match formula.connective {
            Connective::And | Connective::Nand => {
                // NAND flips the polarity of the whole conjunction.
                let positive = positive == (formula.connective == Connective::And);
                let args = self.args(formula, positive)?;
                if positive {
                    self.form.and(args)
                } else {
                    self.form.or(args)
                }
            }
            Connective::Or | Connective::Nor => {
                let positive = positive == (formula.connective == Connective::Or);
                let args = self.args(formula, positive)?;
                if positive {
                    self.form.or(args)
                } else {
                    self.form.and(args)
                }
            }
            Connective::Not => self.arg(&formula.args[0], !positive)?,
            Connective::Null => self.arg(&formula.args[0], positive)?,
            Connective::Xor => {
                let a_pos = self.arg(&formula.args[0], true)?;
                let a_neg = self.arg(&formula.args[0], false)?;
                let b_pos = self.arg(&formula.args[1], true)?;
                let b_neg = self.arg(&formula.args[1], false)?;
                let (left, right) = if positive {
                    (self.form.and([a_pos, b_neg]), self.form.and([a_neg, b_pos]))
                } else {
                    (self.form.and([a_pos, b_pos]), self.form.and([a_neg, b_neg]))
                };
                self.form.or([left, right])
            }
            Connective::AtLeast(k) => {
                let n = formula.args.len();
                let args = self.args(formula, positive)?;
                if positive {
                    self.form.atleast(k, &args)
                } else {
                    // At most k-1 true means at least n-k+1 false.
                    self.form.atleast(n + 1 - k, &args)
                }
            }
        };
        Ok(res)
    }
}
