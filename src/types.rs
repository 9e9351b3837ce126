//! Type-safe identifiers shared across the crate.
//!
//! Model entities live in arenas and are addressed by index newtypes, so an
//! event id can never be confused with a fault tree id or a decision-diagram
//! variable.
use std::fmt;

/// A decision-diagram variable (1-indexed).
///
/// Each variable stands for one independent random event: a basic event, or
/// a generated common-cause event.
///
/// # Invariants
///
/// - Variable IDs are `>= 1` (0 is reserved for terminals)
/// - Variable IDs follow the depth-first first-visit order of the normal form
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Var(u32);

impl Var {
    /// Creates a new variable with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if `id == 0`. Variables must be 1-indexed.
    pub fn new(id: u32) -> Self {
        assert_ne!(id, 0, "Variable IDs must be >= 1");
        Var(id)
    }

    /// Returns the raw variable ID as a `u32`.
    pub fn id(self) -> u32 {
        self.0
    }

    /// Position in per-variable vectors (`id - 1`).
    pub fn index(self) -> usize {
        self.0 as usize - 1
    }

    pub fn pos(self) -> Lit {
        Lit(self.0 as i32)
    }

    pub fn neg(self) -> Lit {
        Lit(-(self.0 as i32))
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

/// A literal: a variable with a polarity, stored DIMACS-style.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Lit(i32);

impl Lit {
    pub fn var(self) -> Var {
        Var(self.0.unsigned_abs())
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn negate(self) -> Self {
        Lit(-self.0)
    }

    pub fn to_dimacs(self) -> i32 {
        self.0
    }

    /// Probability of the literal being true given `p[var.index()]`.
    pub fn probability(self, p: &[f64]) -> f64 {
        let q = p[self.var().index()];
        if self.is_positive() {
            q
        } else {
            1.0 - q
        }
    }
}

impl std::ops::Neg for Lit {
    type Output = Lit;

    fn neg(self) -> Self::Output {
        self.negate()
    }
}

impl fmt::Display for Lit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_positive() {
            write!(f, "{}", self.var())
        } else {
            write!(f, "~{}", self.var())
        }
    }
}

/// Index of an event in its model's arena.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct EventId(pub(crate) usize);

impl EventId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FaultTreeId(pub(crate) usize);

impl FaultTreeId {
    pub fn index(self) -> usize {
        self.0
    }
}
