use std::fmt::{Display, Formatter};
use std::ops::Neg;

/// A handle to a decision diagram node.
///
/// The sign carries the complement bit: a negative reference denotes the
/// negation of the function rooted at `|index|`. Only BDDs use complemented
/// references; ZDD references are always positive.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Ref(i32);

impl Ref {
    pub const fn positive(index: u32) -> Self {
        Self(index as i32)
    }

    pub const fn negative(index: u32) -> Self {
        Self(-(index as i32))
    }

    pub const fn is_negated(self) -> bool {
        self.0 < 0
    }

    pub const fn negate(self) -> Self {
        Self(-self.0)
    }

    /// Return the node index, ignoring the complement bit.
    pub const fn index(self) -> u32 {
        self.0.unsigned_abs()
    }

    /// Return the internal signed representation.
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Literal-style encoding used for hashing: `2 * index + negated`.
    pub const fn unsigned(self) -> u32 {
        (self.0.unsigned_abs() << 1) + (self.0 < 0) as u32
    }

    /// Strip the complement bit.
    pub const fn regular(self) -> Self {
        Self(self.0.abs())
    }
}

impl Neg for Ref {
    type Output = Self;

    fn neg(self) -> Self::Output {
        self.negate()
    }
}

impl Display for Ref {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", if self.is_negated() { "~" } else { "" }, self.index())
    }
}
