use crate::reference::Ref;
use crate::utils::{pairing3, MyHash};

/// A decision diagram node shared by the BDD and ZDD managers.
///
/// Terminals are stored with `variable == 0`; every internal node has a
/// 1-based variable index.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Node {
    pub variable: u32,
    pub low: Ref,
    pub high: Ref,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            variable: 0,
            low: Ref::positive(0),
            high: Ref::positive(0),
        }
    }
}

impl MyHash for Node {
    fn hash(&self) -> u64 {
        pairing3(
            self.variable as u64,
            self.low.unsigned() as u64,
            self.high.unsigned() as u64,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_distinguishes_complement() {
        let a = Node {
            variable: 1,
            low: Ref::positive(1),
            high: Ref::positive(2),
        };
        let b = Node {
            low: Ref::negative(1),
            ..a
        };
        assert_ne!(MyHash::hash(&a), MyHash::hash(&b));
    }
}
