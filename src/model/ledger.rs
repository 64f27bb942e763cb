//! Ledgers: the non-negative rational quantities an atomic consumes or
//! produces, keyed by variable name. `spec.md` §3, §9.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Add, AddAssign, Sub};

/// A non-negative quantity. `spec.md` §9 leaves the precision choice to
/// the implementer; this crate takes 64-bit floating point, matching
/// the teacher's dimensional-analysis aliases (`Equity`, `Probability`,
/// `Energy`) for quantities that are conceptually continuous.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quantity(pub f64);

impl Quantity {
    pub const ZERO: Quantity = Quantity(0.0);

    pub fn new(value: f64) -> Self {
        Quantity(value.max(0.0))
    }

    pub fn is_zero(&self) -> bool {
        self.0 <= f64::EPSILON
    }
}

impl Default for Quantity {
    fn default() -> Self {
        Quantity::ZERO
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add for Quantity {
    type Output = Quantity;
    fn add(self, rhs: Quantity) -> Quantity {
        Quantity(self.0 + rhs.0)
    }
}

impl Sub for Quantity {
    type Output = Quantity;
    /// Saturates at zero, mirroring the ledger simulator's own
    /// `M[v] <- max(0, a - q)` rule (`spec.md` §4.5).
    fn sub(self, rhs: Quantity) -> Quantity {
        Quantity((self.0 - rhs.0).max(0.0))
    }
}

impl AddAssign for Quantity {
    fn add_assign(&mut self, rhs: Quantity) {
        self.0 += rhs.0;
    }
}

impl From<f64> for Quantity {
    fn from(value: f64) -> Self {
        Quantity::new(value)
    }
}

/// A variable name, e.g. `"flour_grams"`. Subject to the vocabulary
/// rule (`spec.md` §3 invariant 6, `crate::vocabulary`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariableName(pub String);

impl VariableName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VariableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for VariableName {
    fn from(raw: &str) -> Self {
        VariableName(raw.to_string())
    }
}

impl From<String> for VariableName {
    fn from(raw: String) -> Self {
        VariableName(raw)
    }
}

/// A mapping from variable name to non-negative quantity. Keys unique;
/// insertion order is not semantic (`spec.md` §3), so this is backed by
/// a `BTreeMap` for deterministic iteration rather than a `HashMap`.
pub type Ledger = BTreeMap<VariableName, Quantity>;

pub fn ledger_from(pairs: impl IntoIterator<Item = (&'static str, f64)>) -> Ledger {
    pairs
        .into_iter()
        .map(|(k, v)| (VariableName::from(k), Quantity::new(v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtraction_saturates_at_zero() {
        let a = Quantity::new(1.0);
        let b = Quantity::new(3.0);
        assert_eq!((a - b).0, 0.0);
    }

    #[test]
    fn negative_construction_clamps() {
        assert_eq!(Quantity::new(-5.0), Quantity::ZERO);
    }
}
