//! Type-safe handles for ground atoms, variables and formula weights.
//!
//! Ground atoms and variables are identified by dense, zero-based indices that are
//! assigned once and stay stable for the lifetime of a [`GroundModel`][crate::model::GroundModel].
//! Hot paths (evidence vectors, clause arenas) only ever use these indices.

use std::fmt;

/// A ground atom handle (0-indexed).
///
/// # Invariants
///
/// - Indices are assigned in registration order, without gaps
/// - The same `(predicate, arguments)` pair always maps to the same index
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct AtomIdx(usize);

impl AtomIdx {
    /// Creates a new atom handle with the given index.
    pub fn new(index: usize) -> Self {
        AtomIdx(index)
    }

    /// Returns the raw index as a `usize`.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for AtomIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a{}", self.0)
    }
}

impl From<AtomIdx> for usize {
    fn from(atom: AtomIdx) -> Self {
        atom.0
    }
}

impl From<usize> for AtomIdx {
    fn from(index: usize) -> Self {
        AtomIdx(index)
    }
}

/// A variable handle (0-indexed).
///
/// A variable groups one or more ground atoms that are assigned jointly.
/// Variables are numbered in the order their first member atom was registered.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VarIdx(usize);

impl VarIdx {
    /// Creates a new variable handle with the given index.
    pub fn new(index: usize) -> Self {
        VarIdx(index)
    }

    /// Returns the raw index as a `usize`.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for VarIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl From<VarIdx> for usize {
    fn from(var: VarIdx) -> Self {
        var.0
    }
}

/// Weight of a formula: a finite real or the hard sentinel.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Weight {
    Soft(f64),
    Hard,
}

impl Weight {
    pub fn is_hard(self) -> bool {
        matches!(self, Weight::Hard)
    }

    /// Returns the soft weight, or `None` for hard formulas.
    pub fn value(self) -> Option<f64> {
        match self {
            Weight::Soft(w) => Some(w),
            Weight::Hard => None,
        }
    }
}

impl fmt::Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Weight::Soft(w) => write!(f, "{}", w),
            Weight::Hard => write!(f, "HARD"),
        }
    }
}

impl From<f64> for Weight {
    fn from(w: f64) -> Self {
        Weight::Soft(w)
    }
}

/// A complete or partial assignment indexed by [`AtomIdx`].
///
/// `None` denotes an unknown truth value.
pub type World = Vec<Option<f64>>;

/// Returns `true` if `truth` is exactly boolean (0 or 1).
#[inline]
pub fn is_boolean(truth: f64) -> bool {
    truth == 0.0 || truth == 1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atom_idx() {
        let a0 = AtomIdx::new(0);
        let a1 = AtomIdx::from(1);
        assert_eq!(a0.index(), 0);
        assert_eq!(usize::from(a1), 1);
        assert!(a0 < a1);
        assert_eq!(a1.to_string(), "a1");
    }

    #[test]
    fn test_var_idx() {
        let v = VarIdx::new(3);
        assert_eq!(v.index(), 3);
        assert_eq!(v.to_string(), "v3");
    }

    #[test]
    fn test_weight() {
        assert!(Weight::Hard.is_hard());
        assert!(!Weight::from(1.5).is_hard());
        assert_eq!(Weight::Soft(1.5).value(), Some(1.5));
        assert_eq!(Weight::Hard.value(), None);
        assert_eq!(Weight::Hard.to_string(), "HARD");
    }

    #[test]
    fn test_is_boolean() {
        assert!(is_boolean(0.0));
        assert!(is_boolean(1.0));
        assert!(!is_boolean(0.3));
    }
}
