//! Ground atoms and their interning table.
//!
//! A ground atom is a predicate applied to constants, written `pred(C1,...,Cn)`.
//! The [`AtomTable`] hash-conses ground atoms: putting the same atom twice returns
//! the index allocated the first time.

use std::collections::HashMap;
use std::fmt;
use std::ops::Index;
use std::str::FromStr;

use crate::error::MlnError;
use crate::types::AtomIdx;

/// A predicate applied to a tuple of constants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroundAtom {
    predicate: String,
    args: Vec<String>,
}

impl GroundAtom {
    pub fn new(predicate: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            predicate: predicate.into(),
            args,
        }
    }

    pub fn predicate(&self) -> &str {
        &self.predicate
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for GroundAtom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.predicate, self.args.join(","))
    }
}

fn is_symbol(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.')
}

impl FromStr for GroundAtom {
    type Err = MlnError;

    /// Parses `pred(A,B)`; a bare `pred` or `pred()` denotes a zero-arity atom.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || MlnError::InvalidAtom(s.to_string());
        let s = s.trim();
        let (predicate, args) = match s.find('(') {
            None => (s, Vec::new()),
            Some(open) => {
                let inner = s[open + 1..].strip_suffix(')').ok_or_else(invalid)?;
                let args = if inner.trim().is_empty() {
                    Vec::new()
                } else {
                    inner.split(',').map(|a| a.trim().to_string()).collect()
                };
                (s[..open].trim(), args)
            }
        };
        if !is_symbol(predicate) || !args.iter().all(|a| is_symbol(a)) {
            return Err(invalid());
        }
        Ok(GroundAtom::new(predicate, args))
    }
}

/// Interning table mapping ground atoms to dense indices.
#[derive(Debug, Clone, Default)]
pub struct AtomTable {
    atoms: Vec<GroundAtom>,
    index: HashMap<GroundAtom, AtomIdx>,
}

impl AtomTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of interned atoms.
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Interns the atom, returning its index and whether it was newly allocated.
    pub fn put(&mut self, atom: GroundAtom) -> (AtomIdx, bool) {
        if let Some(&idx) = self.index.get(&atom) {
            return (idx, false);
        }
        let idx = AtomIdx::new(self.atoms.len());
        self.atoms.push(atom.clone());
        self.index.insert(atom, idx);
        (idx, true)
    }

    /// Looks up an already interned atom.
    pub fn find(&self, atom: &GroundAtom) -> Option<AtomIdx> {
        self.index.get(atom).copied()
    }

    pub fn get(&self, idx: AtomIdx) -> Option<&GroundAtom> {
        self.atoms.get(idx.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = (AtomIdx, &GroundAtom)> {
        self.atoms.iter().enumerate().map(|(i, a)| (AtomIdx::new(i), a))
    }
}

impl Index<AtomIdx> for AtomTable {
    type Output = GroundAtom;

    fn index(&self, idx: AtomIdx) -> &Self::Output {
        &self.atoms[idx.index()]
    }
}
