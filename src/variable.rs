//! Variables: atomic decision units over one or more ground atoms.
//!
//! Every ground atom belongs to exactly one [`Variable`]. A plain predicate yields one
//! binary variable per ground atom; (soft-)functional predicates group the atoms that
//! differ only in their mutex columns into a one-hot (or one-hot-or-none) block.
//!
//! A *value* of a variable is a tuple of truth values, one per member atom, in member
//! order. For a mutex block over `color(X,red)`, `color(X,green)`, `color(X,blue)` the
//! values are `[1,0,0]`, `[0,1,0]` and `[0,0,1]`.
//!
//! Values are always computed against a caller-supplied evidence or world slice and
//! written back into caller-owned state; a variable never touches the model's evidence.

use std::fmt;

use crate::error::{MlnError, Result};
use crate::types::{is_boolean, AtomIdx, VarIdx};

/// The grouping discipline of a variable.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum VariableKind {
    /// A single ground atom with values `[0]` and `[1]`.
    Binary,
    /// Exactly one member atom is true.
    Mutex,
    /// At most one member atom is true; `[0,...,0]` is the extra "none" value.
    SoftMutex,
    /// A single ground atom with a continuous truth value taken from the evidence.
    Fuzzy,
}

/// A variable over one or more ground atoms.
#[derive(Debug, Clone)]
pub struct Variable {
    idx: VarIdx,
    name: String,
    kind: VariableKind,
    atoms: Vec<AtomIdx>,
}

/// A value of a variable: one truth value per member atom.
pub type Value = Vec<f64>;

impl Variable {
    pub(crate) fn new(idx: VarIdx, name: String, kind: VariableKind) -> Self {
        Self {
            idx,
            name,
            kind,
            atoms: Vec::new(),
        }
    }

    pub(crate) fn push_atom(&mut self, atom: AtomIdx) {
        self.atoms.push(atom);
    }

    pub fn idx(&self) -> VarIdx {
        self.idx
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> VariableKind {
        self.kind
    }

    /// Member ground atoms, in registration order.
    pub fn atoms(&self) -> &[AtomIdx] {
        &self.atoms
    }

    pub fn contains(&self, atom: AtomIdx) -> bool {
        self.atoms.contains(&atom)
    }

    /// Number of values ignoring any evidence.
    ///
    /// Fuzzy variables report 1: their only admissible value is the evidenced one.
    pub fn domain_size(&self) -> usize {
        match self.kind {
            VariableKind::Binary => 2,
            VariableKind::Mutex => self.atoms.len(),
            VariableKind::SoftMutex => self.atoms.len() + 1,
            VariableKind::Fuzzy => 1,
        }
    }

    fn pattern(&self, evidence: &[Option<f64>]) -> Vec<Option<f64>> {
        self.atoms.iter().map(|a| evidence[a.index()]).collect()
    }

    fn one_hot(&self, i: usize) -> Value {
        let mut value = vec![0.0; self.atoms.len()];
        value[i] = 1.0;
        value
    }

    /// Enumerates the `(value index, value)` pairs admissible under `evidence`.
    ///
    /// Fuzzy variables yield their evidenced value with index `None`.
    ///
    /// # Errors
    ///
    /// - [`MlnError::ConsistencyViolation`] if more than one mutex member is true, or if
    ///   every member of a mutex block is false
    /// - [`MlnError::FuzzyEnumeration`] for a fuzzy variable without evidence
    pub fn values(&self, evidence: &[Option<f64>]) -> Result<Vec<(Option<usize>, Value)>> {
        self.values_of(&self.pattern(evidence))
    }

    /// Enumerates values admissible under a pattern of member truth values.
    fn values_of(&self, pattern: &[Option<f64>]) -> Result<Vec<(Option<usize>, Value)>> {
        match self.kind {
            VariableKind::Binary => match pattern[0] {
                Some(t) if is_boolean(t) => Ok(vec![(Some(t as usize), vec![t])]),
                _ => Ok(vec![(Some(0), vec![0.0]), (Some(1), vec![1.0])]),
            },
            VariableKind::Fuzzy => match pattern[0] {
                Some(t) => Ok(vec![(None, vec![t])]),
                None => Err(MlnError::FuzzyEnumeration {
                    atom: self.name.clone(),
                }),
            },
            VariableKind::Mutex | VariableKind::SoftMutex => {
                let trues = pattern.iter().filter(|v| **v == Some(1.0)).count();
                if trues > 1 {
                    return Err(self.violation(pattern, "more than one member is true"));
                }
                if trues == 1 {
                    let value: Value = pattern
                        .iter()
                        .map(|v| if *v == Some(1.0) { 1.0 } else { 0.0 })
                        .collect();
                    let index = self.value_index(&value)?;
                    return Ok(vec![(index, value)]);
                }
                let soft = self.kind == VariableKind::SoftMutex;
                if !soft && pattern.iter().all(|v| *v == Some(0.0)) {
                    return Err(self.violation(pattern, "every member is false"));
                }
                let offset = usize::from(soft);
                let mut values: Vec<(Option<usize>, Value)> = pattern
                    .iter()
                    .enumerate()
                    .filter(|(_, v)| v.is_none())
                    .map(|(i, _)| (Some(i + offset), self.one_hot(i)))
                    .collect();
                if soft {
                    values.push((Some(0), vec![0.0; self.atoms.len()]));
                }
                Ok(values)
            }
        }
    }

    /// Member truth values forced by asserting `value` for the member `atom` alone.
    ///
    /// A member is forced when every value admissible under that single assertion
    /// agrees on it: asserting a mutex member true forces its siblings false, and in a
    /// two-member mutex block asserting one member false forces the other true.
    /// Unforced members are `None`.
    pub fn implied_by(&self, atom: AtomIdx, value: f64) -> Result<Vec<Option<f64>>> {
        let mut pattern = vec![None; self.atoms.len()];
        if let Some(pos) = self.atoms.iter().position(|&a| a == atom) {
            pattern[pos] = Some(value);
        }
        let values = self.values_of(&pattern)?;
        let mut implied: Vec<Option<f64>> = match values.first() {
            Some((_, first)) => first.iter().map(|&t| Some(t)).collect(),
            None => return Ok(pattern),
        };
        for (_, v) in &values[1..] {
            for (slot, &t) in implied.iter_mut().zip(v) {
                if *slot != Some(t) {
                    *slot = None;
                }
            }
        }
        Ok(implied)
    }

    /// Number of values admissible under `evidence`.
    pub fn value_count(&self, evidence: &[Option<f64>]) -> Result<usize> {
        Ok(self.values(evidence)?.len())
    }

    /// Computes the index of a value.
    ///
    /// Binary: `[0] -> 0`, `[1] -> 1`. Mutex: position of the true member.
    /// Soft-mutex: position of the true member plus one, `0` for "none".
    /// Fuzzy values have no index.
    pub fn value_index(&self, value: &[f64]) -> Result<Option<usize>> {
        let invalid = || MlnError::ConsistencyViolation {
            variable: self.name.clone(),
            reason: format!("{:?} is not a value of this variable", value),
        };
        if value.len() != self.atoms.len() {
            return Err(invalid());
        }
        let trues = value.iter().filter(|&&v| v == 1.0).count();
        let pos = value.iter().position(|&v| v == 1.0);
        match self.kind {
            VariableKind::Fuzzy => Ok(None),
            VariableKind::Binary if is_boolean(value[0]) => Ok(Some(value[0] as usize)),
            VariableKind::Mutex if trues == 1 => Ok(pos),
            VariableKind::SoftMutex if trues <= 1 => Ok(Some(pos.map_or(0, |p| p + 1))),
            _ => Err(invalid()),
        }
    }

    /// Maps a value onto `(atom, truth)` pairs (`value2dict`).
    pub fn value_assignment<'a>(&'a self, value: &'a [f64]) -> impl Iterator<Item = (AtomIdx, f64)> + 'a {
        self.atoms.iter().copied().zip(value.iter().copied())
    }

    /// Writes a value into `world`.
    pub fn set_value(&self, value: &[f64], world: &mut [Option<f64>]) {
        for (atom, truth) in self.value_assignment(value) {
            world[atom.index()] = Some(truth);
        }
    }

    /// The (possibly partial) value of this variable in `world`.
    pub fn evidence_value(&self, world: &[Option<f64>]) -> Vec<Option<f64>> {
        self.pattern(world)
    }

    /// Index of the value this variable takes in `world`, or `None` if some member is unknown.
    pub fn evidence_value_index(&self, world: &[Option<f64>]) -> Result<Option<usize>> {
        let value: Option<Value> = self.pattern(world).into_iter().collect();
        match value {
            Some(value) => self.value_index(&value),
            None => Ok(None),
        }
    }

    /// Checks that the assignment of this variable in `world` respects its kind.
    ///
    /// With `strict`, every member must be assigned and mutex blocks must have exactly
    /// one true member; otherwise the sum of truth values must lie in `[0, 1]`.
    pub fn consistent(&self, world: &[Option<f64>], strict: bool) -> Result<()> {
        let pattern = self.pattern(world);
        if strict && pattern.iter().any(|v| v.is_none()) {
            return Err(self.violation(&pattern, "not all members are assigned"));
        }
        match self.kind {
            VariableKind::Fuzzy => match pattern[0] {
                Some(t) if !(0.0..=1.0).contains(&t) => Err(self.violation(&pattern, "truth outside [0,1]")),
                _ => Ok(()),
            },
            VariableKind::Binary => match pattern[0] {
                Some(t) if !is_boolean(t) => Err(self.violation(&pattern, "non-boolean truth")),
                _ => Ok(()),
            },
            VariableKind::Mutex | VariableKind::SoftMutex => {
                let total: f64 = pattern.iter().map(|v| v.unwrap_or(0.0)).sum();
                let exact = strict && self.kind == VariableKind::Mutex;
                if exact && total != 1.0 {
                    Err(self.violation(&pattern, "exactly one member must be true"))
                } else if !(0.0..=1.0).contains(&total) {
                    Err(self.violation(&pattern, "at most one member may be true"))
                } else {
                    Ok(())
                }
            }
        }
    }

    fn violation(&self, pattern: &[Option<f64>], reason: &str) -> MlnError {
        let values: Vec<String> = pattern
            .iter()
            .map(|v| v.map_or("?".to_string(), |t| t.to_string()))
            .collect();
        MlnError::ConsistencyViolation {
            variable: self.name.clone(),
            reason: format!("{} [{}]", reason, values.join(",")),
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn block(kind: VariableKind, n: usize) -> Variable {
        let mut var = Variable::new(VarIdx::new(0), "color(X,_)".to_string(), kind);
        for i in 0..n {
            var.push_atom(AtomIdx::new(i));
        }
        var
    }

    #[test]
    fn test_binary_values() {
        let var = block(VariableKind::Binary, 1);
        assert_eq!(var.value_count(&[None]).unwrap(), 2);
        let values = var.values(&[Some(1.0)]).unwrap();
        assert_eq!(values, vec![(Some(1), vec![1.0])]);
    }

    #[test]
    fn test_mutex_values() {
        let var = block(VariableKind::Mutex, 3);
        let values = var.values(&[None, None, None]).unwrap();
        assert_eq!(values.len(), 3);
        assert_eq!(values[1], (Some(1), vec![0.0, 1.0, 0.0]));

        // An atom fixed false is skipped
        let values = var.values(&[Some(0.0), None, None]).unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values[0].0, Some(1));

        // An atom fixed true pins the block
        let values = var.values(&[None, None, Some(1.0)]).unwrap();
        assert_eq!(values, vec![(Some(2), vec![0.0, 0.0, 1.0])]);

        assert!(var.values(&[Some(1.0), Some(1.0), None]).is_err());
        assert!(var.values(&[Some(0.0), Some(0.0), Some(0.0)]).is_err());
    }

    #[test]
    fn test_soft_mutex_values() {
        let var = block(VariableKind::SoftMutex, 2);
        let values = var.values(&[None, None]).unwrap();
        assert_eq!(values.len(), 3);
        assert_eq!(values[2], (Some(0), vec![0.0, 0.0]));
        assert_eq!(values[0], (Some(1), vec![1.0, 0.0]));

        let values = var.values(&[Some(0.0), Some(0.0)]).unwrap();
        assert_eq!(values, vec![(Some(0), vec![0.0, 0.0])]);
    }

    #[test]
    fn test_fuzzy_values() {
        let var = block(VariableKind::Fuzzy, 1);
        assert!(matches!(var.values(&[None]), Err(MlnError::FuzzyEnumeration { .. })));
        assert_eq!(var.values(&[Some(0.3)]).unwrap(), vec![(None, vec![0.3])]);
    }

    #[test]
    fn test_value_round_trip() {
        for (kind, n) in [
            (VariableKind::Binary, 1),
            (VariableKind::Mutex, 3),
            (VariableKind::SoftMutex, 3),
        ] {
            let var = block(kind, n);
            let evidence = vec![None; n];
            for (index, value) in var.values(&evidence).unwrap() {
                let mut world = vec![None; n];
                var.set_value(&value, &mut world);
                let back: Vec<f64> = var.evidence_value(&world).into_iter().map(|v| v.unwrap()).collect();
                assert_eq!(back, value);
                assert_eq!(var.evidence_value_index(&world).unwrap(), index);
            }
        }
    }

    #[test]
    fn test_implied_by() {
        let var = block(VariableKind::Mutex, 3);
        let implied = var.implied_by(AtomIdx::new(1), 1.0).unwrap();
        assert_eq!(implied, vec![Some(0.0), Some(1.0), Some(0.0)]);
        let implied = var.implied_by(AtomIdx::new(1), 0.0).unwrap();
        assert_eq!(implied, vec![None, Some(0.0), None]);

        let pair = block(VariableKind::Mutex, 2);
        let implied = pair.implied_by(AtomIdx::new(0), 0.0).unwrap();
        assert_eq!(implied, vec![Some(0.0), Some(1.0)]);

        let soft = block(VariableKind::SoftMutex, 2);
        let implied = soft.implied_by(AtomIdx::new(0), 0.0).unwrap();
        assert_eq!(implied, vec![Some(0.0), None]);
    }

    #[test]
    fn test_consistent() {
        let var = block(VariableKind::Mutex, 3);
        assert!(var.consistent(&[None, None, None], false).is_ok());
        assert!(var.consistent(&[None, None, None], true).is_err());
        assert!(var.consistent(&[Some(0.0), Some(1.0), Some(0.0)], true).is_ok());
        assert!(var.consistent(&[Some(0.0), Some(0.0), Some(0.0)], true).is_err());
        assert!(var.consistent(&[Some(1.0), Some(1.0), Some(0.0)], false).is_err());

        let soft = block(VariableKind::SoftMutex, 2);
        assert!(soft.consistent(&[Some(0.0), Some(0.0)], true).is_ok());
    }
}
