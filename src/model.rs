//! The ground model: ground atoms, variables and the evidence vector.
//!
//! A [`GroundModel`] is built from an [`Mln`] and a [`Database`] of facts. Construction
//! extends the domains with the constants mentioned by the facts, materializes every
//! ground atom of every declared predicate (so the atom and variable tables are fixed
//! before any grounding or sampling starts), asserts the facts as evidence and finally
//! closes the world for the closed-world predicates of the theory.
//!
//! # Example
//!
//! ```
//! use mln_rs::domain::Predicate;
//! use mln_rs::formula::Mln;
//! use num_bigint::BigUint;
//! use mln_rs::model::{Database, GroundModel};
//!
//! let mut mln = Mln::new();
//! mln.declare_predicate(Predicate::new("smokes", &["person"])).unwrap();
//!
//! let mut db = Database::new();
//! db.add("smokes(Anna)", 1.0).unwrap();
//! db.add("smokes(Bob)", 0.0).unwrap();
//!
//! let model = GroundModel::new(mln, &db).unwrap();
//! assert_eq!(model.atom_count(), 2);
//! let anna = model.gndatom("smokes(Anna)").unwrap();
//! assert_eq!(model.evidence()[anna.index()], Some(1.0));
//! assert_eq!(model.count_worlds().unwrap(), BigUint::from(1u32));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};

use log::{debug, info};
use num_bigint::BigUint;
use rand::Rng;

use crate::atom::{AtomTable, GroundAtom};
use crate::domain::PredicateKind;
use crate::error::{MlnError, Result};
use crate::formula::Mln;
use crate::ground::GroundFormula;
use crate::types::{is_boolean, AtomIdx, VarIdx, World};
use crate::variable::{Value, Variable, VariableKind};

/// A reference to a ground atom by name or by index.
#[derive(Debug, Copy, Clone)]
pub enum AtomKey<'a> {
    Index(AtomIdx),
    Name(&'a str),
    Atom(&'a GroundAtom),
}

impl<'a> From<&'a str> for AtomKey<'a> {
    fn from(name: &'a str) -> Self {
        AtomKey::Name(name)
    }
}

impl<'a> From<&'a String> for AtomKey<'a> {
    fn from(name: &'a String) -> Self {
        AtomKey::Name(name)
    }
}

impl From<AtomIdx> for AtomKey<'_> {
    fn from(idx: AtomIdx) -> Self {
        AtomKey::Index(idx)
    }
}

impl<'a> From<&'a GroundAtom> for AtomKey<'a> {
    fn from(atom: &'a GroundAtom) -> Self {
        AtomKey::Atom(atom)
    }
}

impl fmt::Display for AtomKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AtomKey::Index(idx) => write!(f, "{}", idx),
            AtomKey::Name(name) => write!(f, "{}", name),
            AtomKey::Atom(atom) => write!(f, "{}", atom),
        }
    }
}

/// Ground facts with their truth values.
#[derive(Debug, Clone, Default)]
pub struct Database {
    facts: Vec<(GroundAtom, f64)>,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a fact such as `db.add("friends(Anna,Bob)", 1.0)`.
    pub fn add(&mut self, atom: &str, truth: f64) -> Result<()> {
        let atom: GroundAtom = atom.parse()?;
        self.facts.push((atom, truth));
        Ok(())
    }

    pub fn facts(&self) -> &[(GroundAtom, f64)] {
        &self.facts
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}

/// The propositional network implied by an MLN and its domains.
#[derive(Debug, Clone)]
pub struct GroundModel {
    mln: Mln,
    atoms: AtomTable,
    evidence: World,
    variables: Vec<Variable>,
    atom_vars: Vec<VarIdx>,
    var_names: HashMap<String, VarIdx>,
}

impl GroundModel {
    /// Builds the ground model of `mln` with `db` as evidence.
    pub fn new(mut mln: Mln, db: &Database) -> Result<Self> {
        for (atom, _) in db.facts() {
            let predicate = mln.predicate(atom.predicate())?;
            if predicate.arity() != atom.args().len() {
                return Err(MlnError::ArityMismatch {
                    predicate: predicate.name().to_string(),
                    expected: predicate.arity(),
                    found: atom.args().len(),
                });
            }
            let domains = predicate.domains().to_vec();
            for (dom, arg) in domains.iter().zip(atom.args()) {
                mln.add_constant(dom, arg);
            }
        }

        let mut model = GroundModel {
            mln,
            atoms: AtomTable::new(),
            evidence: Vec::new(),
            variables: Vec::new(),
            atom_vars: Vec::new(),
            var_names: HashMap::new(),
        };
        model.materialize()?;
        model.set_evidence(db.facts().iter().map(|(a, t)| (a, *t)), false, false)?;
        let closed: Vec<String> = model.mln.closed_world().map(|s| s.to_string()).collect();
        if !closed.is_empty() {
            let closed: Vec<&str> = closed.iter().map(|s| s.as_str()).collect();
            model.apply_closed_world(&closed);
        }
        info!(
            "Ground model: {} atoms, {} variables, {} evidence atoms",
            model.atom_count(),
            model.variables.len(),
            model.evidence.iter().filter(|e| e.is_some()).count()
        );
        Ok(model)
    }

    /// Builds the ground model of `mln` without evidence.
    pub fn from_mln(mln: Mln) -> Result<Self> {
        Self::new(mln, &Database::new())
    }

    /// Registers every ground atom of every predicate over its argument domains.
    fn materialize(&mut self) -> Result<()> {
        let predicates = self.mln.predicates().to_vec();
        for predicate in predicates {
            let domains = predicate
                .domains()
                .iter()
                .map(|d| self.mln.domains().constants(d).map(|cs| cs.to_vec()))
                .collect::<Result<Vec<_>>>()?;
            if domains.iter().any(|d| d.is_empty()) {
                debug!("materialize: {} has an empty domain", predicate);
                continue;
            }
            let mut counters = vec![0; domains.len()];
            loop {
                let args: Vec<String> = counters
                    .iter()
                    .zip(&domains)
                    .map(|(&i, d)| d[i].clone())
                    .collect();
                self.register_ground_atom(predicate.name(), args)?;
                if !advance(&mut counters, |i| domains[i].len()) {
                    break;
                }
            }
        }
        Ok(())
    }

    pub fn mln(&self) -> &Mln {
        &self.mln
    }

    pub fn atoms(&self) -> &AtomTable {
        &self.atoms
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn atom(&self, idx: AtomIdx) -> &GroundAtom {
        &self.atoms[idx]
    }

    /// Registers the ground atom `predicate(args)`.
    ///
    /// Idempotent: registering an existing atom returns its index. A new atom gets an
    /// unknown evidence slot and joins the variable named by its predicate, which is
    /// created on first use.
    pub fn register_ground_atom(&mut self, predicate: &str, args: Vec<String>) -> Result<AtomIdx> {
        let pred = self.mln.predicate(predicate)?;
        if pred.arity() != args.len() {
            return Err(MlnError::ArityMismatch {
                predicate: predicate.to_string(),
                expected: pred.arity(),
                found: args.len(),
            });
        }
        let var_name = pred.variable_name(&args);
        let kind = match pred.kind() {
            PredicateKind::Plain => VariableKind::Binary,
            PredicateKind::Functional { .. } => VariableKind::Mutex,
            PredicateKind::SoftFunctional { .. } => VariableKind::SoftMutex,
            PredicateKind::Fuzzy => VariableKind::Fuzzy,
        };

        let (idx, new) = self.atoms.put(GroundAtom::new(predicate, args));
        if !new {
            return Ok(idx);
        }
        self.evidence.push(None);
        let var = match self.var_names.get(&var_name) {
            Some(&var) => var,
            None => {
                let var = VarIdx::new(self.variables.len());
                self.variables.push(Variable::new(var, var_name.clone(), kind));
                self.var_names.insert(var_name, var);
                var
            }
        };
        self.variables[var.index()].push_atom(idx);
        self.atom_vars.push(var);
        Ok(idx)
    }

    /// Resolves a ground atom by name or index.
    pub fn gndatom<'k>(&self, key: impl Into<AtomKey<'k>>) -> Option<AtomIdx> {
        match key.into() {
            AtomKey::Index(idx) => (idx.index() < self.atoms.len()).then_some(idx),
            AtomKey::Name(name) => {
                let atom: GroundAtom = name.parse().ok()?;
                self.atoms.find(&atom)
            }
            AtomKey::Atom(atom) => self.atoms.find(atom),
        }
    }

    pub fn find_atom(&self, atom: &GroundAtom) -> Option<AtomIdx> {
        self.atoms.find(atom)
    }

    /// The variable owning `atom`.
    ///
    /// # Panics
    ///
    /// Panics if `atom` is not an atom of this model; see [`GroundModel::try_variable`].
    pub fn variable(&self, atom: AtomIdx) -> &Variable {
        &self.variables[self.atom_vars[atom.index()].index()]
    }

    /// The variable owning `atom`, or `None` if `atom` is not an atom of this model.
    pub fn try_variable(&self, atom: AtomIdx) -> Option<&Variable> {
        let var = self.atom_vars.get(atom.index())?;
        self.variables.get(var.index())
    }

    pub fn variable_by_name(&self, name: &str) -> Option<&Variable> {
        self.var_names.get(name).map(|v| &self.variables[v.index()])
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn evidence(&self) -> &[Option<f64>] {
        &self.evidence
    }

    /// Asserts evidence for ground atoms.
    ///
    /// With `erase`, all atoms of each touched variable are reset to unknown first.
    /// Asserting a member of a (soft-)mutex block also asserts every sibling value the
    /// block structure forces. With `closed_world`, every atom still unknown afterwards
    /// is set to false.
    ///
    /// # Errors
    ///
    /// - [`MlnError::UnknownAtom`] for atoms not in the model
    /// - [`MlnError::InvalidEvidence`] for values outside `[0, 1]` and for non-boolean
    ///   values on non-fuzzy atoms
    /// - [`MlnError::ValueConflict`] if a forced value contradicts committed evidence
    pub fn set_evidence<'k, K, I>(&mut self, assignment: I, erase: bool, closed_world: bool) -> Result<()>
    where
        K: Into<AtomKey<'k>>,
        I: IntoIterator<Item = (K, f64)>,
    {
        let mut pairs = Vec::new();
        for (key, value) in assignment {
            let key = key.into();
            let atom = self
                .gndatom(key)
                .ok_or_else(|| MlnError::UnknownAtom(key.to_string()))?;
            let fuzzy = self.variable(atom).kind() == VariableKind::Fuzzy;
            if !(0.0..=1.0).contains(&value) || (!fuzzy && !is_boolean(value)) {
                return Err(MlnError::InvalidEvidence {
                    atom: self.atoms[atom].to_string(),
                    value,
                });
            }
            pairs.push((atom, value));
        }

        // staged on a copy: a failing call leaves the evidence untouched
        let mut evidence = self.evidence.clone();
        if erase {
            for &(atom, _) in &pairs {
                for &a in self.variable(atom).atoms() {
                    evidence[a.index()] = None;
                }
            }
        }

        for (atom, value) in pairs {
            let var = self.variable(atom);
            match var.kind() {
                VariableKind::Binary | VariableKind::Fuzzy => {
                    evidence[atom.index()] = Some(value);
                }
                VariableKind::Mutex | VariableKind::SoftMutex => {
                    let implied = var.implied_by(atom, value)?;
                    for (&a, val) in var.atoms().iter().zip(implied) {
                        match (evidence[a.index()], val) {
                            (Some(previous), Some(value)) if previous != value => {
                                return Err(MlnError::ValueConflict {
                                    atom: self.atoms[a].to_string(),
                                    previous,
                                    value,
                                });
                            }
                            (None, Some(value)) => evidence[a.index()] = Some(value),
                            _ => {}
                        }
                    }
                }
            }
        }
        self.evidence = evidence;

        if closed_world {
            self.apply_closed_world(&[]);
        }
        Ok(())
    }

    /// Resets every evidence value to unknown.
    pub fn erase_evidence(&mut self) {
        self.evidence.iter_mut().for_each(|e| *e = None);
    }

    /// Sets every unknown atom of the given predicates to false (all predicates if empty).
    pub fn apply_closed_world(&mut self, predicates: &[&str]) {
        for (idx, atom) in self.atoms.iter() {
            let slot = &mut self.evidence[idx.index()];
            if slot.is_none() && (predicates.is_empty() || predicates.contains(&atom.predicate())) {
                *slot = Some(0.0);
            }
        }
    }

    /// Checks every variable against the current evidence.
    pub fn consistent(&self, strict: bool) -> Result<()> {
        self.check_world(&self.evidence, strict)
    }

    /// Checks every variable against `world`.
    pub fn check_world(&self, world: &[Option<f64>], strict: bool) -> Result<()> {
        for var in &self.variables {
            var.consistent(world, strict)?;
        }
        Ok(())
    }

    /// Ground atoms without evidence: the default query set.
    pub fn query_atoms(&self) -> Vec<AtomIdx> {
        self.evidence
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_none())
            .map(|(i, _)| AtomIdx::new(i))
            .collect()
    }

    /// Number of complete worlds consistent with the evidence.
    pub fn count_worlds(&self) -> Result<BigUint> {
        let mut count = BigUint::from(1u32);
        for var in &self.variables {
            count *= BigUint::from(var.value_count(&self.evidence)?);
        }
        Ok(count)
    }

    /// Lazily enumerates every complete world consistent with the evidence.
    ///
    /// Each call starts a fresh enumeration.
    pub fn iter_worlds(&self) -> Result<Worlds<'_>> {
        Worlds::new(self)
    }

    /// Draws a complete world consistent with the evidence, choosing each variable's
    /// value uniformly among its admissible values.
    pub fn random_world<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<World> {
        let mut world = self.evidence.clone();
        for var in &self.variables {
            let values = var.values(&self.evidence)?;
            if values.is_empty() {
                return Err(MlnError::ConsistencyViolation {
                    variable: var.name().to_string(),
                    reason: "no admissible value".to_string(),
                });
            }
            let (_, value) = &values[rng.random_range(0..values.len())];
            var.set_value(value, &mut world);
        }
        Ok(world)
    }

    /// Renders a ground formula with atom names.
    pub fn format(&self, formula: &GroundFormula) -> String {
        formula.display(&self.atoms).to_string()
    }

    /// Opens an evidence scope: the evidence vector is restored when the scope is
    /// dropped, also during unwinding.
    pub fn evidence_scope(&mut self) -> EvidenceScope<'_> {
        let saved = self.evidence.clone();
        EvidenceScope { model: self, saved }
    }
}

/// Odometer step: increments `counters` in place, last position fastest.
///
/// Returns `false` once every combination has been produced.
pub(crate) fn advance(counters: &mut [usize], size: impl Fn(usize) -> usize) -> bool {
    for i in (0..counters.len()).rev() {
        counters[i] += 1;
        if counters[i] < size(i) {
            return true;
        }
        counters[i] = 0;
    }
    false
}

/// Guard returned by [`GroundModel::evidence_scope`].
pub struct EvidenceScope<'a> {
    model: &'a mut GroundModel,
    saved: World,
}

impl Deref for EvidenceScope<'_> {
    type Target = GroundModel;

    fn deref(&self) -> &Self::Target {
        self.model
    }
}

impl DerefMut for EvidenceScope<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.model
    }
}

impl Drop for EvidenceScope<'_> {
    fn drop(&mut self) {
        self.model.evidence = std::mem::take(&mut self.saved);
    }
}

/// An iterator over complete worlds of a ground model.
///
/// Created by [`GroundModel::iter_worlds()`]. Every variable's admissible values are
/// computed once up front; the iterator then walks their Cartesian product like an
/// odometer, last variable fastest.
#[derive(Clone)]
pub struct Worlds<'a> {
    model: &'a GroundModel,
    values: Vec<Vec<Value>>,
    counters: Vec<usize>,
    done: bool,
}

impl<'a> Worlds<'a> {
    fn new(model: &'a GroundModel) -> Result<Self> {
        let values = model
            .variables
            .iter()
            .map(|var| -> Result<Vec<Value>> {
                Ok(var.values(&model.evidence)?.into_iter().map(|(_, v)| v).collect())
            })
            .collect::<Result<Vec<_>>>()?;
        let done = values.iter().any(|v| v.is_empty());
        Ok(Self {
            model,
            counters: vec![0; values.len()],
            values,
            done,
        })
    }
}

impl Iterator for Worlds<'_> {
    type Item = World;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut world = self.model.evidence.clone();
        for ((var, values), &i) in self.model.variables.iter().zip(&self.values).zip(&self.counters) {
            var.set_value(&values[i], &mut world);
        }
        let values = &self.values;
        self.done = !advance(&mut self.counters, |i| values[i].len());
        Some(world)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Predicate;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use test_log::test;

    fn colors() -> GroundModel {
        let mut mln = Mln::new();
        mln.declare_predicate(Predicate::functional("color", &["obj", "col"], &[1]))
            .unwrap();
        for c in ["red", "green", "blue"] {
            mln.add_constant("col", c);
        }
        mln.add_constant("obj", "X");
        GroundModel::from_mln(mln).unwrap()
    }

    fn smokers(db: &Database) -> GroundModel {
        let mut mln = Mln::new();
        mln.declare_predicate(Predicate::new("smokes", &["person"])).unwrap();
        mln.declare_predicate(Predicate::new("cancer", &["person"])).unwrap();
        mln.add_constant("person", "A");
        mln.add_constant("person", "B");
        GroundModel::new(mln, db).unwrap()
    }

    #[test]
    fn test_materialize() {
        let model = smokers(&Database::new());
        assert_eq!(model.atom_count(), 4);
        assert_eq!(model.variables().len(), 4);
        assert_eq!(model.atom(AtomIdx::new(1)).to_string(), "smokes(B)");
        assert_eq!(model.gndatom("cancer(A)"), Some(AtomIdx::new(2)));
        assert_eq!(model.gndatom(AtomIdx::new(9)), None);
        assert_eq!(model.gndatom("cancer(Z)"), None);
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut model = smokers(&Database::new());
        let a = model.register_ground_atom("smokes", vec!["C".to_string()]).unwrap();
        let b = model.register_ground_atom("smokes", vec!["C".to_string()]).unwrap();
        assert_eq!(a, b);
        assert_eq!(model.atom_count(), 5);
        assert_eq!(model.evidence().len(), 5);
        assert!(model.register_ground_atom("smokes", vec![]).is_err());
    }

    #[test]
    fn test_database_extends_domains() {
        let mut db = Database::new();
        db.add("smokes(C)", 1.0).unwrap();
        let model = smokers(&db);
        assert_eq!(model.atom_count(), 6);
        let c = model.gndatom("smokes(C)").unwrap();
        assert_eq!(model.evidence()[c.index()], Some(1.0));
    }

    #[test]
    fn test_mutex_variable() {
        let model = colors();
        assert_eq!(model.variables().len(), 1);
        let red = model.gndatom("color(X,red)").unwrap();
        let var = model.variable(red);
        assert_eq!(var.name(), "color(X,_)");
        assert_eq!(var.values(model.evidence()).unwrap().len(), 3);
    }

    #[test]
    fn test_mutex_propagation() {
        let mut model = colors();
        model.set_evidence([("color(X,red)", 1.0)], false, false).unwrap();
        let ev = model.evidence();
        assert_eq!(ev, &[Some(1.0), Some(0.0), Some(0.0)]);

        // Contradicting a forced sibling value is a conflict
        let err = model.set_evidence([("color(X,green)", 1.0)], false, false);
        assert!(matches!(err, Err(MlnError::ValueConflict { .. })));

        // Erasing the block first makes it legal
        model.set_evidence([("color(X,green)", 1.0)], true, false).unwrap();
        assert_eq!(model.evidence(), &[Some(0.0), Some(1.0), Some(0.0)]);
    }

    #[test]
    fn test_failed_evidence_changes_nothing() {
        let mut mln = Mln::new();
        mln.declare_predicate(Predicate::new("smokes", &["person"])).unwrap();
        mln.declare_predicate(Predicate::functional("color", &["obj", "col"], &[1]))
            .unwrap();
        mln.add_constant("person", "A");
        mln.add_constant("obj", "X");
        for c in ["red", "green", "blue"] {
            mln.add_constant("col", c);
        }
        let mut db = Database::new();
        db.add("color(X,green)", 1.0).unwrap();
        let mut model = GroundModel::new(mln, &db).unwrap();
        let before = model.evidence().to_vec();

        // the conflict shows up after smokes(A) has been staged
        let err = model.set_evidence([("smokes(A)", 1.0), ("color(X,red)", 1.0)], false, true);
        assert!(matches!(err, Err(MlnError::ValueConflict { .. })));
        assert_eq!(model.evidence(), before.as_slice());

        // two members of one block asserted in the same call
        model.erase_evidence();
        let err = model.set_evidence([("color(X,red)", 1.0), ("color(X,blue)", 1.0)], false, false);
        assert!(matches!(err, Err(MlnError::ValueConflict { .. })));
        assert!(model.evidence().iter().all(|e| e.is_none()));
    }

    #[test]
    fn test_try_variable() {
        let model = smokers(&Database::new());
        let a = model.gndatom("smokes(A)").unwrap();
        assert_eq!(model.try_variable(a).map(|v| v.name()), Some("smokes(A)"));
        assert!(model.try_variable(AtomIdx::new(4)).is_none());
    }

    #[test]
    #[should_panic]
    fn test_variable_out_of_range() {
        let model = smokers(&Database::new());
        model.variable(AtomIdx::new(4));
    }

    #[test]
    fn test_invalid_evidence() {
        let mut model = smokers(&Database::new());
        let err = model.set_evidence([("smokes(A)", 0.5)], false, false);
        assert!(matches!(err, Err(MlnError::InvalidEvidence { .. })));
        let err = model.set_evidence([("smokes(Q)", 1.0)], false, false);
        assert!(matches!(err, Err(MlnError::UnknownAtom(_))));
    }

    #[test]
    fn test_closed_world() {
        let mut model = smokers(&Database::new());
        model.set_evidence([("smokes(A)", 1.0)], false, true).unwrap();
        assert_eq!(model.evidence(), &[Some(1.0), Some(0.0), Some(0.0), Some(0.0)]);
        model.erase_evidence();
        model.apply_closed_world(&["cancer"]);
        assert_eq!(model.evidence(), &[None, None, Some(0.0), Some(0.0)]);
        assert_eq!(model.query_atoms(), vec![AtomIdx::new(0), AtomIdx::new(1)]);
    }

    #[test]
    fn test_iter_worlds() {
        let mut model = smokers(&Database::new());
        assert_eq!(model.count_worlds().unwrap(), BigUint::from(16u32));
        assert_eq!(model.iter_worlds().unwrap().count(), 16);

        model.set_evidence([("smokes(A)", 1.0), ("cancer(B)", 0.0)], false, false).unwrap();
        let worlds: Vec<World> = model.iter_worlds().unwrap().collect();
        assert_eq!(worlds.len(), 4);
        for w in &worlds {
            assert_eq!(w[0], Some(1.0));
            assert_eq!(w[3], Some(0.0));
            assert!(w.iter().all(|t| t.is_some()));
        }
        // Restartable
        assert_eq!(model.iter_worlds().unwrap().count(), 4);

        let colors = colors();
        let worlds: Vec<World> = colors.iter_worlds().unwrap().collect();
        assert_eq!(worlds.len(), 3);
        for w in &worlds {
            colors.check_world(w, true).unwrap();
        }
    }

    #[test]
    fn test_random_world() {
        let mut model = colors();
        model.set_evidence([("color(X,blue)", 0.0)], false, false).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for _ in 0..20 {
            let world = model.random_world(&mut rng).unwrap();
            model.check_world(&world, true).unwrap();
            assert_eq!(world[2], Some(0.0));
        }
    }

    #[test]
    fn test_evidence_scope_restores() {
        let mut model = smokers(&Database::new());
        model.set_evidence([("smokes(A)", 1.0)], false, false).unwrap();
        let before = model.evidence().to_vec();
        {
            let mut scope = model.evidence_scope();
            scope.set_evidence([("cancer(A)", 1.0)], false, true).unwrap();
            assert!(scope.evidence().iter().all(|e| e.is_some()));
        }
        assert_eq!(model.evidence(), before.as_slice());

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut scope = model.evidence_scope();
            scope.erase_evidence();
            panic!("abort inside scope");
        }));
        assert!(result.is_err());
        assert_eq!(model.evidence(), before.as_slice());
    }
}
