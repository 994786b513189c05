//! Ground formulas: propositional structure over ground atom indices.
//!
//! A ground formula is produced by substituting constants for the free variables of a
//! template. Truth values are evaluated against a world (`&[Option<f64>]`); `None`
//! stands for an unknown atom and propagates according to the usual three-valued rules,
//! with `min`/`max` semantics for (fuzzy) conjunction and disjunction.

use std::collections::BTreeSet;
use std::fmt;

use crate::atom::AtomTable;
use crate::types::{is_boolean, AtomIdx};

/// A propositional formula over ground atoms.
#[derive(Debug, Clone, PartialEq)]
pub enum GroundFormula {
    Lit { atom: AtomIdx, negated: bool },
    TrueFalse(f64),
    Not(Box<GroundFormula>),
    And(Vec<GroundFormula>),
    Or(Vec<GroundFormula>),
}

/// A literal of a clause.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroundLit {
    pub atom: AtomIdx,
    /// `true` if the literal is satisfied by the atom being true.
    pub positive: bool,
}

impl GroundLit {
    pub fn new(atom: AtomIdx, positive: bool) -> Self {
        Self { atom, positive }
    }

    /// The atom truth value that satisfies this literal.
    pub fn polarity(self) -> f64 {
        if self.positive {
            1.0
        } else {
            0.0
        }
    }

    pub fn is_satisfied(self, world: &[Option<f64>]) -> bool {
        world[self.atom.index()] == Some(self.polarity())
    }
}

/// A disjunction of literals.
pub type Clause = Vec<GroundLit>;

impl GroundFormula {
    pub fn lit(atom: AtomIdx, negated: bool) -> Self {
        GroundFormula::Lit { atom, negated }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, GroundFormula::TrueFalse(_))
    }

    /// Returns the constant truth value, if the formula is a constant.
    pub fn constant(&self) -> Option<f64> {
        match self {
            GroundFormula::TrueFalse(t) => Some(*t),
            _ => None,
        }
    }

    /// Truth value in `world`, or `None` if it depends on unknown atoms.
    pub fn truth(&self, world: &[Option<f64>]) -> Option<f64> {
        match self {
            GroundFormula::Lit { atom, negated } => {
                world[atom.index()].map(|t| if *negated { 1.0 - t } else { t })
            }
            GroundFormula::TrueFalse(t) => Some(*t),
            GroundFormula::Not(inner) => inner.truth(world).map(|t| 1.0 - t),
            GroundFormula::And(children) => {
                let mut unknown = false;
                let mut truth: f64 = 1.0;
                for c in children {
                    match c.truth(world) {
                        Some(t) if t == 0.0 => return Some(0.0),
                        Some(t) => truth = truth.min(t),
                        None => unknown = true,
                    }
                }
                if unknown {
                    None
                } else {
                    Some(truth)
                }
            }
            GroundFormula::Or(children) => {
                let mut unknown = false;
                let mut truth: f64 = 0.0;
                for c in children {
                    match c.truth(world) {
                        Some(t) if t == 1.0 => return Some(1.0),
                        Some(t) => truth = truth.max(t),
                        None => unknown = true,
                    }
                }
                if unknown {
                    None
                } else {
                    Some(truth)
                }
            }
        }
    }

    /// Lower bound of the truth value over all completions of `world`.
    pub fn min_truth(&self, world: &[Option<f64>]) -> f64 {
        match self {
            GroundFormula::Lit { .. } | GroundFormula::TrueFalse(_) => self.truth(world).unwrap_or(0.0),
            GroundFormula::Not(inner) => 1.0 - inner.max_truth(world),
            GroundFormula::And(children) => children.iter().map(|c| c.min_truth(world)).fold(1.0, f64::min),
            GroundFormula::Or(children) => children.iter().map(|c| c.min_truth(world)).fold(0.0, f64::max),
        }
    }

    /// Upper bound of the truth value over all completions of `world`.
    pub fn max_truth(&self, world: &[Option<f64>]) -> f64 {
        match self {
            GroundFormula::Lit { .. } | GroundFormula::TrueFalse(_) => self.truth(world).unwrap_or(1.0),
            GroundFormula::Not(inner) => 1.0 - inner.min_truth(world),
            GroundFormula::And(children) => children.iter().map(|c| c.max_truth(world)).fold(1.0, f64::min),
            GroundFormula::Or(children) => children.iter().map(|c| c.max_truth(world)).fold(0.0, f64::max),
        }
    }

    /// Replaces atoms known in `evidence` by constants and folds the constants away.
    ///
    /// Boolean constants are absorbed (`x ^ 1 = x`, `x ^ 0 = 0`, ...). Fuzzy constants
    /// stay as children, merged into one per junction.
    pub fn simplify(&self, evidence: &[Option<f64>]) -> GroundFormula {
        match self {
            GroundFormula::Lit { .. } => match self.truth(evidence) {
                Some(t) => GroundFormula::TrueFalse(t),
                None => self.clone(),
            },
            GroundFormula::TrueFalse(_) => self.clone(),
            GroundFormula::Not(inner) => match inner.simplify(evidence) {
                GroundFormula::TrueFalse(t) => GroundFormula::TrueFalse(1.0 - t),
                GroundFormula::Lit { atom, negated } => GroundFormula::Lit {
                    atom,
                    negated: !negated,
                },
                f => GroundFormula::Not(Box::new(f)),
            },
            GroundFormula::And(children) => {
                let mut rest = Vec::new();
                let mut fuzzy: Option<f64> = None;
                for c in children {
                    match c.simplify(evidence) {
                        GroundFormula::TrueFalse(t) if t == 0.0 => return GroundFormula::TrueFalse(0.0),
                        GroundFormula::TrueFalse(t) if t == 1.0 => {}
                        GroundFormula::TrueFalse(t) => fuzzy = Some(fuzzy.map_or(t, |f| f.min(t))),
                        f => rest.push(f),
                    }
                }
                junction(rest, fuzzy, 1.0, GroundFormula::And)
            }
            GroundFormula::Or(children) => {
                let mut rest = Vec::new();
                let mut fuzzy: Option<f64> = None;
                for c in children {
                    match c.simplify(evidence) {
                        GroundFormula::TrueFalse(t) if t == 1.0 => return GroundFormula::TrueFalse(1.0),
                        GroundFormula::TrueFalse(t) if t == 0.0 => {}
                        GroundFormula::TrueFalse(t) => fuzzy = Some(fuzzy.map_or(t, |f| f.max(t))),
                        f => rest.push(f),
                    }
                }
                junction(rest, fuzzy, 0.0, GroundFormula::Or)
            }
        }
    }

    /// Returns `true` if the formula contains a constant strictly between 0 and 1.
    pub fn has_fuzzy_constant(&self) -> bool {
        match self {
            GroundFormula::Lit { .. } => false,
            GroundFormula::TrueFalse(t) => !is_boolean(*t),
            GroundFormula::Not(inner) => inner.has_fuzzy_constant(),
            GroundFormula::And(children) | GroundFormula::Or(children) => {
                children.iter().any(|c| c.has_fuzzy_constant())
            }
        }
    }

    /// Negation normal form: negations only on literals.
    pub fn nnf(&self) -> GroundFormula {
        self.nnf_signed(false)
    }

    fn nnf_signed(&self, negate: bool) -> GroundFormula {
        match self {
            GroundFormula::Lit { atom, negated } => GroundFormula::Lit {
                atom: *atom,
                negated: *negated != negate,
            },
            GroundFormula::TrueFalse(t) => GroundFormula::TrueFalse(if negate { 1.0 - t } else { *t }),
            GroundFormula::Not(inner) => inner.nnf_signed(!negate),
            GroundFormula::And(children) => {
                let children = children.iter().map(|c| c.nnf_signed(negate)).collect();
                if negate {
                    GroundFormula::Or(children)
                } else {
                    GroundFormula::And(children)
                }
            }
            GroundFormula::Or(children) => {
                let children = children.iter().map(|c| c.nnf_signed(negate)).collect();
                if negate {
                    GroundFormula::And(children)
                } else {
                    GroundFormula::Or(children)
                }
            }
        }
    }

    /// Clausal form as a list of clauses.
    ///
    /// An empty list denotes `True`; a list holding an empty clause denotes `False`.
    /// Tautological clauses are dropped, duplicate literals merged and subsumed
    /// clauses removed. Fuzzy constants count as satisfied: they make a clause true
    /// and vanish from a conjunction.
    pub fn clauses(&self) -> Vec<Clause> {
        let mut sets = clause_sets(&self.nnf());
        if sets.iter().any(|c| c.is_empty()) {
            return vec![Vec::new()];
        }
        sets.sort_by_key(|c| c.len());
        let mut kept: Vec<BTreeSet<GroundLit>> = Vec::new();
        for c in sets {
            if !kept.iter().any(|k| k.is_subset(&c)) {
                kept.push(c);
            }
        }
        kept.into_iter().map(|c| c.into_iter().collect()).collect()
    }

    /// Conjunctive normal form as a formula: a constant, a literal, a clause or a
    /// conjunction of clauses.
    pub fn cnf(&self) -> GroundFormula {
        let clauses = self.clauses();
        if clauses.is_empty() {
            return GroundFormula::TrueFalse(1.0);
        }
        if clauses[0].is_empty() {
            return GroundFormula::TrueFalse(0.0);
        }
        let mut conj: Vec<GroundFormula> = clauses
            .into_iter()
            .map(|c| {
                let mut lits: Vec<GroundFormula> = c
                    .into_iter()
                    .map(|l| GroundFormula::lit(l.atom, !l.positive))
                    .collect();
                if lits.len() == 1 {
                    lits.remove(0)
                } else {
                    GroundFormula::Or(lits)
                }
            })
            .collect();
        if conj.len() == 1 {
            conj.remove(0)
        } else {
            GroundFormula::And(conj)
        }
    }

    /// Distinct ground atoms of the formula, in ascending index order.
    pub fn atoms(&self) -> Vec<AtomIdx> {
        let mut set = BTreeSet::new();
        self.collect_atoms(&mut set);
        set.into_iter().collect()
    }

    fn collect_atoms(&self, set: &mut BTreeSet<AtomIdx>) {
        match self {
            GroundFormula::Lit { atom, .. } => {
                set.insert(*atom);
            }
            GroundFormula::TrueFalse(_) => {}
            GroundFormula::Not(inner) => inner.collect_atoms(set),
            GroundFormula::And(children) | GroundFormula::Or(children) => {
                for c in children {
                    c.collect_atoms(set);
                }
            }
        }
    }

    /// Renders the formula with atom names from `atoms`.
    pub fn display<'a>(&'a self, atoms: &'a AtomTable) -> GroundFormulaDisplay<'a> {
        GroundFormulaDisplay { formula: self, atoms }
    }
}

fn junction(
    mut rest: Vec<GroundFormula>,
    fuzzy: Option<f64>,
    neutral: f64,
    make: fn(Vec<GroundFormula>) -> GroundFormula,
) -> GroundFormula {
    if let Some(t) = fuzzy {
        if rest.is_empty() {
            return GroundFormula::TrueFalse(t);
        }
        rest.push(GroundFormula::TrueFalse(t));
    }
    match rest.len() {
        0 => GroundFormula::TrueFalse(neutral),
        1 => rest.remove(0),
        _ => make(rest),
    }
}

/// Clause sets of an NNF formula.
fn clause_sets(f: &GroundFormula) -> Vec<BTreeSet<GroundLit>> {
    match f {
        GroundFormula::Lit { atom, negated } => vec![BTreeSet::from([GroundLit::new(*atom, !negated)])],
        GroundFormula::TrueFalse(t) if *t == 0.0 => vec![BTreeSet::new()],
        GroundFormula::TrueFalse(_) => Vec::new(),
        // Not only wraps literals or constants after NNF
        GroundFormula::Not(inner) => clause_sets(&inner.nnf_signed(true)),
        GroundFormula::And(children) => children.iter().flat_map(clause_sets).collect(),
        GroundFormula::Or(children) => {
            let mut acc: Vec<BTreeSet<GroundLit>> = vec![BTreeSet::new()];
            for c in children {
                let sets = clause_sets(c);
                let mut next = Vec::with_capacity(acc.len() * sets.len());
                for a in &acc {
                    for s in &sets {
                        let merged: BTreeSet<GroundLit> = a.union(s).copied().collect();
                        if !is_tautology(&merged) {
                            next.push(merged);
                        }
                    }
                }
                acc = next;
                if acc.is_empty() {
                    break;
                }
            }
            acc
        }
    }
}

fn is_tautology(clause: &BTreeSet<GroundLit>) -> bool {
    clause
        .iter()
        .any(|l| l.positive && clause.contains(&GroundLit::new(l.atom, false)))
}

/// Display adapter returned by [`GroundFormula::display`].
pub struct GroundFormulaDisplay<'a> {
    formula: &'a GroundFormula,
    atoms: &'a AtomTable,
}

impl GroundFormulaDisplay<'_> {
    fn write(&self, f: &mut fmt::Formatter<'_>, formula: &GroundFormula, nested: bool) -> fmt::Result {
        match formula {
            GroundFormula::Lit { atom, negated } => {
                let neg = if *negated { "!" } else { "" };
                match self.atoms.get(*atom) {
                    Some(a) => write!(f, "{}{}", neg, a),
                    None => write!(f, "{}{}", neg, atom),
                }
            }
            GroundFormula::TrueFalse(t) => write!(f, "{}", t),
            GroundFormula::Not(inner) => {
                write!(f, "!(")?;
                self.write(f, inner, false)?;
                write!(f, ")")
            }
            GroundFormula::And(children) | GroundFormula::Or(children) => {
                let op = if matches!(formula, GroundFormula::And(_)) { " ^ " } else { " v " };
                if nested {
                    write!(f, "(")?;
                }
                for (i, c) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, "{}", op)?;
                    }
                    self.write(f, c, true)?;
                }
                if nested {
                    write!(f, ")")?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for GroundFormulaDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write(f, self.formula, false)
    }
}
