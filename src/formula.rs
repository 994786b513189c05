//! First-order template formulas and the weighted theory that holds them.
//!
//! Templates are built from already-parsed structure: literals over predicates with
//! variable or constant arguments, equalities, boolean constants, negation,
//! conjunction, disjunction, implication and bi-implication. By convention a term
//! starting with a lowercase letter is a variable (`x`, `person`), anything else is a
//! constant (`Anna`, `42`).
//!
//! # Example
//!
//! ```
//! use mln_rs::formula::{Formula, Mln};
//! use mln_rs::domain::Predicate;
//! use mln_rs::types::Weight;
//!
//! let mut mln = Mln::new();
//! mln.declare_predicate(Predicate::new("smokes", &["person"])).unwrap();
//! mln.declare_predicate(Predicate::new("cancer", &["person"])).unwrap();
//!
//! // smokes(x) => cancer(x)
//! let f = Formula::implies(Formula::lit("smokes", &["x"]), Formula::lit("cancer", &["x"]));
//! mln.add_formula(f, Weight::Soft(1.5)).unwrap();
//! assert_eq!(mln.formulas()[0].to_string(), "1.5 smokes(x) => cancer(x)");
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use crate::atom::GroundAtom;
use crate::domain::{Domains, Predicate};
use crate::error::{MlnError, Result};
use crate::ground::GroundFormula;
use crate::model::GroundModel;
use crate::types::Weight;

/// A binding of free variables to constants.
pub type Assignment = HashMap<String, String>;

/// A term: a free variable or a constant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    Var(String),
    Const(String),
}

impl Term {
    /// Resolves the term under `assignment`, returning `None` for an unbound variable.
    pub fn resolve<'a>(&'a self, assignment: &'a Assignment) -> Option<&'a str> {
        match self {
            Term::Var(v) => assignment.get(v).map(|c| c.as_str()),
            Term::Const(c) => Some(c),
        }
    }

    pub fn is_var(&self) -> bool {
        matches!(self, Term::Var(_))
    }
}

impl From<&str> for Term {
    fn from(s: &str) -> Self {
        if s.starts_with(|c: char| c.is_lowercase()) {
            Term::Var(s.to_string())
        } else {
            Term::Const(s.to_string())
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Var(v) => write!(f, "{}", v),
            Term::Const(c) => write!(f, "{}", c),
        }
    }
}

/// A template formula.
#[derive(Debug, Clone, PartialEq)]
pub enum Formula {
    Lit {
        negated: bool,
        predicate: String,
        args: Vec<Term>,
    },
    Equality {
        negated: bool,
        lhs: Term,
        rhs: Term,
    },
    /// Boolean (or fuzzy) constant.
    TrueFalse(f64),
    Not(Box<Formula>),
    And(Vec<Formula>),
    Or(Vec<Formula>),
    Implies(Box<Formula>, Box<Formula>),
    Iff(Box<Formula>, Box<Formula>),
}

impl Formula {
    /// Positive literal, e.g. `Formula::lit("friends", &["x", "Bob"])`.
    pub fn lit(predicate: &str, args: &[&str]) -> Self {
        Formula::Lit {
            negated: false,
            predicate: predicate.to_string(),
            args: args.iter().map(|&a| Term::from(a)).collect(),
        }
    }

    /// Negated literal.
    pub fn neg_lit(predicate: &str, args: &[&str]) -> Self {
        Formula::not(Self::lit(predicate, args))
    }

    pub fn eq(lhs: &str, rhs: &str) -> Self {
        Formula::Equality {
            negated: false,
            lhs: Term::from(lhs),
            rhs: Term::from(rhs),
        }
    }

    pub fn neq(lhs: &str, rhs: &str) -> Self {
        Formula::not(Self::eq(lhs, rhs))
    }

    pub fn constant(truth: f64) -> Self {
        Formula::TrueFalse(truth)
    }

    /// Negation. Literals, equalities and constants absorb the negation,
    /// and double negations collapse.
    pub fn not(f: Formula) -> Self {
        match f {
            Formula::Lit {
                negated,
                predicate,
                args,
            } => Formula::Lit {
                negated: !negated,
                predicate,
                args,
            },
            Formula::Equality { negated, lhs, rhs } => Formula::Equality {
                negated: !negated,
                lhs,
                rhs,
            },
            Formula::TrueFalse(t) => Formula::TrueFalse(1.0 - t),
            Formula::Not(inner) => *inner,
            f => Formula::Not(Box::new(f)),
        }
    }

    pub fn and(children: Vec<Formula>) -> Self {
        Formula::And(children)
    }

    pub fn or(children: Vec<Formula>) -> Self {
        Formula::Or(children)
    }

    pub fn implies(lhs: Formula, rhs: Formula) -> Self {
        Formula::Implies(Box::new(lhs), Box::new(rhs))
    }

    pub fn iff(lhs: Formula, rhs: Formula) -> Self {
        Formula::Iff(Box::new(lhs), Box::new(rhs))
    }

    /// Returns `true` for literals, equalities and constants.
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            Formula::Lit { .. } | Formula::Equality { .. } | Formula::TrueFalse(_)
        )
    }

    /// Children of a top-level conjunction or disjunction, or the formula itself.
    pub fn constituents(&self) -> &[Formula] {
        match self {
            Formula::And(children) | Formula::Or(children) => children,
            f => std::slice::from_ref(f),
        }
    }

    /// Negation normal form over `{Lit, Equality, TrueFalse, And, Or}`.
    ///
    /// Implications and bi-implications are eliminated, negations are pushed down to
    /// the literals and nested junctions of the same kind are flattened.
    pub fn nnf(&self) -> Formula {
        self.nnf_signed(false)
    }

    fn nnf_signed(&self, negate: bool) -> Formula {
        match self {
            Formula::Lit { .. } | Formula::Equality { .. } | Formula::TrueFalse(_) => {
                if negate {
                    Formula::not(self.clone())
                } else {
                    self.clone()
                }
            }
            Formula::Not(inner) => inner.nnf_signed(!negate),
            Formula::And(children) => {
                let children = children.iter().map(|c| c.nnf_signed(negate)).collect();
                if negate {
                    flatten_or(children)
                } else {
                    flatten_and(children)
                }
            }
            Formula::Or(children) => {
                let children = children.iter().map(|c| c.nnf_signed(negate)).collect();
                if negate {
                    flatten_and(children)
                } else {
                    flatten_or(children)
                }
            }
            Formula::Implies(lhs, rhs) => {
                let f = Formula::Or(vec![Formula::not((**lhs).clone()), (**rhs).clone()]);
                f.nnf_signed(negate)
            }
            Formula::Iff(lhs, rhs) => {
                let f = Formula::And(vec![
                    Formula::implies((**lhs).clone(), (**rhs).clone()),
                    Formula::implies((**rhs).clone(), (**lhs).clone()),
                ]);
                f.nnf_signed(negate)
            }
        }
    }

    /// Free variables, in order of first occurrence.
    pub fn free_vars(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut vars = Vec::new();
        self.visit_terms(&mut |t| {
            if let Term::Var(v) = t {
                if seen.insert(v.clone()) {
                    vars.push(v.clone());
                }
            }
        });
        vars
    }

    fn visit_terms(&self, f: &mut impl FnMut(&Term)) {
        match self {
            Formula::Lit { args, .. } => args.iter().for_each(&mut *f),
            Formula::Equality { lhs, rhs, .. } => {
                f(lhs);
                f(rhs);
            }
            Formula::TrueFalse(_) => {}
            Formula::Not(inner) => inner.visit_terms(f),
            Formula::And(children) | Formula::Or(children) => {
                for c in children {
                    c.visit_terms(f);
                }
            }
            Formula::Implies(lhs, rhs) | Formula::Iff(lhs, rhs) => {
                lhs.visit_terms(f);
                rhs.visit_terms(f);
            }
        }
    }

    fn visit_lits<'a>(&'a self, f: &mut impl FnMut(&'a str, &'a [Term])) {
        match self {
            Formula::Lit { predicate, args, .. } => f(predicate, args),
            Formula::Equality { .. } | Formula::TrueFalse(_) => {}
            Formula::Not(inner) => inner.visit_lits(f),
            Formula::And(children) | Formula::Or(children) => {
                for c in children {
                    c.visit_lits(f);
                }
            }
            Formula::Implies(lhs, rhs) | Formula::Iff(lhs, rhs) => {
                lhs.visit_lits(f);
                rhs.visit_lits(f);
            }
        }
    }

    /// Maps each free variable to the domain it ranges over.
    ///
    /// The domain of a variable is taken from the first literal argument position it
    /// occurs in. Variables that occur only in equalities have no domain and are
    /// reported as [`MlnError::UnboundVariable`].
    pub fn var_domains(&self, mln: &Mln) -> Result<BTreeMap<String, String>> {
        let mut doms = BTreeMap::new();
        let mut lits = Vec::new();
        self.visit_lits(&mut |p, args| lits.push((p, args)));
        for (pred, args) in lits {
            let predicate = mln.predicate(pred)?;
            check_arity(predicate, args.len())?;
            for (arg, dom) in args.iter().zip(predicate.domains()) {
                if let Term::Var(v) = arg {
                    doms.entry(v.clone()).or_insert_with(|| dom.clone());
                }
            }
        }
        for v in self.free_vars() {
            if !doms.contains_key(&v) {
                return Err(MlnError::UnboundVariable {
                    variable: v,
                    formula: self.to_string(),
                });
            }
        }
        Ok(doms)
    }

    /// Grounds the formula under a full assignment of its free variables.
    ///
    /// Equalities fold into constants. Literals resolve to the ground atoms of `model`,
    /// which must already exist.
    pub fn ground(&self, model: &GroundModel, assignment: &Assignment) -> Result<GroundFormula> {
        Ok(match self {
            Formula::Lit {
                negated,
                predicate,
                args,
            } => {
                let args = args
                    .iter()
                    .map(|a| resolve_term(a, assignment, self).map(|c| c.to_string()))
                    .collect::<Result<Vec<_>>>()?;
                let atom = GroundAtom::new(predicate.clone(), args);
                let idx = model
                    .find_atom(&atom)
                    .ok_or_else(|| MlnError::UnknownAtom(atom.to_string()))?;
                GroundFormula::Lit {
                    atom: idx,
                    negated: *negated,
                }
            }
            Formula::Equality { negated, lhs, rhs } => {
                let same = resolve_term(lhs, assignment, self)? == resolve_term(rhs, assignment, self)?;
                GroundFormula::TrueFalse(if same != *negated { 1.0 } else { 0.0 })
            }
            Formula::TrueFalse(t) => GroundFormula::TrueFalse(*t),
            Formula::Not(inner) => GroundFormula::Not(Box::new(inner.ground(model, assignment)?)),
            Formula::And(children) => GroundFormula::And(
                children
                    .iter()
                    .map(|c| c.ground(model, assignment))
                    .collect::<Result<_>>()?,
            ),
            Formula::Or(children) => GroundFormula::Or(
                children
                    .iter()
                    .map(|c| c.ground(model, assignment))
                    .collect::<Result<_>>()?,
            ),
            Formula::Implies(..) | Formula::Iff(..) => self.nnf().ground(model, assignment)?,
        })
    }
}

fn resolve_term<'a>(term: &'a Term, assignment: &'a Assignment, formula: &Formula) -> Result<&'a str> {
    term.resolve(assignment).ok_or_else(|| MlnError::UnboundVariable {
        variable: term.to_string(),
        formula: formula.to_string(),
    })
}

fn flatten_and(children: Vec<Formula>) -> Formula {
    let mut flat = Vec::with_capacity(children.len());
    for c in children {
        match c {
            Formula::And(inner) => flat.extend(inner),
            c => flat.push(c),
        }
    }
    if flat.len() == 1 {
        flat.remove(0)
    } else {
        Formula::And(flat)
    }
}

fn flatten_or(children: Vec<Formula>) -> Formula {
    let mut flat = Vec::with_capacity(children.len());
    for c in children {
        match c {
            Formula::Or(inner) => flat.extend(inner),
            c => flat.push(c),
        }
    }
    if flat.len() == 1 {
        flat.remove(0)
    } else {
        Formula::Or(flat)
    }
}

fn check_arity(predicate: &Predicate, found: usize) -> Result<()> {
    if predicate.arity() != found {
        return Err(MlnError::ArityMismatch {
            predicate: predicate.name().to_string(),
            expected: predicate.arity(),
            found,
        });
    }
    Ok(())
}

fn fmt_junction(f: &mut fmt::Formatter<'_>, children: &[Formula], op: &str) -> fmt::Result {
    for (i, c) in children.iter().enumerate() {
        if i > 0 {
            write!(f, " {} ", op)?;
        }
        if c.is_literal() || matches!(c, Formula::Not(_)) {
            write!(f, "{}", c)?;
        } else {
            write!(f, "({})", c)?;
        }
    }
    Ok(())
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Formula::Lit {
                negated,
                predicate,
                args,
            } => {
                let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                write!(f, "{}{}({})", if *negated { "!" } else { "" }, predicate, args.join(","))
            }
            Formula::Equality { negated, lhs, rhs } => {
                write!(f, "{}{}{}", lhs, if *negated { "=/=" } else { "=" }, rhs)
            }
            Formula::TrueFalse(t) if *t == 1.0 => write!(f, "True"),
            Formula::TrueFalse(t) if *t == 0.0 => write!(f, "False"),
            Formula::TrueFalse(t) => write!(f, "{}", t),
            Formula::Not(inner) => write!(f, "!({})", inner),
            Formula::And(children) => fmt_junction(f, children, "^"),
            Formula::Or(children) => fmt_junction(f, children, "v"),
            Formula::Implies(lhs, rhs) => write!(f, "{} => {}", lhs, rhs),
            Formula::Iff(lhs, rhs) => write!(f, "{} <=> {}", lhs, rhs),
        }
    }
}

/// A template formula with its weight.
#[derive(Debug, Clone)]
pub struct WeightedFormula {
    pub formula: Formula,
    pub weight: Weight,
}

impl WeightedFormula {
    pub fn new(formula: Formula, weight: Weight) -> Self {
        Self { formula, weight }
    }

    pub fn is_hard(&self) -> bool {
        self.weight.is_hard()
    }

    /// Replaces a negative soft weight by the negated formula with the flipped weight.
    pub fn with_positive_weight(&self) -> WeightedFormula {
        match self.weight {
            Weight::Soft(w) if w < 0.0 => {
                WeightedFormula::new(Formula::not(self.formula.clone()), Weight::Soft(-w))
            }
            _ => self.clone(),
        }
    }
}

impl fmt::Display for WeightedFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.weight {
            Weight::Hard => write!(f, "{}.", self.formula),
            Weight::Soft(w) => write!(f, "{} {}", w, self.formula),
        }
    }
}

/// A Markov logic network: domains, predicate declarations and weighted formulas.
#[derive(Debug, Clone, Default)]
pub struct Mln {
    domains: Domains,
    predicates: Vec<Predicate>,
    by_name: HashMap<String, usize>,
    formulas: Vec<WeightedFormula>,
    closed_world: BTreeSet<String>,
}

impl Mln {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn domains(&self) -> &Domains {
        &self.domains
    }

    pub fn domains_mut(&mut self) -> &mut Domains {
        &mut self.domains
    }

    /// Adds a constant to a domain.
    pub fn add_constant(&mut self, domain: &str, constant: &str) -> bool {
        self.domains.add_constant(domain, constant)
    }

    /// Declares a predicate; its argument domains are declared as well.
    ///
    /// Redeclaring a predicate replaces the previous declaration.
    pub fn declare_predicate(&mut self, predicate: Predicate) -> Result<()> {
        for dom in predicate.domains() {
            self.domains.add_domain(dom);
        }
        match self.by_name.get(predicate.name()) {
            Some(&i) => self.predicates[i] = predicate,
            None => {
                self.by_name.insert(predicate.name().to_string(), self.predicates.len());
                self.predicates.push(predicate);
            }
        }
        Ok(())
    }

    pub fn predicate(&self, name: &str) -> Result<&Predicate> {
        self.by_name
            .get(name)
            .map(|&i| &self.predicates[i])
            .ok_or_else(|| MlnError::UnknownPredicate(name.to_string()))
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Adds a weighted formula, returning its index.
    ///
    /// Constants that occur as literal arguments join the corresponding domains.
    pub fn add_formula(&mut self, formula: Formula, weight: impl Into<Weight>) -> Result<usize> {
        formula.var_domains(self)?;
        let mut constants = Vec::new();
        formula.visit_lits(&mut |p, args| {
            for (i, a) in args.iter().enumerate() {
                if let Term::Const(c) = a {
                    constants.push((p.to_string(), i, c.clone()));
                }
            }
        });
        for (pred, i, c) in constants {
            let dom = self.predicate(&pred)?.domains()[i].clone();
            self.domains.add_constant(&dom, &c);
        }
        self.formulas.push(WeightedFormula::new(formula, weight.into()));
        Ok(self.formulas.len() - 1)
    }

    pub fn formulas(&self) -> &[WeightedFormula] {
        &self.formulas
    }

    /// Marks a predicate as closed-world: its unknown ground atoms default to false.
    pub fn set_closed_world(&mut self, predicate: &str) -> Result<()> {
        self.predicate(predicate)?;
        self.closed_world.insert(predicate.to_string());
        Ok(())
    }

    pub fn closed_world(&self) -> impl Iterator<Item = &str> {
        self.closed_world.iter().map(|s| s.as_str())
    }
}
