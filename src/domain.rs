//! Domains of constants and predicate declarations.
//!
//! A domain is a named collection of constant symbols. Domains only grow during model
//! setup (evidence loading, formula-constant discovery) and are frozen once a
//! [`GroundModel`][crate::model::GroundModel] has been built from them.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{MlnError, Result};

/// Named domains of constants.
///
/// Each domain keeps its constants in insertion order without duplicates, so the
/// ground atoms materialized from it get a deterministic numbering.
#[derive(Debug, Clone, Default)]
pub struct Domains {
    map: BTreeMap<String, Vec<String>>,
}

impl Domains {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares an (initially empty) domain. Declaring an existing domain is a no-op.
    pub fn add_domain(&mut self, name: &str) {
        self.map.entry(name.to_string()).or_default();
    }

    /// Adds a constant to a domain, creating the domain if needed.
    ///
    /// Returns `true` if the constant was not present before.
    pub fn add_constant(&mut self, domain: &str, constant: &str) -> bool {
        let constants = self.map.entry(domain.to_string()).or_default();
        if constants.iter().any(|c| c == constant) {
            false
        } else {
            constants.push(constant.to_string());
            true
        }
    }

    /// Returns the constants of a domain.
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.map.get(name).map(|v| v.as_slice())
    }

    /// Like [`get`][Self::get], but fails for an undeclared domain.
    pub fn constants(&self, name: &str) -> Result<&[String]> {
        self.get(name).ok_or_else(|| MlnError::UnknownDomain(name.to_string()))
    }

    pub fn contains(&self, domain: &str, constant: &str) -> bool {
        self.get(domain).is_some_and(|cs| cs.iter().any(|c| c == constant))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// How the ground atoms of a predicate are grouped into variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredicateKind {
    /// Every ground atom is its own binary variable.
    Plain,
    /// For each binding of the remaining arguments, exactly one binding of the
    /// `mutex_args` positions is true.
    Functional { mutex_args: Vec<usize> },
    /// Like [`Functional`][PredicateKind::Functional], but at most one is true.
    SoftFunctional { mutex_args: Vec<usize> },
    /// Ground atoms take continuous truth values in `[0, 1]`.
    Fuzzy,
}

/// A predicate declaration: name, argument domains and grouping kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    name: String,
    domains: Vec<String>,
    kind: PredicateKind,
}

impl Predicate {
    /// Declares a plain predicate, e.g. `Predicate::new("smokes", &["person"])`.
    pub fn new(name: &str, domains: &[&str]) -> Self {
        Self::with_kind(name, domains, PredicateKind::Plain)
    }

    /// Declares a functional predicate whose `mutex_args` columns form a one-hot block.
    pub fn functional(name: &str, domains: &[&str], mutex_args: &[usize]) -> Self {
        Self::with_kind(
            name,
            domains,
            PredicateKind::Functional {
                mutex_args: mutex_args.to_vec(),
            },
        )
    }

    /// Declares a soft-functional predicate (one-hot-or-none block).
    pub fn soft_functional(name: &str, domains: &[&str], mutex_args: &[usize]) -> Self {
        Self::with_kind(
            name,
            domains,
            PredicateKind::SoftFunctional {
                mutex_args: mutex_args.to_vec(),
            },
        )
    }

    pub fn fuzzy(name: &str, domains: &[&str]) -> Self {
        Self::with_kind(name, domains, PredicateKind::Fuzzy)
    }

    pub fn with_kind(name: &str, domains: &[&str], kind: PredicateKind) -> Self {
        Self {
            name: name.to_string(),
            domains: domains.iter().map(|d| d.to_string()).collect(),
            kind,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the argument domain names.
    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    pub fn arity(&self) -> usize {
        self.domains.len()
    }

    pub fn kind(&self) -> &PredicateKind {
        &self.kind
    }

    /// Returns `true` for (soft-)functional predicates.
    pub fn is_functional(&self) -> bool {
        matches!(
            self.kind,
            PredicateKind::Functional { .. } | PredicateKind::SoftFunctional { .. }
        )
    }

    pub fn is_fuzzy(&self) -> bool {
        self.kind == PredicateKind::Fuzzy
    }

    fn mutex_args(&self) -> &[usize] {
        match &self.kind {
            PredicateKind::Functional { mutex_args } | PredicateKind::SoftFunctional { mutex_args } => {
                mutex_args
            }
            _ => &[],
        }
    }

    /// Name of the variable owning the ground atom `self(args)`.
    ///
    /// Mutex columns are replaced by `_`, so all members of a block share one name:
    /// `color(X,red)` and `color(X,blue)` both belong to `color(X,_)`.
    pub fn variable_name(&self, args: &[String]) -> String {
        let mutex = self.mutex_args();
        let args: Vec<&str> = args
            .iter()
            .enumerate()
            .map(|(i, a)| if mutex.contains(&i) { "_" } else { a.as_str() })
            .collect();
        format!("{}({})", self.name, args.join(","))
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mutex = self.mutex_args();
        let args: Vec<String> = self
            .domains
            .iter()
            .enumerate()
            .map(|(i, d)| if mutex.contains(&i) { format!("{}!", d) } else { d.clone() })
            .collect();
        write!(f, "{}({})", self.name, args.join(","))
    }
}
