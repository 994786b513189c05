//! Evidence-pruned grounding of template formulas.
//!
//! The [`Grounder`] turns weighted template formulas into the ground formulas that
//! matter for inference. A template is first brought into negation normal form; its
//! top-level conjunction or disjunction is split into *constituents*, which are bound
//! one at a time, depth first. After each constituent is grounded, its truth under
//! the evidence is folded into a running *truth pivot*:
//!
//! - conjunction: the minimum of the known truth values,
//! - disjunction: the maximum of the known truth values.
//!
//! Unknown truth values leave the pivot unchanged. A conjunction whose pivot reaches 0
//! is false whatever the remaining constituents are, and a disjunction whose pivot
//! reaches 1 is true; either way the branch is cut. A hard conjunction cut at 0 is
//! fatal. Completed instances are simplified against the evidence; instances that
//! collapse to a constant are dropped, except that a hard instance collapsing to false
//! (or to a fuzzy truth degree) is fatal as well.
//!
//! Constituents are bound in a fixed order: equalities, constants, ground literals
//! with evidence, ground literals of functional predicates, other ground literals,
//! literals of functional or fuzzy predicates, other literals, everything else. The
//! order only affects how early branches are cut.
//!
//! # Example
//!
//! ```
//! use mln_rs::domain::Predicate;
//! use mln_rs::formula::{Formula, Mln};
//! use mln_rs::grounding::Grounder;
//! use mln_rs::model::{Database, GroundModel};
//! use mln_rs::types::Weight;
//!
//! let mut mln = Mln::new();
//! mln.declare_predicate(Predicate::new("smokes", &["person"])).unwrap();
//! mln.declare_predicate(Predicate::new("cancer", &["person"])).unwrap();
//! mln.add_constant("person", "A");
//! mln.add_constant("person", "B");
//! let f = Formula::implies(Formula::lit("smokes", &["x"]), Formula::lit("cancer", &["x"]));
//! mln.add_formula(f, Weight::Soft(1.5)).unwrap();
//!
//! let mut db = Database::new();
//! db.add("smokes(A)", 0.0).unwrap();
//! let model = GroundModel::new(mln, &db).unwrap();
//!
//! // smokes(A) is false, so the grounding for A is already true and pruned
//! let gfs: Vec<_> = Grounder::new(&model, model.mln().formulas())
//!     .iter_groundings()
//!     .collect::<Result<_, _>>()
//!     .unwrap();
//! assert_eq!(gfs.len(), 1);
//! assert_eq!(model.format(&gfs[0].formula), "!smokes(B) v cancer(B)");
//! ```

use std::panic::{catch_unwind, AssertUnwindSafe};

use log::{debug, info};
use rayon::prelude::*;

use crate::error::{MlnError, Result};
use crate::formula::{Assignment, Formula, WeightedFormula};
use crate::ground::GroundFormula;
use crate::model::{advance, GroundModel};
use crate::types::{is_boolean, VarIdx, Weight};

/// Configuration of a grounding pass.
#[derive(Debug, Clone)]
pub struct GroundingConfig {
    /// Size of the worker pool; `None` grounds sequentially on the calling thread.
    pub workers: Option<usize>,
    /// Number of templates handed to a worker at a time.
    pub batch_size: usize,
}

impl Default for GroundingConfig {
    fn default() -> Self {
        Self {
            workers: None,
            batch_size: 20,
        }
    }
}

impl GroundingConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }
}

/// A ground formula with its weight and the index of the template it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct GroundedFormula {
    pub formula: GroundFormula,
    pub weight: Weight,
    pub template: usize,
}

impl GroundedFormula {
    pub fn is_hard(&self) -> bool {
        self.weight.is_hard()
    }
}

/// Grounding context: a read-only view of the model and the templates.
///
/// The context is `Copy` and `Sync`; every worker of a parallel grounding pass gets its
/// own copy and never mutates the model.
#[derive(Debug, Clone, Copy)]
pub struct Grounder<'a> {
    model: &'a GroundModel,
    formulas: &'a [WeightedFormula],
}

impl<'a> Grounder<'a> {
    pub fn new(model: &'a GroundModel, formulas: &'a [WeightedFormula]) -> Self {
        Self { model, formulas }
    }

    pub fn model(&self) -> &'a GroundModel {
        self.model
    }

    pub fn formulas(&self) -> &'a [WeightedFormula] {
        self.formulas
    }

    /// Template indices, hard templates first.
    fn template_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.formulas.len()).collect();
        order.sort_by_key(|&i| !self.formulas[i].is_hard());
        order
    }

    /// Lazily grounds a single template.
    pub fn iter_template(&self, template: usize) -> Result<Groundings<'a>> {
        Groundings::new(self.model, template, &self.formulas[template], Mode::Inference)
    }

    /// Lazily grounds every template, hard templates first.
    ///
    /// The sequence ends after the first error.
    pub fn iter_groundings(&self) -> impl Iterator<Item = Result<GroundedFormula>> + 'a {
        let this = *self;
        let mut failed = false;
        this.template_order()
            .into_iter()
            .flat_map(move |t| -> Box<dyn Iterator<Item = Result<GroundedFormula>> + 'a> {
                match this.iter_template(t) {
                    Ok(iter) => Box::new(iter),
                    Err(e) => Box::new(std::iter::once(Err(e))),
                }
            })
            .take_while(move |r| {
                let keep = !failed;
                failed |= r.is_err();
                keep
            })
    }

    fn ground_batch(&self, batch: &[usize]) -> Result<Vec<GroundedFormula>> {
        let mut out = Vec::new();
        for &t in batch {
            for gf in self.iter_template(t)? {
                out.push(gf?);
            }
        }
        debug!("ground_batch: {} templates -> {} ground formulas", batch.len(), out.len());
        Ok(out)
    }

    /// Grounds every template, in parallel if `config.workers` is set.
    pub fn ground_all(&self, config: &GroundingConfig) -> Result<Vec<GroundedFormula>> {
        let order = self.template_order();
        let gfs = run_batches(config, &order, |batch| self.ground_batch(batch))?;
        info!("Grounding produced {} ground formulas", gfs.len());
        Ok(gfs)
    }
}

/// Maps `work` over batches of `templates`, on a worker pool if `config.workers` is set,
/// and concatenates the results in template order.
///
/// There is no partial result: the first failing batch fails the whole pass, and a
/// panicking worker is reported as [`MlnError::WorkerFailure`] after the pool has shut
/// down.
pub(crate) fn run_batches<T, F>(config: &GroundingConfig, templates: &[usize], work: F) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(&[usize]) -> Result<Vec<T>> + Sync,
{
    let batches: Vec<&[usize]> = templates.chunks(config.batch_size.max(1)).collect();

    let result = match config.workers {
        None => batches.iter().map(|&b| work(b)).collect::<Result<Vec<_>>>(),
        Some(workers) => {
            info!(
                "Parallel grounding: {} templates in {} batches on {} workers",
                templates.len(),
                batches.len(),
                workers
            );
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .build()
                .map_err(|e| MlnError::WorkerFailure(format!("failed to create thread pool: {}", e)))?;
            let run = catch_unwind(AssertUnwindSafe(|| {
                pool.install(|| batches.par_iter().map(|&b| work(b)).collect::<Result<Vec<_>>>())
            }));
            match run {
                Ok(result) => result,
                Err(payload) => {
                    let msg = payload
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| payload.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "worker panicked".to_string());
                    Err(MlnError::WorkerFailure(msg))
                }
            }
        }
    };

    Ok(result?.into_iter().flatten().collect())
}

/// Grounds the theory of `model` for sampling: templates with negative weight are
/// replaced by their negation with the absolute weight first.
pub fn ground_theory(model: &GroundModel, config: &GroundingConfig) -> Result<Vec<GroundedFormula>> {
    let formulas: Vec<WeightedFormula> = model
        .mln()
        .formulas()
        .iter()
        .map(|f| f.with_positive_weight())
        .collect();
    Grounder::new(model, &formulas).ground_all(config)
}

/// How constituent truth values combine.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Junction {
    And,
    Or,
    /// The formula is a single literal.
    Single,
}

impl Junction {
    fn combine(self, pivot: Option<f64>, truth: Option<f64>) -> Option<f64> {
        match (pivot, truth) {
            (p, None) => p,
            (None, t) => t,
            (Some(p), Some(t)) => Some(match self {
                Junction::And => p.min(t),
                Junction::Or => p.max(t),
                Junction::Single => t,
            }),
        }
    }
}

/// What the traversal keeps.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Mode {
    /// Cut every branch the evidence decides.
    Inference,
    /// Keep every instance that some single-variable change could make true. Only
    /// conjunctions are cut: once two false constituents share no variable, no single
    /// change can make the instance true.
    Statistics,
}

/// A completed binding of every template variable.
#[derive(Debug, Clone)]
pub(crate) struct Leaf {
    pub(crate) assignment: Assignment,
    /// In a conjunction with a constituent false in the evidence: the variables
    /// shared by every false constituent. Only these can make the instance true.
    pub(crate) falsevars: Option<Vec<VarIdx>>,
}

/// Frame on the binding stack: enumerates bindings of the variables a constituent
/// introduces, on top of the bindings made by the constituents before it.
#[derive(Debug)]
struct Frame {
    depth: usize,
    base: Assignment,
    pivot: Option<f64>,
    falsevars: Option<Vec<VarIdx>>,
    counters: Vec<usize>,
    exhausted: bool,
}

/// An iterator over the ground instances of one template.
///
/// Created by [`Grounder::iter_template()`]. Fuses after the first error.
pub struct Groundings<'a> {
    model: &'a GroundModel,
    template: usize,
    weight: Weight,
    formula: Formula,
    junction: Junction,
    constituents: Vec<Formula>,
    /// Variables first bound by each constituent, with their domains.
    bindings: Vec<Vec<(String, &'a [String])>>,
    mode: Mode,
    stack: Vec<Frame>,
    finished: bool,
}

impl<'a> Groundings<'a> {
    pub(crate) fn new(model: &'a GroundModel, template: usize, wf: &WeightedFormula, mode: Mode) -> Result<Self> {
        let formula = wf.formula.nnf();
        let var_domains = formula.var_domains(model.mln())?;
        let junction = match &formula {
            Formula::And(children) | Formula::Or(children) if children.is_empty() => Junction::Single,
            Formula::And(_) => Junction::And,
            Formula::Or(_) => Junction::Or,
            _ => Junction::Single,
        };

        // an empty junction is a constant and grounds as a whole
        let constituents = match junction {
            Junction::Single => std::slice::from_ref(&formula),
            _ => formula.constituents(),
        };
        let mut ranked: Vec<(u8, Formula)> = constituents
            .iter()
            .map(|c| (rank(model, c), c.clone()))
            .collect();
        ranked.sort_by_key(|(r, _)| *r);
        let constituents: Vec<Formula> = ranked.into_iter().map(|(_, c)| c).collect();

        let mut bound: Vec<String> = Vec::new();
        let mut bindings = Vec::with_capacity(constituents.len());
        for c in &constituents {
            let mut vars = Vec::new();
            for v in c.free_vars() {
                if bound.contains(&v) {
                    continue;
                }
                let dom = var_domains.get(&v).ok_or_else(|| MlnError::UnboundVariable {
                    variable: v.clone(),
                    formula: formula.to_string(),
                })?;
                let constants = model.mln().domains().constants(dom)?;
                bound.push(v.clone());
                vars.push((v, constants));
            }
            bindings.push(vars);
        }

        debug!(
            "Grounding template {}: {} ({} constituents, {:?})",
            template,
            formula,
            constituents.len(),
            junction
        );

        let first = Frame::new(0, Assignment::new(), None, None, &bindings[0]);
        Ok(Self {
            model,
            template,
            weight: wf.weight,
            formula,
            junction,
            constituents,
            bindings,
            mode,
            stack: vec![first],
            finished: false,
        })
    }

    fn describe(&self, assignment: &Assignment) -> String {
        let mut pairs: Vec<String> = assignment.iter().map(|(v, c)| format!("{}={}", v, c)).collect();
        pairs.sort();
        if pairs.is_empty() {
            self.formula.to_string()
        } else {
            format!("{} with {}", self.formula, pairs.join(", "))
        }
    }

    pub(crate) fn unsatisfiable(&self, assignment: &Assignment) -> MlnError {
        MlnError::UnsatisfiableEvidence {
            formula: self.describe(assignment),
        }
    }

    /// Decides whether the branch with truth pivot `pivot` is cut.
    fn cut(&self, pivot: Option<f64>, assignment: &Assignment) -> Result<bool> {
        if pivot == Some(0.0) && self.junction != Junction::Or {
            if self.weight.is_hard() {
                return Err(self.unsatisfiable(assignment));
            }
            return Ok(self.mode == Mode::Inference);
        }
        Ok(self.mode == Mode::Inference && pivot == Some(1.0) && self.junction != Junction::And)
    }

    /// Narrows the candidate variables of a conjunction by a false constituent.
    fn narrow(&self, falsevars: Option<Vec<VarIdx>>, constituent: &GroundFormula) -> Vec<VarIdx> {
        let mut vars: Vec<VarIdx> = constituent
            .atoms()
            .into_iter()
            .map(|a| self.model.variable(a).idx())
            .collect();
        vars.sort_unstable();
        vars.dedup();
        match falsevars {
            None => vars,
            Some(prev) => prev.into_iter().filter(|v| vars.binary_search(v).is_ok()).collect(),
        }
    }

    /// The template instance under `assignment`, without simplification.
    pub(crate) fn instance(&self, assignment: &Assignment) -> Result<GroundFormula> {
        self.formula.ground(self.model, assignment)
    }

    /// Grounds the complete instance and simplifies it against the evidence.
    fn complete(&self, assignment: &Assignment) -> Result<Option<GroundedFormula>> {
        let evidence = self.model.evidence();
        let gf = self.formula.ground(self.model, assignment)?.simplify(evidence);
        if let Some(truth) = gf.constant() {
            if self.weight.is_hard() {
                if truth == 0.0 {
                    return Err(self.unsatisfiable(assignment));
                }
                if !is_boolean(truth) {
                    return Err(MlnError::InvalidHardConstraint {
                        formula: self.describe(assignment),
                        truth,
                    });
                }
            }
            return Ok(None);
        }
        if gf.has_fuzzy_constant() {
            if self.weight.is_hard() {
                return Err(MlnError::InvalidHardConstraint {
                    formula: self.describe(assignment),
                    truth: gf.min_truth(evidence),
                });
            }
        } else {
            // tautologies and contradictions only show up in clausal form
            let clauses = gf.clauses();
            if clauses.is_empty() {
                return Ok(None);
            }
            if clauses.iter().any(|c| c.is_empty()) {
                if self.weight.is_hard() {
                    return Err(self.unsatisfiable(assignment));
                }
                return Ok(None);
            }
        }
        Ok(Some(GroundedFormula {
            formula: gf,
            weight: self.weight,
            template: self.template,
        }))
    }

    fn step(&mut self) -> Result<Option<GroundedFormula>> {
        while let Some(leaf) = self.next_leaf()? {
            if let Some(gf) = self.complete(&leaf.assignment)? {
                return Ok(Some(gf));
            }
        }
        Ok(None)
    }

    /// Advances the binding stack to the next binding that survives the cuts.
    pub(crate) fn next_leaf(&mut self) -> Result<Option<Leaf>> {
        loop {
            let Some(frame) = self.stack.last_mut() else {
                return Ok(None);
            };
            if frame.exhausted {
                self.stack.pop();
                continue;
            }

            let vars = &self.bindings[frame.depth];
            let mut assignment = frame.base.clone();
            for ((v, dom), &i) in vars.iter().zip(&frame.counters) {
                assignment.insert(v.clone(), dom[i].clone());
            }
            frame.exhausted = !advance(&mut frame.counters, |i| vars[i].1.len());
            let depth = frame.depth;
            let pivot = frame.pivot;
            let mut falsevars = frame.falsevars.clone();

            let ground = self.constituents[depth].ground(self.model, &assignment)?;
            let truth = ground.truth(self.model.evidence());
            let pivot = self.junction.combine(pivot, truth);
            if self.cut(pivot, &assignment)? {
                continue;
            }
            if self.mode == Mode::Statistics && self.junction == Junction::And && truth == Some(0.0) {
                let narrowed = self.narrow(falsevars, &ground);
                if narrowed.is_empty() {
                    continue;
                }
                falsevars = Some(narrowed);
            }

            if depth + 1 == self.constituents.len() {
                return Ok(Some(Leaf { assignment, falsevars }));
            }
            let next = Frame::new(depth + 1, assignment, pivot, falsevars, &self.bindings[depth + 1]);
            self.stack.push(next);
        }
    }
}

impl Frame {
    fn new(
        depth: usize,
        base: Assignment,
        pivot: Option<f64>,
        falsevars: Option<Vec<VarIdx>>,
        vars: &[(String, &[String])],
    ) -> Self {
        Self {
            depth,
            base,
            pivot,
            falsevars,
            counters: vec![0; vars.len()],
            exhausted: vars.iter().any(|(_, dom)| dom.is_empty()),
        }
    }
}

impl Iterator for Groundings<'_> {
    type Item = Result<GroundedFormula>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.step() {
            Ok(Some(gf)) => Some(Ok(gf)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

/// Binding-order rank of a constituent (lower binds first).
fn rank(model: &GroundModel, c: &Formula) -> u8 {
    match c {
        Formula::Equality { .. } => 0,
        Formula::TrueFalse(_) => 1,
        Formula::Lit { predicate, args, .. } => {
            let functional = model
                .mln()
                .predicate(predicate)
                .map(|p| (p.is_functional(), p.is_fuzzy()))
                .unwrap_or((false, false));
            if args.iter().all(|a| !a.is_var()) {
                let evidence = c
                    .ground(model, &Assignment::new())
                    .ok()
                    .and_then(|g| g.truth(model.evidence()));
                if evidence.is_some() {
                    2
                } else if functional.0 {
                    3
                } else {
                    4
                }
            } else if functional.0 || functional.1 {
                5
            } else {
                6
            }
        }
        _ => 7,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Predicate;
    use crate::formula::Mln;
    use crate::model::Database;
    use test_log::test;

    fn smokers_mln() -> Mln {
        let mut mln = Mln::new();
        mln.declare_predicate(Predicate::new("smokes", &["person"])).unwrap();
        mln.declare_predicate(Predicate::new("cancer", &["person"])).unwrap();
        mln.declare_predicate(Predicate::new("friends", &["person", "person"]))
            .unwrap();
        for p in ["A", "B", "C"] {
            mln.add_constant("person", p);
        }
        mln
    }

    fn ground(model: &GroundModel) -> Result<Vec<GroundedFormula>> {
        Grounder::new(model, model.mln().formulas()).iter_groundings().collect()
    }

    #[test]
    fn test_conjunction_pruned_by_evidence() {
        let mut mln = smokers_mln();
        // friends(x,y) ^ smokes(x)
        let f = Formula::and(vec![Formula::lit("friends", &["x", "y"]), Formula::lit("smokes", &["x"])]);
        mln.add_formula(f, 1.0).unwrap();
        let mut db = Database::new();
        db.add("smokes(A)", 0.0).unwrap();
        let model = GroundModel::new(mln, &db).unwrap();

        let gfs = ground(&model).unwrap();
        // x = A is cut; x in {B, C} with three choices of y remain
        assert_eq!(gfs.len(), 6);
        let smokes_a = model.gndatom("smokes(A)").unwrap();
        for gf in &gfs {
            assert!(!gf.formula.atoms().contains(&smokes_a));
            assert!(!gf.formula.is_constant());
            assert_eq!(gf.template, 0);
        }
    }

    #[test]
    fn test_disjunction_pruned_by_evidence() {
        let mut mln = smokers_mln();
        let f = Formula::or(vec![Formula::lit("smokes", &["x"]), Formula::lit("cancer", &["x"])]);
        mln.add_formula(f, 1.0).unwrap();
        let mut db = Database::new();
        db.add("smokes(A)", 1.0).unwrap();
        db.add("cancer(B)", 1.0).unwrap();
        let model = GroundModel::new(mln, &db).unwrap();

        let gfs = ground(&model).unwrap();
        assert_eq!(gfs.len(), 1);
        assert_eq!(model.format(&gfs[0].formula), "smokes(C) v cancer(C)");
    }

    #[test]
    fn test_equality_filters_bindings() {
        let mut mln = smokers_mln();
        // x =/= y ^ friends(x,y)
        let f = Formula::and(vec![Formula::lit("friends", &["x", "y"]), Formula::neq("x", "y")]);
        mln.add_formula(f, 0.5).unwrap();
        let model = GroundModel::from_mln(mln).unwrap();

        let gfs = ground(&model).unwrap();
        assert_eq!(gfs.len(), 6);
        for gf in &gfs {
            let atom = model.atom(gf.formula.atoms()[0]);
            assert_ne!(atom.args()[0], atom.args()[1]);
        }
    }

    #[test]
    fn test_equality_binds_first() {
        let mut mln = smokers_mln();
        let f = Formula::and(vec![Formula::lit("friends", &["x", "y"]), Formula::eq("x", "y")]);
        mln.add_formula(f, 1.0).unwrap();
        let model = GroundModel::from_mln(mln).unwrap();
        let iter = Grounder::new(&model, model.mln().formulas()).iter_template(0).unwrap();
        assert!(matches!(iter.constituents[0], Formula::Equality { .. }));
        assert_eq!(iter.count(), 3);
    }

    #[test]
    fn test_tautology_yields_nothing() {
        let mut mln = smokers_mln();
        let f = Formula::implies(Formula::lit("smokes", &["x"]), Formula::lit("smokes", &["x"]));
        mln.add_formula(f, Weight::Hard).unwrap();
        let mut db = Database::new();
        db.add("smokes(A)", 0.0).unwrap();
        let model = GroundModel::new(mln, &db).unwrap();
        assert!(ground(&model).unwrap().is_empty());
    }

    #[test]
    fn test_hard_conjunction_unsatisfiable() {
        let mut mln = smokers_mln();
        let f = Formula::and(vec![Formula::lit("smokes", &["x"]), Formula::lit("cancer", &["x"])]);
        mln.add_formula(f, Weight::Hard).unwrap();
        let mut db = Database::new();
        db.add("cancer(B)", 0.0).unwrap();
        let model = GroundModel::new(mln, &db).unwrap();

        let result = ground(&model);
        assert!(matches!(result, Err(MlnError::UnsatisfiableEvidence { .. })));
    }

    #[test]
    fn test_hard_fuzzy_is_invalid() {
        let mut mln = smokers_mln();
        mln.declare_predicate(Predicate::fuzzy("tall", &["person"])).unwrap();
        mln.add_formula(Formula::lit("tall", &["x"]), Weight::Hard).unwrap();
        let mut db = Database::new();
        for (p, t) in [("A", 1.0), ("B", 0.7), ("C", 1.0)] {
            db.add(&format!("tall({})", p), t).unwrap();
        }
        let model = GroundModel::new(mln, &db).unwrap();
        let result = ground(&model);
        assert!(matches!(result, Err(MlnError::InvalidHardConstraint { truth, .. }) if truth == 0.7));
    }

    #[test]
    fn test_iterator_fuses_after_error() {
        let mut mln = smokers_mln();
        mln.add_formula(Formula::lit("smokes", &["x"]), Weight::Hard).unwrap();
        mln.add_formula(Formula::lit("cancer", &["x"]), 1.0).unwrap();
        let mut db = Database::new();
        db.add("smokes(A)", 0.0).unwrap();
        let model = GroundModel::new(mln, &db).unwrap();
        let items: Vec<_> = Grounder::new(&model, model.mln().formulas()).iter_groundings().collect();
        assert_eq!(items.len(), 1);
        assert!(items[0].is_err());
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mut mln = smokers_mln();
        for _ in 0..5 {
            let f = Formula::implies(
                Formula::and(vec![Formula::lit("friends", &["x", "y"]), Formula::lit("smokes", &["x"])]),
                Formula::lit("smokes", &["y"]),
            );
            mln.add_formula(f, 1.1).unwrap();
            mln.add_formula(
                Formula::implies(Formula::lit("smokes", &["x"]), Formula::lit("cancer", &["x"])),
                Weight::Hard,
            )
            .unwrap();
        }
        let mut db = Database::new();
        db.add("friends(A,B)", 1.0).unwrap();
        db.add("smokes(C)", 0.0).unwrap();
        let model = GroundModel::new(mln, &db).unwrap();
        let grounder = Grounder::new(&model, model.mln().formulas());

        let sequential = grounder.ground_all(&GroundingConfig::default()).unwrap();
        let parallel = grounder
            .ground_all(&GroundingConfig::default().with_workers(3).with_batch_size(2))
            .unwrap();
        assert_eq!(sequential, parallel);
        assert!(sequential.iter().take(10).all(|gf| gf.is_hard()));
    }

    #[test]
    fn test_parallel_failure_is_total() {
        let mut mln = smokers_mln();
        for _ in 0..4 {
            mln.add_formula(Formula::lit("cancer", &["x"]), 1.0).unwrap();
        }
        mln.add_formula(Formula::lit("smokes", &["x"]), Weight::Hard).unwrap();
        let mut db = Database::new();
        db.add("smokes(B)", 0.0).unwrap();
        let model = GroundModel::new(mln, &db).unwrap();
        let grounder = Grounder::new(&model, model.mln().formulas());
        let result = grounder.ground_all(&GroundingConfig::default().with_workers(2).with_batch_size(1));
        assert!(matches!(result, Err(MlnError::UnsatisfiableEvidence { .. })));
    }

    #[test]
    fn test_statistics_cut() {
        let mut mln = Mln::new();
        mln.declare_predicate(Predicate::new("p", &["obj"])).unwrap();
        mln.declare_predicate(Predicate::new("q", &["obj"])).unwrap();
        mln.add_constant("obj", "A");
        mln.add_constant("obj", "B");
        let f = Formula::and(vec![Formula::lit("p", &["x"]), Formula::lit("q", &["y"])]);
        mln.add_formula(f, 1.0).unwrap();
        let mut db = Database::new();
        db.add("p(A)", 0.0).unwrap();
        db.add("p(B)", 1.0).unwrap();
        db.add("q(A)", 1.0).unwrap();
        db.add("q(B)", 0.0).unwrap();
        let model = GroundModel::new(mln, &db).unwrap();
        let var = |name: &str| model.variable(model.gndatom(name).unwrap()).idx();

        let mut groundings = Groundings::new(&model, 0, &model.mln().formulas()[0], Mode::Statistics).unwrap();
        let mut leaves = Vec::new();
        while let Some(leaf) = groundings.next_leaf().unwrap() {
            leaves.push((leaf.assignment["x"].clone(), leaf.assignment["y"].clone(), leaf.falsevars));
        }
        // x = A, y = B has two false constituents over different variables
        let expected = vec![
            ("A".to_string(), "A".to_string(), Some(vec![var("p(A)")])),
            ("B".to_string(), "A".to_string(), None),
            ("B".to_string(), "B".to_string(), Some(vec![var("q(B)")])),
        ];
        assert_eq!(leaves, expected);

        // every instance is decided by the evidence
        assert!(ground(&model).unwrap().is_empty());
    }
}

