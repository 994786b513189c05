//! MC-SAT inference.
//!
//! Each chain starts from a random world that SampleSAT repairs to satisfy every hard
//! clause. A step then selects the clauses of every hard ground formula and of every
//! soft ground formula that is true in the current state with probability
//! `1 - exp(-w)`, and draws the next state with SampleSAT among the worlds satisfying
//! the selection. Marginals are the fraction of steps in which each query was true,
//! averaged over chains.
//!
//! # Example
//!
//! ```
//! use mln_rs::domain::Predicate;
//! use mln_rs::formula::{Formula, Mln};
//! use mln_rs::mcsat::{McSat, McSatConfig};
//! use mln_rs::model::{Database, GroundModel};
//!
//! let mut mln = Mln::new();
//! mln.declare_predicate(Predicate::new("smokes", &["person"])).unwrap();
//! mln.declare_predicate(Predicate::new("cancer", &["person"])).unwrap();
//! mln.add_constant("person", "A");
//! let f = Formula::implies(Formula::lit("smokes", &["x"]), Formula::lit("cancer", &["x"]));
//! mln.add_formula(f, 1.5).unwrap();
//!
//! let mut db = Database::new();
//! db.add("smokes(A)", 1.0).unwrap();
//! let model = GroundModel::new(mln, &db).unwrap();
//!
//! let config = McSatConfig::default().with_max_steps(200).with_seed(42);
//! let result = McSat::new(&model, config).unwrap().run().unwrap();
//! let p = result.get("cancer(A)").unwrap();
//! assert!(p > 0.5);
//! ```

use std::fmt;
use std::ops::Range;

use log::{debug, info};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::{MlnError, Result};
use crate::formula::{Assignment, Formula};
use crate::ground::{Clause, GroundFormula};
use crate::grounding::{ground_theory, GroundedFormula, GroundingConfig};
use crate::model::GroundModel;
use crate::samplesat::{sample_exhaustive, use_exhaustive, SampleSat, DEFAULT_MAX_FLIPS};
use crate::types::World;

/// Steps between two convergence reports.
pub(crate) const REPORT_INTERVAL: usize = 50;

/// Configuration of an MC-SAT run.
#[derive(Debug, Clone)]
pub struct McSatConfig {
    /// Number of independent chains (default: 1)
    pub chains: usize,
    /// Number of sampling steps per chain (default: 500)
    pub max_steps: usize,
    /// Probability of a greedy WalkSAT move in SampleSAT (default: 0.5)
    pub p: f64,
    /// Base seed; drawn at random and logged if unset (default: None)
    pub seed: Option<u64>,
    /// Sample exactly when the model has at most this many worlds; 0 disables (default: 0)
    pub exhaustive_limit: u64,
    /// Move budget per SampleSAT call; `None` is unbounded (default: [`DEFAULT_MAX_FLIPS`])
    pub max_flips: Option<usize>,
    pub grounding: GroundingConfig,
}

impl Default for McSatConfig {
    fn default() -> Self {
        Self {
            chains: 1,
            max_steps: 500,
            p: 0.5,
            seed: None,
            exhaustive_limit: 0,
            max_flips: Some(DEFAULT_MAX_FLIPS),
            grounding: GroundingConfig::default(),
        }
    }
}

impl McSatConfig {
    pub fn with_chains(mut self, chains: usize) -> Self {
        self.chains = chains;
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_p(mut self, p: f64) -> Self {
        self.p = p;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_exhaustive_limit(mut self, limit: u64) -> Self {
        self.exhaustive_limit = limit;
        self
    }

    pub fn with_max_flips(mut self, max_flips: usize) -> Self {
        self.max_flips = Some(max_flips);
        self
    }

    /// Lets SampleSAT search until every selected clause holds.
    pub fn with_unbounded_flips(mut self) -> Self {
        self.max_flips = None;
        self
    }

    pub fn with_grounding(mut self, grounding: GroundingConfig) -> Self {
        self.grounding = grounding;
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_chains(self.chains, self.max_steps)?;
        if !(0.0..=1.0).contains(&self.p) {
            return Err(MlnError::InvalidConfig(format!("p must lie in [0, 1], got {}", self.p)));
        }
        if self.max_flips == Some(0) {
            return Err(MlnError::InvalidConfig("max_flips must be positive".to_string()));
        }
        validate_grounding(&self.grounding)
    }
}

pub(crate) fn validate_chains(chains: usize, max_steps: usize) -> Result<()> {
    if chains == 0 {
        return Err(MlnError::InvalidConfig("at least one chain is required".to_string()));
    }
    if max_steps == 0 {
        return Err(MlnError::InvalidConfig("max_steps must be positive".to_string()));
    }
    Ok(())
}

pub(crate) fn validate_grounding(config: &GroundingConfig) -> Result<()> {
    if config.batch_size == 0 {
        return Err(MlnError::InvalidConfig("batch_size must be positive".to_string()));
    }
    if config.workers == Some(0) {
        return Err(MlnError::InvalidConfig("workers must be positive".to_string()));
    }
    Ok(())
}

/// Estimated marginal of one query.
#[derive(Debug, Clone, PartialEq)]
pub struct Marginal {
    pub query: String,
    pub probability: f64,
    /// Variance of the per-chain estimates around `probability`.
    pub variance: f64,
}

/// Marginals of an inference run, in query order.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceResult {
    marginals: Vec<Marginal>,
    pub chains: usize,
    pub steps: usize,
}

impl InferenceResult {
    pub fn marginals(&self) -> &[Marginal] {
        &self.marginals
    }

    pub fn iter(&self) -> impl Iterator<Item = &Marginal> {
        self.marginals.iter()
    }

    /// Probability of the query named `query`, e.g. `"cancer(A)"`.
    pub fn get(&self, query: &str) -> Option<f64> {
        self.marginals.iter().find(|m| m.query == query).map(|m| m.probability)
    }

    pub fn len(&self) -> usize {
        self.marginals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marginals.is_empty()
    }
}

impl fmt::Display for InferenceResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for m in &self.marginals {
            writeln!(f, "{:>8.4}  {}", m.probability, m.query)?;
        }
        Ok(())
    }
}

/// Query formulas, with their display names.
#[derive(Debug, Clone, Default)]
pub(crate) struct Queries {
    pub(crate) names: Vec<String>,
    pub(crate) formulas: Vec<GroundFormula>,
}

impl Queries {
    /// Every ground atom without evidence.
    pub(crate) fn atoms(model: &GroundModel) -> Self {
        let mut queries = Self::default();
        for atom in model.query_atoms() {
            queries.push(model, GroundFormula::lit(atom, false));
        }
        queries
    }

    pub(crate) fn push(&mut self, model: &GroundModel, formula: GroundFormula) {
        self.names.push(model.format(&formula));
        self.formulas.push(formula);
    }

    /// Grounds a closed template formula as a query.
    pub(crate) fn push_formula(&mut self, model: &GroundModel, formula: &Formula) -> Result<()> {
        let ground = formula.ground(model, &Assignment::new())?;
        self.push(model, ground);
        Ok(())
    }
}

/// Running truth counts of one chain.
#[derive(Debug, Clone)]
pub(crate) struct Tally {
    truths: Vec<f64>,
    steps: usize,
    last: Vec<f64>,
}

impl Tally {
    pub(crate) fn new(queries: usize) -> Self {
        Self {
            truths: vec![0.0; queries],
            steps: 0,
            last: vec![0.0; queries],
        }
    }

    pub(crate) fn record(&mut self, queries: &Queries, state: &[Option<f64>]) {
        self.steps += 1;
        for (t, q) in self.truths.iter_mut().zip(&queries.formulas) {
            *t += q.truth(state).unwrap_or(0.0);
        }
    }

    pub(crate) fn estimates(&self) -> Vec<f64> {
        let steps = self.steps.max(1) as f64;
        self.truths.iter().map(|t| t / steps).collect()
    }

    /// Largest change of any estimate since the previous call.
    pub(crate) fn drift(&mut self) -> f64 {
        let now = self.estimates();
        let drift = now
            .iter()
            .zip(&self.last)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);
        self.last = now;
        drift
    }
}

/// Averages chain estimates; the variance is taken over chains.
pub(crate) fn summarize(queries: &Queries, tallies: &[Tally], steps: usize) -> InferenceResult {
    let n = tallies.len() as f64;
    let estimates: Vec<Vec<f64>> = tallies.iter().map(Tally::estimates).collect();
    let marginals = queries
        .names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let mean = estimates.iter().map(|e| e[i]).sum::<f64>() / n;
            let variance = estimates.iter().map(|e| (e[i] - mean).powi(2)).sum::<f64>() / n;
            Marginal {
                query: name.clone(),
                probability: mean,
                variance,
            }
        })
        .collect();
    InferenceResult {
        marginals,
        chains: tallies.len(),
        steps,
    }
}

/// Chain generators: one ChaCha8 stream per chain off a common seed.
pub(crate) fn chain_rngs(seed: Option<u64>, chains: usize) -> Vec<ChaCha8Rng> {
    let seed = seed.unwrap_or_else(|| rand::rng().random::<u64>());
    info!("Sampling {} chains with seed {}", chains, seed);
    (0..chains)
        .map(|i| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            rng.set_stream(i as u64);
            rng
        })
        .collect()
}

/// Ground formulas in clausal form, with each formula's clause range in the arena.
#[derive(Debug, Clone)]
pub struct Theory {
    formulas: Vec<GroundedFormula>,
    clauses: Vec<Clause>,
    ranges: Vec<Range<usize>>,
}

impl Theory {
    /// Converts ground formulas to clauses, dropping the ones that are constant.
    ///
    /// A hard formula whose clausal form is empty-clause false is unsatisfiable.
    pub fn new(model: &GroundModel, formulas: Vec<GroundedFormula>) -> Result<Self> {
        let mut theory = Self {
            formulas: Vec::with_capacity(formulas.len()),
            clauses: Vec::new(),
            ranges: Vec::with_capacity(formulas.len()),
        };
        for gf in formulas {
            let clauses = gf.formula.clauses();
            if clauses.is_empty() {
                continue;
            }
            if clauses.iter().any(|c| c.is_empty()) {
                if gf.is_hard() {
                    return Err(MlnError::UnsatisfiableEvidence {
                        formula: model.format(&gf.formula),
                    });
                }
                continue;
            }
            let start = theory.clauses.len();
            theory.clauses.extend(clauses);
            theory.ranges.push(start..theory.clauses.len());
            theory.formulas.push(gf);
        }
        Ok(theory)
    }

    pub fn formulas(&self) -> &[GroundedFormula] {
        &self.formulas
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Clause indices of every hard formula.
    pub fn hard_clauses(&self) -> Vec<usize> {
        self.formulas
            .iter()
            .zip(&self.ranges)
            .filter(|(gf, _)| gf.is_hard())
            .flat_map(|(_, r)| r.clone())
            .collect()
    }
}

/// MC-SAT sampler over a ground model.
pub struct McSat<'a> {
    model: &'a GroundModel,
    config: McSatConfig,
    queries: Queries,
}

impl<'a> McSat<'a> {
    /// Creates a sampler whose queries are all ground atoms without evidence.
    pub fn new(model: &'a GroundModel, config: McSatConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            model,
            config,
            queries: Queries::atoms(model),
        })
    }

    /// Replaces the queries by the given closed formulas.
    pub fn with_queries<'f>(mut self, queries: impl IntoIterator<Item = &'f Formula>) -> Result<Self> {
        self.queries = Queries::default();
        for q in queries {
            self.queries.push_formula(self.model, q)?;
        }
        Ok(self)
    }

    pub fn config(&self) -> &McSatConfig {
        &self.config
    }

    /// Draws a state satisfying the clauses `targets`.
    fn sample(&self, theory: &Theory, targets: &[usize], exhaustive: bool, rng: &mut ChaCha8Rng) -> Result<World> {
        if exhaustive {
            return sample_exhaustive(self.model, theory.clauses(), targets, rng);
        }
        let start = self.model.random_world(rng)?;
        SampleSat::new(self.model, theory.clauses(), targets.iter().copied(), start)?
            .with_p(self.config.p)
            .with_max_flips(self.config.max_flips)
            .run(rng)
    }

    /// Selects the clauses to satisfy in the next step.
    fn select(&self, theory: &Theory, state: &[Option<f64>], rng: &mut ChaCha8Rng) -> Result<Vec<usize>> {
        let mut targets = Vec::new();
        for (gf, range) in theory.formulas.iter().zip(&theory.ranges) {
            let truth = gf.formula.truth(state);
            match gf.weight.value() {
                None => {
                    if truth != Some(1.0) {
                        return Err(MlnError::HardConstraintViolation {
                            formula: self.model.format(&gf.formula),
                        });
                    }
                    targets.extend(range.clone());
                }
                Some(w) => {
                    if truth == Some(1.0) && rng.random::<f64>() * w.exp() > 1.0 {
                        targets.extend(range.clone());
                    }
                }
            }
        }
        Ok(targets)
    }

    /// Grounds the model and runs every chain for `max_steps` steps.
    pub fn run(&self) -> Result<InferenceResult> {
        let formulas = ground_theory(self.model, &self.config.grounding)?;
        let theory = Theory::new(self.model, formulas)?;
        info!(
            "MC-SAT: {} ground formulas, {} clauses, {} queries",
            theory.formulas.len(),
            theory.clauses.len(),
            self.queries.formulas.len()
        );
        self.run_theory(&theory)
    }

    /// Runs the chains over an already grounded theory.
    pub fn run_theory(&self, theory: &Theory) -> Result<InferenceResult> {
        let exhaustive = use_exhaustive(self.model, self.config.exhaustive_limit)?;
        if exhaustive {
            debug!("MC-SAT: sampling by world enumeration");
        }

        let hard = theory.hard_clauses();
        let mut rngs = chain_rngs(self.config.seed, self.config.chains);
        let mut states = Vec::with_capacity(rngs.len());
        for rng in rngs.iter_mut() {
            let state = if hard.is_empty() {
                self.model.random_world(rng)?
            } else {
                self.sample(theory, &hard, exhaustive, rng)?
            };
            states.push(state);
        }

        let mut tallies = vec![Tally::new(self.queries.formulas.len()); states.len()];
        for step in 1..=self.config.max_steps {
            for ((state, rng), tally) in states.iter_mut().zip(rngs.iter_mut()).zip(tallies.iter_mut()) {
                let targets = self.select(theory, state, rng)?;
                *state = self.sample(theory, &targets, exhaustive, rng)?;
                tally.record(&self.queries, state);
            }
            if step % REPORT_INTERVAL == 0 {
                let drift = tallies.iter_mut().map(Tally::drift).fold(0.0, f64::max);
                debug!("MC-SAT step {}: largest estimate change {:.5}", step, drift);
            }
        }

        info!("MC-SAT finished after {} steps", self.config.max_steps);
        Ok(summarize(&self.queries, &tallies, self.config.max_steps))
    }
}
