//! Gibbs sampling over the ground theory.
//!
//! A step visits every variable with more than one admissible value and resamples it
//! from its conditional distribution given the rest of the state:
//!
//! ```text
//! P(v = x | rest) ∝ exp(Σ w_f · f(state[v := x]))
//! ```
//!
//! summed over the soft ground formulas `f` touching `v`. A value under which a hard
//! ground formula is false has probability zero. Chains start from a state satisfying
//! every hard clause.

use log::{debug, info};
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::error::{MlnError, Result};
use crate::formula::Formula;
use crate::grounding::{ground_theory, GroundingConfig};
use crate::mcsat::{
    chain_rngs, summarize, validate_chains, validate_grounding, InferenceResult, Queries, Tally, Theory,
    REPORT_INTERVAL,
};
use crate::model::GroundModel;
use crate::samplesat::{sample_exhaustive, use_exhaustive, SampleSat, DEFAULT_MAX_FLIPS};
use crate::types::World;
use crate::variable::{Value, Variable};

/// Configuration of a Gibbs sampling run.
#[derive(Debug, Clone)]
pub struct GibbsConfig {
    pub chains: usize,
    pub max_steps: usize,
    pub seed: Option<u64>,
    /// Start chains from an enumerated world when the model has at most this many;
    /// 0 disables (default: 0)
    pub exhaustive_limit: u64,
    /// Move budget of the SampleSAT call that starts a chain (default: [`DEFAULT_MAX_FLIPS`])
    pub max_flips: Option<usize>,
    pub grounding: GroundingConfig,
}

impl Default for GibbsConfig {
    fn default() -> Self {
        Self {
            chains: 1,
            max_steps: 500,
            seed: None,
            exhaustive_limit: 0,
            max_flips: Some(DEFAULT_MAX_FLIPS),
            grounding: GroundingConfig::default(),
        }
    }
}

impl GibbsConfig {
    pub fn with_chains(mut self, chains: usize) -> Self {
        self.chains = chains;
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
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

    pub fn validate(&self) -> Result<()> {
        validate_chains(self.chains, self.max_steps)?;
        if self.max_flips == Some(0) {
            return Err(MlnError::InvalidConfig("max_flips must be positive".to_string()));
        }
        validate_grounding(&self.grounding)
    }
}

/// Gibbs sampler over a ground model.
pub struct Gibbs<'a> {
    model: &'a GroundModel,
    config: GibbsConfig,
    queries: Queries,
}

impl<'a> Gibbs<'a> {
    pub fn new(model: &'a GroundModel, config: GibbsConfig) -> Result<Self> {
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

    /// Conditional distribution of `var` over `values`, given `state`.
    fn conditional(
        &self,
        theory: &Theory,
        touching: &[usize],
        var: &Variable,
        values: &[Value],
        state: &[Option<f64>],
    ) -> Result<Vec<f64>> {
        let mut world = state.to_vec();
        let mut sums: Vec<Option<f64>> = vec![Some(0.0); values.len()];
        for (value, sum) in values.iter().zip(sums.iter_mut()) {
            var.set_value(value, &mut world);
            for &i in touching {
                let gf = &theory.formulas()[i];
                let truth = gf.formula.truth(&world).unwrap_or(0.0);
                match gf.weight.value() {
                    None if truth == 0.0 => *sum = None,
                    None => {}
                    Some(w) => *sum = sum.map(|s| s + w * truth),
                }
            }
        }

        // shift by the largest sum so that large weights do not overflow
        let top = sums.iter().flatten().copied().fold(f64::NEG_INFINITY, f64::max);
        let weights: Vec<f64> = sums.iter().map(|s| s.map_or(0.0, |s| (s - top).exp())).collect();
        let z: f64 = weights.iter().sum();
        if z == 0.0 || !z.is_finite() {
            return Err(MlnError::DegenerateDistribution {
                variable: var.name().to_string(),
            });
        }
        Ok(weights.into_iter().map(|w| w / z).collect())
    }

    fn step(&self, theory: &Theory, touching: &[Vec<usize>], state: &mut World, rng: &mut ChaCha8Rng) -> Result<()> {
        let evidence = self.model.evidence();
        for var in self.model.variables() {
            let values: Vec<Value> = var.values(evidence)?.into_iter().map(|(_, v)| v).collect();
            if values.len() < 2 {
                continue;
            }
            let probs = self.conditional(theory, &touching[var.idx().index()], var, &values, state)?;
            let r = rng.random::<f64>();
            let mut acc = 0.0;
            let mut pick = values.len() - 1;
            for (i, p) in probs.iter().enumerate() {
                acc += p;
                if r < acc {
                    pick = i;
                    break;
                }
            }
            var.set_value(&values[pick], state);
        }
        Ok(())
    }

    fn initial_state(&self, theory: &Theory, hard: &[usize], exhaustive: bool, rng: &mut ChaCha8Rng) -> Result<World> {
        if exhaustive {
            return sample_exhaustive(self.model, theory.clauses(), hard, rng);
        }
        let start = self.model.random_world(rng)?;
        if hard.is_empty() {
            return Ok(start);
        }
        SampleSat::new(self.model, theory.clauses(), hard.iter().copied(), start)?
            .with_max_flips(self.config.max_flips)
            .run(rng)
    }

    pub fn run(&self) -> Result<InferenceResult> {
        let theory = Theory::new(self.model, ground_theory(self.model, &self.config.grounding)?)?;

        // ground formulas touching each variable
        let mut touching: Vec<Vec<usize>> = vec![Vec::new(); self.model.variables().len()];
        for (i, gf) in theory.formulas().iter().enumerate() {
            let mut vars: Vec<usize> = gf
                .formula
                .atoms()
                .into_iter()
                .map(|a| self.model.variable(a).idx().index())
                .collect();
            vars.sort_unstable();
            vars.dedup();
            for v in vars {
                touching[v].push(i);
            }
        }
        info!(
            "Gibbs: {} ground formulas over {} variables",
            theory.formulas().len(),
            self.model.variables().len()
        );

        let hard = theory.hard_clauses();
        let exhaustive = use_exhaustive(self.model, self.config.exhaustive_limit)?;
        let mut rngs = chain_rngs(self.config.seed, self.config.chains);
        let mut states = Vec::with_capacity(rngs.len());
        for rng in rngs.iter_mut() {
            states.push(self.initial_state(&theory, &hard, exhaustive, rng)?);
        }

        let mut tallies = vec![Tally::new(self.queries.formulas.len()); states.len()];
        for step in 1..=self.config.max_steps {
            for ((state, rng), tally) in states.iter_mut().zip(rngs.iter_mut()).zip(tallies.iter_mut()) {
                self.step(&theory, &touching, state, rng)?;
                tally.record(&self.queries, state);
            }
            if step % REPORT_INTERVAL == 0 {
                let drift = tallies.iter_mut().map(Tally::drift).fold(0.0, f64::max);
                debug!("Gibbs step {}: largest estimate change {:.5}", step, drift);
            }
        }
        Ok(summarize(&self.queries, &tallies, self.config.max_steps))
    }
}
