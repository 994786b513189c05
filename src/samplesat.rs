//! SampleSAT: near-uniform sampling of worlds satisfying a clause set.
//!
//! Starting from a world, SampleSAT repairs the target clauses by local search. With
//! probability `p` it makes a greedy WalkSAT move, otherwise a simulated-annealing move:
//!
//! - **WalkSAT**: pick an unsatisfied clause uniformly, enumerate every value of every
//!   variable in it that would satisfy it, and apply one of the values that break the
//!   fewest bottleneck clauses.
//! - **Annealing**: pick a free variable and a different value uniformly, and accept
//!   the flip with probability 1 if it breaks nothing, and `exp(-1 + (nb - b) / nb)`
//!   otherwise, where `b` is the number of broken and `nb` the number of current
//!   bottleneck clauses of the variable.
//!
//! A clause is a *bottleneck* while exactly one of its atoms is true and that atom
//! occurs with a single polarity: changing that atom falsifies the clause.
//!
//! Flips act on whole variables, so a mutex block always moves its true member and
//! stays one-hot.

use log::{debug, trace};
use num_bigint::BigUint;
use rand::Rng;

use crate::error::{MlnError, Result};
use crate::ground::Clause;
use crate::model::GroundModel;
use crate::sparse_set::SparseSet;
use crate::types::{AtomIdx, VarIdx, World};

/// Default move budget of a run. Running out reports the target clauses as
/// unsatisfiable.
pub const DEFAULT_MAX_FLIPS: usize = 100_000;

/// The atom occurs in a positive literal.
const POS: u8 = 0b01;
/// The atom occurs in a negative literal.
const NEG: u8 = 0b10;

fn satisfies(mask: u8, truth: f64) -> bool {
    (truth == 1.0 && mask & POS != 0) || (truth == 0.0 && mask & NEG != 0)
}

/// Local search state of one target clause.
#[derive(Debug, Clone)]
struct ClauseState {
    /// Index into the clause arena.
    index: usize,
    /// Distinct atoms with their polarity masks.
    atoms: Vec<(AtomIdx, u8)>,
    /// Parallel to `atoms`: whether the atom currently satisfies the clause.
    true_atoms: Vec<bool>,
    true_count: usize,
    bottleneck: Option<AtomIdx>,
}

impl ClauseState {
    fn new(index: usize, clause: &Clause, world: &[Option<f64>]) -> Self {
        let mut atoms: Vec<(AtomIdx, u8)> = Vec::with_capacity(clause.len());
        for lit in clause {
            let bit = if lit.positive { POS } else { NEG };
            match atoms.iter_mut().find(|(a, _)| *a == lit.atom) {
                Some((_, mask)) => *mask |= bit,
                None => atoms.push((lit.atom, bit)),
            }
        }
        let true_atoms: Vec<bool> = atoms
            .iter()
            .map(|&(a, mask)| world[a.index()].is_some_and(|t| satisfies(mask, t)))
            .collect();
        let mut state = Self {
            index,
            atoms,
            true_count: true_atoms.iter().filter(|&&t| t).count(),
            true_atoms,
            bottleneck: None,
        };
        state.refresh_bottleneck();
        state
    }

    fn is_satisfied(&self) -> bool {
        self.true_count > 0
    }

    fn mask(&self, atom: AtomIdx) -> Option<u8> {
        self.atoms.iter().find(|(a, _)| *a == atom).map(|&(_, m)| m)
    }

    fn refresh_bottleneck(&mut self) {
        self.bottleneck = None;
        if self.true_count != 1 {
            return;
        }
        if let Some(i) = self.true_atoms.iter().position(|&t| t) {
            let (atom, mask) = self.atoms[i];
            if mask == POS || mask == NEG {
                self.bottleneck = Some(atom);
            }
        }
    }

    /// Records the new truth value of `atom`.
    fn update(&mut self, atom: AtomIdx, truth: f64) {
        if let Some(i) = self.atoms.iter().position(|(a, _)| *a == atom) {
            let now = satisfies(self.atoms[i].1, truth);
            if now != self.true_atoms[i] {
                self.true_atoms[i] = now;
                if now {
                    self.true_count += 1;
                } else {
                    self.true_count -= 1;
                }
            }
        }
    }

    /// Whether setting `assignment` would falsify this clause through its bottleneck.
    fn turns_false_with(&self, assignment: &[(AtomIdx, f64)]) -> bool {
        let Some(b) = self.bottleneck else {
            return false;
        };
        assignment
            .iter()
            .any(|&(a, t)| a == b && self.mask(a).is_some_and(|m| !satisfies(m, t)))
    }

    /// Whether setting `assignment` would satisfy this (unsatisfied) clause.
    fn turns_true_with(&self, assignment: &[(AtomIdx, f64)]) -> bool {
        !self.is_satisfied()
            && assignment
                .iter()
                .any(|&(a, t)| self.mask(a).is_some_and(|m| satisfies(m, t)))
    }
}

/// SampleSAT run over a subset of a clause arena.
///
/// # Example
///
/// ```
/// use mln_rs::domain::Predicate;
/// use mln_rs::formula::Mln;
/// use mln_rs::ground::GroundLit;
/// use mln_rs::model::GroundModel;
/// use mln_rs::samplesat::SampleSat;
/// use rand::SeedableRng;
/// use rand_chacha::ChaCha8Rng;
///
/// let mut mln = Mln::new();
/// mln.declare_predicate(Predicate::new("p", &["obj"])).unwrap();
/// mln.add_constant("obj", "A");
/// mln.add_constant("obj", "B");
/// let model = GroundModel::from_mln(mln).unwrap();
/// let a = model.gndatom("p(A)").unwrap();
/// let b = model.gndatom("p(B)").unwrap();
///
/// // p(A) and !p(B)
/// let clauses = vec![vec![GroundLit::new(a, true)], vec![GroundLit::new(b, false)]];
/// let mut rng = ChaCha8Rng::seed_from_u64(7);
/// let start = model.random_world(&mut rng).unwrap();
/// let world = SampleSat::new(&model, &clauses, 0..2, start).unwrap().run(&mut rng).unwrap();
/// assert_eq!(world[a.index()], Some(1.0));
/// assert_eq!(world[b.index()], Some(0.0));
/// ```
pub struct SampleSat<'a> {
    model: &'a GroundModel,
    targets: Vec<ClauseState>,
    /// Target clauses touching each variable, by variable index.
    var_clauses: Vec<Vec<usize>>,
    /// Variables that touch a target clause and have more than one admissible value.
    candidates: Vec<VarIdx>,
    unsatisfied: SparseSet,
    state: World,
    p: f64,
    max_flips: Option<usize>,
}

impl<'a> SampleSat<'a> {
    /// Prepares a run that satisfies the clauses `targets` of `clauses`, starting from
    /// `state`.
    ///
    /// `state` must be a complete world consistent with the evidence.
    pub fn new(
        model: &'a GroundModel,
        clauses: &'a [Clause],
        targets: impl IntoIterator<Item = usize>,
        state: World,
    ) -> Result<Self> {
        let evidence = model.evidence();
        let mut var_clauses: Vec<Vec<usize>> = vec![Vec::new(); model.variables().len()];
        let mut states = Vec::new();
        for index in targets {
            let local = states.len();
            let clause = ClauseState::new(index, &clauses[index], &state);
            let mut vars: Vec<usize> = clause
                .atoms
                .iter()
                .map(|&(a, _)| model.variable(a).idx().index())
                .collect();
            vars.sort_unstable();
            vars.dedup();
            for v in vars {
                var_clauses[v].push(local);
            }
            states.push(clause);
        }

        let mut unsatisfied = SparseSet::new(states.len());
        unsatisfied.extend(states.iter().enumerate().filter(|(_, c)| !c.is_satisfied()).map(|(i, _)| i));

        let mut candidates = Vec::new();
        for (v, touching) in var_clauses.iter().enumerate() {
            if !touching.is_empty() && model.variables()[v].value_count(evidence)? > 1 {
                candidates.push(VarIdx::new(v));
            }
        }

        debug!(
            "SampleSAT: {} target clauses, {} unsatisfied, {} candidate variables",
            states.len(),
            unsatisfied.len(),
            candidates.len()
        );

        Ok(Self {
            model,
            targets: states,
            var_clauses,
            candidates,
            unsatisfied,
            state,
            p: 0.5,
            max_flips: Some(DEFAULT_MAX_FLIPS),
        })
    }

    /// Sets the probability of a greedy WalkSAT move.
    pub fn with_p(mut self, p: f64) -> Self {
        self.p = p;
        self
    }

    /// Bounds the number of moves (default: [`DEFAULT_MAX_FLIPS`]); exceeding the bound
    /// reports unsatisfiable evidence. `None` searches until every target clause holds.
    pub fn with_max_flips(mut self, max_flips: Option<usize>) -> Self {
        self.max_flips = max_flips;
        self
    }

    pub fn state(&self) -> &World {
        &self.state
    }

    /// Number of currently unsatisfied target clauses.
    pub fn unsatisfied(&self) -> usize {
        self.unsatisfied.len()
    }

    fn unsatisfiable(&self, clause: usize) -> MlnError {
        let index = self.targets[clause].index;
        let lits: Vec<String> = self.targets[clause]
            .atoms
            .iter()
            .map(|&(a, mask)| {
                let name = self.model.atom(a).to_string();
                match mask {
                    NEG => format!("!{}", name),
                    POS => name,
                    _ => format!("{} v !{}", name, name),
                }
            })
            .collect();
        MlnError::UnsatisfiableEvidence {
            formula: format!("clause {}: {}", index, lits.join(" v ")),
        }
    }

    /// Runs local search until every target clause is satisfied and returns the world.
    pub fn run<R: Rng + ?Sized>(mut self, rng: &mut R) -> Result<World> {
        let mut flips = 0usize;
        while let Some(clause) = self.unsatisfied.choose(rng) {
            if self.max_flips.is_some_and(|max| flips >= max) {
                return Err(self.unsatisfiable(clause));
            }
            flips += 1;
            if rng.random::<f64>() <= self.p {
                self.walksat_move(clause, rng)?;
            } else {
                self.sa_move(rng)?;
            }
        }
        debug!("SampleSAT: satisfied after {} moves", flips);
        Ok(self.state)
    }

    fn assignment(&self, var: VarIdx, value: &[f64]) -> Vec<(AtomIdx, f64)> {
        self.model.variables()[var.index()].value_assignment(value).collect()
    }

    /// Number of bottleneck clauses of `var`, and how many of them `assignment` breaks.
    fn breakage(&self, var: VarIdx, assignment: &[(AtomIdx, f64)]) -> (usize, usize) {
        let mut bottlenecks = 0;
        let mut broken = 0;
        for &c in &self.var_clauses[var.index()] {
            let clause = &self.targets[c];
            if clause.bottleneck.is_some() {
                bottlenecks += 1;
                if clause.turns_false_with(assignment) {
                    broken += 1;
                }
            }
        }
        (bottlenecks, broken)
    }

    fn walksat_move<R: Rng + ?Sized>(&mut self, clause: usize, rng: &mut R) -> Result<()> {
        let evidence = self.model.evidence();
        let mut vars: Vec<VarIdx> = self.targets[clause]
            .atoms
            .iter()
            .map(|&(a, _)| self.model.variable(a).idx())
            .collect();
        vars.sort_unstable();
        vars.dedup();

        let mut best: Option<usize> = None;
        let mut options: Vec<(VarIdx, Vec<f64>)> = Vec::new();
        for var in vars {
            for (_, value) in self.model.variables()[var.index()].values(evidence)? {
                let assignment = self.assignment(var, &value);
                if !self.targets[clause].turns_true_with(&assignment) {
                    continue;
                }
                let (_, broken) = self.breakage(var, &assignment);
                match best {
                    Some(b) if broken > b => continue,
                    Some(b) if broken == b => {}
                    _ => {
                        best = Some(broken);
                        options.clear();
                    }
                }
                options.push((var, value));
            }
        }

        if options.is_empty() {
            return Err(self.unsatisfiable(clause));
        }
        let (var, value) = options.swap_remove(rng.random_range(0..options.len()));
        trace!("WalkSAT: {} := {:?} breaks {:?}", self.model.variables()[var.index()], value, best);
        self.set_value(var, &value);
        Ok(())
    }

    fn sa_move<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<()> {
        if self.candidates.is_empty() {
            return Ok(());
        }
        let model = self.model;
        let var = self.candidates[rng.random_range(0..self.candidates.len())];
        let variable = &model.variables()[var.index()];
        let current = variable.evidence_value(&self.state);
        let values: Vec<Vec<f64>> = variable
            .values(model.evidence())?
            .into_iter()
            .map(|(_, v)| v)
            .filter(|v| v.iter().zip(&current).any(|(&a, &b)| Some(a) != b))
            .collect();
        if values.is_empty() {
            return Ok(());
        }
        let value = &values[rng.random_range(0..values.len())];
        let assignment = self.assignment(var, value);
        let (bottlenecks, broken) = self.breakage(var, &assignment);
        let p = if broken == 0 {
            1.0
        } else {
            let nb = bottlenecks as f64;
            (-1.0 + (nb - broken as f64) / nb).exp()
        };
        if rng.random::<f64>() <= p {
            self.set_value(var, value);
        }
        Ok(())
    }

    /// Applies a value and updates every target clause touching the variable.
    fn set_value(&mut self, var: VarIdx, value: &[f64]) {
        let model = self.model;
        let variable = &model.variables()[var.index()];
        variable.set_value(value, &mut self.state);
        for &c in &self.var_clauses[var.index()] {
            let clause = &mut self.targets[c];
            for (atom, truth) in variable.value_assignment(value) {
                clause.update(atom, truth);
            }
            clause.refresh_bottleneck();
            if clause.is_satisfied() {
                self.unsatisfied.remove(c);
            } else {
                self.unsatisfied.insert(c);
            }
        }
    }
}

/// Returns `true` if `world` satisfies every clause of `clauses` listed in `targets`.
pub fn satisfies_all(clauses: &[Clause], targets: &[usize], world: &[Option<f64>]) -> bool {
    targets
        .iter()
        .all(|&i| clauses[i].iter().any(|lit| lit.is_satisfied(world)))
}

/// Exact variant: enumerates every world consistent with the evidence and draws one
/// uniformly among those satisfying the target clauses.
pub fn sample_exhaustive<R: Rng + ?Sized>(
    model: &GroundModel,
    clauses: &[Clause],
    targets: &[usize],
    rng: &mut R,
) -> Result<World> {
    let mut models: Vec<World> = model
        .iter_worlds()?
        .filter(|w| satisfies_all(clauses, targets, w))
        .collect();
    if models.is_empty() {
        return Err(MlnError::UnsatisfiableEvidence {
            formula: format!("no world satisfies the {} target clauses", targets.len()),
        });
    }
    trace!("SampleSAT: {} satisfying worlds", models.len());
    Ok(models.swap_remove(rng.random_range(0..models.len())))
}

/// Decides whether a model is small enough for [`sample_exhaustive`].
pub fn use_exhaustive(model: &GroundModel, limit: u64) -> Result<bool> {
    if limit == 0 {
        return Ok(false);
    }
    Ok(model.count_worlds()? <= BigUint::from(limit))
}
