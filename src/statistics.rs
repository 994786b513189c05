//! Sufficient statistics for weight learning.
//!
//! For every grounding of every template, every variable of the ground formula and
//! every value of that variable, the tally records the truth of the ground formula in
//! the evidence world with the variable switched to that value. Counts accumulate per
//! `(template, variable)` as a vector over value indices. Pseudo-likelihood learners
//! read them to score weight vectors without re-grounding.
//!
//! The evidence is assumed complete, as in learning. Groundings come from the same
//! traversal as inference grounding, with a weaker cut: a grounding that is false in the
//! evidence can still become true when one of its variables changes, so only
//! conjunctions are cut, once two of their false constituents share no variable. A
//! surviving conjunction is tallied only for the variables shared by its false
//! constituents.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use log::{debug, info};

use crate::error::Result;
use crate::formula::WeightedFormula;
use crate::grounding::{run_batches, Groundings, GroundingConfig, Mode};
use crate::model::GroundModel;
use crate::types::VarIdx;
use crate::variable::VariableKind;

/// One tally entry: `(template, variable, value index, truth)`.
type Entry = (usize, VarIdx, usize, f64);

/// Per-template, per-variable truth tallies.
#[derive(Debug, Clone, Default)]
pub struct Statistics {
    counts: HashMap<(usize, VarIdx), Vec<f64>>,
    templates: BTreeMap<VarIdx, BTreeSet<usize>>,
}

impl Statistics {
    /// Tallies every template of `model`.
    ///
    /// A hard grounding that is not true in the evidence makes the evidence
    /// unsatisfiable and fails the pass.
    pub fn collect(model: &GroundModel, config: &GroundingConfig) -> Result<Self> {
        let formulas = model.mln().formulas();
        let templates: Vec<usize> = (0..formulas.len()).collect();
        let entries = run_batches(config, &templates, |batch| {
            let mut out = Vec::new();
            for &t in batch {
                tally_template(model, t, &formulas[t], &mut out)?;
            }
            Ok(out)
        })?;

        let mut stats = Self::default();
        for (template, var, index, truth) in entries {
            let size = model.variables()[var.index()].domain_size();
            let counts = stats.counts.entry((template, var)).or_insert_with(|| vec![0.0; size]);
            counts[index] += truth;
            stats.templates.entry(var).or_default().insert(template);
        }
        info!("Statistics: {} (template, variable) tallies", stats.counts.len());
        Ok(stats)
    }

    /// Tally of `template` for `var`, indexed by value index.
    pub fn get(&self, template: usize, var: VarIdx) -> Option<&[f64]> {
        self.counts.get(&(template, var)).map(Vec::as_slice)
    }

    /// Templates with a grounding that mentions `var`.
    pub fn templates_of(&self, var: VarIdx) -> impl Iterator<Item = usize> + '_ {
        self.templates.get(&var).into_iter().flatten().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = ((usize, VarIdx), &[f64])> {
        self.counts.iter().map(|(&k, v)| (k, v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

fn tally_template(model: &GroundModel, template: usize, wf: &WeightedFormula, out: &mut Vec<Entry>) -> Result<()> {
    let evidence = model.evidence();
    let before = out.len();
    let blank = vec![None; model.atom_count()];
    let mut world = evidence.to_vec();
    let mut leaves = 0usize;

    let mut groundings = Groundings::new(model, template, wf, Mode::Statistics)?;
    while let Some(leaf) = groundings.next_leaf()? {
        leaves += 1;
        let gf = groundings.instance(&leaf.assignment)?;
        if wf.is_hard() && gf.truth(evidence).is_some_and(|t| t < 1.0) {
            return Err(groundings.unsatisfiable(&leaf.assignment));
        }

        let mut seen = BTreeSet::new();
        for atom in gf.atoms() {
            let var = model.variable(atom);
            if var.kind() == VariableKind::Fuzzy || !seen.insert(var.idx()) {
                continue;
            }
            // a variable outside every false constituent leaves the conjunction false
            if leaf.falsevars.as_ref().is_some_and(|vs| !vs.contains(&var.idx())) {
                continue;
            }
            for (index, value) in var.values(&blank)? {
                let Some(index) = index else {
                    continue;
                };
                var.set_value(&value, &mut world);
                let truth = gf.truth(&world).unwrap_or(0.0);
                if truth != 0.0 {
                    out.push((template, var.idx(), index, truth));
                }
            }
            // restore the evidence of this variable
            for &a in var.atoms() {
                world[a.index()] = evidence[a.index()];
            }
        }
    }
    debug!(
        "Statistics: template {} kept {} groundings, contributed {} entries",
        template,
        leaves,
        out.len() - before
    );
    Ok(())
}
