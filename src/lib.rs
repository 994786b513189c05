//! # mln-rs: Markov Logic Networks in Rust
//!
//! **`mln-rs`** builds ground Markov networks from weighted first-order formulas and
//! samples them with MC-SAT.
//!
//! ## What is a Markov Logic Network?
//!
//! A Markov Logic Network is a set of first-order formulas with weights. Together with a
//! finite set of constants it defines a probability distribution over possible worlds:
//! a world that violates a grounding of a formula is not impossible, only less probable,
//! by a factor of `exp(w)` per violated grounding. *Hard* formulas have infinite weight
//! and must hold in every world.
//!
//! ## Key Features
//!
//! - **Variables over atom blocks**: ground atoms are assigned through
//!   [`Variable`][crate::variable::Variable]s, which keep functional (mutex) and
//!   soft-functional blocks one-hot, and fuzzy atoms at their evidence degree.
//! - **Evidence-pruned grounding**: the [`Grounder`][crate::grounding::Grounder] skips
//!   groundings already decided by the evidence, optionally on a worker pool.
//! - **MC-SAT with SampleSAT**: [`McSat`][crate::mcsat::McSat] runs seeded, reproducible
//!   chains and reports marginals with their inter-chain variance.
//! - **Gibbs sampling** and **learning statistics** over the same ground theory.
//!
//! ## Basic Usage
//!
//! ```rust
//! use mln_rs::domain::Predicate;
//! use mln_rs::formula::{Formula, Mln};
//! use mln_rs::mcsat::{McSat, McSatConfig};
//! use mln_rs::model::{Database, GroundModel};
//!
//! // 1. Declare predicates, constants and weighted formulas
//! let mut mln = Mln::new();
//! mln.declare_predicate(Predicate::new("smokes", &["person"])).unwrap();
//! mln.declare_predicate(Predicate::new("cancer", &["person"])).unwrap();
//! let f = Formula::implies(Formula::lit("smokes", &["x"]), Formula::lit("cancer", &["x"]));
//! mln.add_formula(f, 1.5).unwrap();
//!
//! // 2. Evidence; its constants join the domains
//! let mut db = Database::new();
//! db.add("smokes(Anna)", 1.0).unwrap();
//! db.add("smokes(Bob)", 0.0).unwrap();
//!
//! // 3. Ground model: every ground atom, its variable and its evidence
//! let model = GroundModel::new(mln, &db).unwrap();
//!
//! // 4. Sample
//! let config = McSatConfig::default().with_chains(2).with_max_steps(300).with_seed(1);
//! let result = McSat::new(&model, config).unwrap().run().unwrap();
//! assert!(result.get("cancer(Anna)").unwrap() > result.get("cancer(Bob)").unwrap());
//! ```
//!
//! ## Core Components
//!
//! - **[`model`]**: The [`GroundModel`][crate::model::GroundModel]: atoms, variables, evidence.
//! - **[`formula`]** and **[`ground`]**: Template and ground formulas.
//! - **[`grounding`]**: The grounding engine.
//! - **[`mcsat`]**, **[`samplesat`]**, **[`gibbs`]**: Inference.

pub mod atom;
pub mod domain;
pub mod error;
pub mod formula;
pub mod gibbs;
pub mod ground;
pub mod grounding;
pub mod mcsat;
pub mod model;
pub mod samplesat;
pub mod sparse_set;
pub mod statistics;
pub mod types;
pub mod variable;
