use mln_rs::domain::Predicate;
use mln_rs::error::MlnError;
use mln_rs::formula::{Formula, Mln};
use mln_rs::gibbs::{Gibbs, GibbsConfig};
use mln_rs::grounding::{Grounder, GroundingConfig};
use mln_rs::mcsat::{McSat, McSatConfig};
use mln_rs::model::{Database, GroundModel};
use mln_rs::types::Weight;
use test_log::test;

fn smokers() -> Mln {
    let mut mln = Mln::new();
    mln.declare_predicate(Predicate::new("smokes", &["person"])).unwrap();
    mln.declare_predicate(Predicate::new("cancer", &["person"])).unwrap();
    mln.add_constant("person", "A");
    mln.add_constant("person", "B");
    mln
}

fn database(facts: &[(&str, f64)]) -> Database {
    let mut db = Database::new();
    for (atom, truth) in facts {
        db.add(atom, *truth).unwrap();
    }
    db
}

#[test]
fn tautology_has_no_groundings() {
    let evidence: [&[(&str, f64)]; 4] = [
        &[],
        &[("smokes(A)", 1.0)],
        &[("smokes(A)", 0.0), ("smokes(B)", 1.0)],
        &[("smokes(A)", 0.0), ("smokes(B)", 0.0)],
    ];
    for facts in evidence {
        let mut mln = Mln::new();
        mln.declare_predicate(Predicate::new("smokes", &["person"])).unwrap();
        mln.add_constant("person", "A");
        mln.add_constant("person", "B");
        let f = Formula::implies(Formula::lit("smokes", &["x"]), Formula::lit("smokes", &["x"]));
        mln.add_formula(f, Weight::Hard).unwrap();
        let model = GroundModel::new(mln, &database(facts)).unwrap();

        let gfs = Grounder::new(&model, model.mln().formulas())
            .ground_all(&GroundingConfig::default())
            .unwrap();
        assert!(gfs.iter().all(|gf| gf.formula.is_constant()), "{:?}", facts);
        assert!(gfs.is_empty());
    }
}

#[test]
fn smoking_raises_cancer_probability() {
    let run = |smokes: f64| {
        let mut mln = smokers();
        let f = Formula::implies(Formula::lit("smokes", &["x"]), Formula::lit("cancer", &["x"]));
        mln.add_formula(f, 1.5).unwrap();
        let model = GroundModel::new(mln, &database(&[("smokes(A)", smokes)])).unwrap();
        let config = McSatConfig::default().with_chains(4).with_max_steps(500).with_seed(2024);
        let result = McSat::new(&model, config).unwrap().run().unwrap();
        result.get("cancer(A)").unwrap()
    };
    let with = run(1.0);
    let without = run(0.0);
    assert!(with > without, "P(cancer(A)) = {} with smoking, {} without", with, without);
}

#[test]
fn mutex_block_enumeration_and_propagation() {
    let mut mln = Mln::new();
    mln.declare_predicate(Predicate::functional("color", &["obj", "col"], &[1]))
        .unwrap();
    mln.add_constant("obj", "X");
    for c in ["red", "green", "blue"] {
        mln.add_constant("col", c);
    }
    let mut model = GroundModel::from_mln(mln).unwrap();

    let red = model.gndatom("color(X,red)").unwrap();
    let var = model.variable(red);
    assert_eq!(var.name(), "color(X,_)");
    let values = var.values(model.evidence()).unwrap();
    assert_eq!(values.len(), 3);
    for (i, (index, value)) in values.iter().enumerate() {
        assert_eq!(*index, Some(i));
        assert_eq!(value.iter().filter(|&&v| v == 1.0).count(), 1);
    }

    model.set_evidence([("color(X,red)", 1.0)], false, false).unwrap();
    assert_eq!(model.evidence()[red.index()], Some(1.0));
    for other in ["color(X,green)", "color(X,blue)"] {
        let atom = model.gndatom(other).unwrap();
        assert_eq!(model.evidence()[atom.index()], Some(0.0));
    }
    assert_eq!(model.variable(red).value_count(model.evidence()).unwrap(), 1);

    let conflict = model.set_evidence([("color(X,green)", 1.0)], false, false);
    assert!(matches!(conflict, Err(MlnError::ValueConflict { .. })));
}

#[test]
fn contradicted_hard_formula_fails_before_sampling() {
    let mut mln = Mln::new();
    mln.declare_predicate(Predicate::new("p", &["obj"])).unwrap();
    mln.add_constant("obj", "A");
    mln.add_formula(Formula::lit("p", &["A"]), Weight::Hard).unwrap();
    let model = GroundModel::new(mln, &database(&[("p(A)", 0.0)])).unwrap();

    let grounded: Result<Vec<_>, _> = Grounder::new(&model, model.mln().formulas())
        .iter_groundings()
        .collect();
    assert!(matches!(grounded, Err(MlnError::UnsatisfiableEvidence { .. })));

    let result = McSat::new(&model, McSatConfig::default().with_seed(0)).unwrap().run();
    match result {
        Err(MlnError::UnsatisfiableEvidence { formula }) => assert!(formula.contains("p(A)")),
        other => panic!("expected unsatisfiable evidence, got {:?}", other),
    }
}

fn contradiction() -> GroundModel {
    let mut mln = Mln::new();
    mln.declare_predicate(Predicate::new("p", &["obj"])).unwrap();
    mln.add_constant("obj", "A");
    mln.add_formula(Formula::lit("p", &["A"]), Weight::Hard).unwrap();
    mln.add_formula(Formula::neg_lit("p", &["A"]), Weight::Hard).unwrap();
    GroundModel::from_mln(mln).unwrap()
}

#[test]
fn contradicting_hard_formulas_fail_mcsat() {
    let model = contradiction();
    let result = McSat::new(&model, McSatConfig::default().with_seed(1)).unwrap().run();
    assert!(matches!(result, Err(MlnError::UnsatisfiableEvidence { .. })));
}

#[test]
fn contradicting_hard_formulas_fail_gibbs() {
    let model = contradiction();
    let result = Gibbs::new(&model, GibbsConfig::default().with_seed(1)).unwrap().run();
    assert!(matches!(result, Err(MlnError::UnsatisfiableEvidence { .. })));
}
