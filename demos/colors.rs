use clap::Parser;

use mln_rs::domain::Predicate;
use mln_rs::formula::{Formula, Mln};
use mln_rs::mcsat::{McSat, McSatConfig};
use mln_rs::model::{Database, GroundModel};
use mln_rs::types::Weight;

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Number of MC-SAT chains.
    #[clap(long, value_name = "INT", default_value = "2")]
    chains: usize,

    /// Sampling steps per chain.
    #[clap(long, value_name = "INT", default_value = "500")]
    steps: usize,

    /// Random seed.
    #[clap(long, value_name = "INT", default_value = "7")]
    seed: u64,

    /// Enumerate worlds when there are at most this many (0 disables).
    #[clap(long, value_name = "INT", default_value = "0")]
    exhaustive: u64,

    /// SampleSAT random-walk probability.
    #[clap(long, value_name = "FLOAT", default_value = "0.5")]
    p: f64,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let time_total = std::time::Instant::now();

    let args = Cli::parse();
    println!("args = {:?}", args);

    // Every node takes exactly one color, neighbours prefer different colors,
    // and the first node may not be Red.
    let mut mln = Mln::new();
    mln.declare_predicate(Predicate::functional("color", &["node", "col"], &[1]))?;
    mln.declare_predicate(Predicate::new("edge", &["node", "node"]))?;
    for c in ["Red", "Green", "Blue"] {
        mln.add_constant("col", c);
    }
    mln.add_formula(
        Formula::implies(
            Formula::lit("edge", &["x", "y"]),
            Formula::not(Formula::and(vec![
                Formula::lit("color", &["x", "c"]),
                Formula::lit("color", &["y", "c"]),
            ])),
        ),
        2.0,
    )?;
    mln.add_formula(Formula::neg_lit("color", &["N0", "Red"]), Weight::Hard)?;
    mln.set_closed_world("edge")?;

    // A triangle with a tail: N0-N1-N2-N0, N2-N3
    let mut db = Database::new();
    for (a, b) in [("N0", "N1"), ("N1", "N2"), ("N2", "N0"), ("N2", "N3")] {
        db.add(&format!("edge({},{})", a, b), 1.0)?;
    }
    db.add("color(N3,Blue)", 1.0)?;

    let model = GroundModel::new(mln, &db)?;
    println!(
        "Ground model: {} atoms, {} variables, {} possible worlds",
        model.atom_count(),
        model.variables().len(),
        model.count_worlds()?
    );
    for var in model.variables() {
        println!("  {} with {} admissible values", var.name(), var.value_count(model.evidence())?);
    }

    let queries = [
        Formula::lit("color", &["N2", "Blue"]),
        Formula::or(vec![
            Formula::lit("color", &["N0", "Green"]),
            Formula::lit("color", &["N1", "Green"]),
        ]),
    ];
    let config = McSatConfig::default()
        .with_chains(args.chains)
        .with_max_steps(args.steps)
        .with_seed(args.seed)
        .with_p(args.p)
        .with_exhaustive_limit(args.exhaustive);
    let result = McSat::new(&model, config)?.with_queries(&queries)?.run()?;
    println!("Marginals:\n{}", result);

    let time_total = time_total.elapsed();
    println!("\nAll done in {:.3} s", time_total.as_secs_f64());

    Ok(())
}
