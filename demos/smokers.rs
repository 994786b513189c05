use clap::Parser;

use mln_rs::domain::Predicate;
use mln_rs::formula::{Formula, Mln};
use mln_rs::gibbs::{Gibbs, GibbsConfig};
use mln_rs::grounding::GroundingConfig;
use mln_rs::mcsat::{McSat, McSatConfig};
use mln_rs::model::{Database, GroundModel};

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Number of people.
    #[arg(value_name = "INT", default_value = "4")]
    n: usize,

    /// Number of MC-SAT chains.
    #[clap(long, value_name = "INT", default_value = "4")]
    chains: usize,

    /// Sampling steps per chain.
    #[clap(long, value_name = "INT", default_value = "1000")]
    steps: usize,

    /// Random seed.
    #[clap(long, value_name = "INT", default_value = "42")]
    seed: u64,

    /// Grounding worker threads.
    #[clap(long, value_name = "INT")]
    workers: Option<usize>,

    /// Also run the Gibbs sampler.
    #[clap(long)]
    gibbs: bool,
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

    // Smokers and friends:
    // - smoking causes cancer
    // - friends of smokers smoke
    let mut mln = Mln::new();
    mln.declare_predicate(Predicate::new("smokes", &["person"]))?;
    mln.declare_predicate(Predicate::new("cancer", &["person"]))?;
    mln.declare_predicate(Predicate::new("friends", &["person", "person"]))?;
    mln.add_formula(
        Formula::implies(Formula::lit("smokes", &["x"]), Formula::lit("cancer", &["x"])),
        1.5,
    )?;
    mln.add_formula(
        Formula::implies(
            Formula::and(vec![Formula::lit("friends", &["x", "y"]), Formula::lit("smokes", &["x"])]),
            Formula::lit("smokes", &["y"]),
        ),
        1.1,
    )?;
    mln.set_closed_world("friends")?;

    // People form a chain of friendships; the first one smokes.
    let people: Vec<String> = (0..args.n).map(|i| format!("P{}", i)).collect();
    let mut db = Database::new();
    for w in people.windows(2) {
        db.add(&format!("friends({},{})", w[0], w[1]), 1.0)?;
    }
    if let Some(first) = people.first() {
        db.add(&format!("smokes({})", first), 1.0)?;
    }

    let model = GroundModel::new(mln, &db)?;
    println!(
        "Ground model: {} atoms, {} variables, {} possible worlds",
        model.atom_count(),
        model.variables().len(),
        model.count_worlds()?
    );

    let mut grounding = GroundingConfig::default();
    if let Some(workers) = args.workers {
        grounding = grounding.with_workers(workers);
    }

    let time_mcsat = std::time::Instant::now();
    let config = McSatConfig::default()
        .with_chains(args.chains)
        .with_max_steps(args.steps)
        .with_seed(args.seed)
        .with_grounding(grounding.clone());
    let result = McSat::new(&model, config)?.run()?;
    println!("MC-SAT marginals:\n{}", result);
    println!("MC-SAT done in {:.3} s", time_mcsat.elapsed().as_secs_f64());

    if args.gibbs {
        let time_gibbs = std::time::Instant::now();
        let config = GibbsConfig {
            grounding,
            ..GibbsConfig::default()
        }
        .with_chains(args.chains)
        .with_max_steps(args.steps)
        .with_seed(args.seed);
        let result = Gibbs::new(&model, config)?.run()?;
        println!("Gibbs marginals:\n{}", result);
        println!("Gibbs done in {:.3} s", time_gibbs.elapsed().as_secs_f64());
    }

    let time_total = time_total.elapsed();
    println!("\nAll done in {:.3} s", time_total.as_secs_f64());

    Ok(())
}
