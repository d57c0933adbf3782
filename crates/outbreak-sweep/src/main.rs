//! Outbreak headless runner
//!
//! Drives the simulation core from JSON inputs. No rendering, no server:
//! read the input spec, run, write JSON.
//!
//! Usage:
//!   cargo run -p outbreak-sweep -- --inputs inputs.json single
//!   cargo run -p outbreak-sweep -- --inputs inputs.json sweep --threads 8 --skip-existing
//!   cargo run -p outbreak-sweep -- --inputs inputs.json graphs --output graphs/

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use outbreak_core::persistence;
use outbreak_core::prelude::*;
use outbreak_core::systems::{CaseGrowth, GroupVisits};
use serde::Serialize;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "outbreak-sweep", version, about = "Contact-graph epidemic simulations")]
struct Cli {
    /// Input spec naming the community, infection, simulation and app input files
    #[arg(long, short, default_value = "inputs.json")]
    inputs: PathBuf,

    /// Base seed; every graph and combination derives its own from this
    #[arg(long, default_value_t = 0)]
    seed: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// One community, one behaviour combination, averaged over repeats
    Single(SingleArgs),
    /// Every community against every behaviour combination
    Sweep(SweepArgs),
    /// Precompute and save one contact graph per community
    Graphs(GraphArgs),
}

#[derive(Debug, Args)]
struct SingleArgs {
    #[arg(long, default_value_t = 10)]
    repeats: u32,
    /// Keep every n-th timestep in the written series
    #[arg(long)]
    report_interval: Option<usize>,
    /// Write integer counts that sum to the population
    #[arg(long)]
    round: bool,
    #[arg(long, short, default_value = "output")]
    output: PathBuf,
}

#[derive(Debug, Args)]
struct SweepArgs {
    #[arg(long, default_value_t = 10)]
    repeats: u32,
    /// Worker threads; 0 runs combinations one after another
    #[arg(long, default_value_t = 0)]
    threads: usize,
    #[arg(long)]
    skip_existing: bool,
    #[arg(long)]
    delete_after_merge: bool,
    #[arg(long)]
    fail_fast: bool,
    /// Write random S/R splits instead of simulating
    #[arg(long)]
    sample: bool,
    /// Sample a fresh graph for every run
    #[arg(long, conflicts_with = "graphs_from")]
    rebuild_graphs: bool,
    /// Load `<community>-graph.bin` files from this directory
    #[arg(long)]
    graphs_from: Option<PathBuf>,
    #[arg(long)]
    report_interval: Option<usize>,
    /// Write integer counts that sum to the population
    #[arg(long)]
    round: bool,
    #[arg(long, short, default_value = "output")]
    output: PathBuf,
}

#[derive(Debug, Args)]
struct GraphArgs {
    #[arg(long, short, default_value = "graphs")]
    output: PathBuf,
}

/// What `single` writes: the averaged series plus its case growth.
#[derive(Debug, Serialize)]
struct SingleReport {
    timestamp: DateTime<Utc>,
    community: String,
    combination: String,
    population: u32,
    result: AveragedResult,
    growth: CaseGrowth,
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let spec: InputSpec = read_json(&cli.inputs)
        .with_context(|| format!("reading input spec {}", cli.inputs.display()))?;

    match cli.command {
        Command::Single(args) => run_single(&spec, cli.seed, args),
        Command::Sweep(args) => run_sweep(&spec, cli.seed, args),
        Command::Graphs(args) => build_graphs(&spec, cli.seed, args),
    }
}

/// `RUST_LOG` filters; defaults to `info`. `log` records from the core are
/// bridged in by `try_init`.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .try_init();
}

// ── Subcommands ─────────────────────────────────────────────────────────

fn run_single(spec: &InputSpec, seed: u64, args: SingleArgs) -> Result<()> {
    let Some(app_input_path) = &spec.app_input_filename else {
        bail!("input spec has no app_input_filename");
    };
    let app_input: AppInput = read_json(app_input_path)
        .with_context(|| format!("reading app input {}", app_input_path.display()))?;
    let (communities, infection, config) = load_model_inputs(spec)?;

    let population = communities.population(&app_input.community)?;
    let combination = app_input.combination()?;
    tracing::info!(
        community = %app_input.community,
        %combination,
        repeats = args.repeats,
        "single run"
    );

    let mut graph_rng = seeded(derive_seed(seed, &format!("{}/graph", app_input.community)));
    let graph = GraphBuilder::new(&population, &config.graph_config).build(&mut graph_rng)?;
    let contacts = GroupVisits::new(&combination, &app_input.local_behaviours)?;
    tracing::debug!(
        behaviours = ?contacts.active_behaviours().collect::<Vec<_>>(),
        "group visits"
    );
    let mut runner = SimulationRunner::shared(Arc::new(graph), &population, infection, config)?
        .with_contacts(Box::new(contacts));

    let mut rng = seeded(derive_seed(
        seed,
        &format!("{}/{}", app_input.community, combination.key()),
    ));
    let averaged = runner.run_multiple(args.repeats, &mut rng)?;
    let population_size = population.age_structure.total();
    let growth = CaseGrowth::from_result(&averaged, population_size);

    let report = SingleReport {
        timestamp: Utc::now(),
        community: app_input.community.clone(),
        combination: combination.key(),
        population: population_size,
        result: match (args.report_interval, args.round) {
            (Some(interval), true) => averaged.sampled(interval).rounded(population_size),
            (Some(interval), false) => averaged.sampled(interval),
            (None, true) => averaged.rounded(population_size),
            (None, false) => averaged,
        },
        growth,
    };
    let path = args
        .output
        .join(format!("{}-{}-single.json", app_input.community, combination.file_stem()));
    write_json(&path, &report)?;
    tracing::info!(path = %path.display(), "wrote single run");
    Ok(())
}

fn run_sweep(spec: &InputSpec, seed: u64, args: SweepArgs) -> Result<()> {
    let inputs = SweepInputs::load(spec).context("loading sweep inputs")?;
    let graph_policy = match (args.rebuild_graphs, args.graphs_from) {
        (true, _) => GraphPolicy::RebuildPerRun,
        (false, Some(dir)) => GraphPolicy::LoadFrom(dir),
        (false, None) => GraphPolicy::SharedPerCommunity,
    };
    let options = SweepOptions {
        output_dir: args.output,
        repeats: args.repeats,
        parallelism: match args.threads {
            0 => Parallelism::Sequential,
            n => Parallelism::Pool(n),
        },
        skip_existing: args.skip_existing,
        delete_after_merge: args.delete_after_merge,
        fail_fast: args.fail_fast,
        generate_sample: args.sample,
        graph_policy,
        report_interval: args.report_interval,
        round_counts: args.round,
        seed,
    };

    let results = SweepOrchestrator::new(inputs, options)?.run()?;
    let mut failed = 0;
    for result in &results {
        failed += result.failures.len();
        tracing::info!(
            community = %result.community_data.name,
            leaves = result.results.leaf_count(),
            failures = result.failures.len(),
            "sweep finished"
        );
    }
    if failed > 0 {
        bail!("{failed} combinations failed; rerun with --skip-existing to retry them");
    }
    Ok(())
}

fn build_graphs(spec: &InputSpec, seed: u64, args: GraphArgs) -> Result<()> {
    let (communities, _, config) = load_model_inputs(spec)?;
    config.validate()?;
    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;

    for name in communities.names() {
        let population = communities.population(name)?;
        let mut rng = seeded(derive_seed(seed, &format!("{name}/graph")));
        let graph = GraphBuilder::new(&population, &config.graph_config).build(&mut rng)?;
        let path = persistence::graph_path(&args.output, name);
        persistence::save_graph_file(&path, &graph)
            .with_context(|| format!("saving graph {}", path.display()))?;
        tracing::info!(
            community = name,
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            path = %path.display(),
            "saved graph"
        );
    }
    Ok(())
}

// ── File helpers ────────────────────────────────────────────────────────

fn load_model_inputs(
    spec: &InputSpec,
) -> Result<(CommunityData, InfectionParameters, SimulationConfig)> {
    let communities = read_json(&spec.community_data_filename).with_context(|| {
        format!("reading community data {}", spec.community_data_filename.display())
    })?;
    let infection = read_json(&spec.infection_data_filename).with_context(|| {
        format!("reading infection data {}", spec.infection_data_filename.display())
    })?;
    let config = read_json(&spec.simulation_config_filename).with_context(|| {
        format!("reading simulation config {}", spec.simulation_config_filename.display())
    })?;
    Ok((communities, infection, config))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
