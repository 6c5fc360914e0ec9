//! Command-line driver for the reference scenarios.
//!
//! ```bash
//! slatesim --scenario personas --rounds 10000 --seed 0
//! slatesim --scenario parametric-slate --service thompson --step 0.5
//! slatesim --scenario empirical-combo --data obs-a.csv --data obs-b.csv
//! slatesim --average obs-a.csv obs-b.csv > averaged.csv
//! slatesim --generate 5 --noise 0.05 --seed 1 > obs.csv
//! ```
//!
//! Progress goes to stderr through `tracing`; the final summary goes to stdout.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use slatesim::{
    write_records, EvalConfig, GenerateConfig, ObservationGenerator, ParametricConfig,
    ParametricOracle, RewardTable, SamplePolicy, Scenario, ScenarioConfig, ServiceKind, Sign,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ScenarioArg {
    Personas,
    ParametricSlate,
    EmpiricalSlate,
    EmpiricalCombo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PolicyArg {
    First,
    Mean,
}

#[derive(Parser, Debug)]
#[command(name = "slatesim")]
#[command(about = "Run a reward simulation against an in-process decision service")]
struct Cli {
    /// Scenario to run.
    #[arg(long, value_enum, env = "SLATESIM_SCENARIO", default_value = "personas")]
    scenario: ScenarioArg,

    /// Number of rounds.
    #[arg(long, env = "SLATESIM_ROUNDS", default_value_t = 10_000)]
    rounds: u64,

    /// Root RNG seed.
    #[arg(long, env = "SLATESIM_SEED", default_value_t = 0)]
    seed: u64,

    /// Log a progress line every N rounds (0 disables).
    #[arg(long, env = "SLATESIM_PROGRESS_EVERY", default_value_t = 500)]
    progress_every: u64,

    /// Grid step for the parametric slate.
    #[arg(long, env = "SLATESIM_STEP", default_value_t = 1.0)]
    step: f64,

    /// Report raw cost instead of negated cost in the parametric slate.
    #[arg(long)]
    cost: bool,

    /// Observation files for the empirical scenarios (merged in order).
    #[arg(long = "data", env = "SLATESIM_DATA")]
    data: Vec<PathBuf>,

    /// How repeated observations collapse during lookup.
    #[arg(long, value_enum, env = "SLATESIM_POLICY", default_value = "first")]
    policy: PolicyArg,

    /// In-process decision service (uniform|thompson).
    #[arg(long, env = "SLATESIM_SERVICE", default_value = "uniform")]
    service: ServiceKind,

    /// Write the per-key mean of these observation files to stdout and exit.
    #[arg(long, num_args = 1.., value_name = "PATH")]
    average: Vec<PathBuf>,

    /// Write N noisy observations per parametric grid point to stdout and exit.
    #[arg(long, value_name = "N")]
    generate: Option<usize>,

    /// Noise standard deviation for --generate.
    #[arg(long, env = "SLATESIM_NOISE", default_value_t = 0.05)]
    noise: f64,

    /// Log filter when RUST_LOG is unset (e.g. info, debug, slatesim=trace).
    #[arg(long, env = "SLATESIM_LOG", default_value = "info")]
    log_level: String,
}

fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(false),
        )
        .with(filter)
        .init();
}

fn load(paths: &[PathBuf]) -> Result<RewardTable> {
    if paths.is_empty() {
        bail!("empirical scenarios need at least one --data file");
    }
    let table = RewardTable::load_paths(paths).context("failed to load observation data")?;
    info!(
        files = paths.len(),
        keys = table.len(),
        samples = table.sample_count(),
        "observation data loaded"
    );
    Ok(table)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    if !cli.average.is_empty() {
        let table = load(&cli.average)?;
        let stdout = io::stdout();
        let mut out = stdout.lock();
        table
            .averaged()
            .write_averaged(&mut out)
            .context("failed to write averaged table")?;
        out.flush()?;
        return Ok(());
    }

    if let Some(samples_per_point) = cli.generate {
        let oracle = ParametricOracle::reference(ParametricConfig::default())?;
        let cfg = GenerateConfig {
            samples_per_point,
            noise_sd: cli.noise,
            step: cli.step,
        };
        let records = ObservationGenerator::with_seed(oracle, cfg, cli.seed)?.generate();
        info!(records = records.len(), seed = cli.seed, "observation records generated");
        let stdout = io::stdout();
        let mut out = stdout.lock();
        write_records(&records, &mut out).context("failed to write observation records")?;
        out.flush()?;
        return Ok(());
    }

    let scenario = match cli.scenario {
        ScenarioArg::Personas => Scenario::Personas,
        ScenarioArg::ParametricSlate => Scenario::ParametricSlate,
        ScenarioArg::EmpiricalSlate => Scenario::EmpiricalSlate(load(&cli.data)?),
        ScenarioArg::EmpiricalCombo => Scenario::EmpiricalCombo(load(&cli.data)?),
    };

    let cfg = ScenarioConfig {
        eval: EvalConfig {
            rounds: cli.rounds,
            progress_every: cli.progress_every,
        },
        seed: cli.seed,
        step: cli.step,
        sign: if cli.cost { Sign::Cost } else { Sign::Reward },
        policy: match cli.policy {
            PolicyArg::First => SamplePolicy::First,
            PolicyArg::Mean => SamplePolicy::Mean,
        },
        service: cli.service,
        ..ScenarioConfig::default()
    };

    let name = scenario.to_string();
    let report = scenario
        .run(&cfg)
        .with_context(|| format!("{name} run failed"))?;

    for (context, row) in report.regret.rows() {
        info!(
            context = %context,
            n = row.n,
            optimal = row.optimal,
            avg_reward = row.average_reward(),
            avg_regret = row.average_regret(),
            "regret"
        );
    }
    println!("{}", report.summary);
    Ok(())
}
