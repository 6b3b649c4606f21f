//! ns-post - postprocessing for diffusive nested-sampling runs
//!
//! Reads the level and particle records a sampler left in a run directory and
//! produces:
//! - the log-evidence and information estimates
//! - an equally-weighted posterior sample
//! - per-particle and per-level diagnostics

use clap::{Args, Parser, Subcommand, ValueEnum};
use ns_common::Error;
use ns_config::{load_config, validate_config, AbcConfig, ConfigSnapshot, PostprocessConfig};
use ns_core::evidence::{EstimatorOptions, EvidenceEstimator};
use ns_core::exit_codes::ExitCode;
use ns_core::logging::{
    event_names, generate_run_id, init_logging, LogConfig, LogFormat, LogLevel, Stage,
};
use ns_core::postprocess::postprocess_run_dir;
use ns_core::report::{render_levels, render_summary};
use ns_core::store::JsonlStore;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Evidence estimation and posterior resampling for nested-sampling runs
#[derive(Parser)]
#[command(name = "ns-post")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Path to postprocess.json (overrides NS_POST_CONFIG and XDG lookup)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Format of results printed to stdout
    #[arg(long, short = 'f', global = true, value_enum, default_value_t = OutputFormat::Human)]
    format: OutputFormat,

    /// Log level for stderr (overrides NS_LOG / RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    /// Log format for stderr (overrides NS_LOG_FORMAT)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Human,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate the evidence, resample the posterior and write all outputs
    Run(RunArgs),

    /// Estimate the evidence only; nothing is written
    Evidence(EstimateArgs),

    /// Show per-level compression and acceptance diagnostics
    Levels(LevelsArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    estimate: EstimateArgs,

    /// Directory for posterior, results and diagnostics (default: the run directory)
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Seed for the resampling random stream
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args, Debug)]
struct EstimateArgs {
    /// Directory holding levels.jsonl, particle_counts.jsonl and particles.jsonl
    #[arg(long)]
    run_dir: PathBuf,

    /// Divide log-likelihoods by this temperature
    #[arg(long)]
    temperature: Option<f64>,

    /// Enable ABC mode, rejecting this fraction of particles
    #[arg(long)]
    abc_fraction: Option<f64>,
}

#[derive(Args, Debug)]
struct LevelsArgs {
    /// Directory holding the sampler's records
    #[arg(long)]
    run_dir: PathBuf,
}

/// Failure of a command, ready to report.
enum Failure {
    Config(String),
    Run(Error),
}

impl From<Error> for Failure {
    fn from(err: Error) -> Self {
        Failure::Run(err)
    }
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() {
                ExitCode::ArgsError.as_i32()
            } else {
                ExitCode::Clean.as_i32()
            };
            let _ = err.print();
            std::process::exit(code);
        }
    };

    let cli_level = if cli.global.quiet {
        Some(LogLevel::Error)
    } else {
        match cli.global.verbose {
            0 => cli.global.log_level,
            1 => Some(cli.global.log_level.unwrap_or_default().louder()),
            _ => Some(LogLevel::Trace),
        }
    };
    let log_config = LogConfig::from_env(cli_level, cli.global.log_format);
    init_logging(&log_config);

    let run_id = generate_run_id();
    let span = tracing::info_span!("ns_post", run_id = %run_id);
    let _enter = span.enter();
    tracing::debug!(event = event_names::RUN_STARTED, stage = %Stage::Init, "starting");

    let result = match &cli.command {
        Commands::Run(args) => run_full(&cli.global, args),
        Commands::Evidence(args) => run_evidence(&cli.global, args),
        Commands::Levels(args) => run_levels(&cli.global, args),
    };

    let exit_code = match result {
        Ok(()) => {
            tracing::debug!(event = event_names::RUN_FINISHED, "finished");
            ExitCode::Clean
        }
        Err(failure) => report_failure(&cli.global, failure),
    };
    std::process::exit(exit_code.as_i32());
}

/// Load settings and apply command-line overrides.
fn settings(
    global: &GlobalOpts,
    args: &EstimateArgs,
    seed: Option<u64>,
) -> Result<(PostprocessConfig, ConfigSnapshot), Failure> {
    let (mut config, snapshot) =
        load_config(global.config.as_deref()).map_err(|e| Failure::Config(e.to_string()))?;
    match &snapshot.path {
        Some(path) => tracing::info!(
            event = event_names::CONFIG_LOADED,
            path = %path,
            source = %snapshot.source,
            hash = snapshot.short_id(),
            "configuration loaded"
        ),
        None => tracing::debug!(
            event = event_names::CONFIG_DEFAULT_USED,
            "using built-in defaults"
        ),
    }

    if let Some(seed) = seed {
        config.seed = seed;
    }
    if let Some(temperature) = args.temperature {
        config.temperature = temperature;
    }
    if let Some(fraction) = args.abc_fraction {
        config.abc = Some(AbcConfig { fraction });
    }
    validate_config(&config).map_err(|e| Failure::Config(e.to_string()))?;
    Ok((config, snapshot))
}

fn run_full(global: &GlobalOpts, args: &RunArgs) -> Result<(), Failure> {
    let (config, snapshot) = settings(global, &args.estimate, args.seed)?;
    let out_dir = args
        .out_dir
        .clone()
        .unwrap_or_else(|| args.estimate.run_dir.clone());

    let (outcome, paths) =
        postprocess_run_dir(&config, &snapshot, &args.estimate.run_dir, &out_dir)?;

    match global.format {
        OutputFormat::Human => {
            print!("{}", render_summary(&outcome.estimate, Some(&outcome.draw)));
            println!("Posterior    -> {}", paths.posterior.display());
            println!("Results      -> {}", paths.results.display());
        }
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct RunOutput<'a> {
                results: &'a ns_core::report::RunResults,
                outputs: &'a ns_core::report::OutputPaths,
            }
            print_json(&RunOutput {
                results: &outcome.results,
                outputs: &paths,
            })?;
        }
    }
    Ok(())
}

fn run_evidence(global: &GlobalOpts, args: &EstimateArgs) -> Result<(), Failure> {
    let (config, _) = settings(global, args, None)?;
    let estimate = estimate(&args.run_dir, EstimatorOptions::from(&config))?;

    match global.format {
        OutputFormat::Human => print!("{}", render_summary(&estimate, None)),
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct EvidenceOutput {
                #[serde(with = "ns_common::serde_ext::log_value")]
                log_evidence: f64,
                information: f64,
                particles_included: usize,
                full_records: usize,
                particles_excluded: u64,
                levels_used: u32,
            }
            print_json(&EvidenceOutput {
                log_evidence: estimate.log_evidence,
                information: estimate.information,
                particles_included: estimate.particles.len(),
                full_records: estimate.full_record_particles().count(),
                particles_excluded: estimate.excluded,
                levels_used: estimate.levels_used,
            })?;
        }
    }
    Ok(())
}

fn run_levels(global: &GlobalOpts, args: &LevelsArgs) -> Result<(), Failure> {
    let (config, _) = load_config(global.config.as_deref())
        .map_err(|e| Failure::Config(e.to_string()))?;
    let store = JsonlStore::open(&args.run_dir)?;
    let levels = EvidenceEstimator::new(EstimatorOptions::from(&config)).level_summaries(&store)?;

    match global.format {
        OutputFormat::Human => print!("{}", render_levels(&levels)),
        OutputFormat::Json => print_json(&levels)?,
    }
    Ok(())
}

fn estimate(
    run_dir: &Path,
    options: EstimatorOptions,
) -> Result<ns_core::EvidenceEstimate, Failure> {
    let store = JsonlStore::open(run_dir)?;
    Ok(EvidenceEstimator::new(options).estimate(&store)?)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), Failure> {
    let text = serde_json::to_string_pretty(value).map_err(Error::from)?;
    println!("{}", text);
    Ok(())
}

fn report_failure(global: &GlobalOpts, failure: Failure) -> ExitCode {
    let (code, headline, message, hint, location) = match &failure {
        Failure::Config(message) => (
            ExitCode::ConfigError,
            "Configuration Error",
            message.clone(),
            "Check postprocess.json and the command-line overrides.",
            None,
        ),
        Failure::Run(err) => (
            ExitCode::from(err),
            err.headline(),
            err.to_string(),
            err.remediation(),
            err.location(),
        ),
    };
    tracing::error!(
        event = event_names::RUN_FAILED,
        code = code.as_i32(),
        "{}",
        message
    );

    match global.format {
        OutputFormat::Human => {
            eprintln!("error: {}: {}", headline, message);
            eprintln!("  hint: {}", hint);
        }
        OutputFormat::Json => {
            let body = serde_json::json!({
                "error": {
                    "code": code.code_name(),
                    "exit_code": code.as_i32(),
                    "headline": headline,
                    "message": message,
                    "location": location,
                    "hint": hint,
                }
            });
            println!("{}", body);
        }
    }
    code
}
