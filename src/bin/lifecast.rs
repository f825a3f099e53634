//! lifecast command-line tool.
//!
//! - `simulate`: Monte Carlo forecast through the background lane
//! - `decide`: rank the action catalog for one or every policy mode
//! - `synthetic`: print generated history for demos
//! - `generate-config` / `validate-config`: TOML config helpers
//!
//! Inputs and outputs are JSON. Logging follows the `[logging]` config
//! section; `--log-level` and `RUST_LOG` override its filter.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use lifecast::forecast::config::{generate_config, load_config};
use lifecast::forecast::influence::WeightsSource;
use lifecast::forecast::infra::{init_logging, LogFormat};
use lifecast::forecast::metrics::{GoalWeights, MetricVector};
use lifecast::forecast::policy::{
    evaluate, evaluate_all_modes, ActionCatalog, AuditSink, JsonLinesAuditSink, PolicyDecision,
    PolicyMode, PolicyState,
};
use lifecast::forecast::simulation::{
    simulate_parallel, synthetic_history, LaneResult, Scenario, SimulationInput, SimulationLane,
};
use lifecast::ForecastConfig;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser)]
#[command(name = "lifecast")]
#[command(version, about = "Personal-state forecasting and decision engine", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "lifecast.toml", env = "LIFECAST_CONFIG")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Output format (pretty, json, compact)
    #[arg(long)]
    log_format: Option<String>,

    /// Influence weights (manual, learned, blend, blend:<share>); overrides the config
    #[arg(long)]
    weights_source: Option<WeightsSource>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a Monte Carlo forecast
    Simulate {
        /// JSON `SimulationInput`; synthetic history is used when omitted
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Scenario preset (sleep_crunch, financial_hit, burnout)
        #[arg(long)]
        scenario: Option<String>,
        /// Override horizon (days)
        #[arg(long)]
        horizon: Option<usize>,
        /// Override run count
        #[arg(long)]
        runs: Option<usize>,
        /// Override seed
        #[arg(long)]
        seed: Option<u32>,
        /// Run on the rayon pool instead of the background lane
        #[arg(long)]
        parallel: bool,
        /// Cancel the lane after this many seconds and report the partial result
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// Write the outcome here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Rank candidate actions
    Decide {
        /// JSON `{ snapshot, history, goal }`; synthetic history is used when omitted
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Single mode (risk, balanced, growth); every mode when omitted
        #[arg(long)]
        mode: Option<PolicyMode>,
        /// Append audit records to this JSON-lines file
        #[arg(long)]
        audit: Option<PathBuf>,
        /// Override seed
        #[arg(long)]
        seed: Option<u32>,
        /// Write decisions here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print generated daily history
    Synthetic {
        #[arg(long, default_value_t = 30)]
        days: usize,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Generate a sample config file
    GenerateConfig {
        /// Output file path
        #[arg(short, long, default_value = "lifecast.toml")]
        output: PathBuf,
    },
    /// Validate config without running
    ValidateConfig,
}

/// `decide` input file.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DecideInput {
    snapshot: MetricVector,
    #[serde(default)]
    history: Vec<MetricVector>,
    #[serde(default)]
    goal: Option<GoalWeights>,
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::GenerateConfig { output } => {
            generate_config(output)?;
            println!("Sample config written to: {}", output.display());
            return Ok(());
        }
        Commands::ValidateConfig => {
            let config = load_config(&cli.config)?;
            config.validate()?;
            println!("Configuration is valid:\n{:#?}", config);
            return Ok(());
        }
        _ => {}
    }

    let mut config = load_config(&cli.config)?;
    if let Some(source) = cli.weights_source {
        config.influence.weights_source = source;
    }
    config.validate()?;
    let _guards = setup_logging(&config, &cli)?;
    info!(weights_source = %config.influence.weights_source, "Configuration loaded");

    match cli.command {
        Commands::Simulate {
            input,
            scenario,
            horizon,
            runs,
            seed,
            parallel,
            timeout_secs,
            output,
        } => {
            let mut input = match input {
                Some(path) => read_json::<SimulationInput>(&path)?,
                None => synthetic_input(&config)?,
            };
            if cli.weights_source.is_some() {
                input.matrix = config.influence.active_matrix()?;
            }
            if let Some(name) = scenario {
                let preset = Scenario::preset(&name).ok_or_else(|| format!("unknown scenario: {name}"))?;
                input.scenario = Some(preset);
            }
            if let Some(h) = horizon {
                input.settings.horizon_days = h;
            }
            if let Some(r) = runs {
                input.settings.simulation_count = r;
            }
            if let Some(s) = seed {
                input.settings.seed = s;
            }
            run_simulation(input, parallel, timeout_secs, output.as_deref()).await?;
        }
        Commands::Decide {
            input,
            mode,
            audit,
            seed,
            output,
        } => {
            let input = match input {
                Some(path) => read_json::<DecideInput>(&path)?,
                None => {
                    let mut history = synthetic_history(30, u64::from(config.policy.seed));
                    let snapshot = history.pop().unwrap_or_default();
                    DecideInput {
                        snapshot,
                        history,
                        goal: None,
                    }
                }
            };
            let decisions = run_decide(&config, input, mode, seed)?;
            if let Some(path) = audit {
                let sink = JsonLinesAuditSink::new(path)?;
                for decision in &decisions {
                    sink.persist(&decision.audit).await?;
                }
                info!(sink = sink.sink_id(), records = decisions.len(), "Audit written");
            }
            write_json(&decisions, output.as_deref())?;
        }
        Commands::Synthetic { days, seed } => {
            write_json(&synthetic_history(days, seed), None)?;
        }
        Commands::GenerateConfig { .. } | Commands::ValidateConfig => {}
    }
    Ok(())
}

// ============================================================================
// Commands
// ============================================================================

fn synthetic_input(config: &ForecastConfig) -> Result<SimulationInput, Box<dyn std::error::Error>> {
    let mut history = synthetic_history(30, u64::from(config.simulation.seed));
    let base = history.pop().unwrap_or_default();
    Ok(SimulationInput::new(base)
        .with_history(history)
        .with_matrix(config.influence.active_matrix()?)
        .with_settings(config.simulation.clone()))
}

async fn run_simulation(
    input: SimulationInput,
    parallel: bool,
    timeout_secs: Option<u64>,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    if parallel {
        let outcome = tokio::task::spawn_blocking(move || simulate_parallel(&input)).await??;
        return write_json(&outcome, output);
    }

    let total = input.settings.simulation_count;
    let handle = SimulationLane::spawn(1, input);
    if let Some(secs) = timeout_secs {
        let flag = handle.cancel_flag();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            flag.cancel();
        });
    }

    let step = (total / 10).max(1);
    let result = handle
        .finish_with(|done, total| {
            if done % step == 0 || done == total {
                info!(done, total, "Simulation progress");
            }
        })
        .await?;

    let outcome = match result {
        LaneResult::Done(outcome) => outcome,
        LaneResult::Cancelled(partial) => {
            warn!(
                completed = partial.runs_completed,
                requested = partial.runs_requested,
                "Simulation cancelled; reporting partial result"
            );
            partial
        }
    };
    info!(
        p_ever_red = outcome.p_ever_red,
        p_threshold_crossed = outcome.p_threshold_crossed,
        collapse_es = outcome.tail.collapse.expected_shortfall,
        regime_now = outcome.regime_outlook.current.as_str(),
        regime_at_horizon = outcome.regime_outlook.most_likely.as_str(),
        "Simulation complete"
    );
    write_json(&outcome, output)
}

fn run_decide(
    config: &ForecastConfig,
    input: DecideInput,
    mode: Option<PolicyMode>,
    seed: Option<u32>,
) -> Result<Vec<PolicyDecision>, Box<dyn std::error::Error>> {
    let state = PolicyState::from_snapshot(input.snapshot, &input.history, input.goal.as_ref())
        .with_shock_budget(config.policy.shock_budget);
    let catalog = ActionCatalog::default();
    let mut options = config.evaluation_options()?;
    if let Some(goal) = input.goal {
        options = options.with_goal(goal);
    }
    if let Some(s) = seed {
        options = options.with_seed(s);
    }

    let constraints = &config.policy.constraints;
    let decisions = match mode {
        Some(mode) => vec![evaluate(&state, &catalog, constraints, mode, &options)?],
        None => evaluate_all_modes(&state, &catalog, constraints, &options)?,
    };
    for decision in &decisions {
        info!(
            mode = %decision.mode,
            best = %decision.best().action_id,
            fallback = decision.fallback,
            "Decision"
        );
    }
    Ok(decisions)
}

// ============================================================================
// Helpers
// ============================================================================

fn setup_logging(
    config: &ForecastConfig,
    cli: &Cli,
) -> Result<Vec<tracing_appender::non_blocking::WorkerGuard>, Box<dyn std::error::Error>> {
    let mut log_config = config.logging.clone();
    if let Some(format) = cli.log_format.as_deref() {
        log_config.stdout_format = match format {
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            "pretty" => LogFormat::Pretty,
            other => return Err(format!("unknown log format: {other}").into()),
        };
    }
    Ok(init_logging(&log_config, cli.log_level.as_deref())?)
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            std::fs::write(path, json)?;
            info!(path = %path.display(), "Output written");
        }
        None => println!("{json}"),
    }
    Ok(())
}
