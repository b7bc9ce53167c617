//! Demo and calibration harness for the adaptive execution engine.
//!
//! Registers three simulated operations whose gears carry distinct latency
//! profiles (one favours the device gears, one the threaded CPU family,
//! one is flat), then runs repeated workflow iterations and reports how
//! the selection distribution tracked the observed timings. Learned
//! statistics can be persisted between runs with `--stats-file`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use ndarray::ArrayD;
use rand::Rng;
use tracing::{Level, info};

use gearbox_engine::{AdaptiveDispatcher, StatisticsStore, StoreSnapshot, WorkflowEngine};
use gearbox_registry::{OperationBinding, Registry};
use gearbox_types::{Argument, Gear, KwArgs, OpValue, WorkflowStep};

#[derive(Parser)]
#[command(name = "gearbox", about = "Adaptive gear-selection demo and calibration harness")]
struct Cli {
    /// Number of workflow iterations to run.
    #[arg(long, default_value_t = 60)]
    iterations: usize,

    /// Seed for the gear-selection RNG; omit for an OS seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Force every step onto one gear, e.g. "open_cl1" or "interpreted".
    #[arg(long)]
    force_gear: Option<String>,

    /// JSON file to load learned timing statistics from and save them to.
    #[arg(long)]
    stats_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let forced_gear = cli
        .force_gear
        .as_deref()
        .map(Gear::from_str)
        .transpose()
        .context("unrecognized --force-gear value")?;

    let store = StatisticsStore::new();
    if let Some(path) = &cli.stats_file
        && path.exists()
    {
        let content = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        let snapshot: StoreSnapshot = serde_json::from_str(&content).context("failed to parse statistics snapshot")?;
        store.restore(&snapshot);
        info!(path = %path.display(), "restored learned statistics");
    }

    let registry = Arc::new(build_simulated_registry()?);
    let dispatcher = match cli.seed {
        Some(seed) => AdaptiveDispatcher::with_seed(Arc::clone(&registry), store.clone(), seed),
        None => AdaptiveDispatcher::new(Arc::clone(&registry), store.clone()),
    };
    let mut engine = WorkflowEngine::new(dispatcher);

    let steps = demo_steps();
    let mut selections: HashMap<(String, Gear), usize> = HashMap::new();

    info!(iterations = cli.iterations, "starting adaptive workflow run");
    for iteration in 0..cli.iterations {
        let result = engine
            .calculate(&steps, forced_gear)
            .with_context(|| format!("workflow iteration {iteration} failed"))?;
        for record in result.records() {
            *selections.entry((record.operation.clone(), record.gear)).or_default() += 1;
        }
    }

    print_summary(&store, &selections);

    if let Some(path) = &cli.stats_file {
        let snapshot = store.export();
        let content = serde_json::to_string_pretty(&snapshot).context("failed to encode statistics snapshot")?;
        std::fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), "saved learned statistics");
    }

    Ok(())
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .try_init();
}

/// The demo pipeline: magnify a frame, rotate the magnified frame, then
/// align its channels. Later steps consume earlier outputs by reference.
fn demo_steps() -> Vec<WorkflowStep> {
    let frame = ArrayD::<f32>::zeros(vec![32, 32]);
    vec![
        WorkflowStep::new("shift_magnify")
            .arg(Argument::literal(frame))
            .kwarg("magnification", Argument::literal(2i64)),
        WorkflowStep::new("rotate")
            .arg(Argument::reference(0, 0))
            .kwarg("angle", Argument::literal(1.5707)),
        WorkflowStep::new("register_channels").arg(Argument::reference(1, 0)),
    ]
}

/// Builds the simulated operation registry.
///
/// Latency profiles are in milliseconds per gear, in catalog order. The
/// first operation favours the device gears, the second the threaded CPU
/// family, and the third is flat apart from the interpreted fallback.
fn build_simulated_registry() -> Result<Registry> {
    let mut registry = Registry::new();
    register_simulated(
        &mut registry,
        "shift_magnify",
        [1.0, 1.5, 2.0, 2.1, 2.2, 2.1, 2.3, 10.0],
    )?;
    register_simulated(&mut registry, "rotate", [2.0, 2.5, 1.0, 1.1, 1.0, 1.1, 1.3, 5.0])?;
    register_simulated(&mut registry, "register_channels", [1.0, 1.0, 1.0, 1.0, 1.0, 1.1, 1.0, 2.5])?;
    Ok(registry)
}

fn register_simulated(registry: &mut Registry, operation: &str, base_ms: [f64; 8]) -> Result<()> {
    let mut binding = OperationBinding::new(operation);
    for (gear, base) in Gear::ALL.into_iter().zip(base_ms) {
        binding = binding.gear(gear, simulated_kernel(base));
    }
    registry
        .register(binding)
        .with_context(|| format!("failed to register simulated operation '{operation}'"))
}

/// A kernel that models one gear: it sleeps for the gear's base latency
/// with a ±10% jitter and passes its first argument through so workflow
/// references stay meaningful.
fn simulated_kernel(base_ms: f64) -> impl Fn(&[OpValue], &KwArgs) -> Result<Vec<OpValue>> {
    move |args, _kwargs| {
        let jitter = (rand::rng().random::<f64>() - 0.5) * 0.2;
        thread::sleep(Duration::from_secs_f64(base_ms * (1.0 + jitter) / 1e3));
        let output = args.first().cloned().unwrap_or(OpValue::Bool(true));
        Ok(vec![output])
    }
}

fn print_summary(store: &StatisticsStore, selections: &HashMap<(String, Gear), usize>) {
    let snapshot = store.export();
    for (operation, timings) in &snapshot.operations {
        println!("\n{operation}");
        println!("  {:<18} {:>6} {:>12} {:>12}", "gear", "runs", "mean (ms)", "std (ms)");
        for (gear, timing) in timings {
            let runs = selections.get(&(operation.clone(), *gear)).copied().unwrap_or(0);
            println!(
                "  {:<18} {:>6} {:>12.3} {:>12.3}",
                gear.to_string(),
                runs,
                timing.mean_time * 1e3,
                timing.std_time * 1e3,
            );
        }
    }
}
