use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;
mod contract;
mod database;
mod error;
mod load_generator;
mod metrics;
mod mock_data;
mod plot;
mod target;

use config::BenchConfig;
use contract::Contract;
use database::SimulatedDatabase;
use load_generator::Workload;
use metrics::WriterOptions;
use target::{BenchTarget, TargetReport};

const LOG_FILE: &str = "benchmark.log";

/// Databases query time benchmark.
///
/// Without any phase flag every phase runs.
#[derive(Parser, Debug)]
#[command(name = "db-latency-bench", version)]
struct Cli {
    /// Settings file
    #[arg(long, short, env = "BENCH_CONFIG", default_value = "appsettings.json")]
    config: PathBuf,

    /// Run prologue, middle and epilogue
    #[arg(long)]
    all: bool,

    /// Create and pre-fill the tables
    #[arg(long, short = 'p')]
    with_prologue: bool,

    /// Run the measured insert/select loop
    #[arg(long, short = 'm')]
    with_middle: bool,

    /// Drop the tables afterwards
    #[arg(long, short = 'e')]
    with_epilogue: bool,

    /// Stop the measured loop after this many seconds (default: Ctrl-C)
    #[arg(long, value_parser = parse_seconds)]
    duration: Option<Duration>,

    /// Do not launch gnuplot at the end
    #[arg(long)]
    no_plot: bool,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(long, short)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy)]
struct Phases {
    prologue: bool,
    middle: bool,
    epilogue: bool,
}

impl Cli {
    fn phases(&self) -> Phases {
        let any = self.with_prologue || self.with_middle || self.with_epilogue;
        if self.all || !any {
            return Phases {
                prologue: true,
                middle: true,
                epilogue: true,
            };
        }
        Phases {
            prologue: self.with_prologue,
            middle: self.with_middle,
            epilogue: self.with_epilogue,
        }
    }
}

fn parse_seconds(s: &str) -> std::result::Result<Duration, std::num::ParseIntError> {
    Ok(Duration::from_secs(s.parse()?))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = BenchConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    init_logging(&config.output_dir, cli.verbose)?;

    let contract = Contract::load(&config.contract)
        .with_context(|| format!("loading contract {}", config.contract.display()))?;
    let phases = cli.phases();
    info!(
        databases = config.databases.len(),
        columns = contract.len(),
        ?phases,
        "starting benchmark"
    );

    // ── Ctrl-C stops the phases, never the shutdown ─────────────
    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, finishing up");
                running.store(false, Ordering::SeqCst);
            }
        });
    }

    let targets = build_targets(&config)?;
    let workload = Workload {
        contract: Arc::new(contract),
        sample_size: config.sample_size,
        table_size: config.table_size,
        workers: config.workers,
        prologue_batch: load_generator::PROLOGUE_BATCH,
    };

    let outcome = run_phases(&targets, &workload, phases, running, cli.duration).await;
    let reports = shutdown(targets).await?;
    outcome?;

    print_reports(&reports);

    if !cli.no_plot {
        open_plots(&config, &reports);
    }
    Ok(())
}

fn init_logging(output_dir: &Path, verbose: bool) -> Result<()> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;
    let log_file = File::create(output_dir.join(LOG_FILE))?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(log_file)),
        )
        .try_init()
        .map_err(|e| anyhow!("failed to initialize logging: {e}"))
}

fn build_targets(config: &BenchConfig) -> Result<Vec<Arc<BenchTarget>>> {
    config
        .databases
        .iter()
        .map(|db| {
            let mut options = WriterOptions::new(&config.output_dir, "", 0);
            options.threshold_bytes = config.writer.threshold_bytes;
            options.flush_interval = config.writer.flush_interval();

            let database = Box::new(SimulatedDatabase::new(db.clone()));
            let target = BenchTarget::new(database, config.sampler_capacity, options)
                .with_context(|| format!("preparing {}", db.name))?;
            Ok(Arc::new(target))
        })
        .collect()
}

async fn run_phases(
    targets: &[Arc<BenchTarget>],
    workload: &Workload,
    phases: Phases,
    running: Arc<AtomicBool>,
    duration: Option<Duration>,
) -> Result<()> {
    if phases.prologue {
        info!("prologue");
        if let Err(e) = load_generator::prologue(targets, workload, &running).await {
            load_generator::epilogue(targets).await;
            return Err(e).context("prologue failed");
        }
    }

    if phases.middle {
        info!(?duration, "middle");
        load_generator::middle(targets, workload, running, duration).await;
    }

    if phases.epilogue {
        info!("epilogue");
        load_generator::epilogue(targets).await;
    }
    Ok(())
}

/// Flushes every target, even when an earlier one fails.
async fn shutdown(targets: Vec<Arc<BenchTarget>>) -> Result<Vec<TargetReport>> {
    let mut reports = Vec::with_capacity(targets.len());
    let mut first_error = None;

    for target in targets {
        let result = match Arc::try_unwrap(target) {
            Ok(target) => {
                let name = target.name().to_owned();
                target
                    .shutdown()
                    .await
                    .map_err(|e| anyhow!(e).context(format!("closing {name}")))
            }
            Err(shared) => Err(anyhow!("target {} is still in use", shared.name())),
        };
        match result {
            Ok(report) => reports.push(report),
            Err(e) => {
                warn!("shutdown failed: {e:#}");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(reports),
    }
}

fn print_reports(reports: &[TargetReport]) {
    println!();
    for report in reports {
        println!("── {} → {}", report.name, report.data_path.display());
        println!(
            "   {:<12} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8}",
            "operation", "count", "min", "p50", "p95", "p99", "max"
        );
        for (kind, set) in &report.latencies {
            if !set.has_data() {
                continue;
            }
            println!(
                "   {:<12} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8}",
                kind.as_str(),
                set.count,
                set.min,
                set.p50,
                set.p95,
                set.p99,
                set.max
            );
        }
    }
    println!();
}

fn open_plots(config: &BenchConfig, reports: &[TargetReport]) {
    let gnuplot = match plot::GnuPlot::new(&config.plot.gnuplot, &config.plot.template) {
        Ok(gnuplot) => gnuplot,
        Err(e) => {
            warn!("not plotting: {e}");
            return;
        }
    };

    for report in reports {
        if let Err(e) = gnuplot.open(&report.data_path, &report.name) {
            warn!(target_name = %report.name, "cannot launch gnuplot: {e}");
        }
    }
}
