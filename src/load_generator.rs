use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::Instant;
use tracing::{error, info, info_span, warn, Instrument};

use crate::contract::Contract;
use crate::error::{BenchError, Result};
use crate::mock_data::{Row, RowGenerator};
use crate::target::BenchTarget;

// ─── Constants ───────────────────────────────────────────────────

/// Rows per insert-many while pre-filling tables.
pub const PROLOGUE_BATCH: usize = 50_000;

/// Rows kept around as select probes.
const PROBE_CACHE_ROWS: usize = 100;

/// The probe cache is rebuilt every this many iterations.
const PROBE_REFRESH_EVERY: u64 = 3;

/// Pause between iterations of one worker.
const ITERATION_PAUSE: Duration = Duration::from_millis(10);

// ─── Public types ────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Workload {
    pub contract: Arc<Contract>,
    /// Rows per insert-many in the measured phase
    pub sample_size: usize,
    /// Rows the prologue fills every table with
    pub table_size: usize,
    /// Benchmark loops per target
    pub workers: usize,
    pub prologue_batch: usize,
}

// ─── Phases ──────────────────────────────────────────────────────

/// Creates every table, then fills them all with the same rows in
/// `prologue_batch` chunks, one task per target per chunk. A failing chunk
/// still waits for the other targets' tasks before the error is returned.
pub async fn prologue(
    targets: &[Arc<BenchTarget>],
    workload: &Workload,
    running: &AtomicBool,
) -> Result<()> {
    for target in targets {
        target
            .setup()
            .instrument(info_span!("target", name = target.name()))
            .await?;
    }

    let mut generator = RowGenerator::new();
    let mut processed = 0;

    while processed < workload.table_size && running.load(Ordering::Relaxed) {
        let size = (workload.table_size - processed).min(workload.prologue_batch);
        let rows = Arc::new(generator.rows(&workload.contract, size));

        let handles: Vec<_> = targets
            .iter()
            .map(|target| {
                let target = target.clone();
                let rows = rows.clone();
                let span = info_span!("target", name = target.name());
                tokio::spawn(async move { target.insert_many(&rows).await }.instrument(span))
            })
            .collect();

        let mut first_error = None;
        for h in handles {
            let result = h.await.map_err(BenchError::from).and_then(|r| r);
            if let Err(e) = result {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        processed += size;
        info!(processed, total = workload.table_size, "prologue progress");
    }

    Ok(())
}

/// Runs `workers` loops per target until `running` is cleared or
/// `duration` elapses. Worker failures are logged, not propagated.
pub async fn middle(
    targets: &[Arc<BenchTarget>],
    workload: &Workload,
    running: Arc<AtomicBool>,
    duration: Option<Duration>,
) {
    let deadline = duration.map(|d| Instant::now() + d);

    let mut handles = Vec::with_capacity(targets.len() * workload.workers);
    for target in targets {
        for worker_id in 0..workload.workers {
            let target = target.clone();
            let workload = workload.clone();
            let running = running.clone();
            let span = info_span!("target", name = target.name(), worker_id);

            handles.push(tokio::spawn(
                async move { worker(&target, &workload, &running, deadline).await }.instrument(span),
            ));
        }
    }

    for h in handles {
        match h.await {
            Ok(Ok(iterations)) => info!(iterations, "worker finished"),
            Ok(Err(e)) => error!("worker stopped: {e}"),
            Err(e) => error!("worker panicked: {e}"),
        }
    }
}

/// Drops every table. Keeps going past failures so every target gets a
/// chance to clean up.
pub async fn epilogue(targets: &[Arc<BenchTarget>]) {
    for target in targets {
        if let Err(e) = target
            .teardown()
            .instrument(info_span!("target", name = target.name()))
            .await
        {
            warn!(target_name = target.name(), "teardown failed: {e}");
        }
    }
}

// ─── Worker loop ─────────────────────────────────────────────────

async fn worker(
    target: &BenchTarget,
    workload: &Workload,
    running: &AtomicBool,
    deadline: Option<Instant>,
) -> Result<u64> {
    let mut generator = RowGenerator::new();
    let mut rng = StdRng::from_entropy();
    let mut probes: Vec<Row> = Vec::new();
    let mut iteration = 0u64;

    while running.load(Ordering::Relaxed) && deadline.map_or(true, |d| Instant::now() < d) {
        let single = generator.row(&workload.contract);
        let batch = generator.rows(&workload.contract, workload.sample_size);

        if iteration % PROBE_REFRESH_EVERY == 0 {
            probes = batch.iter().take(PROBE_CACHE_ROWS).cloned().collect();
        }

        target.insert_many(&batch).await?;
        target.select(&probes[rng.gen_range(0..probes.len())]).await?;
        target.insert_one(&single).await?;

        tokio::time::sleep(ITERATION_PAUSE).await;
        iteration += 1;
    }

    Ok(iteration)
}
