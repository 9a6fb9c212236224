use hdrhistogram::Histogram;
use parking_lot::Mutex;
use serde::Serialize;

use super::{BatchSink, OperationKind, SampleBatch};

// ─── Configuration ───────────────────────────────────────────────

/// HdrHistogram range: 1 ms → u16::MAX ms, 3 significant figures.
/// Zero-millisecond samples are clamped up to 1 before recording.
const HIST_LOW: u64 = 1;
const HIST_HIGH: u64 = u16::MAX as u64;
const HIST_SIGFIG: u8 = 3;

// ─── Public types ────────────────────────────────────────────────

/// A complete percentile breakdown for one operation kind (milliseconds).
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PercentileSet {
    pub min: u64,
    pub max: u64,
    pub mean: f64,
    pub p50: u64,
    pub p95: u64,
    pub p99: u64,
    pub p999: u64,
    pub count: u64,
}

impl PercentileSet {
    /// Extract a full percentile set from an HdrHistogram.
    /// Returns zeroed values if the histogram is empty.
    pub fn from_histogram(hist: &Histogram<u64>) -> Self {
        if hist.len() == 0 {
            return Self::empty();
        }

        Self {
            min: hist.min(),
            max: hist.max(),
            mean: hist.mean(),
            p50: hist.value_at_percentile(50.0),
            p95: hist.value_at_percentile(95.0),
            p99: hist.value_at_percentile(99.0),
            p999: hist.value_at_percentile(99.9),
            count: hist.len(),
        }
    }

    /// All-zero placeholder used before any samples are recorded.
    pub fn empty() -> Self {
        Self {
            min: 0,
            max: 0,
            mean: 0.0,
            p50: 0,
            p95: 0,
            p99: 0,
            p999: 0,
            count: 0,
        }
    }

    pub fn has_data(&self) -> bool {
        self.count > 0
    }
}

/// Batch sink that keeps one histogram per operation kind for the
/// end-of-run report.
pub struct LatencySummary {
    hists: Mutex<Vec<Histogram<u64>>>,
}

impl LatencySummary {
    pub fn new() -> Self {
        let hists = OperationKind::ALL
            .iter()
            .map(|_| {
                Histogram::<u64>::new_with_bounds(HIST_LOW, HIST_HIGH, HIST_SIGFIG)
                    .expect("static histogram bounds are valid")
            })
            .collect();
        Self {
            hists: Mutex::new(hists),
        }
    }

    pub fn snapshot(&self) -> Vec<(OperationKind, PercentileSet)> {
        let hists = self.hists.lock();
        OperationKind::ALL
            .iter()
            .map(|&kind| (kind, PercentileSet::from_histogram(&hists[kind.index()])))
            .collect()
    }
}

impl Default for LatencySummary {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchSink for LatencySummary {
    fn on_batch(&self, batch: &SampleBatch) {
        let mut hists = self.hists.lock();
        let hist = &mut hists[batch.kind.index()];
        for &ms in &batch.values {
            // In range by construction; saturate rather than fail anyway.
            hist.saturating_record(u64::from(ms).max(HIST_LOW));
        }
    }
}
