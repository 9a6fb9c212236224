use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::trace;

use super::timing::TimingScope;
use super::writer::MultiplexedWriter;
use super::{clamp_millis, duration_to_millis, BatchSink, OperationKind, SampleBatch};
use crate::error::{BenchError, Result};

// ─── Configuration ───────────────────────────────────────────────

/// Samples per emitted batch unless configured otherwise.
pub const DEFAULT_CAPACITY: usize = 32;

// ─── Public types ────────────────────────────────────────────────

/// Per-kind ring buffers of latency samples.
///
/// Producers call `record()` (usually through a [`TimingScope`]); every
/// `capacity` samples of one kind are handed to the sinks as a batch.
/// Nothing ever blocks producers beyond the ring's own lock: a full ring
/// is emitted and reused, never waited on.
pub struct Sampler {
    capacity: usize,
    rings: Vec<Mutex<Ring>>,
    sinks: Vec<Arc<dyn BatchSink>>,
    finished: bool,
}

// ─── Internal state ──────────────────────────────────────────────

struct Ring {
    values: Box<[u16]>,
    cursor: usize,
}

impl Ring {
    fn new(capacity: usize) -> Self {
        Self {
            values: vec![0; capacity].into_boxed_slice(),
            cursor: 0,
        }
    }

    /// Writes one sample; returns the full contents when this write filled
    /// the ring, after which the cursor is back at 0.
    fn push(&mut self, value: u16) -> Option<Vec<u16>> {
        self.values[self.cursor] = value;
        self.cursor += 1;

        if self.cursor == self.values.len() {
            self.cursor = 0;
            Some(self.values.to_vec())
        } else {
            None
        }
    }

    fn take_written(&mut self) -> Vec<u16> {
        let written = self.values[..self.cursor].to_vec();
        self.cursor = 0;
        written
    }
}

// ─── Sampler impl ────────────────────────────────────────────────

impl Sampler {
    pub fn new(capacity: usize, sinks: Vec<Arc<dyn BatchSink>>) -> Result<Self> {
        if capacity == 0 {
            return Err(BenchError::InvalidCapacity);
        }

        Ok(Self {
            capacity,
            rings: OperationKind::ALL
                .iter()
                .map(|_| Mutex::new(Ring::new(capacity)))
                .collect(),
            sinks,
            finished: false,
        })
    }

    /// Sampler whose batches land in `writer` (lane = kind index) and in
    /// any `extra` sinks.
    pub fn with_writer(
        capacity: usize,
        writer: Arc<MultiplexedWriter>,
        extra: Vec<Arc<dyn BatchSink>>,
    ) -> Result<Self> {
        if writer.lane_count() != OperationKind::ALL.len() {
            return Err(BenchError::LaneCountMismatch {
                expected: OperationKind::ALL.len(),
                actual: writer.lane_count(),
            });
        }

        let mut sinks: Vec<Arc<dyn BatchSink>> = Vec::with_capacity(extra.len() + 1);
        sinks.push(writer);
        sinks.extend(extra);
        Self::new(capacity, sinks)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn record(&self, kind: OperationKind, elapsed: Duration) {
        self.push(kind, duration_to_millis(elapsed));
    }

    pub fn record_millis(&self, kind: OperationKind, millis: u64) {
        self.push(kind, clamp_millis(millis));
    }

    /// Starts timing one operation; the sample is recorded when the scope
    /// is dropped.
    pub fn begin(&self, kind: OperationKind) -> TimingScope<'_> {
        TimingScope::new(self, kind)
    }

    /// Awaits `fut` inside a timing scope. The duration is recorded even if
    /// the returned future is dropped before completion.
    pub async fn timed<F: Future>(&self, kind: OperationKind, fut: F) -> F::Output {
        let _scope = self.begin(kind);
        fut.await
    }

    /// Emits every ring's written prefix as a final (possibly short or
    /// empty) batch.
    pub fn finish(mut self) {
        self.emit_remainders();
    }

    pub(super) fn push(&self, kind: OperationKind, value: u16) {
        let mut ring = self.rings[kind.index()].lock();
        if let Some(values) = ring.push(value) {
            trace!(%kind, len = values.len(), "ring full, emitting batch");
            // Still under the ring lock so batches of one kind stay ordered.
            self.emit(SampleBatch { kind, values });
        }
    }

    fn emit(&self, batch: SampleBatch) {
        for sink in &self.sinks {
            sink.on_batch(&batch);
        }
    }

    fn emit_remainders(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;

        for kind in OperationKind::ALL {
            let values = self.rings[kind.index()].lock().take_written();
            self.emit(SampleBatch { kind, values });
        }
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        self.emit_remainders();
    }
}
