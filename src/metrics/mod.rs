pub mod lane;
pub mod percentiles;
pub mod sampler;
pub mod timing;
pub mod writer;

use std::fmt;
use std::time::Duration;

pub use percentiles::{LatencySummary, PercentileSet};
pub use sampler::Sampler;
pub use writer::{MultiplexedWriter, WriterOptions};

/// The category of database action being timed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperationKind {
    Select,
    InsertOne,
    InsertMany,
}

impl OperationKind {
    pub const ALL: [OperationKind; 3] = [
        OperationKind::Select,
        OperationKind::InsertOne,
        OperationKind::InsertMany,
    ];

    /// Stable position of the kind; also the lane it is written to.
    pub const fn index(self) -> usize {
        match self {
            OperationKind::Select => 0,
            OperationKind::InsertOne => 1,
            OperationKind::InsertMany => 2,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            OperationKind::Select => "select",
            OperationKind::InsertOne => "insert_one",
            OperationKind::InsertMany => "insert_many",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A group of latency samples (milliseconds) emitted together by a ring
/// buffer, either because it filled up or because the sampler was finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleBatch {
    pub kind: OperationKind,
    pub values: Vec<u16>,
}

/// Receives every batch a [`Sampler`] emits.
///
/// Called while the emitting ring is locked, so implementations must not
/// record into the same sampler.
pub trait BatchSink: Send + Sync {
    fn on_batch(&self, batch: &SampleBatch);
}

/// Whole milliseconds, saturating at `u16::MAX`.
pub fn clamp_millis(millis: u64) -> u16 {
    u16::try_from(millis).unwrap_or(u16::MAX)
}

pub fn duration_to_millis(elapsed: Duration) -> u16 {
    clamp_millis(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
}
