use std::time::Instant;

use super::sampler::Sampler;
use super::{duration_to_millis, OperationKind};

/// Times one operation and records it into the owning [`Sampler`] when
/// dropped, however the measured block exits. Success and errors drop it at
/// the end of the scope, a panic drops it during unwinding, and a cancelled
/// future drops it mid-`.await`.
///
/// ```ignore
/// let _scope = sampler.begin(OperationKind::Select);
/// db.select(&row).await?;
/// ```
#[must_use = "the sample is recorded when the scope is dropped"]
pub struct TimingScope<'a> {
    sampler: &'a Sampler,
    kind: OperationKind,
    started: Instant,
    recorded: bool,
}

impl<'a> TimingScope<'a> {
    pub(super) fn new(sampler: &'a Sampler, kind: OperationKind) -> Self {
        Self {
            sampler,
            kind,
            started: Instant::now(),
            recorded: false,
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Ends the scope now and returns the recorded milliseconds.
    pub fn finish(mut self) -> u16 {
        self.release()
    }

    fn release(&mut self) -> u16 {
        let millis = duration_to_millis(self.started.elapsed());
        if !self.recorded {
            self.recorded = true;
            self.sampler.push(self.kind, millis);
        }
        millis
    }
}

impl Drop for TimingScope<'_> {
    fn drop(&mut self) {
        self.release();
    }
}
