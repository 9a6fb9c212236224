use std::fs::{self, File};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;
use tracing::{debug, error, trace, warn};

use super::lane::LaneBuffer;
use super::{BatchSink, SampleBatch};
use crate::error::{BenchError, Result};

// ─── Configuration ───────────────────────────────────────────────

/// Directory the data files land in unless configured otherwise.
pub const DEFAULT_OUTPUT_DIR: &str = "_output";

/// How often the background ticker attempts a partial flush.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(200);

/// Pending bytes every lane needs before a partial flush is worth it.
pub const DEFAULT_THRESHOLD_BYTES: usize = 16;

/// Written by the final flush in place of a value a lane never produced.
/// gnuplot reads it as a missing point.
pub const MISSING_VALUE: &str = "NaN";

// ─── Public types ────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct WriterOptions {
    pub dir: PathBuf,
    pub file_name: String,
    pub lanes: usize,
    pub threshold_bytes: usize,
    pub flush_interval: Duration,
}

impl WriterOptions {
    pub fn new(dir: impl Into<PathBuf>, file_name: impl Into<String>, lanes: usize) -> Self {
        Self {
            dir: dir.into(),
            file_name: file_name.into(),
            lanes,
            threshold_bytes: DEFAULT_THRESHOLD_BYTES,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another flush holds the output.
    Busy,
    /// Some lane has less than the threshold pending.
    BelowThreshold,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    Flushed { rows: usize },
    Skipped(SkipReason),
}

/// Interleaves several independently filling lanes into one text file,
/// one row per line: `<lane0> <lane1> ... <laneN-1>`.
///
/// Producers only touch the in-memory lanes (`append`); a background
/// ticker moves row-aligned data to disk, and `close()` drains
/// everything that is left.
pub struct MultiplexedWriter {
    core: Arc<WriterCore>,
    ticker: Mutex<Option<Ticker>>,
}

// ─── Internal state ──────────────────────────────────────────────

struct WriterCore {
    path: PathBuf,
    lanes: Vec<Mutex<LaneBuffer>>,
    output: Mutex<Output>,
    threshold: usize,
    closed: AtomicBool,
}

struct Output {
    /// `None` once the final flush has run.
    sink: Option<Box<dyn DataSink>>,
    rows: u64,
    /// Bytes of whole rows in the sink. A failed write is cut back to this.
    committed: u64,
}

/// Append-only row output that can drop a torn tail.
trait DataSink: Write + Send {
    /// Discards everything past `len` bytes; appending continues there.
    fn truncate(&mut self, len: u64) -> io::Result<()>;

    fn sync(&mut self) -> io::Result<()>;
}

impl DataSink for File {
    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)?;
        self.seek(SeekFrom::End(0)).map(drop)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_all()
    }
}

struct Ticker {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<Result<()>>,
}

// ─── MultiplexedWriter impl ──────────────────────────────────────

impl MultiplexedWriter {
    /// Creates (or truncates) `<dir>/<file_name>` and starts the flush
    /// ticker. Must be called from within a Tokio runtime.
    pub fn create(options: WriterOptions) -> Result<Self> {
        if options.lanes == 0 {
            return Err(BenchError::InvalidLaneCount);
        }

        fs::create_dir_all(&options.dir)?;
        let path = options.dir.join(&options.file_name);
        let file = File::create(&path)?;
        debug!(path = %path.display(), lanes = options.lanes, "data file created");

        Ok(Self::from_parts(path, Box::new(file), &options))
    }

    fn from_parts(path: PathBuf, sink: Box<dyn DataSink>, options: &WriterOptions) -> Self {
        let core = Arc::new(WriterCore {
            path,
            lanes: (0..options.lanes)
                .map(|_| Mutex::new(LaneBuffer::with_capacity(options.threshold_bytes * 2)))
                .collect(),
            output: Mutex::new(Output {
                sink: Some(sink),
                rows: 0,
                committed: 0,
            }),
            threshold: options.threshold_bytes,
            closed: AtomicBool::new(false),
        });

        let (stop, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(run_ticker(core.clone(), options.flush_interval, stop_rx));

        Self {
            core,
            ticker: Mutex::new(Some(Ticker { stop, handle })),
        }
    }

    pub fn path(&self) -> &Path {
        &self.core.path
    }

    pub fn lane_count(&self) -> usize {
        self.core.lanes.len()
    }

    /// Rows committed to the file so far.
    pub fn rows_written(&self) -> u64 {
        self.core.output.lock().rows
    }

    /// Queues `values` on `lane`, one line each. Never touches the file.
    pub fn append(&self, lane: usize, values: &[u16]) -> Result<()> {
        let buffer = self.core.lanes.get(lane).ok_or(BenchError::UnknownLane {
            lane,
            lanes: self.core.lanes.len(),
        })?;

        if self.core.closed.load(Ordering::Acquire) {
            warn!(lane, dropped = values.len(), "append after close, samples dropped");
            return Ok(());
        }

        buffer.lock().append(values);
        Ok(())
    }

    /// One periodic-style flush attempt; never waits for a running flush.
    pub fn flush_partial(&self) -> Result<FlushOutcome> {
        self.core.flush_partial()
    }

    /// Stops the ticker (waiting out a flush in flight), drains every lane
    /// into the file and closes it. Reports the first error seen by either
    /// the ticker or the final flush.
    pub async fn close(&self) -> Result<PathBuf> {
        let ticker = self.ticker.lock().take();
        let mut first_error = None;

        if let Some(Ticker { stop, handle }) = ticker {
            let _ = stop.send(());
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => first_error = Some(e),
                Err(e) => first_error = Some(e.into()),
            }
        }

        let core = self.core.clone();
        let flushed = tokio::task::spawn_blocking(move || core.flush_final())
            .await
            .map_err(BenchError::from)
            .and_then(|r| r);

        match (first_error, flushed) {
            (Some(e), _) | (None, Err(e)) => Err(e),
            (None, Ok(rows)) => {
                debug!(path = %self.core.path.display(), rows, "data file closed");
                Ok(self.core.path.clone())
            }
        }
    }
}

impl BatchSink for MultiplexedWriter {
    fn on_batch(&self, batch: &SampleBatch) {
        if let Err(e) = self.append(batch.kind.index(), &batch.values) {
            error!(kind = %batch.kind, "cannot queue batch: {e}");
        }
    }
}

impl Drop for MultiplexedWriter {
    fn drop(&mut self) {
        // Dropping the stop sender ends the ticker on its next poll.
        if self.ticker.get_mut().take().is_some() {
            warn!(path = %self.core.path.display(), "writer dropped without close, pending rows lost");
        }
    }
}

// ─── WriterCore impl ─────────────────────────────────────────────

impl WriterCore {
    fn lock_lanes(&self) -> Vec<MutexGuard<'_, LaneBuffer>> {
        self.lanes.iter().map(|l| l.lock()).collect()
    }

    fn flush_partial(&self) -> Result<FlushOutcome> {
        let Some(mut output) = self.output.try_lock() else {
            return Ok(FlushOutcome::Skipped(SkipReason::Busy));
        };
        let output = &mut *output;
        let Some(sink) = output.sink.as_mut() else {
            return Ok(FlushOutcome::Skipped(SkipReason::Closed));
        };

        // Phase 1: assemble rows under the lane locks.
        let mut text = String::new();
        let (rows, starts) = {
            let mut lanes = self.lock_lanes();
            if lanes.iter().any(|l| l.pending() < self.threshold) {
                return Ok(FlushOutcome::Skipped(SkipReason::BelowThreshold));
            }
            let starts: Vec<usize> = lanes.iter().map(|l| l.position()).collect();
            let rows = interleave(&mut lanes, &mut text, false);
            (rows, starts)
        };

        if rows == 0 {
            return Ok(FlushOutcome::Flushed { rows: 0 });
        }

        // Phase 2: disk I/O with the lanes free for producers.
        let written = sink
            .write_all(text.as_bytes())
            .and_then(|()| sink.flush());

        // Phase 3: commit or roll back the file and every lane.
        let mut lanes = self.lock_lanes();
        match written {
            Ok(()) => {
                for lane in lanes.iter_mut() {
                    let consumed = lane.position();
                    lane.compact(consumed);
                }
                output.rows += rows as u64;
                output.committed += text.len() as u64;
                trace!(rows, "partial flush");
                Ok(FlushOutcome::Flushed { rows })
            }
            Err(e) => {
                self.cut_back(&mut **sink, output.committed);
                for (lane, start) in lanes.iter_mut().zip(starts) {
                    lane.rewind_to(start);
                }
                Err(e.into())
            }
        }
    }

    /// Drops whatever a failed write left past the last whole row.
    fn cut_back(&self, sink: &mut dyn DataSink, committed: u64) {
        if let Err(e) = sink.truncate(committed) {
            error!(path = %self.path.display(), committed, "cannot drop torn rows: {e}");
        }
    }

    fn flush_final(&self) -> Result<usize> {
        let mut output = self.output.lock();
        let Some(mut sink) = output.sink.take() else {
            return Err(BenchError::config(format!(
                "{} is already closed",
                self.path.display()
            )));
        };
        self.closed.store(true, Ordering::Release);

        let mut text = String::new();
        let rows = interleave(&mut self.lock_lanes(), &mut text, true);

        let written = sink
            .write_all(text.as_bytes())
            .and_then(|()| sink.flush())
            .and_then(|()| sink.sync());
        if let Err(e) = written {
            self.cut_back(&mut *sink, output.committed);
            return Err(e.into());
        }
        output.rows += rows as u64;
        output.committed += text.len() as u64;
        Ok(rows)
    }
}

/// Moves one token per lane into `out` per row, space separated.
///
/// Partial mode stops at the first lane that runs dry and un-reads the
/// tokens already taken for that row, so row `i` always holds the `i`-th
/// value of every lane. Exhaustive mode keeps going until all lanes are
/// empty, writing [`MISSING_VALUE`] for lanes that ran out.
fn interleave(lanes: &mut [MutexGuard<'_, LaneBuffer>], out: &mut String, exhaustive: bool) -> usize {
    let mut rows = 0;
    let mut starts = vec![0; lanes.len()];

    loop {
        let mark = out.len();
        for (start, lane) in starts.iter_mut().zip(lanes.iter()) {
            *start = lane.position();
        }

        let mut complete = true;
        let mut produced = false;
        for (column, lane) in lanes.iter_mut().enumerate() {
            if column > 0 {
                out.push(' ');
            }
            match lane.next_token() {
                Some(token) => {
                    out.push_str(token);
                    produced = true;
                }
                None if exhaustive => {
                    out.push_str(MISSING_VALUE);
                    complete = false;
                }
                None => {
                    complete = false;
                    break;
                }
            }
        }

        if !produced || (!complete && !exhaustive) {
            out.truncate(mark);
            for (lane, &start) in lanes.iter_mut().zip(starts.iter()) {
                lane.rewind_to(start);
            }
            return rows;
        }

        out.push('\n');
        rows += 1;
    }
}

async fn run_ticker(
    core: Arc<WriterCore>,
    period: Duration,
    mut stop: oneshot::Receiver<()>,
) -> Result<()> {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut ticks = IntervalStream::new(interval);

    loop {
        tokio::select! {
            _ = &mut stop => return Ok(()),
            tick = ticks.next() => {
                if tick.is_none() {
                    return Ok(());
                }
                let flushing = core.clone();
                match tokio::task::spawn_blocking(move || flushing.flush_partial()).await? {
                    Ok(FlushOutcome::Flushed { rows }) if rows > 0 => trace!(rows, "periodic flush"),
                    Ok(_) => {}
                    Err(e) => {
                        warn!(path = %core.path.display(), "periodic flush failed: {e}");
                        return Err(e);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::metrics::{OperationKind, Sampler};

    const NEVER: Duration = Duration::from_secs(3600);
    const SLOW_WRITE: Duration = Duration::from_millis(100);

    /// In-memory output that can run out of space or be slow.
    #[derive(Clone, Default)]
    struct SharedSink {
        data: Arc<Mutex<Vec<u8>>>,
        /// Bytes still accepted before every write fails; `None` is unlimited.
        space: Arc<Mutex<Option<usize>>>,
        slow: Arc<AtomicBool>,
        syncs: Arc<AtomicUsize>,
    }

    impl Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.slow.load(Ordering::SeqCst) {
                std::thread::sleep(SLOW_WRITE);
            }
            let mut space = self.space.lock();
            let n = match *space {
                Some(0) => return Err(io::Error::new(io::ErrorKind::Other, "disk full")),
                Some(left) => {
                    let n = left.min(buf.len());
                    *space = Some(left - n);
                    n
                }
                None => buf.len(),
            };
            self.data.lock().extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl DataSink for SharedSink {
        fn truncate(&mut self, len: u64) -> io::Result<()> {
            self.data.lock().truncate(len as usize);
            Ok(())
        }

        fn sync(&mut self) -> io::Result<()> {
            self.syncs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    impl SharedSink {
        fn text(&self) -> String {
            String::from_utf8(self.data.lock().clone()).unwrap()
        }

        fn fill_after(&self, bytes: usize) {
            *self.space.lock() = Some(bytes);
        }

        fn free_space(&self) {
            *self.space.lock() = None;
        }
    }

    fn in_memory(lanes: usize) -> (MultiplexedWriter, SharedSink) {
        let sink = SharedSink::default();
        let mut options = WriterOptions::new("mem", "mem.data", lanes);
        options.threshold_bytes = 0;
        options.flush_interval = NEVER;
        let writer = MultiplexedWriter::from_parts(
            PathBuf::from("mem/mem.data"),
            Box::new(sink.clone()),
            &options,
        );
        (writer, sink)
    }

    fn remaining(writer: &MultiplexedWriter, lane: usize) -> Vec<String> {
        let mut buffer = writer.core.lanes[lane].lock();
        let start = buffer.position();
        let mut tokens = Vec::new();
        while let Some(t) = buffer.next_token() {
            tokens.push(t.to_owned());
        }
        buffer.rewind_to(start);
        tokens
    }

    #[tokio::test]
    async fn interleaves_two_lanes_into_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut options = WriterOptions::new(dir.path().join("out"), "pg.data", 2);
        options.threshold_bytes = 0;
        options.flush_interval = NEVER;
        let writer = MultiplexedWriter::create(options).unwrap();

        writer.append(0, &[1, 2, 3]).unwrap();
        writer.append(1, &[100, 200]).unwrap();

        assert_eq!(
            writer.flush_partial().unwrap(),
            FlushOutcome::Flushed { rows: 2 }
        );
        let path = dir.path().join("out").join("pg.data");
        assert_eq!(fs::read_to_string(&path).unwrap(), "1 100\n2 200\n");
        assert_eq!(remaining(&writer, 0), vec!["3"]);
        assert!(remaining(&writer, 1).is_empty());

        let closed = writer.close().await.unwrap();
        assert_eq!(closed, path);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "1 100\n2 200\n3 NaN\n"
        );
        assert_eq!(writer.rows_written(), 3);
    }

    #[tokio::test]
    async fn partial_flush_keeps_rows_aligned() {
        let (writer, sink) = in_memory(3);
        let counts = [5u16, 3, 7];
        for (lane, &count) in counts.iter().enumerate() {
            let values: Vec<u16> = (0..count).map(|i| lane as u16 * 100 + i).collect();
            writer.append(lane, &values).unwrap();
        }

        assert_eq!(
            writer.flush_partial().unwrap(),
            FlushOutcome::Flushed { rows: 3 }
        );

        let text = sink.text();
        let rows: Vec<&str> = text.lines().collect();
        assert_eq!(rows.len(), 3);
        for (i, row) in rows.iter().enumerate() {
            let fields: Vec<u16> = row.split(' ').map(|f| f.parse().unwrap()).collect();
            assert_eq!(fields, vec![i as u16, 100 + i as u16, 200 + i as u16]);
        }

        for (lane, &count) in counts.iter().enumerate() {
            assert_eq!(remaining(&writer, lane).len(), count as usize - 3);
        }
        assert_eq!(remaining(&writer, 0), vec!["3", "4"]);

        writer.close().await.unwrap();
    }

    #[tokio::test]
    async fn later_appends_continue_where_rows_left_off() {
        let (writer, sink) = in_memory(2);
        writer.append(0, &[1, 2]).unwrap();
        writer.append(1, &[10]).unwrap();
        writer.flush_partial().unwrap();

        writer.append(1, &[20, 30]).unwrap();
        writer.append(0, &[3]).unwrap();
        writer.flush_partial().unwrap();

        assert_eq!(sink.text(), "1 10\n2 20\n3 30\n");
        writer.close().await.unwrap();
    }

    #[tokio::test]
    async fn skips_when_a_lane_is_below_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let mut options = WriterOptions::new(dir.path(), "t.data", 2);
        options.threshold_bytes = 8;
        options.flush_interval = NEVER;
        let writer = MultiplexedWriter::create(options).unwrap();

        writer.append(0, &[1000, 2000]).unwrap();
        writer.append(1, &[1]).unwrap();
        assert_eq!(
            writer.flush_partial().unwrap(),
            FlushOutcome::Skipped(SkipReason::BelowThreshold)
        );

        writer.append(1, &[2, 3, 4]).unwrap();
        assert_eq!(
            writer.flush_partial().unwrap(),
            FlushOutcome::Flushed { rows: 2 }
        );
        writer.close().await.unwrap();
    }

    #[tokio::test]
    async fn skips_while_another_flush_holds_the_output() {
        let (writer, _sink) = in_memory(1);
        writer.append(0, &[1]).unwrap();

        {
            let _busy = writer.core.output.lock();
            assert_eq!(
                writer.flush_partial().unwrap(),
                FlushOutcome::Skipped(SkipReason::Busy)
            );
        }
        assert_eq!(
            writer.flush_partial().unwrap(),
            FlushOutcome::Flushed { rows: 1 }
        );
        writer.close().await.unwrap();
    }

    #[tokio::test]
    async fn rejects_undeclared_lanes() {
        let (writer, _sink) = in_memory(2);
        assert!(matches!(
            writer.append(2, &[1]),
            Err(BenchError::UnknownLane { lane: 2, lanes: 2 })
        ));
        writer.close().await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            MultiplexedWriter::create(WriterOptions::new(dir.path(), "x.data", 0)),
            Err(BenchError::InvalidLaneCount)
        ));
    }

    #[tokio::test]
    async fn failed_write_leaves_lanes_untouched() {
        let (writer, sink) = in_memory(2);
        writer.append(0, &[1, 2]).unwrap();
        writer.append(1, &[3, 4, 5]).unwrap();

        sink.fill_after(0);
        assert!(matches!(writer.flush_partial(), Err(BenchError::Io(_))));
        assert_eq!(remaining(&writer, 0), vec!["1", "2"]);
        assert_eq!(remaining(&writer, 1), vec!["3", "4", "5"]);
        assert_eq!(writer.rows_written(), 0);

        sink.free_space();
        assert_eq!(
            writer.flush_partial().unwrap(),
            FlushOutcome::Flushed { rows: 2 }
        );
        assert_eq!(sink.text(), "1 3\n2 4\n");
        writer.close().await.unwrap();
    }

    #[tokio::test]
    async fn torn_write_is_cut_back_to_the_last_whole_row() {
        let (writer, sink) = in_memory(2);
        writer.append(0, &[1]).unwrap();
        writer.append(1, &[3]).unwrap();
        writer.flush_partial().unwrap();

        writer.append(0, &[2, 5]).unwrap();
        writer.append(1, &[4, 6]).unwrap();
        sink.fill_after(5);
        assert!(matches!(writer.flush_partial(), Err(BenchError::Io(_))));
        assert_eq!(sink.text(), "1 3\n");
        assert_eq!(writer.rows_written(), 1);

        sink.free_space();
        writer.flush_partial().unwrap();
        assert_eq!(sink.text(), "1 3\n2 4\n5 6\n");
        writer.close().await.unwrap();
    }

    #[tokio::test]
    async fn torn_final_write_keeps_the_file_row_aligned() {
        let (writer, sink) = in_memory(2);
        writer.append(0, &[1, 2]).unwrap();
        writer.append(1, &[3]).unwrap();
        writer.flush_partial().unwrap();

        sink.fill_after(3);
        assert!(matches!(writer.close().await, Err(BenchError::Io(_))));
        assert_eq!(sink.text(), "1 3\n");
        assert_eq!(sink.syncs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn close_waits_for_a_flush_in_flight() {
        let (writer, sink) = in_memory(2);
        let writer = Arc::new(writer);
        writer.append(0, &[1, 2, 3]).unwrap();
        writer.append(1, &[10, 20]).unwrap();

        sink.slow.store(true, Ordering::SeqCst);
        let flushing = writer.clone();
        let partial = tokio::task::spawn_blocking(move || flushing.flush_partial());
        tokio::time::sleep(Duration::from_millis(20)).await;

        // The partial flush is writing; this lands behind the rows it took.
        writer.append(1, &[30]).unwrap();
        writer.close().await.unwrap();

        assert_eq!(
            partial.await.unwrap().unwrap(),
            FlushOutcome::Flushed { rows: 2 }
        );
        assert_eq!(sink.text(), "1 10\n2 20\n3 30\n");
        assert_eq!(writer.rows_written(), 3);
    }

    #[tokio::test]
    async fn close_drains_everything_once() {
        let (writer, sink) = in_memory(3);
        writer.append(0, &[1]).unwrap();
        writer.append(2, &[7, 8]).unwrap();

        writer.close().await.unwrap();
        assert_eq!(sink.text(), "1 NaN 7\nNaN NaN 8\n");
        assert_eq!(sink.syncs.load(Ordering::SeqCst), 1);

        assert!(writer.close().await.is_err());
        assert_eq!(
            writer.flush_partial().unwrap(),
            FlushOutcome::Skipped(SkipReason::Closed)
        );
        // Late samples are dropped, not an error.
        writer.append(0, &[9]).unwrap();
    }

    #[tokio::test]
    async fn ticker_flushes_in_the_background() {
        let sink = SharedSink::default();
        let mut options = WriterOptions::new("mem", "mem.data", 2);
        options.threshold_bytes = 0;
        options.flush_interval = Duration::from_millis(20);
        let writer =
            MultiplexedWriter::from_parts(PathBuf::from("mem.data"), Box::new(sink.clone()), &options);

        writer.append(0, &[11, 12]).unwrap();
        writer.append(1, &[21]).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(sink.text(), "11 21\n");
        assert_eq!(remaining(&writer, 0), vec!["12"]);

        writer.close().await.unwrap();
        assert_eq!(sink.text(), "11 21\n12 NaN\n");
    }

    #[tokio::test]
    async fn ticker_failure_is_reported_by_close() {
        let sink = SharedSink::default();
        sink.fill_after(0);
        let mut options = WriterOptions::new("mem", "mem.data", 1);
        options.threshold_bytes = 0;
        options.flush_interval = Duration::from_millis(10);
        let writer =
            MultiplexedWriter::from_parts(PathBuf::from("mem.data"), Box::new(sink.clone()), &options);

        writer.append(0, &[5]).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        sink.free_space();
        assert!(matches!(writer.close().await, Err(BenchError::Io(_))));
        // The final flush still ran with the rolled-back lane.
        assert_eq!(sink.text(), "5\n");
    }

    #[tokio::test]
    async fn sampler_batches_land_in_kind_lanes() {
        let (writer, sink) = in_memory(3);
        let writer = Arc::new(writer);
        let sampler = Sampler::with_writer(2, writer.clone(), Vec::new()).unwrap();

        for ms in [10, 20, 30] {
            sampler.record_millis(OperationKind::Select, ms);
        }
        sampler.record_millis(OperationKind::InsertOne, 1);
        sampler.record_millis(OperationKind::InsertMany, 500);
        sampler.record_millis(OperationKind::InsertMany, 600);
        sampler.finish();

        writer.close().await.unwrap();
        assert_eq!(sink.text(), "10 1 500\n20 NaN 600\n30 NaN NaN\n");
    }

    #[tokio::test]
    async fn sampler_rejects_mismatched_writer() {
        let (writer, _sink) = in_memory(2);
        let writer = Arc::new(writer);
        assert!(matches!(
            Sampler::with_writer(4, writer.clone(), Vec::new()),
            Err(BenchError::LaneCountMismatch {
                expected: 3,
                actual: 2
            })
        ));
        writer.close().await.unwrap();
    }
}
