use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::database::Database;
use crate::error::Result;
use crate::metrics::{
    BatchSink, LatencySummary, MultiplexedWriter, OperationKind, PercentileSet, Sampler,
    WriterOptions,
};
use crate::mock_data::Row;

/// A database plus everything that records its latencies.
///
/// Lane layout of the data file follows [`OperationKind::index`]:
/// `<select> <insert_one> <insert_many>`.
pub struct BenchTarget {
    name: String,
    db: Box<dyn Database>,
    sampler: Sampler,
    writer: Arc<MultiplexedWriter>,
    summary: Arc<LatencySummary>,
}

/// What is left of a target after shutdown.
#[derive(Debug, Clone)]
pub struct TargetReport {
    pub name: String,
    pub data_path: PathBuf,
    pub latencies: Vec<(OperationKind, PercentileSet)>,
}

impl BenchTarget {
    /// `writer.file_name` and `writer.lanes` are filled in from the
    /// database name and the operation kinds.
    pub fn new(db: Box<dyn Database>, capacity: usize, mut writer: WriterOptions) -> Result<Self> {
        let name = db.name().to_owned();
        writer.file_name = Self::data_file_name(&name);
        writer.lanes = OperationKind::ALL.len();

        let writer = Arc::new(MultiplexedWriter::create(writer)?);
        let summary = Arc::new(LatencySummary::new());
        let extra: Vec<Arc<dyn BatchSink>> = vec![summary.clone()];
        let sampler = Sampler::with_writer(capacity, writer.clone(), extra)?;

        debug!(target_name = %name, path = %writer.path().display(), "target ready");
        Ok(Self {
            name,
            db,
            sampler,
            writer,
            summary,
        })
    }

    pub fn data_file_name(name: &str) -> String {
        format!("{}.data", name.to_lowercase())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn setup(&self) -> Result<()> {
        self.db.setup().await
    }

    pub async fn teardown(&self) -> Result<()> {
        self.db.teardown().await
    }

    pub async fn select(&self, row: &Row) -> Result<()> {
        self.timed(OperationKind::Select, self.db.select(row)).await
    }

    pub async fn insert_one(&self, row: &Row) -> Result<()> {
        self.timed(OperationKind::InsertOne, self.db.insert_one(row))
            .await
    }

    pub async fn insert_many(&self, rows: &[Row]) -> Result<()> {
        self.timed(OperationKind::InsertMany, self.db.insert_many(rows))
            .await
    }

    /// Failed operations are timed like successful ones.
    async fn timed<F>(&self, kind: OperationKind, op: F) -> Result<()>
    where
        F: Future<Output = Result<()>>,
    {
        let result = self.sampler.timed(kind, op).await;
        if let Err(e) = &result {
            warn!(target_name = %self.name, %kind, "operation failed: {e}");
        }
        result
    }

    /// Emits the samplers' remainders and closes the data file.
    pub async fn shutdown(self) -> Result<TargetReport> {
        let BenchTarget {
            name,
            sampler,
            writer,
            summary,
            ..
        } = self;

        sampler.finish();
        let data_path = writer.close().await?;

        Ok(TargetReport {
            name,
            data_path,
            latencies: summary.snapshot(),
        })
    }
}
