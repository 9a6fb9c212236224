pub mod simulated;

use async_trait::async_trait;

use crate::error::Result;
use crate::mock_data::Row;

pub use simulated::SimulatedDatabase;

/// A benchmark target. Implementations perform the actual work; timing is
/// done around these calls by [`crate::target::BenchTarget`].
#[async_trait]
pub trait Database: Send + Sync {
    fn name(&self) -> &str;

    /// Creates whatever the benchmark writes into.
    async fn setup(&self) -> Result<()>;

    async fn teardown(&self) -> Result<()>;

    /// Looks up rows equal to `row`.
    async fn select(&self, row: &Row) -> Result<()>;

    async fn insert_one(&self, row: &Row) -> Result<()>;

    async fn insert_many(&self, rows: &[Row]) -> Result<()>;
}
