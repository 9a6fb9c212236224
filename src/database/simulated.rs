use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use tracing::debug;

use super::Database;
use crate::config::DatabaseConfig;
use crate::error::{BenchError, Result};
use crate::mock_data::Row;

/// In-memory stand-in for a real server: keeps the table in a `Vec` and
/// sleeps `base + rows × per_row + jitter` per call so the latency files
/// have a realistic shape.
pub struct SimulatedDatabase {
    config: DatabaseConfig,
    /// `None` until `setup()` and after `teardown()`.
    table: Mutex<Option<Vec<Row>>>,
}

impl SimulatedDatabase {
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            config,
            table: Mutex::new(None),
        }
    }

    pub fn row_count(&self) -> usize {
        self.table.lock().as_ref().map_or(0, Vec::len)
    }

    fn latency(&self, rows: usize) -> Duration {
        let jitter = if self.config.jitter_ms > 0 {
            rand::thread_rng().gen_range(0..=self.config.jitter_ms)
        } else {
            0
        };
        Duration::from_millis(self.config.base_latency_ms + jitter)
            + Duration::from_micros(self.config.per_row_micros.saturating_mul(rows as u64))
    }

    fn with_table<T>(&self, f: impl FnOnce(&mut Vec<Row>) -> T) -> Result<T> {
        let mut table = self.table.lock();
        let rows = table
            .as_mut()
            .ok_or_else(|| BenchError::database(&self.config.name, "table does not exist"))?;
        Ok(f(rows))
    }
}

#[async_trait]
impl Database for SimulatedDatabase {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn setup(&self) -> Result<()> {
        tokio::time::sleep(self.latency(0)).await;
        let mut table = self.table.lock();
        if table.is_some() {
            return Err(BenchError::database(&self.config.name, "table already exists"));
        }
        *table = Some(Vec::new());
        Ok(())
    }

    async fn teardown(&self) -> Result<()> {
        tokio::time::sleep(self.latency(0)).await;
        self.table
            .lock()
            .take()
            .map(drop)
            .ok_or_else(|| BenchError::database(&self.config.name, "table does not exist"))
    }

    async fn select(&self, row: &Row) -> Result<()> {
        let (scanned, matched) =
            self.with_table(|rows| (rows.len(), rows.iter().filter(|r| *r == row).count()))?;
        tokio::time::sleep(self.latency(scanned)).await;
        debug!(db = %self.config.name, matched, "select");
        Ok(())
    }

    async fn insert_one(&self, row: &Row) -> Result<()> {
        tokio::time::sleep(self.latency(1)).await;
        self.with_table(|rows| rows.push(row.clone()))
    }

    async fn insert_many(&self, batch: &[Row]) -> Result<()> {
        tokio::time::sleep(self.latency(batch.len())).await;
        self.with_table(|rows| rows.extend_from_slice(batch))
    }
}
