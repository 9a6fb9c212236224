use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{BenchError, Result};
use crate::metrics::sampler::DEFAULT_CAPACITY;
use crate::metrics::writer::{DEFAULT_FLUSH_INTERVAL, DEFAULT_OUTPUT_DIR, DEFAULT_THRESHOLD_BYTES};

// ─── Settings file ───────────────────────────────────────────────

/// Contents of `appsettings.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct BenchConfig {
    /// Where data files and the log land
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Schema file the rows are generated from
    pub contract: PathBuf,

    /// Rows per insert-many during the measured phase
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,

    /// Rows the prologue pre-fills every table with
    #[serde(default = "default_table_size")]
    pub table_size: usize,

    /// Concurrent benchmark loops per database
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Samples per emitted batch
    #[serde(default = "default_sampler_capacity")]
    pub sampler_capacity: usize,

    #[serde(default)]
    pub writer: WriterConfig,

    #[serde(default)]
    pub plot: PlotConfig,

    pub databases: Vec<DatabaseConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WriterConfig {
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    /// Pending bytes every lane needs before a periodic flush runs
    #[serde(default = "default_threshold_bytes")]
    pub threshold_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlotConfig {
    #[serde(default = "default_gnuplot")]
    pub gnuplot: String,

    #[serde(default = "default_template")]
    pub template: PathBuf,
}

/// One benchmark target. Latencies drive the simulated backend.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub name: String,

    #[serde(default = "default_base_latency_ms")]
    pub base_latency_ms: u64,

    #[serde(default = "default_per_row_micros")]
    pub per_row_micros: u64,

    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_DIR)
}
fn default_sample_size() -> usize {
    1_000
}
fn default_table_size() -> usize {
    100_000
}
fn default_workers() -> usize {
    1
}
fn default_sampler_capacity() -> usize {
    DEFAULT_CAPACITY
}
fn default_flush_interval_ms() -> u64 {
    DEFAULT_FLUSH_INTERVAL.as_millis() as u64
}
fn default_threshold_bytes() -> usize {
    DEFAULT_THRESHOLD_BYTES
}
fn default_gnuplot() -> String {
    "gnuplot".into()
}
fn default_template() -> PathBuf {
    PathBuf::from("templates/basic.plt")
}
fn default_base_latency_ms() -> u64 {
    2
}
fn default_per_row_micros() -> u64 {
    5
}
fn default_jitter_ms() -> u64 {
    1
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: default_flush_interval_ms(),
            threshold_bytes: default_threshold_bytes(),
        }
    }
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            gnuplot: default_gnuplot(),
            template: default_template(),
        }
    }
}

impl WriterConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

impl BenchConfig {
    pub fn load(path: &Path) -> Result<Self> {
        Self::parse(&fs::read_to_string(path)?)
    }

    pub fn parse(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.databases.is_empty() {
            return Err(BenchError::config("no databases configured"));
        }
        if self.sample_size == 0 {
            return Err(BenchError::config("sample_size must be at least 1"));
        }
        if self.workers == 0 {
            return Err(BenchError::config("workers must be at least 1"));
        }
        if self.sampler_capacity == 0 {
            return Err(BenchError::InvalidCapacity);
        }
        if self.writer.flush_interval_ms == 0 {
            return Err(BenchError::config("writer.flush_interval_ms must be positive"));
        }

        let mut seen = HashSet::new();
        for db in &self.databases {
            // Names become file names, so compare them the same way.
            if !seen.insert(db.name.to_lowercase()) {
                return Err(BenchError::config(format!(
                    "database `{}` is configured twice",
                    db.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_in_defaults() {
        let config = BenchConfig::parse(
            r#"{ "contract": "contract.txt", "databases": [{ "name": "PostgreSql" }] }"#,
        )
        .unwrap();

        assert_eq!(config.output_dir, PathBuf::from("_output"));
        assert_eq!(config.sampler_capacity, 32);
        assert_eq!(config.writer.flush_interval(), Duration::from_millis(200));
        assert_eq!(config.writer.threshold_bytes, 16);
        assert_eq!(config.plot.gnuplot, "gnuplot");
        assert_eq!(config.databases[0].base_latency_ms, 2);
        assert_eq!(config.workers, 1);
    }

    #[test]
    fn rejects_duplicate_and_missing_databases() {
        let dup = r#"{ "contract": "c", "databases": [{ "name": "A" }, { "name": "a" }] }"#;
        assert!(matches!(BenchConfig::parse(dup), Err(BenchError::Config(_))));

        let none = r#"{ "contract": "c", "databases": [] }"#;
        assert!(matches!(BenchConfig::parse(none), Err(BenchError::Config(_))));

        let zero = r#"{ "contract": "c", "sampler_capacity": 0, "databases": [{ "name": "A" }] }"#;
        assert!(matches!(
            BenchConfig::parse(zero),
            Err(BenchError::InvalidCapacity)
        ));
    }

    #[test]
    fn malformed_json_is_a_json_error() {
        assert!(matches!(
            BenchConfig::parse("{ not json"),
            Err(BenchError::Json(_))
        ));
    }
}
