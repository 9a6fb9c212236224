use thiserror::Error;

/// Everything the sampling, persistence and glue layers can fail with.
#[derive(Error, Debug)]
pub enum BenchError {
    #[error("lane {lane} is not declared (writer has {lanes} lanes)")]
    UnknownLane { lane: usize, lanes: usize },

    #[error("writer declares {actual} lanes but {expected} operation kinds are sampled")]
    LaneCountMismatch { expected: usize, actual: usize },

    #[error("sampler capacity must be at least 1")]
    InvalidCapacity,

    #[error("writer needs at least one lane")]
    InvalidLaneCount,

    #[error("contract line {line}: {message}")]
    Contract { line: usize, message: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("plot template {path}: {message}")]
    Template { path: String, message: String },

    #[error("database {name}: {message}")]
    Database { name: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, BenchError>;

impl BenchError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    pub fn database<N: Into<String>, S: Into<String>>(name: N, msg: S) -> Self {
        Self::Database {
            name: name.into(),
            message: msg.into(),
        }
    }
}
