use serde_json::Value;
use thiserror::Error;

use crate::transport::TransportError;

#[derive(Error, Debug)]
pub enum Error {
    /// Caller bug: malformed document id or source. Never retried.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A search or scroll response reported `_shards.failed > 0`. The
    /// message carries the raw `_shards` payload.
    #[error("Shard failure: {0}")]
    ShardFailure(String),

    /// The requested task id is absent from the live task list.
    #[error("Task missing: {0}")]
    TaskMissing(String),

    /// Task response shape was not recognized.
    #[error("Task error: {0}")]
    Task(Value),

    /// One or more bulk items failed. Carries the filtered per-item error
    /// payloads exactly as returned by the engine.
    #[error("{} document(s) failed to index", errors.len())]
    BulkIndex { errors: Vec<Value> },

    #[error("Mapping update failed for index {index}: {response}")]
    MappingUpdateFailed { index: String, response: Value },

    #[error("Invalid index tuning settings: {0}")]
    InvalidTuningSettings(String),

    #[error("Index is not multiplexed: {0}")]
    NotMultiplexed(String),

    #[error("Operation is not reversible: {0}")]
    Irreversible(String),

    /// Unexpected engine response or cluster-level failure.
    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
