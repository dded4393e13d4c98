//! Error types for the store and the task list.

use thiserror::Error;

use crate::store::Key;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("No task stored under key {0}")]
    UnknownKey(Key),
}

#[derive(Error, Debug)]
pub enum TaskListError {
    #[error("No task at position {position} (list has {len})")]
    OutOfRange { position: usize, len: usize },

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
pub type Result<T> = std::result::Result<T, TaskListError>;
