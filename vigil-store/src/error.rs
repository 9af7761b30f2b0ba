use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;
use vigil_core::{TaskKind, ValidationError};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("i/o error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed record data: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("no {kind} record with id {id}")]
    NotFound { kind: TaskKind, id: Uuid },

    #[error("invalid result: {0}")]
    Invalid(#[from] ValidationError),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}
