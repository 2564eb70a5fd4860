use thiserror::Error;

use crate::types::IndexVariant;

#[derive(Error, Debug)]
pub enum VectorLakeError {
    // Payload errors
    #[error("malformed vector payload: {0}")]
    Format(String),

    // Naming errors
    #[error("invalid namespace '{namespace}': {reason}")]
    InvalidNamespace { namespace: String, reason: String },

    #[error("unsupported index variant: {0}")]
    UnsupportedVariant(String),

    // Query errors
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    // Index errors
    #[error("no {variant} index artifact exists for namespace {namespace}")]
    ArtifactMissing {
        namespace: String,
        variant: IndexVariant,
    },

    #[error("failed to build {variant} index: {reason}")]
    IndexBuild {
        variant: IndexVariant,
        reason: String,
    },

    // Storage errors
    #[error("object not found: {key}")]
    NotFound { key: String },

    #[error("storage {operation} failed for {key}: {source}")]
    Transport {
        operation: &'static str,
        key: String,
        #[source]
        source: object_store::Error,
    },

    #[error("storage path error: {0}")]
    StoragePath(#[from] object_store::path::Error),

    // Serialization errors
    #[error("bincode serialization error: {0}")]
    Bincode(String),

    // Config errors
    #[error("config error: {0}")]
    Config(String),

    // Local cache errors
    #[error("cache error: {0}")]
    Cache(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    // Blocking pool
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<Box<bincode::ErrorKind>> for VectorLakeError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        VectorLakeError::Bincode(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, VectorLakeError>;

impl VectorLakeError {
    /// True when the storage layer reported that the object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, VectorLakeError::NotFound { .. })
    }

    /// Wrap a raw `object_store` failure, mapping missing objects to `NotFound`.
    pub(crate) fn from_store(operation: &'static str, key: &str, err: object_store::Error) -> Self {
        match err {
            object_store::Error::NotFound { .. } => VectorLakeError::NotFound {
                key: key.to_string(),
            },
            source => VectorLakeError::Transport {
                operation,
                key: key.to_string(),
                source,
            },
        }
    }
}
