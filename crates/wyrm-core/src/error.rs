//! Error types for the wyrm pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using WyrmError.
pub type Result<T> = std::result::Result<T, WyrmError>;

/// Errors that can occur in the wyrm pipeline.
#[derive(Error, Debug)]
pub enum WyrmError {
    /// The embedding model could not be loaded.
    #[error("Embedding model unavailable: {message}")]
    ModelUnavailable { message: String },

    /// The vector index could not be opened.
    #[error("Index unavailable: {message}")]
    IndexUnavailable { message: String },

    /// The generative model call failed.
    #[error("Generation unavailable: {message}")]
    GenerationUnavailable { message: String },

    /// Ingestion target directory does not exist.
    #[error("Directory '{}' does not exist", path.display())]
    DirectoryNotFound { path: PathBuf },

    /// Vector length differs from the index dimension.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Invalid argument provided.
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Database error.
    #[error("Database error: {message}")]
    Database { message: String },

    /// Embedding inference error.
    #[error("Embedding error: {message}")]
    Embedding { message: String },

    /// A guarded call ran past its deadline.
    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: String, secs: u64 },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Internal error (unexpected).
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl WyrmError {
    /// Create a model-unavailable error.
    pub fn model_unavailable(message: impl Into<String>) -> Self {
        Self::ModelUnavailable {
            message: message.into(),
        }
    }

    /// Create an index-unavailable error.
    pub fn index_unavailable(message: impl Into<String>) -> Self {
        Self::IndexUnavailable {
            message: message.into(),
        }
    }

    /// Create a generation-unavailable error.
    pub fn generation_unavailable(message: impl Into<String>) -> Self {
        Self::GenerationUnavailable {
            message: message.into(),
        }
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    /// Create an embedding error.
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error must abort the process at startup.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ModelUnavailable { .. } | Self::IndexUnavailable { .. }
        )
    }

    /// Whether a guarded call may be attempted again after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::GenerationUnavailable { .. }
                | Self::Embedding { .. }
                | Self::Io(_)
        )
    }

    /// Get the stable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ModelUnavailable { .. } => "MODEL_UNAVAILABLE",
            Self::IndexUnavailable { .. } => "INDEX_UNAVAILABLE",
            Self::GenerationUnavailable { .. } => "GENERATION_UNAVAILABLE",
            Self::DirectoryNotFound { .. } => "DIRECTORY_NOT_FOUND",
            Self::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
            Self::InvalidArgument { .. } => "INVALID_ARGUMENT",
            Self::Database { .. } => "DATABASE_ERROR",
            Self::Embedding { .. } => "EMBEDDING_ERROR",
            Self::Timeout { .. } => "TIMEOUT",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Config { .. } => "CONFIG_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}
