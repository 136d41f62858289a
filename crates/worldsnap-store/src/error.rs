//! Error types for the storage flow.
//!
//! Writer-side failures are reported through [`StoreError`]. They never
//! reach the drain: the writer task logs and counts them, and the totals
//! surface in the pipeline summary returned on stop.

use std::path::{Path, PathBuf};

use worldsnap_core::sink::SinkError;

/// Errors that can occur while writing a captured level.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A filesystem operation failed.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// Path the operation targeted.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Encoding a document failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The flow was launched outside a Tokio runtime.
    #[error("no Tokio runtime available to run the storage flow: {source}")]
    NoRuntime {
        /// Why no runtime handle could be obtained.
        #[source]
        source: tokio::runtime::TryCurrentError,
    },
}

impl StoreError {
    /// Build a mapper that tags an I/O error with the path it concerned.
    pub(crate) fn io_at(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl From<StoreError> for SinkError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Io { source, .. } => Self::Io { source },
            StoreError::Serialization(source) => Self::Serialization { source },
            StoreError::NoRuntime { source } => Self::Rejected {
                reason: format!("no Tokio runtime available to run the storage flow: {source}"),
            },
        }
    }
}
