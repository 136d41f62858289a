//! Storage sink traits: where emitted snapshots go.
//!
//! The capture core never encodes or writes anything itself. It hands each
//! [`Snapshot`] to a [`StorageSink`] and moves on; the sink performs or
//! schedules the durable write. A [`StorageBackend`] launches one
//! [`CapturePipeline`] per session, and the session winds that pipeline
//! down on stop.
//!
//! # Contract
//!
//! - [`StorageSink::submit`] must not block on I/O. It may fail for a single
//!   item; the drain reports the failure and keeps going.
//! - A pipeline finalizes after it receives [`Snapshot::End`].

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use worldsnap_types::Snapshot;

/// Errors a sink can report for a single submission.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The pipeline is no longer accepting submissions.
    #[error("storage pipeline is closed")]
    Closed,

    /// The sink refused this particular snapshot.
    #[error("snapshot rejected: {reason}")]
    Rejected {
        /// Why the snapshot was refused.
        reason: String,
    },

    /// A filesystem operation failed.
    #[error("storage I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Encoding the snapshot failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// The underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

/// Accepts emitted snapshots and schedules their durable write.
pub trait StorageSink: Send + Sync {
    /// Submit one snapshot for persistence.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] if this snapshot could not be accepted. Other
    /// submissions are unaffected.
    fn submit(&self, snapshot: Snapshot) -> Result<(), SinkError>;
}

/// Outcome of a pipeline after it has been wound down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineSummary {
    /// Snapshots durably written.
    pub written: u64,
    /// Snapshots the pipeline failed to write.
    pub failed: u64,
    /// Whether the pipeline ran to completion (`false` if it was aborted
    /// or died).
    pub completed: bool,
}

/// The write pipeline of one capture session.
pub trait CapturePipeline: StorageSink + Sized {
    /// Wait for the pipeline to finish writing everything it was handed,
    /// aborting it if `deadline` elapses first.
    fn finish(self, deadline: Duration) -> impl Future<Output = PipelineSummary> + Send;
}

/// Launches a write pipeline for each capture session.
pub trait StorageBackend: Send + Sync {
    /// The pipeline type this backend produces.
    type Pipeline: CapturePipeline;

    /// Launch the pipeline for a session writing the level `level_name`
    /// into `target`. Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] if the pipeline could not be started.
    fn launch(&self, level_name: &str, target: &Path) -> Result<Self::Pipeline, SinkError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_error_display() {
        let err = SinkError::Rejected {
            reason: String::from("region too large"),
        };
        assert!(err.to_string().contains("region too large"));
        assert_eq!(SinkError::Closed.to_string(), "storage pipeline is closed");
    }

    #[test]
    fn sink_error_from_io() {
        let io = std::io::Error::other("disk full");
        let err = SinkError::from(io);
        assert!(err.to_string().contains("disk full"));
    }
}
