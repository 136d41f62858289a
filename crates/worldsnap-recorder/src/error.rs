//! Error types for the recorder binary.
//!
//! [`RecorderError`] is the top-level error type that wraps all possible
//! failure modes during startup and the capture run.

/// Top-level error for the recorder binary.
#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: worldsnap_core::config::ConfigError,
    },

    /// The `recorder:` section is present but invalid.
    #[error("recorder config error: {message}")]
    RecorderConfig {
        /// Description of the problem.
        message: String,
    },

    /// A session transition failed.
    #[error("session error: {source}")]
    Session {
        /// The underlying session error.
        #[from]
        source: worldsnap_core::SessionError,
    },

    /// The overwrite prompt was raised but nobody answered it.
    #[error("overwrite prompt for '{level_name}' went unanswered")]
    PromptUnanswered {
        /// Level the prompt was raised for.
        level_name: String,
    },

    /// The user declined to overwrite an existing level.
    #[error("capture of '{level_name}' abandoned: existing level kept")]
    OverwriteDeclined {
        /// Level that was not overwritten.
        level_name: String,
    },

    /// A producer task panicked or was cancelled.
    #[error("producer task failed: {message}")]
    Producer {
        /// Description of the failure.
        message: String,
    },
}
