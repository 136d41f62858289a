//! User-facing notifications.
//!
//! Messages are identified by a fixed set of [`MessageKey`]s with positional
//! arguments; wording and rendering belong to the UI layer.

use tracing::{info, warn};

/// Identifier of a user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKey {
    /// A capture is already running. Args: current level name.
    AlreadyCapturing,
    /// The requested level name is too long. Args: name, maximum length.
    NameTooLong,
    /// The level name is not a plain directory name. Args: name.
    InvalidName,
    /// No capture is running.
    NotCapturing,
    /// A capture started. Args: level name.
    Started,
    /// A capture is stopping. Args: level name.
    Stopping,
}

impl MessageKey {
    /// Stable translation key for the UI layer.
    pub const fn translation_key(self) -> &'static str {
        match self {
            Self::AlreadyCapturing => "worldsnap.log.error.already_capturing",
            Self::NameTooLong => "worldsnap.log.error.level_name_too_long",
            Self::InvalidName => "worldsnap.log.error.invalid_level_name",
            Self::NotCapturing => "worldsnap.log.error.not_capturing",
            Self::Started => "worldsnap.log.info.started_capture",
            Self::Stopping => "worldsnap.log.info.stopping_capture",
        }
    }
}

impl core::fmt::Display for MessageKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.translation_key())
    }
}

/// Delivers user-facing messages.
pub trait MessageSink: Send + Sync {
    /// Deliver an informational message.
    fn info(&self, key: MessageKey, args: &[String]);

    /// Deliver an error message.
    fn error(&self, key: MessageKey, args: &[String]);
}

/// A [`MessageSink`] that writes every message to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMessageSink;

impl MessageSink for LogMessageSink {
    fn info(&self, key: MessageKey, args: &[String]) {
        info!(key = key.translation_key(), ?args, "user message");
    }

    fn error(&self, key: MessageKey, args: &[String]) {
        warn!(key = key.translation_key(), ?args, "user error");
    }
}
