//! Staging cache, drain protocol, and capture session for Worldsnap.
//!
//! While a capture runs, producer tasks stage regions, entities, players,
//! and containers into a shared [`StagingCache`]. When the session stops,
//! the [`DrainCoordinator`] flushes everything to a [`StorageSink`] in a
//! fixed order and clears the cache.
//!
//! # Modules
//!
//! - [`cache`] -- The concurrent [`StagingCache`]
//! - [`recency`] -- [`RecencyGate`], a time-bounded memo for derived views
//! - [`aggregate`] -- Per-region entity aggregation at drain time
//! - [`drain`] -- The ordered flush and its [`DrainReport`]
//! - [`session`] -- The [`CaptureSession`] start/stop state machine
//! - [`sink`] -- Storage sink, pipeline, and backend traits
//! - [`context`] -- Live session queries and the overwrite prompt
//! - [`messages`] -- Translation-keyed user messages
//! - [`config`] -- Configuration loading from `worldsnap-config.yaml`
//!
//! [`StagingCache`]: cache::StagingCache
//! [`RecencyGate`]: recency::RecencyGate
//! [`DrainCoordinator`]: drain::DrainCoordinator
//! [`DrainReport`]: drain::DrainReport
//! [`CaptureSession`]: session::CaptureSession
//! [`StorageSink`]: sink::StorageSink

pub mod aggregate;
pub mod cache;
pub mod config;
pub mod context;
pub mod drain;
pub mod messages;
pub mod recency;
pub mod session;
pub mod sink;

#[cfg(test)]
mod test_support;

pub use cache::StagingCache;
pub use session::{CaptureSession, SessionError, SessionStatus};
