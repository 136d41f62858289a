//! Capture session state machine.
//!
//! A [`CaptureSession`] owns one [`StagingCache`] and moves between two
//! states:
//!
//! ```text
//!            start()                    stop()
//!   Idle ─────────────────▶ Capturing ─────────────▶ Idle
//!     │                      (close staging, drain, clear, join pipeline)
//!     │ start() on an existing level
//!     ▼
//!   prompt ── resolve_overwrite(yes) ──▶ start(name, confirmed = true)
//!          └─ resolve_overwrite(no)  ──▶ abandoned
//! ```
//!
//! Session transitions take `&mut self`, so exactly one controller drives
//! them. Producers never touch the session: they stage into the shared
//! cache and check [`SessionStatus::is_capturing`].

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::cache::StagingCache;
use crate::config::CaptureConfig;
use crate::context::{ConfirmationPrompt, GameContext};
use crate::drain::{DrainCoordinator, DrainReport};
use crate::messages::{MessageKey, MessageSink};
use crate::sink::{CapturePipeline, PipelineSummary, SinkError, StorageBackend};

/// Maximum length of a level name, in characters.
pub const MAX_LEVEL_NAME_LENGTH: usize = 64;

/// Level name reported before any session has started.
const UNINITIALIZED_LEVEL_NAME: &str = "Not yet initialized";

/// Characters that separate address or path components and cannot appear
/// in a level name derived from one.
const RESERVED_SEPARATORS: [char; 3] = [':', '/', '\\'];

/// Errors returned by session transitions.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// `start()` while a capture is running.
    #[error("already capturing level '{name}'")]
    AlreadyCapturing {
        /// Name of the level being captured.
        name: String,
    },

    /// `stop()` while no capture is running.
    #[error("not capturing")]
    NotCapturing,

    /// The requested level name exceeds [`MAX_LEVEL_NAME_LENGTH`].
    #[error("level name '{name}' is longer than {max} characters")]
    NameTooLong {
        /// The rejected name.
        name: String,
        /// The maximum length.
        max: usize,
    },

    /// The level name does not name a single directory inside the saves
    /// directory.
    #[error("level name '{name}' is not a plain directory name")]
    InvalidLevelName {
        /// The rejected name.
        name: String,
    },

    /// A remote level name was requested with no active connection. Only
    /// reachable through a call-sequencing bug in the caller.
    #[error("no active session context to derive a level name from")]
    MissingSessionContext,

    /// The storage backend could not launch a pipeline.
    #[error("storage pipeline error: {source}")]
    Pipeline {
        /// The underlying sink error.
        #[from]
        source: SinkError,
    },
}

/// Read-only view of the session shared with producer call sites.
#[derive(Debug, Clone)]
pub struct SessionStatus {
    inner: Arc<StatusInner>,
}

#[derive(Debug)]
struct StatusInner {
    capturing: AtomicBool,
    level_name: RwLock<String>,
    started_at: RwLock<Option<DateTime<Utc>>>,
}

impl SessionStatus {
    fn new() -> Self {
        Self {
            inner: Arc::new(StatusInner {
                capturing: AtomicBool::new(false),
                level_name: RwLock::new(String::from(UNINITIALIZED_LEVEL_NAME)),
                started_at: RwLock::new(None),
            }),
        }
    }

    /// Whether a capture is running.
    pub fn is_capturing(&self) -> bool {
        self.inner.capturing.load(Ordering::Acquire)
    }

    /// Name of the current (or most recent) level.
    pub fn level_name(&self) -> String {
        self.inner.level_name.read().clone()
    }

    /// When the current capture started, if one is running.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        *self.inner.started_at.read()
    }

    fn begin(&self, level_name: &str, started_at: DateTime<Utc>) {
        level_name.clone_into(&mut self.inner.level_name.write());
        *self.inner.started_at.write() = Some(started_at);
        self.inner.capturing.store(true, Ordering::Release);
    }

    fn end(&self) {
        self.inner.capturing.store(false, Ordering::Release);
        *self.inner.started_at.write() = None;
    }
}

/// Result of a `start()` call that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// The capture is running.
    Started {
        /// Resolved level name.
        level_name: String,
        /// Directory the level is written to.
        target: PathBuf,
    },
    /// The level already exists; an overwrite prompt was raised and the
    /// session is still idle.
    AwaitingConfirmation {
        /// Resolved level name.
        level_name: String,
        /// Existing directory that would be overwritten.
        target: PathBuf,
    },
}

/// Result of a completed `stop()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopReport {
    /// Name of the level that was captured.
    pub level_name: String,
    /// What the drain submitted.
    pub drain: DrainReport,
    /// How the storage pipeline wound down.
    pub pipeline: PipelineSummary,
}

/// Result of [`CaptureSession::toggle_capture`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureTransition {
    /// `start()` ran.
    Started(StartOutcome),
    /// `stop()` ran.
    Stopped(StopReport),
}

/// A capture in progress.
struct ActiveCapture<P> {
    level_name: String,
    started_at: DateTime<Utc>,
    pipeline: P,
}

enum SessionState<P> {
    Idle,
    Capturing(ActiveCapture<P>),
}

/// The capture controller: owns the staging cache, the session identity,
/// and the session's storage pipeline.
pub struct CaptureSession<B: StorageBackend> {
    config: CaptureConfig,
    cache: Arc<StagingCache>,
    backend: B,
    context: Arc<dyn GameContext>,
    prompt: Arc<dyn ConfirmationPrompt>,
    messages: Arc<dyn MessageSink>,
    status: SessionStatus,
    state: SessionState<B::Pipeline>,
}

impl<B: StorageBackend> CaptureSession<B> {
    /// Create an idle session with an empty cache.
    pub fn new(
        config: CaptureConfig,
        backend: B,
        context: Arc<dyn GameContext>,
        prompt: Arc<dyn ConfirmationPrompt>,
        messages: Arc<dyn MessageSink>,
    ) -> Self {
        let cache = Arc::new(StagingCache::new(Arc::clone(&context), &config));
        Self {
            config,
            cache,
            backend,
            context,
            prompt,
            messages,
            status: SessionStatus::new(),
            state: SessionState::Idle,
        }
    }

    /// The staging cache producers write into.
    pub const fn cache(&self) -> &Arc<StagingCache> {
        &self.cache
    }

    /// A shareable view of the session state.
    pub fn status(&self) -> SessionStatus {
        self.status.clone()
    }

    /// Whether a capture is running.
    pub const fn is_capturing(&self) -> bool {
        matches!(self.state, SessionState::Capturing(_))
    }

    /// Name of the current (or most recent) level.
    pub fn level_name(&self) -> String {
        self.status.level_name()
    }

    /// Directory a level named `level_name` is written to.
    pub fn target_for(&self, level_name: &str) -> PathBuf {
        self.config.saves_dir.join(level_name)
    }

    /// Start a capture.
    ///
    /// `custom_name` overrides the default level name; a blank name falls
    /// back to the default. If the target directory already exists and
    /// `confirmed` is false, an overwrite prompt is raised and the session
    /// stays idle until [`resolve_overwrite`](Self::resolve_overwrite).
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`SessionError::AlreadyCapturing`] if a capture is running.
    /// - [`SessionError::NameTooLong`] if `custom_name` exceeds
    ///   [`MAX_LEVEL_NAME_LENGTH`].
    /// - [`SessionError::InvalidLevelName`] if the resolved name is not a
    ///   single plain path component (`.`, `..`, absolute paths, or names
    ///   containing a separator).
    /// - [`SessionError::MissingSessionContext`] if a remote name is needed
    ///   but there is no connection.
    /// - [`SessionError::Pipeline`] if the storage pipeline cannot launch.
    ///
    /// None of these change the session state.
    pub async fn start(
        &mut self,
        custom_name: Option<&str>,
        confirmed: bool,
    ) -> Result<StartOutcome, SessionError> {
        if let SessionState::Capturing(active) = &self.state {
            let name = active.level_name.clone();
            self.messages
                .error(MessageKey::AlreadyCapturing, std::slice::from_ref(&name));
            return Err(SessionError::AlreadyCapturing { name });
        }

        let level_name = self.resolve_level_name(custom_name)?;
        let target = self.target_for(&level_name);

        if !confirmed && level_exists(&target).await {
            info!(
                level_name = level_name.as_str(),
                target = %target.display(),
                "Level already exists; awaiting overwrite confirmation"
            );
            self.prompt.request_overwrite(&level_name, &target);
            return Ok(StartOutcome::AwaitingConfirmation { level_name, target });
        }

        let pipeline = self.backend.launch(&level_name, &target)?;
        let started_at = Utc::now();
        self.cache.open_staging();
        self.status.begin(&level_name, started_at);
        self.messages
            .info(MessageKey::Started, std::slice::from_ref(&level_name));
        info!(
            level_name = level_name.as_str(),
            target = %target.display(),
            overwrite = confirmed,
            "Capture started"
        );

        self.state = SessionState::Capturing(ActiveCapture {
            level_name: level_name.clone(),
            started_at,
            pipeline,
        });
        Ok(StartOutcome::Started { level_name, target })
    }

    /// Answer an overwrite prompt raised by [`start`](Self::start).
    ///
    /// `overwrite = true` restarts with the same name and `confirmed =
    /// true`; `false` abandons the start and returns `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Any error [`start`](Self::start) can return.
    pub async fn resolve_overwrite(
        &mut self,
        level_name: &str,
        overwrite: bool,
    ) -> Result<Option<StartOutcome>, SessionError> {
        if !overwrite {
            info!(level_name, "Overwrite declined; capture not started");
            return Ok(None);
        }
        self.start(Some(level_name), true).await.map(Some)
    }

    /// Stop the running capture.
    ///
    /// Reports the session as no longer capturing and closes staging, so
    /// producers stop feeding the cache before the drain starts. Then it
    /// signals the protocol layer to refresh statistics, drains every
    /// staged object into the session's pipeline, clears the cache, and
    /// waits for the pipeline to wind down. The drain cannot be cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotCapturing`] if no capture is running.
    pub async fn stop(&mut self) -> Result<StopReport, SessionError> {
        let SessionState::Capturing(active) = std::mem::replace(&mut self.state, SessionState::Idle)
        else {
            self.messages.error(MessageKey::NotCapturing, &[]);
            return Err(SessionError::NotCapturing);
        };
        let ActiveCapture {
            level_name,
            started_at,
            pipeline,
        } = active;

        self.status.end();
        self.cache.close_staging();
        self.messages
            .info(MessageKey::Stopping, std::slice::from_ref(&level_name));
        info!(level_name = level_name.as_str(), "Stopping capture");

        // Stats land in the metadata snapshot built at the end of the drain.
        self.context.request_stats_refresh();

        let drain = DrainCoordinator::new(
            &self.cache,
            &pipeline,
            &*self.context,
            &level_name,
            started_at,
        )
        .drain_all();

        let summary = pipeline.finish(self.config.pipeline_join_timeout()).await;
        if !summary.completed {
            warn!(
                level_name = level_name.as_str(),
                written = summary.written,
                failed = summary.failed,
                "Storage pipeline did not finish cleanly"
            );
        }

        info!(
            level_name = level_name.as_str(),
            submitted = drain.submitted(),
            written = summary.written,
            "Capture stopped"
        );

        Ok(StopReport {
            level_name,
            drain,
            pipeline: summary,
        })
    }

    /// Stop if capturing, otherwise start with the default name.
    ///
    /// # Errors
    ///
    /// Any error [`start`](Self::start) or [`stop`](Self::stop) can return.
    pub async fn toggle_capture(&mut self) -> Result<CaptureTransition, SessionError> {
        if self.is_capturing() {
            self.stop().await.map(CaptureTransition::Stopped)
        } else {
            self.start(None, false).await.map(CaptureTransition::Started)
        }
    }

    /// The level name used when no custom name is given.
    ///
    /// A local session uses its world's name (or the configured fallback);
    /// a remote session uses its sanitized address.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::MissingSessionContext`] if the session is
    /// remote but has no address.
    pub fn default_level_name(&self) -> Result<String, SessionError> {
        if self.context.is_local() {
            return Ok(self.context.local_level_name().map_or_else(
                || self.config.local_fallback_name.clone(),
                |name| sanitize_level_name(&name),
            ));
        }
        self.context
            .remote_address()
            .map(|address| sanitize_level_name(&address))
            .ok_or(SessionError::MissingSessionContext)
    }

    fn resolve_level_name(&self, custom_name: Option<&str>) -> Result<String, SessionError> {
        let name = self.requested_level_name(custom_name)?;
        if is_plain_level_name(&name) {
            Ok(name)
        } else {
            self.messages
                .error(MessageKey::InvalidName, std::slice::from_ref(&name));
            Err(SessionError::InvalidLevelName { name })
        }
    }

    fn requested_level_name(&self, custom_name: Option<&str>) -> Result<String, SessionError> {
        match custom_name {
            Some(name) if name.chars().count() > MAX_LEVEL_NAME_LENGTH => {
                self.messages.error(
                    MessageKey::NameTooLong,
                    &[name.to_owned(), MAX_LEVEL_NAME_LENGTH.to_string()],
                );
                Err(SessionError::NameTooLong {
                    name: name.to_owned(),
                    max: MAX_LEVEL_NAME_LENGTH,
                })
            }
            Some(name) if !name.trim().is_empty() => Ok(name.to_owned()),
            _ => self.default_level_name(),
        }
    }
}

/// Whether `name` is exactly one normal path component, so that joining it
/// onto the saves directory stays directly inside it.
fn is_plain_level_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(part)), None) if part == name
    )
}

/// Whether the level directory exists. An error probing it counts as
/// existing, so the overwrite prompt is never skipped by accident.
async fn level_exists(target: &Path) -> bool {
    match tokio::fs::try_exists(target).await {
        Ok(exists) => exists,
        Err(err) => {
            warn!(
                target = %target.display(),
                error = %err,
                "Could not check for an existing level; treating it as present"
            );
            true
        }
    }
}

/// Replace reserved separator characters with underscores.
pub fn sanitize_level_name(raw: &str) -> String {
    raw.replace(RESERVED_SEPARATORS, "_")
}
