//! The per-session storage flow.
//!
//! A [`StorageFlow`] is the write pipeline of one capture session. The
//! session side submits snapshots through an unbounded channel, so
//! [`StorageSink::submit`] never waits on the disk. A background task owns
//! the receiving end and writes one JSON document per snapshot.
//!
//! ```text
//! drain ──submit()──▶ mpsc ──▶ writer task ──▶ <saves>/<level>/...
//!                                  │
//!                        Snapshot::End: stop, return counts
//! ```
//!
//! The writer finalizes when it receives [`Snapshot::End`] or when every
//! sender is gone. [`CapturePipeline::finish`] waits for it, bounded by a
//! deadline; a writer that misses the deadline is aborted.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use worldsnap_core::sink::{CapturePipeline, PipelineSummary, SinkError, StorageSink};
use worldsnap_types::Snapshot;

use crate::error::StoreError;
use crate::layout::LevelLayout;

/// Counts kept by the writer task.
#[derive(Debug, Clone, Copy, Default)]
struct WriterStats {
    written: u64,
    failed: u64,
    ended: bool,
}

/// Write pipeline of one capture session.
#[derive(Debug)]
pub struct StorageFlow {
    level_name: String,
    sender: mpsc::UnboundedSender<Snapshot>,
    writer: JoinHandle<WriterStats>,
}

impl StorageFlow {
    /// Spawn the writer task for `level_name` rooted at `target`.
    ///
    /// Any existing contents of `target` are replaced before the first
    /// document is written.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NoRuntime`] if called outside a Tokio runtime.
    pub fn spawn(level_name: &str, target: &Path, pretty: bool) -> Result<Self, StoreError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|source| StoreError::NoRuntime { source })?;
        let (sender, receiver) = mpsc::unbounded_channel();
        let layout = LevelLayout::new(target);
        let writer = runtime.spawn(run_writer(
            level_name.to_owned(),
            layout,
            receiver,
            pretty,
        ));

        info!(
            level_name,
            target = %target.display(),
            "Storage flow started"
        );

        Ok(Self {
            level_name: level_name.to_owned(),
            sender,
            writer,
        })
    }

    /// Name of the level this flow writes.
    pub fn level_name(&self) -> &str {
        &self.level_name
    }
}

impl StorageSink for StorageFlow {
    fn submit(&self, snapshot: Snapshot) -> Result<(), SinkError> {
        self.sender
            .send(snapshot)
            .map_err(|_unsent| SinkError::Closed)
    }
}

impl CapturePipeline for StorageFlow {
    fn finish(self, deadline: Duration) -> impl Future<Output = PipelineSummary> + Send {
        let Self {
            level_name,
            sender,
            mut writer,
        } = self;
        // Without senders the writer stops even if the end marker never
        // arrived.
        drop(sender);

        async move {
            match tokio::time::timeout(deadline, &mut writer).await {
                Ok(Ok(stats)) => {
                    info!(
                        level_name = level_name.as_str(),
                        written = stats.written,
                        failed = stats.failed,
                        "Storage flow finished"
                    );
                    PipelineSummary {
                        written: stats.written,
                        failed: stats.failed,
                        completed: stats.ended,
                    }
                }
                Ok(Err(join_err)) => {
                    error!(
                        level_name = level_name.as_str(),
                        error = %join_err,
                        "Storage flow task failed"
                    );
                    PipelineSummary::default()
                }
                Err(_) => {
                    writer.abort();
                    warn!(
                        level_name = level_name.as_str(),
                        deadline_ms = u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
                        "Storage flow missed its deadline; aborted"
                    );
                    PipelineSummary::default()
                }
            }
        }
    }
}

// =============================================================================
// Writer task
// =============================================================================

async fn run_writer(
    level_name: String,
    layout: LevelLayout,
    mut receiver: mpsc::UnboundedReceiver<Snapshot>,
    pretty: bool,
) -> WriterStats {
    let mut stats = WriterStats::default();

    let prepared = prepare_level_dir(&layout).await;
    if let Err(err) = &prepared {
        error!(
            level_name = level_name.as_str(),
            error = %err,
            "Could not prepare level directory; every document will fail"
        );
    }

    while let Some(snapshot) = receiver.recv().await {
        let kind = snapshot.kind();
        let Some(path) = layout.document_path(&snapshot) else {
            stats.ended = true;
            break;
        };
        if prepared.is_err() {
            stats.failed = stats.failed.saturating_add(1);
            continue;
        }
        match write_document(&path, &snapshot, pretty).await {
            Ok(bytes) => {
                stats.written = stats.written.saturating_add(1);
                debug!(%kind, path = %path.display(), bytes, "Wrote document");
            }
            Err(err) => {
                stats.failed = stats.failed.saturating_add(1);
                warn!(%kind, error = %err, "Failed to write document");
            }
        }
    }

    stats
}

/// Replace any previous level at the layout root with empty directories.
async fn prepare_level_dir(layout: &LevelLayout) -> Result<(), StoreError> {
    let root = layout.root();
    if tokio::fs::try_exists(root)
        .await
        .map_err(StoreError::io_at(root))?
    {
        tokio::fs::remove_dir_all(root)
            .await
            .map_err(StoreError::io_at(root))?;
        debug!(root = %root.display(), "Removed previous level");
    }
    for dir in layout.directories() {
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(StoreError::io_at(&dir))?;
    }
    Ok(())
}

async fn write_document(path: &Path, snapshot: &Snapshot, pretty: bool) -> Result<usize, StoreError> {
    let bytes = encode(snapshot, pretty)?;
    tokio::fs::write(path, &bytes)
        .await
        .map_err(StoreError::io_at(path))?;
    Ok(bytes.len())
}

/// Encode the payload of `snapshot` as JSON. The end marker has no payload.
///
/// # Errors
///
/// Returns the serializer's error if the payload cannot be encoded.
pub fn encode(snapshot: &Snapshot, pretty: bool) -> Result<Vec<u8>, serde_json::Error> {
    fn to_vec<T: serde::Serialize + ?Sized>(
        value: &T,
        pretty: bool,
    ) -> Result<Vec<u8>, serde_json::Error> {
        if pretty {
            serde_json::to_vec_pretty(value)
        } else {
            serde_json::to_vec(value)
        }
    }

    match snapshot {
        Snapshot::Region(region) => to_vec(&**region, pretty),
        Snapshot::RegionEntities(entities) => to_vec(entities, pretty),
        Snapshot::Player(player) => to_vec(player, pretty),
        Snapshot::LevelData(level) => to_vec(level, pretty),
        Snapshot::Advancements(progress) => to_vec(progress, pretty),
        Snapshot::Metadata(metadata) => to_vec(metadata, pretty),
        Snapshot::End => Ok(Vec::new()),
    }
}
