//! Test doubles shared by the `worldsnap-core` integration tests.

#![allow(dead_code, clippy::unwrap_used)]

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use worldsnap_core::config::CaptureConfig;
use worldsnap_core::context::{ConfirmationPrompt, GameContext};
use worldsnap_core::messages::{MessageKey, MessageSink};
use worldsnap_core::sink::{
    CapturePipeline, PipelineSummary, SinkError, StorageBackend, StorageSink,
};
use worldsnap_core::{CaptureSession, SessionStatus, StagingCache};
use worldsnap_types::{
    CachedEntityRecord, EntityId, PlayerId, PlayerRecord, RegionKey, RegionSnapshot, Snapshot,
    SnapshotKind, WorldInfo,
};

// =============================================================================
// Game context
// =============================================================================

/// A game context with fixed identity.
pub struct TestContext {
    local: bool,
    name: Option<String>,
    address: Option<String>,
    stats_requests: AtomicU32,
}

impl TestContext {
    pub fn local(name: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            local: true,
            name: name.map(str::to_owned),
            address: None,
            stats_requests: AtomicU32::new(0),
        })
    }

    pub fn remote(address: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            local: false,
            name: None,
            address: address.map(str::to_owned),
            stats_requests: AtomicU32::new(0),
        })
    }

    pub fn stats_requests(&self) -> u32 {
        self.stats_requests.load(Ordering::SeqCst)
    }
}

impl GameContext for TestContext {
    fn is_local(&self) -> bool {
        self.local
    }

    fn local_level_name(&self) -> Option<String> {
        self.name.clone()
    }

    fn remote_address(&self) -> Option<String> {
        self.address.clone()
    }

    fn world_info(&self) -> WorldInfo {
        WorldInfo {
            dimension: String::from("minecraft:overworld"),
            day_time: 1000,
            game_time: 24_000,
        }
    }

    fn local_player(&self) -> Option<PlayerId> {
        None
    }

    fn advancements(&self) -> serde_json::Value {
        serde_json::Value::Null
    }

    fn request_stats_refresh(&self) {
        self.stats_requests.fetch_add(1, Ordering::SeqCst);
    }

    fn reset_private_container(&self) {}
}

// =============================================================================
// Storage backend
// =============================================================================

/// Backend whose pipelines append every submission to a shared log.
#[derive(Clone, Default)]
pub struct RecordingBackend {
    pub launches: Arc<Mutex<Vec<(String, PathBuf)>>>,
    pub log: Arc<Mutex<Vec<Snapshot>>>,
}

impl RecordingBackend {
    pub fn kinds(&self) -> Vec<SnapshotKind> {
        self.log.lock().iter().map(Snapshot::kind).collect()
    }

    pub fn launch_count(&self) -> usize {
        self.launches.lock().len()
    }
}

/// Pipeline produced by [`RecordingBackend`].
pub struct RecordingPipeline {
    log: Arc<Mutex<Vec<Snapshot>>>,
}

impl StorageSink for RecordingPipeline {
    fn submit(&self, snapshot: Snapshot) -> Result<(), SinkError> {
        self.log.lock().push(snapshot);
        Ok(())
    }
}

impl CapturePipeline for RecordingPipeline {
    fn finish(self, _deadline: Duration) -> impl Future<Output = PipelineSummary> + Send {
        let written = u64::try_from(self.log.lock().len()).unwrap();
        async move {
            PipelineSummary {
                written,
                failed: 0,
                completed: true,
            }
        }
    }
}

impl StorageBackend for RecordingBackend {
    type Pipeline = RecordingPipeline;

    fn launch(&self, level_name: &str, target: &Path) -> Result<Self::Pipeline, SinkError> {
        self.log.lock().clear();
        self.launches
            .lock()
            .push((level_name.to_owned(), target.to_path_buf()));
        Ok(RecordingPipeline {
            log: Arc::clone(&self.log),
        })
    }
}

/// Backend whose pipelines keep staging into the cache while the session
/// still reports a capture, once on every submission and once more while
/// being joined. Stands in for a producer that races the stop.
#[derive(Clone, Default)]
pub struct RacingBackend {
    pub producer: Arc<Mutex<Option<(Arc<StagingCache>, SessionStatus)>>>,
    pub log: Arc<Mutex<Vec<Snapshot>>>,
    pub unchecked: bool,
}

impl RacingBackend {
    /// Attach the producer side of `session`.
    pub fn attach<B: StorageBackend>(&self, session: &CaptureSession<B>) {
        *self.producer.lock() = Some((Arc::clone(session.cache()), session.status()));
    }
}

/// Pipeline produced by [`RacingBackend`].
pub struct RacingPipeline {
    backend: RacingBackend,
}

impl RacingPipeline {
    fn stage(&self, x: i32) {
        let Some((cache, status)) = self.backend.producer.lock().clone() else {
            return;
        };
        if self.backend.unchecked || status.is_capturing() {
            let key = RegionKey::new(x, 7);
            cache.stage_region(region(x, 7));
            let _ = cache.stage_entity(key, entity(key, "minecraft:bee"));
            let _ = cache.stage_player(player("Late"));
        }
    }
}

impl StorageSink for RacingPipeline {
    fn submit(&self, snapshot: Snapshot) -> Result<(), SinkError> {
        let index = self.backend.log.lock().len();
        self.backend.log.lock().push(snapshot);
        self.stage(i32::try_from(index).unwrap_or(i32::MAX));
        Ok(())
    }
}

impl CapturePipeline for RacingPipeline {
    fn finish(self, _deadline: Duration) -> impl Future<Output = PipelineSummary> + Send {
        self.stage(-1);
        let written = u64::try_from(self.backend.log.lock().len()).unwrap();
        async move {
            PipelineSummary {
                written,
                failed: 0,
                completed: true,
            }
        }
    }
}

impl StorageBackend for RacingBackend {
    type Pipeline = RacingPipeline;

    fn launch(&self, _level_name: &str, _target: &Path) -> Result<Self::Pipeline, SinkError> {
        Ok(RacingPipeline {
            backend: self.clone(),
        })
    }
}

// =============================================================================
// Prompt and messages
// =============================================================================

/// Records every overwrite prompt raised.
#[derive(Default)]
pub struct PromptLog {
    pub requests: Mutex<Vec<(String, PathBuf)>>,
}

impl ConfirmationPrompt for PromptLog {
    fn request_overwrite(&self, level_name: &str, target: &Path) {
        self.requests
            .lock()
            .push((level_name.to_owned(), target.to_path_buf()));
    }
}

/// Records every user message delivered.
#[derive(Default)]
pub struct MessageLog {
    pub infos: Mutex<Vec<(MessageKey, Vec<String>)>>,
    pub errors: Mutex<Vec<(MessageKey, Vec<String>)>>,
}

impl MessageLog {
    pub fn error_keys(&self) -> Vec<MessageKey> {
        self.errors.lock().iter().map(|(key, _)| *key).collect()
    }

    pub fn info_keys(&self) -> Vec<MessageKey> {
        self.infos.lock().iter().map(|(key, _)| *key).collect()
    }
}

impl MessageSink for MessageLog {
    fn info(&self, key: MessageKey, args: &[String]) {
        self.infos.lock().push((key, args.to_vec()));
    }

    fn error(&self, key: MessageKey, args: &[String]) {
        self.errors.lock().push((key, args.to_vec()));
    }
}

// =============================================================================
// Harness
// =============================================================================

/// A session wired to recording doubles and a temporary saves directory.
pub struct Harness {
    pub session: CaptureSession<RecordingBackend>,
    pub backend: RecordingBackend,
    pub context: Arc<TestContext>,
    pub prompt: Arc<PromptLog>,
    pub messages: Arc<MessageLog>,
    pub saves: tempfile::TempDir,
}

impl Harness {
    pub fn new(context: Arc<TestContext>) -> Self {
        let saves = tempfile::tempdir().unwrap();
        let saves_dir = saves.path().to_path_buf();
        Self::in_dir(context, saves, saves_dir)
    }

    /// A harness whose levels go under `saves_dir` instead of the tempdir
    /// root. The tempdir is still owned and removed on drop.
    pub fn in_dir(context: Arc<TestContext>, saves: tempfile::TempDir, saves_dir: PathBuf) -> Self {
        let backend = RecordingBackend::default();
        let prompt = Arc::new(PromptLog::default());
        let messages = Arc::new(MessageLog::default());
        let session = session_with(
            backend.clone(),
            Arc::clone(&context),
            saves_dir,
            Arc::clone(&prompt),
            Arc::clone(&messages),
        );
        Self {
            session,
            backend,
            context,
            prompt,
            messages,
            saves,
        }
    }

    pub fn local(name: &str) -> Self {
        Self::new(TestContext::local(Some(name)))
    }
}

/// A session over any backend, writing levels under `saves_dir`.
pub fn session_with<B: StorageBackend>(
    backend: B,
    context: Arc<TestContext>,
    saves_dir: PathBuf,
    prompt: Arc<PromptLog>,
    messages: Arc<MessageLog>,
) -> CaptureSession<B> {
    let config = CaptureConfig {
        saves_dir,
        ..CaptureConfig::default()
    };
    CaptureSession::new(
        config,
        backend,
        context as Arc<dyn GameContext>,
        prompt as Arc<dyn ConfirmationPrompt>,
        messages as Arc<dyn MessageSink>,
    )
}

// =============================================================================
// Record builders
// =============================================================================

pub fn region(x: i32, z: i32) -> RegionSnapshot {
    RegionSnapshot {
        key: RegionKey::new(x, z),
        dimension: String::from("minecraft:overworld"),
        blocks: vec![0; 16],
        block_entities: Vec::new(),
        captured_at: Utc::now(),
    }
}

pub fn entity(key: RegionKey, kind: &str) -> CachedEntityRecord {
    CachedEntityRecord {
        id: EntityId::new(),
        region: key,
        kind: kind.to_owned(),
        position: [1.0, 70.0, 1.0],
        data: serde_json::Value::Null,
    }
}

pub fn player(name: &str) -> PlayerRecord {
    PlayerRecord {
        id: PlayerId::new(),
        name: name.to_owned(),
        dimension: String::from("minecraft:overworld"),
        position: [0.0, 70.0, 0.0],
        inventory: Vec::new(),
    }
}
