//! Test doubles and record builders shared by this crate's unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::Utc;
use parking_lot::Mutex;
use worldsnap_types::{
    BlockEntity, BlockPos, CachedEntityRecord, ContainerRecord, EntityId, PlayerId, PlayerRecord,
    RegionKey, RegionSnapshot, Snapshot, SnapshotKind, WorldInfo,
};

use crate::context::GameContext;
use crate::sink::{SinkError, StorageSink};

/// A game context with fixed identity that counts the signals it receives.
pub struct StubContext {
    local: bool,
    local_name: Option<String>,
    address: Option<String>,
    stats_requests: AtomicU32,
    private_resets: AtomicU32,
}

impl StubContext {
    pub fn local(name: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            local: true,
            local_name: name.map(str::to_owned),
            address: None,
            stats_requests: AtomicU32::new(0),
            private_resets: AtomicU32::new(0),
        })
    }

    pub fn remote(address: &str) -> Arc<Self> {
        Arc::new(Self {
            local: false,
            local_name: None,
            address: Some(address.to_owned()),
            stats_requests: AtomicU32::new(0),
            private_resets: AtomicU32::new(0),
        })
    }

    pub fn stats_requests(&self) -> u32 {
        self.stats_requests.load(Ordering::SeqCst)
    }

    pub fn private_resets(&self) -> u32 {
        self.private_resets.load(Ordering::SeqCst)
    }
}

impl GameContext for StubContext {
    fn is_local(&self) -> bool {
        self.local
    }

    fn local_level_name(&self) -> Option<String> {
        self.local_name.clone()
    }

    fn remote_address(&self) -> Option<String> {
        self.address.clone()
    }

    fn world_info(&self) -> WorldInfo {
        WorldInfo {
            dimension: String::from("minecraft:overworld"),
            day_time: 6000,
            game_time: 120_000,
        }
    }

    fn local_player(&self) -> Option<PlayerId> {
        None
    }

    fn advancements(&self) -> serde_json::Value {
        serde_json::json!({ "minecraft:story/root": { "done": true } })
    }

    fn request_stats_refresh(&self) {
        self.stats_requests.fetch_add(1, Ordering::SeqCst);
    }

    fn reset_private_container(&self) {
        self.private_resets.fetch_add(1, Ordering::SeqCst);
    }
}

/// A sink that records every submission and can be told to reject some.
#[derive(Default)]
pub struct RecordingSink {
    accepted: Mutex<Vec<Snapshot>>,
    reject: Option<SnapshotKind>,
}

impl RecordingSink {
    /// A sink that rejects every snapshot of `kind`.
    pub fn rejecting(kind: SnapshotKind) -> Self {
        Self {
            accepted: Mutex::new(Vec::new()),
            reject: Some(kind),
        }
    }

    pub fn kinds(&self) -> Vec<SnapshotKind> {
        self.accepted.lock().iter().map(Snapshot::kind).collect()
    }

    pub fn snapshots(&self) -> Vec<Snapshot> {
        self.accepted.lock().clone()
    }
}

impl StorageSink for RecordingSink {
    fn submit(&self, snapshot: Snapshot) -> Result<(), SinkError> {
        if self.reject == Some(snapshot.kind()) {
            return Err(SinkError::Rejected {
                reason: format!("{} rejected by test sink", snapshot.kind()),
            });
        }
        self.accepted.lock().push(snapshot);
        Ok(())
    }
}

pub fn region(key: RegionKey, containers: &[BlockPos]) -> RegionSnapshot {
    RegionSnapshot {
        key,
        dimension: String::from("minecraft:overworld"),
        blocks: vec![1, 2, 3],
        block_entities: containers
            .iter()
            .map(|pos| BlockEntity {
                pos: *pos,
                kind: String::from("minecraft:chest"),
                container: true,
            })
            .collect(),
        captured_at: Utc::now(),
    }
}

pub fn entity(key: RegionKey, kind: &str) -> CachedEntityRecord {
    CachedEntityRecord {
        id: EntityId::new(),
        region: key,
        kind: kind.to_owned(),
        position: [0.5, 64.0, 0.5],
        data: serde_json::Value::Null,
    }
}

pub fn player(name: &str) -> PlayerRecord {
    PlayerRecord {
        id: PlayerId::new(),
        name: name.to_owned(),
        dimension: String::from("minecraft:overworld"),
        position: [0.0, 64.0, 0.0],
        inventory: Vec::new(),
    }
}

pub fn container(pos: BlockPos, private: bool) -> ContainerRecord {
    ContainerRecord {
        pos,
        kind: String::from(if private {
            "minecraft:ender_chest"
        } else {
            "minecraft:chest"
        }),
        items: Vec::new(),
        private,
    }
}
