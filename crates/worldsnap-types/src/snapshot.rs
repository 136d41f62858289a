//! The unit of emission handed to the storage sink.
//!
//! A [`Snapshot`] is produced once per staged object (or once per session
//! for the session-wide kinds) during a drain. The sink decides how each
//! kind is encoded and where it lands.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::PlayerId;
use crate::records::{PlayerRecord, RegionEntitySnapshot, RegionSnapshot, WorldInfo};

/// Session-wide level data, written once per capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelData {
    /// Name of the captured level.
    pub level_name: String,
    /// World context at the time of the drain.
    pub world: WorldInfo,
    /// When the capture session started.
    pub started_at: DateTime<Utc>,
}

/// Advancement progress of the local player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvancementsSnapshot {
    /// Local player the progress belongs to, if known.
    pub player: Option<PlayerId>,
    /// Progress document as reported by the game.
    pub progress: serde_json::Value,
}

/// Summary of what a session captured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureMetadata {
    /// Name of the captured level.
    pub level_name: String,
    /// When the capture session started.
    pub started_at: DateTime<Utc>,
    /// When the drain began.
    pub finished_at: DateTime<Utc>,
    /// Number of regions staged.
    pub regions: u64,
    /// Number of regions holding staged entities.
    pub entity_regions: u64,
    /// Number of distinct players staged.
    pub players: u64,
    /// Number of distinct containers whose contents were recorded.
    pub containers: u64,
    /// Identifiers of in-world maps seen during the capture, sorted.
    pub map_ids: Vec<String>,
}

/// Discriminant of a [`Snapshot`], used for logging and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SnapshotKind {
    /// Block data of one region.
    Region,
    /// Aggregated entities of one region.
    RegionEntities,
    /// One player.
    Player,
    /// Session-wide level data.
    LevelData,
    /// Advancement progress.
    Advancements,
    /// Capture summary.
    Metadata,
    /// End-of-session marker.
    End,
}

impl core::fmt::Display for SnapshotKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let label = match self {
            Self::Region => "region",
            Self::RegionEntities => "region_entities",
            Self::Player => "player",
            Self::LevelData => "level_data",
            Self::Advancements => "advancements",
            Self::Metadata => "metadata",
            Self::End => "end",
        };
        f.write_str(label)
    }
}

/// One emitted object, ready for the storage sink.
#[derive(Debug, Clone)]
pub enum Snapshot {
    /// Block data of one region. Shared with the staging cache to avoid
    /// copying block payloads.
    Region(Arc<RegionSnapshot>),
    /// All entities of one region.
    RegionEntities(RegionEntitySnapshot),
    /// One player.
    Player(PlayerRecord),
    /// Session-wide level data.
    LevelData(LevelData),
    /// Advancement progress.
    Advancements(AdvancementsSnapshot),
    /// Capture summary.
    Metadata(CaptureMetadata),
    /// Marks the end of the session; the sink finalizes after it.
    End,
}

impl Snapshot {
    /// Return the kind of this snapshot.
    pub const fn kind(&self) -> SnapshotKind {
        match self {
            Self::Region(_) => SnapshotKind::Region,
            Self::RegionEntities(_) => SnapshotKind::RegionEntities,
            Self::Player(_) => SnapshotKind::Player,
            Self::LevelData(_) => SnapshotKind::LevelData,
            Self::Advancements(_) => SnapshotKind::Advancements,
            Self::Metadata(_) => SnapshotKind::Metadata,
            Self::End => SnapshotKind::End,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_labels_are_snake_case() {
        assert_eq!(SnapshotKind::RegionEntities.to_string(), "region_entities");
        assert_eq!(SnapshotKind::End.to_string(), "end");
    }

    #[test]
    fn end_marker_reports_end_kind() {
        assert_eq!(Snapshot::End.kind(), SnapshotKind::End);
    }
}
