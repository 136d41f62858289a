//! On-disk layout of a captured level.
//!
//! ```text
//! <saves>/<level>/
//!   level.json
//!   advancements.json
//!   metadata.json
//!   region/r.<x>.<z>.json       one per region
//!   entities/e.<x>.<z>.json     one per region holding entities
//!   playerdata/<uuid>.json      one per player
//! ```

use std::path::{Path, PathBuf};

use worldsnap_types::{PlayerId, RegionKey, Snapshot};

/// Directory holding region block data.
pub const REGION_DIR: &str = "region";
/// Directory holding aggregated entity data.
pub const ENTITIES_DIR: &str = "entities";
/// Directory holding one document per player.
pub const PLAYERDATA_DIR: &str = "playerdata";

/// Paths of every document in one captured level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelLayout {
    root: PathBuf,
}

impl LevelLayout {
    /// Layout rooted at the level directory `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The level directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Sub-directories created before the first write.
    pub fn directories(&self) -> [PathBuf; 3] {
        [
            self.root.join(REGION_DIR),
            self.root.join(ENTITIES_DIR),
            self.root.join(PLAYERDATA_DIR),
        ]
    }

    /// Block data of region `key`.
    pub fn region_file(&self, key: RegionKey) -> PathBuf {
        self.root
            .join(REGION_DIR)
            .join(format!("r.{}.{}.json", key.x, key.z))
    }

    /// Entities of region `key`.
    pub fn entities_file(&self, key: RegionKey) -> PathBuf {
        self.root
            .join(ENTITIES_DIR)
            .join(format!("e.{}.{}.json", key.x, key.z))
    }

    /// Player `id`.
    pub fn player_file(&self, id: PlayerId) -> PathBuf {
        self.root.join(PLAYERDATA_DIR).join(format!("{id}.json"))
    }

    /// Session-wide level data.
    pub fn level_file(&self) -> PathBuf {
        self.root.join("level.json")
    }

    /// Advancement progress.
    pub fn advancements_file(&self) -> PathBuf {
        self.root.join("advancements.json")
    }

    /// Capture summary.
    pub fn metadata_file(&self) -> PathBuf {
        self.root.join("metadata.json")
    }

    /// Where `snapshot` is written, or `None` for the end marker.
    pub fn document_path(&self, snapshot: &Snapshot) -> Option<PathBuf> {
        match snapshot {
            Snapshot::Region(region) => Some(self.region_file(region.key)),
            Snapshot::RegionEntities(entities) => Some(self.entities_file(entities.key)),
            Snapshot::Player(player) => Some(self.player_file(player.id)),
            Snapshot::LevelData(_) => Some(self.level_file()),
            Snapshot::Advancements(_) => Some(self.advancements_file()),
            Snapshot::Metadata(_) => Some(self.metadata_file()),
            Snapshot::End => None,
        }
    }
}
