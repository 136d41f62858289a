//! Records staged in memory while a capture session is running.
//!
//! Every record is an immutable snapshot of live world state at the moment
//! it was staged. Producers build a fresh record and hand it over; nothing
//! mutates a record after staging.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{EntityId, PlayerId};
use crate::region::{BlockPos, RegionKey};

/// A stack of items inside a container or inventory slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    /// Namespaced item identifier (e.g. `minecraft:diamond`).
    pub item: String,
    /// Number of items in the stack.
    pub count: u32,
    /// Slot index within the owning inventory.
    pub slot: u16,
}

/// A block entity that lives inside a region (chest, furnace, sign, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockEntity {
    /// Position of the block entity.
    pub pos: BlockPos,
    /// Namespaced block entity type (e.g. `minecraft:chest`).
    pub kind: String,
    /// Whether this block entity is a lockable item container whose
    /// contents only become known once a player opens it.
    pub container: bool,
}

/// Block and structure data of one region, as delivered by the live world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionSnapshot {
    /// The region this snapshot covers.
    pub key: RegionKey,
    /// Dimension the region belongs to (e.g. `minecraft:overworld`).
    pub dimension: String,
    /// Opaque packed block-state payload.
    pub blocks: Vec<u8>,
    /// Block entities resident in the region.
    pub block_entities: Vec<BlockEntity>,
    /// When the snapshot was taken from the live world.
    pub captured_at: DateTime<Utc>,
}

impl RegionSnapshot {
    /// Iterate the lockable containers resident in this region.
    pub fn containers(&self) -> impl Iterator<Item = &BlockEntity> {
        self.block_entities.iter().filter(|entity| entity.container)
    }
}

/// A movable world object, tagged with the region it currently occupies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedEntityRecord {
    /// Identity of the entity. Staging is idempotent on this field.
    pub id: EntityId,
    /// Region the entity occupied when staged.
    pub region: RegionKey,
    /// Namespaced entity type (e.g. `minecraft:villager`).
    pub kind: String,
    /// Exact position in world coordinates.
    pub position: [f64; 3],
    /// Remaining entity state, opaque to the capture core.
    pub data: serde_json::Value,
}

/// A player observed during the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    /// Identity of the player. Staging is idempotent on this field.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Dimension the player was in.
    pub dimension: String,
    /// Exact position in world coordinates.
    pub position: [f64; 3],
    /// Inventory contents.
    pub inventory: Vec<ItemStack>,
}

/// The contents of a container block, recorded once a player opened it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRecord {
    /// Position of the container. Staging is idempotent on this field.
    pub pos: BlockPos,
    /// Namespaced container type.
    pub kind: String,
    /// Items observed inside the container.
    pub items: Vec<ItemStack>,
    /// Whether the container is personal to the local player (an ender
    /// chest). Private contents are only meaningful on a remote session.
    pub private: bool,
}

/// World context needed to encode entities and session-wide metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldInfo {
    /// Dimension currently occupied by the local player.
    pub dimension: String,
    /// In-game time of day in ticks.
    pub day_time: u64,
    /// Total in-game ticks since world creation.
    pub game_time: u64,
}

/// All staged entities of one region merged into a single flushable unit.
///
/// Derived at drain time by the region aggregator; never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionEntitySnapshot {
    /// Region the entities belong to.
    pub key: RegionKey,
    /// Entities staged for the region, ordered by identity.
    pub entities: Vec<CachedEntityRecord>,
    /// World context for encoding.
    pub world: WorldInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn containers_filters_non_container_block_entities() {
        let snapshot = RegionSnapshot {
            key: RegionKey::new(0, 0),
            dimension: String::from("minecraft:overworld"),
            blocks: Vec::new(),
            block_entities: vec![
                BlockEntity {
                    pos: BlockPos::new(1, 64, 1),
                    kind: String::from("minecraft:chest"),
                    container: true,
                },
                BlockEntity {
                    pos: BlockPos::new(2, 64, 1),
                    kind: String::from("minecraft:sign"),
                    container: false,
                },
            ],
            captured_at: Utc::now(),
        };

        let kinds: Vec<&str> = snapshot.containers().map(|c| c.kind.as_str()).collect();
        assert_eq!(kinds, vec!["minecraft:chest"]);
    }
}
