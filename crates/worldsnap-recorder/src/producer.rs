//! Producer tasks that feed the staging cache while a capture runs.
//!
//! Each producer plays the part of the protocol layer: every tick it
//! "receives" a region with its block entities, a few entities, and now
//! and then a player, an opened container, or a map, and stages them.
//! Producers only touch the shared [`StagingCache`] and the read-only
//! [`SessionStatus`]; they never drive the session.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tracing::debug;
use worldsnap_core::{SessionStatus, StagingCache};
use worldsnap_types::{
    BlockEntity, BlockPos, CachedEntityRecord, ContainerRecord, EntityId, ItemStack, PlayerId,
    PlayerRecord, REGION_SIZE, RegionKey, RegionSnapshot,
};

use crate::world::SimulatedWorld;

const DIMENSION: &str = "minecraft:overworld";

const ENTITY_KINDS: [&str; 6] = [
    "minecraft:cow",
    "minecraft:sheep",
    "minecraft:villager",
    "minecraft:zombie",
    "minecraft:item_frame",
    "minecraft:armor_stand",
];

const ITEMS: [&str; 5] = [
    "minecraft:cobblestone",
    "minecraft:oak_log",
    "minecraft:iron_ingot",
    "minecraft:bread",
    "minecraft:diamond",
];

/// Bytes of block payload per simulated region.
const BLOCK_PAYLOAD_LEN: usize = 256;

/// A player that wanders the simulated world.
#[derive(Debug, Clone)]
pub struct Wanderer {
    /// Stable identity.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
}

impl Wanderer {
    /// A new wanderer with a fresh identity.
    pub fn named(name: &str) -> Self {
        Self {
            id: PlayerId::new(),
            name: name.to_owned(),
        }
    }
}

/// Counts of what one producer staged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProducerStats {
    /// Ticks in which the producer staged anything.
    pub active_ticks: u64,
    /// Region snapshots staged.
    pub regions: u64,
    /// Entity records newly staged.
    pub entities: u64,
    /// Players newly staged.
    pub players: u64,
    /// Containers newly staged.
    pub containers: u64,
}

impl ProducerStats {
    /// Field-wise sum of two stats.
    #[must_use]
    pub const fn merge(self, other: Self) -> Self {
        Self {
            active_ticks: self.active_ticks.saturating_add(other.active_ticks),
            regions: self.regions.saturating_add(other.regions),
            entities: self.entities.saturating_add(other.entities),
            players: self.players.saturating_add(other.players),
            containers: self.containers.saturating_add(other.containers),
        }
    }
}

/// One producer task.
#[derive(Debug)]
pub struct Producer {
    id: usize,
    cache: Arc<StagingCache>,
    status: SessionStatus,
    world: Arc<SimulatedWorld>,
    wanderers: Arc<[Wanderer]>,
    radius: i32,
}

impl Producer {
    /// A producer staging into `cache` while `status` reports a capture.
    pub const fn new(
        id: usize,
        cache: Arc<StagingCache>,
        status: SessionStatus,
        world: Arc<SimulatedWorld>,
        wanderers: Arc<[Wanderer]>,
        radius: i32,
    ) -> Self {
        Self {
            id,
            cache,
            status,
            world,
            wanderers,
            radius,
        }
    }

    /// Run for `ticks` ticks, one every `interval`.
    pub async fn run(self, ticks: u64, interval: Duration) -> ProducerStats {
        let mut stats = ProducerStats::default();
        let mut ticker = tokio::time::interval(interval);
        for _ in 0..ticks {
            ticker.tick().await;
            if !self.status.is_capturing() {
                continue;
            }
            self.world.tick();
            self.produce_tick(&mut stats);
        }
        debug!(producer = self.id, ?stats, "Producer finished");
        stats
    }

    fn produce_tick(&self, stats: &mut ProducerStats) {
        let mut rng = rand::rng();
        stats.active_ticks = stats.active_ticks.saturating_add(1);

        let key = RegionKey::new(
            rng.random_range(-self.radius..=self.radius),
            rng.random_range(-self.radius..=self.radius),
        );
        let origin = BlockPos::new(
            key.x.saturating_mul(REGION_SIZE),
            0,
            key.z.saturating_mul(REGION_SIZE),
        );

        // Region with a handful of chests.
        let chest_count = rng.random_range(0..=3_usize);
        let chests: Vec<BlockEntity> = (0..chest_count)
            .map(|_| BlockEntity {
                pos: random_pos_in(&mut rng, origin),
                kind: String::from("minecraft:chest"),
                container: true,
            })
            .collect();
        let blocks: Vec<u8> = (0..BLOCK_PAYLOAD_LEN).map(|_| rng.random()).collect();
        self.cache.stage_region(RegionSnapshot {
            key,
            dimension: String::from(DIMENSION),
            blocks,
            block_entities: chests.clone(),
            captured_at: Utc::now(),
        });
        stats.regions = stats.regions.saturating_add(1);

        // About half the chests get opened, which records their contents.
        for chest in chests {
            if rng.random_bool(0.5) {
                let pos = chest.pos;
                if self.cache.stage_container(ContainerRecord {
                    pos,
                    kind: chest.kind,
                    items: random_items(&mut rng),
                    private: false,
                }) {
                    stats.containers = stats.containers.saturating_add(1);
                }
                self.cache.set_last_interacted(pos);
            }
        }

        // Entities.
        for _ in 0..rng.random_range(0..=2_u8) {
            let kind_index = rng.random_range(0..ENTITY_KINDS.len());
            let kind = ENTITY_KINDS.get(kind_index).copied().unwrap_or("minecraft:pig");
            let record = CachedEntityRecord {
                id: EntityId::new(),
                region: key,
                kind: kind.to_owned(),
                position: random_point_in(&mut rng, origin),
                data: serde_json::json!({ "health": rng.random_range(1..=20_u8) }),
            };
            if self.cache.stage_entity(key, record) {
                stats.entities = stats.entities.saturating_add(1);
            }
        }

        // A wanderer passes by.
        if rng.random_bool(0.3) {
            let index = rng.random_range(0..self.wanderers.len().max(1));
            if let Some(wanderer) = self.wanderers.get(index) {
                let staged = self.cache.stage_player(PlayerRecord {
                    id: wanderer.id,
                    name: wanderer.name.clone(),
                    dimension: String::from(DIMENSION),
                    position: random_point_in(&mut rng, origin),
                    inventory: random_items(&mut rng),
                });
                if staged {
                    stats.players = stats.players.saturating_add(1);
                }
            }
        }

        // The local player opens their private container.
        if rng.random_bool(0.05) {
            let staged = self.cache.stage_container(ContainerRecord {
                pos: random_pos_in(&mut rng, origin),
                kind: String::from("minecraft:ender_chest"),
                items: random_items(&mut rng),
                private: true,
            });
            if staged {
                stats.containers = stats.containers.saturating_add(1);
            }
        }

        // A map is held up.
        if rng.random_bool(0.05) {
            let _ = self
                .cache
                .stage_map_id(format!("map_{}", rng.random_range(0..16_u8)));
        }
    }
}

fn random_pos_in<R: Rng + ?Sized>(rng: &mut R, origin: BlockPos) -> BlockPos {
    BlockPos::new(
        origin.x.saturating_add(rng.random_range(0..REGION_SIZE)),
        rng.random_range(40..100),
        origin.z.saturating_add(rng.random_range(0..REGION_SIZE)),
    )
}

fn random_point_in<R: Rng + ?Sized>(rng: &mut R, origin: BlockPos) -> [f64; 3] {
    let size = f64::from(REGION_SIZE);
    [
        f64::from(origin.x) + rng.random_range(0.0..size),
        rng.random_range(40.0..100.0),
        f64::from(origin.z) + rng.random_range(0.0..size),
    ]
}

fn random_items<R: Rng + ?Sized>(rng: &mut R) -> Vec<ItemStack> {
    (0..rng.random_range(0..=4_u16))
        .filter_map(|slot| {
            let item = ITEMS.get(rng.random_range(0..ITEMS.len()))?;
            Some(ItemStack {
                item: (*item).to_owned(),
                count: rng.random_range(1..=64),
                slot,
            })
        })
        .collect()
}
