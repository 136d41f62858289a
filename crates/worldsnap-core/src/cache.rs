//! The staging cache: everything resident in the live world that a running
//! capture still has to persist.
//!
//! Objects in the live world are only written to disk once they are
//! evicted, so a capture has to hold on to everything it has seen until
//! the session ends. Producers (world updates, network handlers, UI
//! interaction handlers) stage records here from any thread; the drain at
//! stop time emits them all and then clears the cache.
//!
//! # Concurrency
//!
//! | Operation | Runs concurrently with |
//! |-----------|------------------------|
//! | `stage_*`, `mark_persisted`, `set_last_interacted` | each other, all reads |
//! | `is_persisted`, counts, `missing_containers` | everything |
//! | `clear`, `close_staging`, `open_staging` | reads only; excludes every staging call |
//!
//! All maps are sharded ([`DashMap`]/[`DashSet`]), so writers to distinct
//! keys rarely contend and writers to the same key serialize on its shard.
//! Staging calls additionally hold the shared side of a clear gate; `clear`
//! takes the exclusive side, so every staging call lands either fully
//! before or fully after a clear.
//!
//! While staging is closed every `stage_*` call is dropped. A stopping
//! session closes staging before it drains, so nothing staged after the
//! drain began can survive the final clear.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use dashmap::{DashMap, DashSet};
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use tracing::{debug, info};
use worldsnap_types::{
    BlockEntity, BlockPos, CachedEntityRecord, ContainerRecord, EntityId, PlayerId, PlayerRecord,
    RegionKey, RegionSnapshot,
};

use crate::config::CaptureConfig;
use crate::context::GameContext;
use crate::recency::RecencyGate;

/// Containers resident in staged regions whose contents were never
/// recorded.
pub type MissingContainers = Arc<Vec<BlockEntity>>;

/// Concurrent in-memory store of world data pending persistence.
pub struct StagingCache {
    /// Shared by staging calls, exclusive for `clear`.
    clear_gate: RwLock<()>,
    /// Read under the shared gate, written under the exclusive gate.
    accepting: AtomicBool,
    regions: DashMap<RegionKey, Arc<RegionSnapshot>>,
    /// Packed keys of regions already committed this session.
    persisted: DashSet<u64>,
    entities: DashMap<RegionKey, HashMap<EntityId, CachedEntityRecord>>,
    players: DashMap<PlayerId, PlayerRecord>,
    containers: DashMap<BlockPos, ContainerRecord>,
    map_ids: DashSet<String>,
    last_interacted: Mutex<Option<BlockPos>>,
    missing_containers: RecencyGate<MissingContainers>,
    context: Arc<dyn GameContext>,
    reset_private_container_on_clear: bool,
}

impl StagingCache {
    /// Create an empty cache attached to the given game context. Staging
    /// starts open.
    pub fn new(context: Arc<dyn GameContext>, config: &CaptureConfig) -> Self {
        Self {
            clear_gate: RwLock::new(()),
            accepting: AtomicBool::new(true),
            regions: DashMap::new(),
            persisted: DashSet::new(),
            entities: DashMap::new(),
            players: DashMap::new(),
            containers: DashMap::new(),
            map_ids: DashSet::new(),
            last_interacted: Mutex::new(None),
            missing_containers: RecencyGate::new(config.missing_container_refresh()),
            context,
            reset_private_container_on_clear: config.reset_private_container_on_clear,
        }
    }

    // -----------------------------------------------------------------------
    // Staging
    // -----------------------------------------------------------------------

    /// Stage a region's block data, replacing any earlier snapshot of the
    /// same region.
    pub fn stage_region(&self, snapshot: RegionSnapshot) {
        let Some(_gate) = self.staging_gate() else {
            debug!(region = %snapshot.key, "Staging closed; dropped region");
            return;
        };
        let key = snapshot.key;
        let replaced = self.regions.insert(key, Arc::new(snapshot)).is_some();
        debug!(region = %key, replaced, "Staged region");
    }

    /// Stage an entity under `key`. Returns `false` if an entity with the
    /// same identity was already staged there (the earlier record is kept)
    /// or if staging is closed.
    pub fn stage_entity(&self, key: RegionKey, record: CachedEntityRecord) -> bool {
        let Some(_gate) = self.staging_gate() else {
            return false;
        };
        let mut region = self.entities.entry(key).or_default();
        let mut added = false;
        region.entry(record.id).or_insert_with(|| {
            added = true;
            record
        });
        added
    }

    /// Stage a player. Returns `false` if the player was already staged or
    /// staging is closed.
    pub fn stage_player(&self, record: PlayerRecord) -> bool {
        let Some(_gate) = self.staging_gate() else {
            return false;
        };
        insert_once(&self.players, record.id, record)
    }

    /// Stage a container's observed contents. Returns `false` if the
    /// container was already staged, if staging is closed, or if it is
    /// private to the local player and the session is not verified to be
    /// remote.
    pub fn stage_container(&self, record: ContainerRecord) -> bool {
        if record.private && self.context.is_local() {
            debug!(pos = %record.pos, "Skipped private container in local session");
            return false;
        }
        let Some(_gate) = self.staging_gate() else {
            return false;
        };
        insert_once(&self.containers, record.pos, record)
    }

    /// Record an in-world map identifier seen during the capture.
    pub fn stage_map_id(&self, map_id: impl Into<String>) -> bool {
        let Some(_gate) = self.staging_gate() else {
            return false;
        };
        self.map_ids.insert(map_id.into())
    }

    /// Remember the container the player interacted with most recently.
    pub fn set_last_interacted(&self, pos: BlockPos) {
        let Some(_gate) = self.staging_gate() else {
            return;
        };
        *self.last_interacted.lock() = Some(pos);
    }

    /// Stop accepting staged data. Waits for in-flight staging calls; every
    /// later `stage_*` call is dropped until [`open_staging`](Self::open_staging).
    pub fn close_staging(&self) {
        let _gate = self.clear_gate.write();
        self.accepting.store(false, Ordering::Release);
        debug!("Staging closed");
    }

    /// Accept staged data again.
    pub fn open_staging(&self) {
        let _gate = self.clear_gate.write();
        self.accepting.store(true, Ordering::Release);
        debug!("Staging opened");
    }

    /// Whether `stage_*` calls are currently accepted.
    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }

    /// Shared side of the clear gate, if staging is open.
    fn staging_gate(&self) -> Option<RwLockReadGuard<'_, ()>> {
        let gate = self.clear_gate.read();
        self.accepting.load(Ordering::Acquire).then_some(gate)
    }

    /// The container the player interacted with most recently, if any.
    pub fn last_interacted(&self) -> Option<BlockPos> {
        *self.last_interacted.lock()
    }

    // -----------------------------------------------------------------------
    // Persisted regions
    // -----------------------------------------------------------------------

    /// Record that `key` has been committed to storage. Append-only until
    /// the next [`clear`](Self::clear).
    pub fn mark_persisted(&self, key: RegionKey) {
        let _gate = self.clear_gate.read();
        self.persisted.insert(key.pack());
    }

    /// Whether the chunk at (`chunk_x`, `chunk_z`) has been committed to
    /// storage during this session. A chunk is one cell of the region grid,
    /// addressed like [`RegionKey`].
    ///
    /// Part of the public query surface used by external map tooling; safe
    /// to call from any thread and free of side effects.
    pub fn is_persisted(&self, chunk_x: i32, chunk_z: i32) -> bool {
        self.persisted
            .contains(&RegionKey::new(chunk_x, chunk_z).pack())
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// The staged snapshot of one region.
    pub fn region(&self, key: RegionKey) -> Option<Arc<RegionSnapshot>> {
        self.regions.get(&key).map(|entry| Arc::clone(entry.value()))
    }

    /// Point-in-time copy of every staged region snapshot, ordered by key.
    pub fn staged_regions(&self) -> Vec<Arc<RegionSnapshot>> {
        let mut regions: Vec<Arc<RegionSnapshot>> = self
            .regions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        regions.sort_by_key(|snapshot| snapshot.key);
        regions
    }

    /// Point-in-time copy of every staged player, ordered by identity.
    pub fn staged_players(&self) -> Vec<PlayerRecord> {
        let mut players: Vec<PlayerRecord> =
            self.players.iter().map(|entry| entry.value().clone()).collect();
        players.sort_by_key(|player| player.id);
        players
    }

    /// Keys of every region currently holding staged entities, ordered.
    pub fn entity_region_keys(&self) -> Vec<RegionKey> {
        let mut keys: Vec<RegionKey> = self
            .entities
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| *entry.key())
            .collect();
        keys.sort_unstable();
        keys
    }

    /// Copy of the entities staged under `key`, ordered by identity.
    pub fn entities_in(&self, key: RegionKey) -> Vec<CachedEntityRecord> {
        let mut records: Vec<CachedEntityRecord> = self
            .entities
            .get(&key)
            .map(|region| region.values().cloned().collect())
            .unwrap_or_default();
        records.sort_by_key(|record| record.id);
        records
    }

    /// Whether the contents of the container at `pos` have been staged.
    pub fn has_container(&self, pos: &BlockPos) -> bool {
        self.containers.contains_key(pos)
    }

    /// Map identifiers seen during the capture, sorted.
    pub fn map_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.map_ids.iter().map(|id| id.key().clone()).collect();
        ids.sort_unstable();
        ids
    }

    /// Number of staged regions.
    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    /// Number of regions holding at least one staged entity.
    pub fn entity_region_count(&self) -> usize {
        self.entities
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .count()
    }

    /// Total number of staged entities across all regions.
    pub fn entity_count(&self) -> usize {
        self.entities.iter().map(|entry| entry.value().len()).sum()
    }

    /// Number of staged players.
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Number of staged containers.
    pub fn container_count(&self) -> usize {
        self.containers.len()
    }

    /// Number of regions recorded as persisted.
    pub fn persisted_count(&self) -> usize {
        self.persisted.len()
    }

    /// Whether every map and set in the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
            && self.persisted.is_empty()
            && self.entities.is_empty()
            && self.players.is_empty()
            && self.containers.is_empty()
            && self.map_ids.is_empty()
            && self.last_interacted.lock().is_none()
    }

    // -----------------------------------------------------------------------
    // Diagnostics
    // -----------------------------------------------------------------------

    /// Containers resident in staged regions whose contents have not been
    /// recorded yet. Recomputed at most once per configured interval.
    pub fn missing_containers(&self) -> MissingContainers {
        self.missing_containers_at(Instant::now())
    }

    /// [`missing_containers`](Self::missing_containers) as of `now`.
    pub fn missing_containers_at(&self, now: Instant) -> MissingContainers {
        self.missing_containers.get_at(now, || {
            let regions = self.staged_regions();
            Arc::new(find_missing_containers(
                regions.iter().map(|snapshot| &**snapshot),
                |pos| self.has_container(pos),
            ))
        })
    }

    // -----------------------------------------------------------------------
    // Clear
    // -----------------------------------------------------------------------

    /// Empty every map and set, forget the last interacted container, and
    /// reset the transient private container of a remote session.
    ///
    /// Waits for in-flight staging calls to finish and holds new ones off
    /// until the cache is fully cleared.
    pub fn clear(&self) {
        let _gate = self.clear_gate.write();
        self.regions.clear();
        self.persisted.clear();
        self.entities.clear();
        self.players.clear();
        self.containers.clear();
        self.map_ids.clear();
        *self.last_interacted.lock() = None;
        self.missing_containers.invalidate();
        // A stale private container would be saved again by the next
        // capture on another server.
        if self.reset_private_container_on_clear && !self.context.is_local() {
            self.context.reset_private_container();
        }
        info!("Cleared staging cache");
    }
}

impl core::fmt::Debug for StagingCache {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StagingCache")
            .field("regions", &self.region_count())
            .field("persisted", &self.persisted_count())
            .field("entity_regions", &self.entity_region_count())
            .field("players", &self.player_count())
            .field("containers", &self.container_count())
            .field("map_ids", &self.map_ids.len())
            .finish_non_exhaustive()
    }
}

/// Insert `value` under `key` unless the key is present. Returns whether
/// the value was inserted.
fn insert_once<K, V>(map: &DashMap<K, V>, key: K, value: V) -> bool
where
    K: Eq + std::hash::Hash,
{
    match map.entry(key) {
        dashmap::mapref::entry::Entry::Occupied(_) => false,
        dashmap::mapref::entry::Entry::Vacant(slot) => {
            slot.insert(value);
            true
        }
    }
}

/// Lockable containers in `regions` for which `is_recorded` is false.
pub fn find_missing_containers<'a>(
    regions: impl IntoIterator<Item = &'a RegionSnapshot>,
    is_recorded: impl Fn(&BlockPos) -> bool,
) -> Vec<BlockEntity> {
    regions
        .into_iter()
        .flat_map(RegionSnapshot::containers)
        .filter(|container| !is_recorded(&container.pos))
        .cloned()
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::test_support::{StubContext, container, entity, player, region};

    fn make_cache(context: &Arc<StubContext>) -> StagingCache {
        let context: Arc<dyn GameContext> = Arc::clone(context) as Arc<dyn GameContext>;
        StagingCache::new(context, &CaptureConfig::default())
    }

    #[test]
    fn region_staging_is_last_write_wins() {
        let ctx = StubContext::remote("play.example.net:25565");
        let cache = make_cache(&ctx);
        let key = RegionKey::new(3, -4);

        cache.stage_region(region(key, &[]));
        let mut newer = region(key, &[]);
        newer.blocks = vec![9, 9, 9];
        cache.stage_region(newer);

        assert_eq!(cache.region_count(), 1);
        assert_eq!(cache.region(key).unwrap().blocks, vec![9, 9, 9]);
    }

    #[test]
    fn entity_staging_is_idempotent_by_identity() {
        let ctx = StubContext::remote("host");
        let cache = make_cache(&ctx);
        let key = RegionKey::new(0, 0);
        let first = entity(key, "minecraft:cow");
        let mut duplicate = first.clone();
        duplicate.kind = String::from("minecraft:pig");

        assert!(cache.stage_entity(key, first));
        assert!(!cache.stage_entity(key, duplicate));

        let staged = cache.entities_in(key);
        assert_eq!(staged.len(), 1);
        assert_eq!(staged[0].kind, "minecraft:cow");
    }

    #[test]
    fn players_and_containers_are_sets() {
        let ctx = StubContext::remote("host");
        let cache = make_cache(&ctx);
        let steve = player("Steve");

        assert!(cache.stage_player(steve.clone()));
        assert!(!cache.stage_player(steve));
        assert!(cache.stage_container(container(BlockPos::new(1, 64, 1), false)));
        assert!(!cache.stage_container(container(BlockPos::new(1, 64, 1), false)));

        assert_eq!(cache.player_count(), 1);
        assert_eq!(cache.container_count(), 1);
    }

    #[test]
    fn private_containers_are_skipped_in_local_sessions() {
        let local = StubContext::local(Some("My World"));
        let cache = make_cache(&local);
        assert!(!cache.stage_container(container(BlockPos::new(0, 70, 0), true)));
        assert_eq!(cache.container_count(), 0);

        let remote = StubContext::remote("host");
        let cache = make_cache(&remote);
        assert!(cache.stage_container(container(BlockPos::new(0, 70, 0), true)));
        assert_eq!(cache.container_count(), 1);
    }

    #[test]
    fn persisted_set_answers_by_coordinates() {
        let ctx = StubContext::remote("host");
        let cache = make_cache(&ctx);

        assert!(!cache.is_persisted(-2, 7));
        cache.mark_persisted(RegionKey::new(-2, 7));
        assert!(cache.is_persisted(-2, 7));
        assert!(!cache.is_persisted(7, -2));

        cache.mark_persisted(RegionKey::new(-2, 7));
        assert_eq!(cache.persisted_count(), 1);
    }

    #[test]
    fn clear_empties_everything_and_resets_private_container() {
        let ctx = StubContext::remote("host");
        let cache = make_cache(&ctx);
        let key = RegionKey::new(1, 1);

        cache.stage_region(region(key, &[BlockPos::new(17, 64, 17)]));
        let _ = cache.stage_entity(key, entity(key, "minecraft:cow"));
        let _ = cache.stage_player(player("Alex"));
        let _ = cache.stage_container(container(BlockPos::new(17, 64, 17), false));
        let _ = cache.stage_map_id("map_12");
        cache.set_last_interacted(BlockPos::new(17, 64, 17));
        cache.mark_persisted(key);

        cache.clear();

        assert!(cache.is_empty());
        assert!(!cache.is_persisted(1, 1));
        assert_eq!(cache.last_interacted(), None);
        assert_eq!(ctx.private_resets(), 1);
    }

    #[test]
    fn clear_in_local_session_leaves_private_container_alone() {
        let ctx = StubContext::local(None);
        let cache = make_cache(&ctx);
        cache.clear();
        assert_eq!(ctx.private_resets(), 0);
    }

    #[test]
    fn clear_respects_reset_setting() {
        let ctx = StubContext::remote("host");
        let config = CaptureConfig {
            reset_private_container_on_clear: false,
            ..CaptureConfig::default()
        };
        let cache = StagingCache::new(Arc::clone(&ctx) as Arc<dyn GameContext>, &config);
        cache.clear();
        assert_eq!(ctx.private_resets(), 0);
    }

    #[test]
    fn missing_containers_excludes_recorded_ones() {
        let ctx = StubContext::remote("host");
        let cache = make_cache(&ctx);
        let opened = BlockPos::new(2, 64, 2);
        let unopened = BlockPos::new(3, 64, 3);
        cache.stage_region(region(RegionKey::new(0, 0), &[opened, unopened]));
        let _ = cache.stage_container(container(opened, false));

        let missing = cache.missing_containers();
        let positions: Vec<BlockPos> = missing.iter().map(|c| c.pos).collect();
        assert_eq!(positions, vec![unopened]);
    }

    #[test]
    fn missing_containers_is_debounced() {
        let ctx = StubContext::remote("host");
        let cache = make_cache(&ctx);
        let pos = BlockPos::new(4, 64, 4);
        let start = Instant::now();
        cache.stage_region(region(RegionKey::new(0, 0), &[pos]));

        let first = cache.missing_containers_at(start);
        let _ = cache.stage_container(container(pos, false));
        let within = cache.missing_containers_at(start + Duration::from_millis(50));
        let after = cache.missing_containers_at(start + Duration::from_millis(100));

        assert_eq!(*first, *within);
        assert_eq!(first.len(), 1);
        assert!(after.is_empty());
    }

    #[test]
    fn closed_staging_drops_every_write() {
        let ctx = StubContext::remote("host");
        let cache = make_cache(&ctx);
        let key = RegionKey::new(5, 5);
        assert!(cache.is_accepting());

        cache.close_staging();
        cache.stage_region(region(key, &[]));
        assert!(!cache.stage_entity(key, entity(key, "minecraft:cow")));
        assert!(!cache.stage_player(player("Alex")));
        assert!(!cache.stage_container(container(BlockPos::new(80, 64, 80), false)));
        assert!(!cache.stage_map_id("map_1"));
        cache.set_last_interacted(BlockPos::new(80, 64, 80));

        assert!(!cache.is_accepting());
        assert!(cache.is_empty());

        cache.open_staging();
        cache.stage_region(region(key, &[]));
        assert_eq!(cache.region_count(), 1);
    }

    #[test]
    fn closed_staging_still_records_persisted_regions() {
        let ctx = StubContext::remote("host");
        let cache = make_cache(&ctx);
        cache.close_staging();
        cache.mark_persisted(RegionKey::new(1, 2));
        assert!(cache.is_persisted(1, 2));
    }

    #[test]
    fn nothing_lands_after_close_and_clear() {
        let ctx = StubContext::remote("host");
        let cache = Arc::new(make_cache(&ctx));

        let stagers: Vec<_> = (0..4)
            .map(|worker: i32| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..500 {
                        let key = RegionKey::new(worker, i);
                        cache.stage_region(region(key, &[]));
                        let _ = cache.stage_entity(key, entity(key, "minecraft:bat"));
                    }
                })
            })
            .collect();
        thread::sleep(Duration::from_millis(1));
        cache.close_staging();
        cache.clear();
        for stager in stagers {
            stager.join().unwrap();
        }

        assert!(cache.is_empty());
    }

    #[test]
    fn concurrent_writers_to_distinct_keys() {
        let ctx = StubContext::remote("host");
        let cache = Arc::new(make_cache(&ctx));

        let handles: Vec<_> = (0..8)
            .map(|worker: i32| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..50 {
                        let key = RegionKey::new(worker, i);
                        cache.stage_region(region(key, &[]));
                        let _ = cache.stage_entity(key, entity(key, "minecraft:bat"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.region_count(), 400);
        assert_eq!(cache.entity_count(), 400);
    }

    #[test]
    fn clear_racing_with_stagers_never_leaves_partial_state() {
        let ctx = StubContext::remote("host");
        let cache = Arc::new(make_cache(&ctx));

        let stager = {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for i in 0..500 {
                    let key = RegionKey::new(i, i);
                    cache.stage_region(region(key, &[]));
                    cache.mark_persisted(key);
                }
            })
        };
        for _ in 0..20 {
            cache.clear();
        }
        stager.join().unwrap();

        // A region that survived every clear was also marked persisted
        // after the last one.
        for snapshot in cache.staged_regions() {
            assert!(cache.is_persisted(snapshot.key.x, snapshot.key.z));
        }
    }
}
