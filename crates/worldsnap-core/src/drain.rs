//! The ordered, total flush of the staging cache at session end.
//!
//! # Order
//!
//! ```text
//! 1. Region            one per staged region (marked persisted on submit)
//! 2. RegionEntities    one per region holding staged entities
//! 3. Player            one per staged player
//! 4. LevelData         once
//! 5. Advancements      once
//! 6. Metadata          once
//! 7. End               once
//! then StagingCache::clear()
//! ```
//!
//! Later kinds may depend on everything before them being submitted, so the
//! order is fixed. A failed submission is recorded in the [`DrainReport`]
//! and the drain moves on; the clear at the end always runs so one bad
//! record cannot pin the cache in memory.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use worldsnap_types::{
    AdvancementsSnapshot, CaptureMetadata, LevelData, RegionKey, Snapshot, SnapshotKind,
};

use crate::aggregate::RegionAggregator;
use crate::cache::StagingCache;
use crate::context::GameContext;
use crate::sink::StorageSink;

/// A single submission the sink refused during a drain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainFailure {
    /// Kind of the refused snapshot.
    pub kind: SnapshotKind,
    /// Region the snapshot covered, for region-scoped kinds.
    pub region: Option<RegionKey>,
    /// The sink's error message.
    pub message: String,
}

/// Outcome of one drain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Region snapshots submitted.
    pub regions: u64,
    /// Aggregated entity snapshots submitted.
    pub entity_regions: u64,
    /// Player snapshots submitted.
    pub players: u64,
    /// Session-wide snapshots submitted (level data, advancements,
    /// metadata, end marker).
    pub session_snapshots: u64,
    /// Submissions the sink refused.
    pub failures: Vec<DrainFailure>,
}

impl DrainReport {
    /// Total snapshots accepted by the sink.
    pub const fn submitted(&self) -> u64 {
        self.regions
            .saturating_add(self.entity_regions)
            .saturating_add(self.players)
            .saturating_add(self.session_snapshots)
    }

    /// Whether every submission was accepted.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Flushes everything staged in a [`StagingCache`] into a [`StorageSink`].
pub struct DrainCoordinator<'a, S: ?Sized> {
    cache: &'a StagingCache,
    sink: &'a S,
    context: &'a dyn GameContext,
    level_name: &'a str,
    started_at: DateTime<Utc>,
}

impl<'a, S: StorageSink + ?Sized> DrainCoordinator<'a, S> {
    /// Create a coordinator for the session capturing `level_name` that
    /// started at `started_at`.
    pub const fn new(
        cache: &'a StagingCache,
        sink: &'a S,
        context: &'a dyn GameContext,
        level_name: &'a str,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            cache,
            sink,
            context,
            level_name,
            started_at,
        }
    }

    /// Submit every staged object in order, then clear the cache.
    ///
    /// Returns once every submission has been issued; completion of the
    /// underlying writes is the sink's concern.
    pub fn drain_all(&self) -> DrainReport {
        let mut report = DrainReport::default();
        let finished_at = Utc::now();

        // Counted up front: the metadata describes what was staged, not
        // what the sink happened to accept.
        let metadata = CaptureMetadata {
            level_name: self.level_name.to_owned(),
            started_at: self.started_at,
            finished_at,
            regions: count(self.cache.region_count()),
            entity_regions: count(self.cache.entity_region_count()),
            players: count(self.cache.player_count()),
            containers: count(self.cache.container_count()),
            map_ids: self.cache.map_ids(),
        };

        // 1. Regions
        for region in self.cache.staged_regions() {
            let key = region.key;
            if self.emit(Snapshot::Region(region), Some(key), &mut report) {
                self.cache.mark_persisted(key);
                report.regions = report.regions.saturating_add(1);
            }
        }

        // 2. Entities, one snapshot per region
        let world = self.context.world_info();
        for snapshot in RegionAggregator::new(self.cache, world.clone()).aggregate_all() {
            let key = snapshot.key;
            if self.emit(Snapshot::RegionEntities(snapshot), Some(key), &mut report) {
                report.entity_regions = report.entity_regions.saturating_add(1);
            }
        }

        // 3. Players
        for player in self.cache.staged_players() {
            if self.emit(Snapshot::Player(player), None, &mut report) {
                report.players = report.players.saturating_add(1);
            }
        }

        // 4-7. Session-wide snapshots
        let session_wide = [
            Snapshot::LevelData(LevelData {
                level_name: self.level_name.to_owned(),
                world,
                started_at: self.started_at,
            }),
            Snapshot::Advancements(AdvancementsSnapshot {
                player: self.context.local_player(),
                progress: self.context.advancements(),
            }),
            Snapshot::Metadata(metadata),
            Snapshot::End,
        ];
        for snapshot in session_wide {
            if self.emit(snapshot, None, &mut report) {
                report.session_snapshots = report.session_snapshots.saturating_add(1);
            }
        }

        self.cache.clear();

        info!(
            level_name = self.level_name,
            regions = report.regions,
            entity_regions = report.entity_regions,
            players = report.players,
            failures = report.failures.len(),
            "Drain complete"
        );
        report
    }

    /// Submit one snapshot, recording a failure instead of propagating it.
    fn emit(&self, snapshot: Snapshot, region: Option<RegionKey>, report: &mut DrainReport) -> bool {
        let kind = snapshot.kind();
        match self.sink.submit(snapshot) {
            Ok(()) => {
                debug!(%kind, ?region, "Submitted snapshot");
                true
            }
            Err(err) => {
                warn!(%kind, ?region, error = %err, "Sink refused snapshot; continuing drain");
                report.failures.push(DrainFailure {
                    kind,
                    region,
                    message: err.to_string(),
                });
                false
            }
        }
    }
}

fn count(len: usize) -> u64 {
    u64::try_from(len).unwrap_or(u64::MAX)
}
