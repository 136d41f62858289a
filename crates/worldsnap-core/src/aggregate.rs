//! Per-region entity aggregation.
//!
//! Entities are staged one record at a time, but storage writes them one
//! region at a time. At drain time the [`RegionAggregator`] merges every
//! entity staged under a region into a single [`RegionEntitySnapshot`].

use worldsnap_types::{RegionEntitySnapshot, RegionKey, WorldInfo};

use crate::cache::StagingCache;

/// Merges staged entity records into per-region snapshots.
#[derive(Debug)]
pub struct RegionAggregator<'a> {
    cache: &'a StagingCache,
    world: WorldInfo,
}

impl<'a> RegionAggregator<'a> {
    /// Create an aggregator over `cache`, stamping snapshots with `world`.
    pub const fn new(cache: &'a StagingCache, world: WorldInfo) -> Self {
        Self { cache, world }
    }

    /// The merged snapshot of one region, or `None` if no entities are
    /// staged there.
    pub fn aggregate(&self, key: RegionKey) -> Option<RegionEntitySnapshot> {
        let entities = self.cache.entities_in(key);
        if entities.is_empty() {
            return None;
        }
        Some(RegionEntitySnapshot {
            key,
            entities,
            world: self.world.clone(),
        })
    }

    /// One snapshot per region holding staged entities.
    ///
    /// The set of regions is read once, when this is called; each region's
    /// entities are read lazily as the iterator advances. A region emptied
    /// mid-iteration is skipped, and no region is yielded twice.
    pub fn aggregate_all(self) -> impl Iterator<Item = RegionEntitySnapshot> + 'a {
        let keys = self.cache.entity_region_keys();
        keys.into_iter().filter_map(move |key| self.aggregate(key))
    }
}
