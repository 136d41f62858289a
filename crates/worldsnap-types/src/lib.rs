//! Shared type definitions for the Worldsnap capture pipeline.
//!
//! This crate is the single source of truth for the data that flows from
//! the live world, through the staging cache, into the storage sink.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for entity and player identities
//! - [`region`] -- Region keys (with 64-bit packing) and block positions
//! - [`records`] -- Records staged while a capture is running
//! - [`snapshot`] -- The [`Snapshot`] unit handed to the storage sink

pub mod ids;
pub mod records;
pub mod region;
pub mod snapshot;

// Re-export all public types at crate root for convenience.
pub use ids::{EntityId, PlayerId};
pub use records::{
    BlockEntity, CachedEntityRecord, ContainerRecord, ItemStack, PlayerRecord,
    RegionEntitySnapshot, RegionSnapshot, WorldInfo,
};
pub use region::{BlockPos, REGION_SIZE, RegionKey};
pub use snapshot::{AdvancementsSnapshot, CaptureMetadata, LevelData, Snapshot, SnapshotKind};
