//! Debounced derived values.
//!
//! A [`RecencyGate`] caches the result of an expensive computation together
//! with the instant it was computed. Reads within the debounce interval
//! return the cached value; the first read after the interval recomputes.
//!
//! The gate owns no computation of its own. Callers pass the recompute
//! function on each read, which keeps that function pure and lets tests
//! drive the gate with explicit instants instead of sleeping.

use std::time::{Duration, Instant};

use parking_lot::RwLock;

/// A cached value and the instant it was computed.
#[derive(Debug, Clone)]
struct Computed<T> {
    value: T,
    at: Instant,
}

/// A value recomputed at most once per `interval`.
///
/// Concurrent readers share the cached value under a read lock. A stale
/// read takes the write lock and re-checks before recomputing, so racing
/// readers recompute once.
#[derive(Debug)]
pub struct RecencyGate<T> {
    interval: Duration,
    slot: RwLock<Option<Computed<T>>>,
}

impl<T: Clone> RecencyGate<T> {
    /// Create an empty gate. The first read always computes.
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            slot: RwLock::new(None),
        }
    }

    /// The debounce interval.
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Read the value, recomputing it with `compute` if it is stale.
    pub fn get(&self, compute: impl FnOnce() -> T) -> T {
        self.get_at(Instant::now(), compute)
    }

    /// Read the value as of `now`, recomputing it with `compute` if the
    /// cached value is older than the interval.
    pub fn get_at(&self, now: Instant, compute: impl FnOnce() -> T) -> T {
        if let Some(value) = self.fresh(&self.slot.read(), now) {
            return value;
        }

        let mut slot = self.slot.write();
        if let Some(value) = self.fresh(&slot, now) {
            return value;
        }
        let value = compute();
        *slot = Some(Computed {
            value: value.clone(),
            at: now,
        });
        value
    }

    /// Drop the cached value so the next read recomputes.
    pub fn invalidate(&self) {
        *self.slot.write() = None;
    }

    fn fresh(&self, slot: &Option<Computed<T>>, now: Instant) -> Option<T> {
        slot.as_ref()
            .filter(|computed| now.saturating_duration_since(computed.at) < self.interval)
            .map(|computed| computed.value.clone())
    }
}
