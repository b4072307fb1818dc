//! Contention counters and a station exclusivity probe.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use crate::types::StationId;

/// Point-in-time copy of the counters, for reports.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub served: u64,
    pub failed: u64,
    pub order_races: u64,
    pub reservation_denials: u64,
    pub plate_rejections: u64,
    pub poll_retries: u64,
    pub max_concurrent_holders: usize,
    pub reservation_violation: bool,
}

/// Kitchen-wide counters updated by workers.
///
/// The exclusivity probe is independent of the stations' own locking: workers
/// call `enter` after a successful reservation and `pre_release` right before
/// giving it up, so two holders of one station show up as a violation.
pub struct KitchenStats {
    served: AtomicU64,
    failed: AtomicU64,
    order_races: AtomicU64,
    reservation_denials: AtomicU64,
    plate_rejections: AtomicU64,
    poll_retries: AtomicU64,
    occupancy: AtomicUsize,
    max_occupancy: AtomicUsize,
    violation: AtomicBool,
    holders: Mutex<HashMap<StationId, usize>>,
}

impl KitchenStats {
    pub fn new() -> Self {
        Self {
            served: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            order_races: AtomicU64::new(0),
            reservation_denials: AtomicU64::new(0),
            plate_rejections: AtomicU64::new(0),
            poll_retries: AtomicU64::new(0),
            occupancy: AtomicUsize::new(0),
            max_occupancy: AtomicUsize::new(0),
            violation: AtomicBool::new(false),
            holders: Mutex::new(HashMap::new()),
        }
    }

    pub fn record_served(&self) {
        self.served.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_order_race(&self) {
        self.order_races.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_denial(&self) {
        self.reservation_denials.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_plate_rejection(&self) {
        self.plate_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.poll_retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Note that a worker now holds `station`.
    pub fn enter(&self, station: StationId) {
        let current = self.occupancy.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut guard = self.holders.lock().expect("stats mutex poisoned");
            let count = guard.entry(station).or_insert(0);
            *count += 1;
            if *count > 1 {
                self.violation.store(true, Ordering::SeqCst);
            }
        }
        self.max_occupancy.fetch_max(current, Ordering::SeqCst);
    }

    /// Note that a holder is about to release `station`.
    pub fn pre_release(&self, station: StationId) {
        let mut guard = self.holders.lock().expect("stats mutex poisoned");
        let count = guard.entry(station).or_insert(0);
        debug_assert!(*count > 0, "holder counter underflow for {station}");
        *count = count.saturating_sub(1);
        let prev = self.occupancy.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(prev > 0, "occupancy counter underflow");
    }

    /// Undo a `pre_release` whose release did not happen.
    pub fn revert_pre_release(&self, station: StationId) {
        let mut guard = self.holders.lock().expect("stats mutex poisoned");
        *guard.entry(station).or_insert(0) += 1;
        self.occupancy.fetch_add(1, Ordering::SeqCst);
    }

    pub fn served(&self) -> u64 {
        self.served.load(Ordering::SeqCst)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::SeqCst)
    }

    pub fn has_violation(&self) -> bool {
        self.violation.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            served: self.served(),
            failed: self.failed(),
            order_races: self.order_races.load(Ordering::Relaxed),
            reservation_denials: self.reservation_denials.load(Ordering::Relaxed),
            plate_rejections: self.plate_rejections.load(Ordering::Relaxed),
            poll_retries: self.poll_retries.load(Ordering::Relaxed),
            max_concurrent_holders: self.max_occupancy.load(Ordering::SeqCst),
            reservation_violation: self.has_violation(),
        }
    }
}

impl Default for KitchenStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StationKind;

    #[test]
    fn sequential_holders_are_not_a_violation() {
        let stats = KitchenStats::new();
        let board = StationId::new(StationKind::Cutting, 0);
        stats.enter(board);
        stats.pre_release(board);
        stats.enter(board);
        stats.pre_release(board);
        let snapshot = stats.snapshot();
        assert!(!snapshot.reservation_violation);
        assert_eq!(snapshot.max_concurrent_holders, 1);
    }

    #[test]
    fn overlapping_holders_flag_a_violation() {
        let stats = KitchenStats::new();
        let plate = StationId::new(StationKind::Assembly, 1);
        stats.enter(plate);
        stats.enter(plate);
        assert!(stats.has_violation());
    }

    #[test]
    fn different_stations_may_be_held_together() {
        let stats = KitchenStats::new();
        stats.enter(StationId::new(StationKind::Cutting, 0));
        stats.enter(StationId::new(StationKind::Cutting, 1));
        stats.enter(StationId::new(StationKind::Cooking, 0));
        let snapshot = stats.snapshot();
        assert!(!snapshot.reservation_violation);
        assert_eq!(snapshot.max_concurrent_holders, 3);
    }

    #[test]
    fn reverted_release_keeps_the_holder_counted() {
        let stats = KitchenStats::new();
        let stove = StationId::new(StationKind::Cooking, 0);
        stats.enter(stove);
        stats.pre_release(stove);
        stats.revert_pre_release(stove);
        stats.enter(stove);
        assert!(stats.has_violation());
    }

    #[test]
    fn counters_accumulate() {
        let stats = KitchenStats::new();
        stats.record_served();
        stats.record_failed();
        stats.record_order_race();
        stats.record_order_race();
        stats.record_retry();
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.served, 1);
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.order_races, 2);
        assert_eq!(snapshot.poll_retries, 1);
    }
}
