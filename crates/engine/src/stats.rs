//! Online runtime statistics for gear selection.
//!
//! Every logical operation accumulates, per gear, a bounded window of
//! observed execution times. The window is a ring: once at capacity, the
//! oldest sample is evicted first, so estimates track systems whose
//! relative gear performance drifts (thermal throttling, contention)
//! instead of converging to a stale lifetime average. Mean and standard
//! deviation are recomputed from the window on every record.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use gearbox_types::Gear;

use crate::error::EngineError;

/// Fixed capacity of each per-gear sample window.
pub const SAMPLE_WINDOW_CAPACITY: usize = 100;

/// Prior mean assigned to every gear before any sample arrives. Equal
/// priors across the catalog make a fresh operation select uniformly.
const PRIOR_MEAN_SECONDS: f64 = 1.0;
/// Prior standard deviation paired with the prior mean.
const PRIOR_STD_SECONDS: f64 = 1.0;

/// Timing estimate for one gear of one operation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GearTiming {
    /// Mean execution time in seconds over the current window.
    pub mean_time: f64,
    /// Population standard deviation in seconds over the current window.
    pub std_time: f64,
}

impl GearTiming {
    /// The uniform prior used before any sample is recorded.
    pub const fn prior() -> Self {
        Self {
            mean_time: PRIOR_MEAN_SECONDS,
            std_time: PRIOR_STD_SECONDS,
        }
    }
}

/// Read-only view of one operation's timings, in catalog order.
///
/// Snapshots are plain copies: building a policy from one never blocks a
/// concurrent recorder.
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticsSnapshot {
    operation: String,
    timings: IndexMap<Gear, GearTiming>,
}

impl StatisticsSnapshot {
    /// The operation these timings belong to.
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Per-gear timings in catalog order.
    pub fn timings(&self) -> &IndexMap<Gear, GearTiming> {
        &self.timings
    }

    /// Timing for one gear.
    pub fn timing(&self, gear: Gear) -> Option<GearTiming> {
        self.timings.get(&gear).copied()
    }

    /// Gears covered by this snapshot, in catalog order.
    pub fn gears(&self) -> Vec<Gear> {
        self.timings.keys().copied().collect()
    }
}

/// Bounded sample window and derived estimate for one gear.
#[derive(Debug, Clone)]
struct GearSeries {
    samples: VecDeque<f64>,
    timing: GearTiming,
}

impl GearSeries {
    fn with_prior(timing: GearTiming) -> Self {
        Self {
            samples: VecDeque::with_capacity(SAMPLE_WINDOW_CAPACITY),
            timing,
        }
    }

    fn push(&mut self, seconds: f64) {
        if self.samples.len() == SAMPLE_WINDOW_CAPACITY {
            self.samples.pop_front();
        }
        self.samples.push_back(seconds);
        self.timing = recompute(self.samples.iter().copied());
    }
}

/// Recomputes mean and population standard deviation over a window.
fn recompute(samples: impl Iterator<Item = f64> + Clone) -> GearTiming {
    let count = samples.clone().count();
    let mean_time = samples.clone().sum::<f64>() / count as f64;
    let variance = samples.map(|sample| (sample - mean_time).powi(2)).sum::<f64>() / count as f64;
    GearTiming {
        mean_time,
        std_time: variance.max(0.0).sqrt(),
    }
}

/// Statistics for every gear of one logical operation.
#[derive(Debug, Clone)]
pub struct OperationStatistics {
    operation: String,
    series: IndexMap<Gear, GearSeries>,
}

impl OperationStatistics {
    /// Creates statistics with the uniform prior over `catalog`.
    pub fn with_uniform_prior(operation: impl Into<String>, catalog: &[Gear]) -> Self {
        let series = catalog
            .iter()
            .map(|gear| (*gear, GearSeries::with_prior(GearTiming::prior())))
            .collect();
        Self {
            operation: operation.into(),
            series,
        }
    }

    /// Appends a timing sample for `gear`, evicting the oldest sample at
    /// capacity and recomputing the gear's mean and standard deviation.
    ///
    /// Negative and non-finite samples are rejected with
    /// [`EngineError::InvalidSample`], leaving prior statistics untouched.
    /// A gear outside the known catalog gains a fresh series first, so a
    /// forced calibration run on a newly bound gear is not lost.
    pub fn record(&mut self, gear: Gear, seconds: f64) -> Result<(), EngineError> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(EngineError::invalid_sample(gear, seconds));
        }
        self.series
            .entry(gear)
            .or_insert_with(|| GearSeries::with_prior(GearTiming::prior()))
            .push(seconds);
        Ok(())
    }

    /// Overwrites per-gear priors from externally measured timings without
    /// fabricating samples (warm start from a previous calibration).
    pub fn seed(&mut self, priors: &IndexMap<Gear, GearTiming>) {
        for (gear, timing) in priors {
            self.series.insert(*gear, GearSeries::with_prior(*timing));
        }
    }

    /// Ensures every gear of `catalog` has a series, inserting the uniform
    /// prior for gears this operation has never seen.
    fn ensure_catalog(&mut self, catalog: &[Gear]) {
        for gear in catalog {
            self.series
                .entry(*gear)
                .or_insert_with(|| GearSeries::with_prior(GearTiming::prior()));
        }
    }

    /// Copy-on-read view of the current per-gear timings.
    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            operation: self.operation.clone(),
            timings: self.series.iter().map(|(gear, series)| (*gear, series.timing)).collect(),
        }
    }

    /// Number of samples currently held for `gear`.
    pub fn window_len(&self, gear: Gear) -> usize {
        self.series.get(&gear).map_or(0, |series| series.samples.len())
    }

    /// Copy of the current sample window for `gear`, oldest first.
    pub fn window(&self, gear: Gear) -> Vec<f64> {
        self.series
            .get(&gear)
            .map_or_else(Vec::new, |series| series.samples.iter().copied().collect())
    }
}

/// Serializable dump of learned timings, keyed by operation name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    /// Per-operation, per-gear timing estimates.
    pub operations: IndexMap<String, IndexMap<Gear, GearTiming>>,
}

/// Process-wide store of per-operation statistics.
///
/// The store is an explicit handle: clone it to share the same underlying
/// state between dispatchers and engines, or create a fresh one for an
/// isolated test. Records for one operation serialize behind that
/// operation's own lock; different operations never contend.
#[derive(Clone, Debug, Default)]
pub struct StatisticsStore {
    inner: Arc<RwLock<HashMap<String, Arc<Mutex<OperationStatistics>>>>>,
}

impl StatisticsStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the statistics cell for `operation`, creating it with the
    /// uniform prior over `catalog` on first use and extending it with any
    /// catalog gears it has never seen.
    pub fn stats_for(&self, operation: &str, catalog: &[Gear]) -> Arc<Mutex<OperationStatistics>> {
        let cell = {
            let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
            guard.get(operation).cloned()
        };
        let cell = match cell {
            Some(cell) => cell,
            None => {
                let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
                guard
                    .entry(operation.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(OperationStatistics::with_uniform_prior(operation, catalog))))
                    .clone()
            }
        };
        cell.lock().unwrap_or_else(PoisonError::into_inner).ensure_catalog(catalog);
        cell
    }

    /// Records one timing sample for an operation's gear.
    pub fn record(&self, operation: &str, catalog: &[Gear], gear: Gear, seconds: f64) -> Result<(), EngineError> {
        let cell = self.stats_for(operation, catalog);
        let mut stats = cell.lock().unwrap_or_else(PoisonError::into_inner);
        stats.record(gear, seconds)
    }

    /// Copy-on-read snapshot of one operation's timings.
    pub fn snapshot(&self, operation: &str, catalog: &[Gear]) -> StatisticsSnapshot {
        let cell = self.stats_for(operation, catalog);
        let stats = cell.lock().unwrap_or_else(PoisonError::into_inner);
        stats.snapshot()
    }

    /// Warm-starts one operation from externally measured timings,
    /// creating the operation if it does not exist yet.
    pub fn seed(&self, operation: &str, priors: &IndexMap<Gear, GearTiming>) {
        let catalog: Vec<Gear> = priors.keys().copied().collect();
        let cell = self.stats_for(operation, &catalog);
        let mut stats = cell.lock().unwrap_or_else(PoisonError::into_inner);
        stats.seed(priors);
    }

    /// Exports every operation's current timings.
    pub fn export(&self) -> StoreSnapshot {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut operations: Vec<(String, IndexMap<Gear, GearTiming>)> = guard
            .iter()
            .map(|(operation, cell)| {
                let stats = cell.lock().unwrap_or_else(PoisonError::into_inner);
                (operation.clone(), stats.snapshot().timings().clone())
            })
            .collect();
        operations.sort_by(|(left, _), (right, _)| left.cmp(right));
        StoreSnapshot {
            operations: operations.into_iter().collect(),
        }
    }

    /// Restores priors from a previously exported snapshot.
    pub fn restore(&self, snapshot: &StoreSnapshot) {
        for (operation, priors) in &snapshot.operations {
            self.seed(operation, priors);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: [Gear; 3] = [Gear::OpenCl1, Gear::Unthreaded, Gear::Interpreted];

    #[test]
    fn fresh_statistics_carry_the_uniform_prior() {
        let stats = OperationStatistics::with_uniform_prior("rotate", &CATALOG);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.gears(), CATALOG.to_vec());
        for gear in CATALOG {
            assert_eq!(snapshot.timing(gear), Some(GearTiming::prior()));
            assert_eq!(stats.window_len(gear), 0);
        }
    }

    #[test]
    fn window_never_exceeds_capacity_and_evicts_oldest_first() {
        let mut stats = OperationStatistics::with_uniform_prior("rotate", &CATALOG);
        for sample in 0..(SAMPLE_WINDOW_CAPACITY + 10) {
            stats.record(Gear::Unthreaded, sample as f64).expect("valid sample");
        }
        assert_eq!(stats.window_len(Gear::Unthreaded), SAMPLE_WINDOW_CAPACITY);
        let window = stats.window(Gear::Unthreaded);
        assert_eq!(window[0], 10.0);
        assert_eq!(window[SAMPLE_WINDOW_CAPACITY - 1], (SAMPLE_WINDOW_CAPACITY + 9) as f64);
    }

    #[test]
    fn mean_and_std_match_a_recompute_over_the_window_copy() {
        let mut stats = OperationStatistics::with_uniform_prior("rotate", &CATALOG);
        for sample in [0.2, 0.4, 0.9, 0.1, 0.4] {
            stats.record(Gear::OpenCl1, sample).expect("valid sample");
        }
        let window = stats.window(Gear::OpenCl1);
        let mean = window.iter().sum::<f64>() / window.len() as f64;
        let variance = window.iter().map(|sample| (sample - mean).powi(2)).sum::<f64>() / window.len() as f64;

        let timing = stats.snapshot().timing(Gear::OpenCl1).expect("timing");
        assert!((timing.mean_time - mean).abs() < 1e-12);
        assert!((timing.std_time - variance.sqrt()).abs() < 1e-12);
        assert!(timing.mean_time >= 0.0);
        assert!(timing.std_time >= 0.0);
    }

    #[test]
    fn single_sample_window_has_zero_std() {
        let mut stats = OperationStatistics::with_uniform_prior("rotate", &CATALOG);
        stats.record(Gear::Interpreted, 0.25).expect("valid sample");
        let timing = stats.snapshot().timing(Gear::Interpreted).expect("timing");
        assert_eq!(timing.mean_time, 0.25);
        assert_eq!(timing.std_time, 0.0);
    }

    #[test]
    fn invalid_samples_are_rejected_and_leave_statistics_untouched() {
        let mut stats = OperationStatistics::with_uniform_prior("rotate", &CATALOG);
        stats.record(Gear::OpenCl1, 0.5).expect("valid sample");
        let before = stats.snapshot();

        for bad in [-0.1, f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let error = stats.record(Gear::OpenCl1, bad).expect_err("invalid sample");
            assert!(matches!(error, EngineError::InvalidSample { gear: Gear::OpenCl1, .. }));
        }

        assert_eq!(stats.snapshot(), before);
        assert_eq!(stats.window_len(Gear::OpenCl1), 1);
    }

    #[test]
    fn store_creates_lazily_and_snapshots_are_copies() {
        let store = StatisticsStore::new();
        let snapshot = store.snapshot("magnify", &CATALOG);
        assert_eq!(snapshot.operation(), "magnify");
        assert_eq!(snapshot.timing(Gear::OpenCl1), Some(GearTiming::prior()));

        store.record("magnify", &CATALOG, Gear::OpenCl1, 0.125).expect("record");
        // The earlier snapshot is an immutable copy.
        assert_eq!(snapshot.timing(Gear::OpenCl1), Some(GearTiming::prior()));
        let updated = store.snapshot("magnify", &CATALOG);
        assert_eq!(updated.timing(Gear::OpenCl1).map(|timing| timing.mean_time), Some(0.125));
    }

    #[test]
    fn cloned_handles_share_state_but_fresh_stores_are_isolated() {
        let store = StatisticsStore::new();
        let shared = store.clone();
        store.record("rotate", &CATALOG, Gear::Unthreaded, 0.5).expect("record");

        let via_clone = shared.snapshot("rotate", &CATALOG);
        assert_eq!(via_clone.timing(Gear::Unthreaded).map(|timing| timing.mean_time), Some(0.5));

        let isolated = StatisticsStore::new();
        let fresh = isolated.snapshot("rotate", &CATALOG);
        assert_eq!(fresh.timing(Gear::Unthreaded), Some(GearTiming::prior()));
    }

    #[test]
    fn seeded_priors_survive_until_real_samples_arrive() {
        let store = StatisticsStore::new();
        let priors: IndexMap<Gear, GearTiming> = CATALOG
            .iter()
            .zip([0.01, 0.02, 0.10])
            .map(|(gear, mean)| {
                (
                    *gear,
                    GearTiming {
                        mean_time: mean,
                        std_time: 0.001,
                    },
                )
            })
            .collect();
        store.seed("rotate", &priors);

        let snapshot = store.snapshot("rotate", &CATALOG);
        assert_eq!(snapshot.timing(Gear::OpenCl1).map(|timing| timing.mean_time), Some(0.01));

        store.record("rotate", &CATALOG, Gear::OpenCl1, 0.5).expect("record");
        let updated = store.snapshot("rotate", &CATALOG);
        assert_eq!(updated.timing(Gear::OpenCl1).map(|timing| timing.mean_time), Some(0.5));
    }

    #[test]
    fn export_restore_round_trips_learned_timings() {
        let store = StatisticsStore::new();
        store.record("rotate", &CATALOG, Gear::OpenCl1, 0.125).expect("record");
        store.record("magnify", &CATALOG, Gear::Interpreted, 2.0).expect("record");

        let exported = store.export();
        let encoded = serde_json::to_string(&exported).expect("encode");
        let decoded: StoreSnapshot = serde_json::from_str(&encoded).expect("decode");
        assert_eq!(decoded, exported);

        let restored = StatisticsStore::new();
        restored.restore(&decoded);
        let snapshot = restored.snapshot("rotate", &CATALOG);
        assert_eq!(snapshot.timing(Gear::OpenCl1).map(|timing| timing.mean_time), Some(0.125));
    }
}
