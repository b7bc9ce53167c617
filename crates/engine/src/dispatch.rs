//! Adaptive dispatch of single logical operation calls.
//!
//! One dispatch moves through selection, execution, and bookkeeping:
//! obtain the operation's statistics (created with a uniform prior on
//! first use), build a selection policy, draw a gear (or take a forced
//! one), invoke the bound kernel under wall-clock timing, and feed the
//! elapsed time back into the store on success. A failed kernel run
//! records nothing: it carries no valid timing signal.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, warn};

use gearbox_registry::Registry;
use gearbox_types::{Gear, KwArgs, OpValue};

use crate::error::EngineError;
use crate::selector;
use crate::stats::StatisticsStore;

/// Result of one dispatched call: the kernel outputs plus telemetry about
/// which gear ran and how long it took.
#[derive(Debug)]
pub struct DispatchOutcome {
    /// Gear that executed the call.
    pub gear: Gear,
    /// Wall-clock duration of the kernel call.
    pub elapsed: Duration,
    /// Kernel outputs, one per output slot.
    pub outputs: Vec<OpValue>,
}

/// Orchestrates single operation calls against the registry, learning from
/// observed execution times through the shared [`StatisticsStore`].
pub struct AdaptiveDispatcher {
    registry: Arc<Registry>,
    store: StatisticsStore,
    rng: StdRng,
}

impl AdaptiveDispatcher {
    /// Creates a dispatcher with an OS-seeded random source.
    pub fn new(registry: Arc<Registry>, store: StatisticsStore) -> Self {
        Self::with_rng(registry, store, StdRng::from_os_rng())
    }

    /// Creates a dispatcher with a fixed seed, for reproducible runs.
    pub fn with_seed(registry: Arc<Registry>, store: StatisticsStore, seed: u64) -> Self {
        Self::with_rng(registry, store, StdRng::seed_from_u64(seed))
    }

    fn with_rng(registry: Arc<Registry>, store: StatisticsStore, rng: StdRng) -> Self {
        Self { registry, store, rng }
    }

    /// The shared statistics store handle.
    pub fn store(&self) -> &StatisticsStore {
        &self.store
    }

    /// The operation registry.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Dispatches one call to `operation`.
    ///
    /// `forced_gear` bypasses selection entirely; it is the only
    /// deterministic path and still records timing on success, which makes
    /// it useful for calibrating a specific gear. Kernel failures surface
    /// as [`EngineError::KernelExecution`] wrapping the original cause and
    /// are never retried here; a caller wanting a retry can re-dispatch,
    /// typically with a different forced gear.
    pub fn dispatch(
        &mut self,
        operation: &str,
        args: &[OpValue],
        kwargs: &KwArgs,
        forced_gear: Option<Gear>,
    ) -> Result<DispatchOutcome, EngineError> {
        let binding = self
            .registry
            .get(operation)
            .ok_or_else(|| EngineError::unknown_operation(operation))?;
        let catalog = binding.gears();

        let gear = match forced_gear {
            Some(gear) => {
                debug!(operation, gear = %gear, "gear forced, selection bypassed");
                gear
            }
            None => {
                let snapshot = self.store.snapshot(operation, &catalog);
                let policy = selector::policy_or_uniform(&snapshot);
                let gear = policy.sample(&mut self.rng);
                debug!(
                    operation,
                    gear = %gear,
                    weight = policy.weight(gear).unwrap_or(0.0),
                    "gear selected"
                );
                gear
            }
        };

        let kernel = binding.kernel(gear).ok_or_else(|| {
            EngineError::kernel_execution(operation, gear, anyhow::anyhow!("no kernel bound to gear '{gear}'"))
        })?;
        let kernel = Arc::clone(kernel);

        let started = Instant::now();
        match kernel.invoke(args, kwargs) {
            Ok(outputs) => {
                let elapsed = started.elapsed();
                self.store.record(operation, &catalog, gear, elapsed.as_secs_f64())?;
                debug!(
                    operation,
                    gear = %gear,
                    elapsed_ms = elapsed.as_secs_f64() * 1e3,
                    outputs = outputs.len(),
                    "kernel execution completed"
                );
                Ok(DispatchOutcome { gear, elapsed, outputs })
            }
            Err(source) => {
                warn!(operation, gear = %gear, error = %source, "kernel execution failed");
                Err(EngineError::kernel_execution(operation, gear, source))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use gearbox_registry::OperationBinding;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_kernel(counter: Arc<AtomicUsize>) -> impl Fn(&[OpValue], &KwArgs) -> anyhow::Result<Vec<OpValue>> {
        move |_args, _kwargs| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(vec![OpValue::Int(1)])
        }
    }

    fn registry_with_counters() -> (Arc<Registry>, [Arc<AtomicUsize>; 3]) {
        let counters = [
            Arc::new(AtomicUsize::new(0)),
            Arc::new(AtomicUsize::new(0)),
            Arc::new(AtomicUsize::new(0)),
        ];
        let mut registry = Registry::new();
        registry
            .register(
                OperationBinding::new("magnify")
                    .gear(Gear::OpenCl1, counting_kernel(Arc::clone(&counters[0])))
                    .gear(Gear::Unthreaded, counting_kernel(Arc::clone(&counters[1])))
                    .gear(Gear::Interpreted, counting_kernel(Arc::clone(&counters[2]))),
            )
            .expect("register");
        (Arc::new(registry), counters)
    }

    #[test]
    fn forced_gear_always_runs_and_only_its_statistics_move() {
        let (registry, counters) = registry_with_counters();
        let store = StatisticsStore::new();
        let mut dispatcher = AdaptiveDispatcher::with_seed(Arc::clone(&registry), store.clone(), 99);

        for _ in 0..100 {
            let outcome = dispatcher
                .dispatch("magnify", &[], &KwArgs::new(), Some(Gear::Unthreaded))
                .expect("dispatch");
            assert_eq!(outcome.gear, Gear::Unthreaded);
        }

        assert_eq!(counters[0].load(Ordering::SeqCst), 0);
        assert_eq!(counters[1].load(Ordering::SeqCst), 100);
        assert_eq!(counters[2].load(Ordering::SeqCst), 0);

        let catalog = registry.get("magnify").expect("binding").gears();
        let cell = store.stats_for("magnify", &catalog);
        let stats = cell.lock().expect("lock");
        assert_eq!(stats.window_len(Gear::Unthreaded), 100);
        assert_eq!(stats.window_len(Gear::OpenCl1), 0);
        assert_eq!(stats.window_len(Gear::Interpreted), 0);
    }

    #[test]
    fn successful_dispatch_records_exactly_one_sample() {
        let (registry, _counters) = registry_with_counters();
        let store = StatisticsStore::new();
        let mut dispatcher = AdaptiveDispatcher::with_seed(Arc::clone(&registry), store.clone(), 7);

        let outcome = dispatcher.dispatch("magnify", &[], &KwArgs::new(), None).expect("dispatch");
        assert_eq!(outcome.outputs, vec![OpValue::Int(1)]);

        let catalog = registry.get("magnify").expect("binding").gears();
        let cell = store.stats_for("magnify", &catalog);
        let stats = cell.lock().expect("lock");
        let total: usize = catalog.iter().map(|gear| stats.window_len(*gear)).sum();
        assert_eq!(total, 1);
        assert_eq!(stats.window_len(outcome.gear), 1);
    }

    #[test]
    fn failed_kernels_leave_statistics_unchanged() {
        let mut registry = Registry::new();
        registry
            .register(OperationBinding::new("rotate").gear(
                Gear::OpenCl1,
                |_args: &[OpValue], _kwargs: &KwArgs| -> anyhow::Result<Vec<OpValue>> { bail!("device lost") },
            ))
            .expect("register");
        let registry = Arc::new(registry);
        let store = StatisticsStore::new();
        let mut dispatcher = AdaptiveDispatcher::with_seed(Arc::clone(&registry), store.clone(), 1);

        let error = dispatcher
            .dispatch("rotate", &[], &KwArgs::new(), None)
            .expect_err("kernel failure");
        assert!(matches!(
            error,
            EngineError::KernelExecution { gear: Gear::OpenCl1, .. }
        ));

        let cell = store.stats_for("rotate", &[Gear::OpenCl1]);
        let stats = cell.lock().expect("lock");
        assert_eq!(stats.window_len(Gear::OpenCl1), 0);
    }

    #[test]
    fn unknown_operations_are_rejected() {
        let (registry, _counters) = registry_with_counters();
        let mut dispatcher = AdaptiveDispatcher::with_seed(registry, StatisticsStore::new(), 3);
        let error = dispatcher
            .dispatch("sharpen", &[], &KwArgs::new(), None)
            .expect_err("unknown operation");
        assert!(matches!(error, EngineError::UnknownOperation { .. }));
    }

    #[test]
    fn forcing_an_unbound_gear_fails_without_recording() {
        let (registry, counters) = registry_with_counters();
        let store = StatisticsStore::new();
        let mut dispatcher = AdaptiveDispatcher::with_seed(Arc::clone(&registry), store.clone(), 5);

        let error = dispatcher
            .dispatch("magnify", &[], &KwArgs::new(), Some(Gear::JitCompiled))
            .expect_err("unbound gear");
        assert!(matches!(
            error,
            EngineError::KernelExecution { gear: Gear::JitCompiled, .. }
        ));
        assert!(counters.iter().all(|counter| counter.load(Ordering::SeqCst) == 0));
    }

    #[test]
    fn single_gear_operations_still_accumulate_statistics() {
        let mut registry = Registry::new();
        registry
            .register(OperationBinding::new("register_channels").gear(
                Gear::Unthreaded,
                |_args: &[OpValue], _kwargs: &KwArgs| -> anyhow::Result<Vec<OpValue>> { Ok(vec![OpValue::Bool(true)]) },
            ))
            .expect("register");
        let registry = Arc::new(registry);
        let store = StatisticsStore::new();
        let mut dispatcher = AdaptiveDispatcher::with_seed(Arc::clone(&registry), store.clone(), 11);

        for _ in 0..3 {
            let outcome = dispatcher
                .dispatch("register_channels", &[], &KwArgs::new(), None)
                .expect("dispatch");
            assert_eq!(outcome.gear, Gear::Unthreaded);
        }

        let cell = store.stats_for("register_channels", &[Gear::Unthreaded]);
        let stats = cell.lock().expect("lock");
        assert_eq!(stats.window_len(Gear::Unthreaded), 3);
    }
}
