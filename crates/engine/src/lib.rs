//! # Gearbox Engine
//!
//! The Gearbox engine decides, for every call to a logical image-processing
//! operation, which of its interchangeable implementations ("gears") to
//! run, learns from observed execution times, and chains operations into
//! workflows where one step's output feeds the next step's input.
//!
//! ## Key Features
//!
//! - **Adaptive dispatch**: each call samples a gear from a probability
//!   distribution weighted inversely to observed mean execution time
//! - **Online statistics**: bounded per-gear sample windows track drifting
//!   hardware behaviour instead of a stale lifetime average
//! - **Typed dataflow**: workflow steps reference earlier outputs through a
//!   tagged `Argument` variant, resolved before each dispatch
//! - **Document loading**: workflows can be authored as YAML/JSON files
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use gearbox_engine::{AdaptiveDispatcher, StatisticsStore, WorkflowEngine};
//! use gearbox_registry::{OperationBinding, Registry};
//! use gearbox_types::{Argument, Gear, KwArgs, OpValue, WorkflowStep};
//!
//! let mut registry = Registry::new();
//! registry.register(
//!     OperationBinding::new("double")
//!         .gear(Gear::Unthreaded, |args: &[OpValue], _kwargs: &KwArgs| -> anyhow::Result<Vec<OpValue>> {
//!             let input = args[0].as_scalar().unwrap_or_default();
//!             Ok(vec![OpValue::Scalar(input * 2.0)])
//!         }),
//! )?;
//!
//! let dispatcher = AdaptiveDispatcher::with_seed(Arc::new(registry), StatisticsStore::new(), 7);
//! let mut engine = WorkflowEngine::new(dispatcher);
//!
//! let steps = vec![
//!     WorkflowStep::new("double").arg(Argument::literal(21.0)),
//!     WorkflowStep::new("double").arg(Argument::reference(0, 0)),
//! ];
//! let result = engine.calculate(&steps, None)?;
//! assert_eq!(result.output(1, 0).and_then(|value| value.as_scalar()), Some(84.0));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! - **`stats`**: per-operation, per-gear runtime statistics and the
//!   injectable process-wide store
//! - **`selector`**: selection policies over gear catalogs
//! - **`dispatch`**: the adaptive dispatcher orchestrating one call
//! - **`workflow`**: the sequential workflow engine and document loader
//! - **`error`**: the engine error taxonomy

pub mod dispatch;
pub mod error;
pub mod selector;
pub mod stats;
pub mod workflow;

// Re-export commonly used types for convenience
pub use dispatch::{AdaptiveDispatcher, DispatchOutcome};
pub use error::EngineError;
pub use selector::{SelectionPolicy, policy_from, policy_or_uniform};
pub use stats::{
    GearTiming, OperationStatistics, SAMPLE_WINDOW_CAPACITY, StatisticsSnapshot, StatisticsStore, StoreSnapshot,
};
pub use workflow::document::{WorkflowBundle, WorkflowDocument, parse_workflow_file};
pub use workflow::engine::{StepRecord, WorkflowEngine, WorkflowResult};
