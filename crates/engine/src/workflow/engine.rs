//! Sequential workflow interpretation over the adaptive dispatcher.

use std::time::Duration;

use tracing::{debug, info};

use gearbox_types::{Argument, Gear, KwArgs, OpValue, WorkflowStep};

use crate::dispatch::AdaptiveDispatcher;
use crate::error::EngineError;

/// Telemetry for one executed step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepRecord {
    /// Operation the step dispatched.
    pub operation: String,
    /// Gear that executed it.
    pub gear: Gear,
    /// Wall-clock duration of the kernel call.
    pub elapsed: Duration,
}

/// Outputs of one `calculate` run: one slot list per executed step,
/// append-only and indexed by step position. Owned by the engine for the
/// duration of the run and handed to the caller when it completes.
#[derive(Debug, Default)]
pub struct WorkflowResult {
    outputs: Vec<Vec<OpValue>>,
    records: Vec<StepRecord>,
}

impl WorkflowResult {
    /// Output slot `output` of step `step`, if produced.
    pub fn output(&self, step: usize, output: usize) -> Option<&OpValue> {
        self.outputs.get(step).and_then(|slots| slots.get(output))
    }

    /// All output slots of one step.
    pub fn step_outputs(&self, step: usize) -> Option<&[OpValue]> {
        self.outputs.get(step).map(Vec::as_slice)
    }

    /// Output slots of the final step; empty when no step has run.
    pub fn final_outputs(&self) -> &[OpValue] {
        self.outputs.last().map_or(&[], Vec::as_slice)
    }

    /// Telemetry records, one per executed step.
    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    /// Number of executed steps.
    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    /// Whether any step has executed.
    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    fn push(&mut self, outputs: Vec<OpValue>, record: StepRecord) {
        self.outputs.push(outputs);
        self.records.push(record);
    }
}

/// Executes ordered step sequences, resolving typed back-references
/// between steps and dispatching each operation adaptively.
pub struct WorkflowEngine {
    dispatcher: AdaptiveDispatcher,
}

impl WorkflowEngine {
    /// Creates an engine around a dispatcher.
    pub fn new(dispatcher: AdaptiveDispatcher) -> Self {
        Self { dispatcher }
    }

    /// The underlying dispatcher.
    pub fn dispatcher(&self) -> &AdaptiveDispatcher {
        &self.dispatcher
    }

    /// Executes `steps` strictly in order.
    ///
    /// Later steps may reference any earlier step's outputs; references are
    /// resolved against the run's results immediately before each dispatch,
    /// so a step always observes the true produced values. A step-level
    /// `forced_gear` takes precedence over `forced_gear_override`. The
    /// first failing step aborts the run with [`EngineError::Step`]
    /// identifying its index; results of completed steps are discarded
    /// with it.
    pub fn calculate(
        &mut self,
        steps: &[WorkflowStep],
        forced_gear_override: Option<Gear>,
    ) -> Result<WorkflowResult, EngineError> {
        info!(step_count = steps.len(), "workflow execution started");

        let mut result = WorkflowResult::default();
        for (step_index, step) in steps.iter().enumerate() {
            let args = resolve_args(step_index, &step.args, &result)
                .map_err(|source| EngineError::step(step_index, &step.operation, source))?;
            let kwargs = resolve_kwargs(step_index, step, &result)
                .map_err(|source| EngineError::step(step_index, &step.operation, source))?;

            let forced = step.forced_gear.or(forced_gear_override);
            let outcome = self
                .dispatcher
                .dispatch(&step.operation, &args, &kwargs, forced)
                .map_err(|source| EngineError::step(step_index, &step.operation, source))?;

            debug!(
                step_index,
                operation = %step.operation,
                gear = %outcome.gear,
                elapsed_ms = outcome.elapsed.as_secs_f64() * 1e3,
                "workflow step completed"
            );
            result.push(
                outcome.outputs,
                StepRecord {
                    operation: step.operation.clone(),
                    gear: outcome.gear,
                    elapsed: outcome.elapsed,
                },
            );
        }

        info!(step_count = result.len(), "workflow execution finished");
        Ok(result)
    }
}

fn resolve_args(step_index: usize, args: &[Argument], result: &WorkflowResult) -> Result<Vec<OpValue>, EngineError> {
    args.iter()
        .map(|argument| resolve_argument(step_index, argument, result))
        .collect()
}

fn resolve_kwargs(step_index: usize, step: &WorkflowStep, result: &WorkflowResult) -> Result<KwArgs, EngineError> {
    step.kwargs
        .iter()
        .map(|(name, argument)| Ok((name.clone(), resolve_argument(step_index, argument, result)?)))
        .collect()
}

/// Substitutes one argument, resolving references against the outputs
/// produced so far.
fn resolve_argument(step_index: usize, argument: &Argument, result: &WorkflowResult) -> Result<OpValue, EngineError> {
    match argument {
        Argument::Literal(value) => Ok(value.clone()),
        Argument::Reference { step, output } => result
            .output(*step, *output)
            .cloned()
            .ok_or_else(|| EngineError::unresolved_reference(step_index, *step, *output)),
    }
}
