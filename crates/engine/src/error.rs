//! Error types for adaptive dispatch and workflow execution.

use thiserror::Error;

use gearbox_types::Gear;

/// Main error type for the execution engine.
///
/// Statistics-layer anomalies (`InvalidSample`, `DegenerateStatistics`) are
/// recovered close to where they arise; execution-layer failures carry the
/// step index, gear, and original cause so a caller can reproduce the run.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A negative or non-finite timing sample was rejected; the gear's
    /// prior statistics are untouched.
    #[error("invalid timing sample {seconds}s for gear {gear}")]
    InvalidSample { gear: Gear, seconds: f64 },

    /// Selection was attempted with no usable timing information across
    /// the whole catalog. Dispatch resolves this internally by falling
    /// back to a uniform policy.
    #[error("no usable timing information for operation '{operation}'")]
    DegenerateStatistics { operation: String },

    /// Dispatch was requested for an operation the registry does not know.
    #[error("operation '{operation}' is not registered")]
    UnknownOperation { operation: String },

    /// The selected gear's kernel failed; wraps the original cause. The
    /// dispatcher never retries on its own.
    #[error("kernel for operation '{operation}' failed on gear {gear}")]
    KernelExecution {
        operation: String,
        gear: Gear,
        #[source]
        source: anyhow::Error,
    },

    /// A step argument referenced an output that has not been produced.
    #[error("step {step_index} references step {referenced_step} output {output_index}, which is not available")]
    UnresolvedReference {
        step_index: usize,
        referenced_step: usize,
        output_index: usize,
    },

    /// A workflow step failed; identifies the failing step and wraps the
    /// underlying cause. No subsequent steps execute.
    #[error("workflow step {step_index} ('{operation}') failed")]
    Step {
        step_index: usize,
        operation: String,
        #[source]
        source: Box<EngineError>,
    },
}

impl EngineError {
    /// Create an invalid-sample error.
    pub fn invalid_sample(gear: Gear, seconds: f64) -> Self {
        Self::InvalidSample { gear, seconds }
    }

    /// Create a degenerate-statistics error.
    pub fn degenerate_statistics(operation: impl Into<String>) -> Self {
        Self::DegenerateStatistics {
            operation: operation.into(),
        }
    }

    /// Create an unknown-operation error.
    pub fn unknown_operation(operation: impl Into<String>) -> Self {
        Self::UnknownOperation {
            operation: operation.into(),
        }
    }

    /// Create a kernel-execution error wrapping the kernel's failure.
    pub fn kernel_execution(operation: impl Into<String>, gear: Gear, source: anyhow::Error) -> Self {
        Self::KernelExecution {
            operation: operation.into(),
            gear,
            source,
        }
    }

    /// Create an unresolved-reference error.
    pub fn unresolved_reference(step_index: usize, referenced_step: usize, output_index: usize) -> Self {
        Self::UnresolvedReference {
            step_index,
            referenced_step,
            output_index,
        }
    }

    /// Wrap a step failure with its position in the sequence.
    pub fn step(step_index: usize, operation: impl Into<String>, source: EngineError) -> Self {
        Self::Step {
            step_index,
            operation: operation.into(),
            source: Box::new(source),
        }
    }
}
