//! Declarative workflow schema shared between the engine and document loader.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{Gear, OpValue};

/// A single argument slot of a workflow step.
///
/// Arguments are either literal values or typed back-references to an
/// output slot of an earlier step in the same run, resolved by the engine
/// immediately before the step executes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Argument {
    /// A value handed to the kernel unchanged.
    Literal(OpValue),
    /// The `output`-th value produced by the `step`-th step of this run.
    Reference {
        /// Zero-based index of the producing step.
        step: usize,
        /// Zero-based output slot of that step; single-value kernels
        /// expose their result as output 0.
        output: usize,
    },
}

impl Argument {
    /// Wraps a literal kernel value.
    pub fn literal(value: impl Into<OpValue>) -> Self {
        Argument::Literal(value.into())
    }

    /// References an output slot of an earlier step.
    pub const fn reference(step: usize, output: usize) -> Self {
        Argument::Reference { step, output }
    }
}

/// One declarative unit of a workflow: the operation to dispatch, its
/// arguments, and an optional forced implementation override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    /// Logical operation name, e.g. `"shift_magnify"`.
    pub operation: String,
    /// Positional arguments in kernel order.
    #[serde(default)]
    pub args: Vec<Argument>,
    /// Keyword arguments, preserving authoring order.
    #[serde(default)]
    pub kwargs: IndexMap<String, Argument>,
    /// When set, bypasses adaptive gear selection for this step.
    #[serde(default)]
    pub forced_gear: Option<Gear>,
}

impl WorkflowStep {
    /// Creates a step for the named operation with no arguments.
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            args: Vec::new(),
            kwargs: IndexMap::new(),
            forced_gear: None,
        }
    }

    /// Appends a positional argument.
    #[must_use]
    pub fn arg(mut self, argument: Argument) -> Self {
        self.args.push(argument);
        self
    }

    /// Inserts a keyword argument.
    #[must_use]
    pub fn kwarg(mut self, name: impl Into<String>, argument: Argument) -> Self {
        self.kwargs.insert(name.into(), argument);
        self
    }

    /// Forces a specific gear for this step.
    #[must_use]
    pub const fn forced(mut self, gear: Gear) -> Self {
        self.forced_gear = Some(gear);
        self
    }
}
