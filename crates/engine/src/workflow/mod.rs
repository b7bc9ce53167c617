//! Workflow execution.
//!
//! A workflow is an ordered sequence of declarative steps whose arguments
//! may reference the outputs of earlier steps. The submodules cover the
//! sequential interpreter itself and the loading of workflow documents
//! authored on disk.

pub mod document;
pub mod engine;

pub use document::{WorkflowBundle, parse_workflow_file};
pub use engine::{StepRecord, WorkflowEngine, WorkflowResult};
