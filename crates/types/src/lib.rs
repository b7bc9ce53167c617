//! Strongly typed definitions shared across the registry, engine, and CLI.
//!
//! The models defined here form the vocabulary of the adaptive execution
//! engine: the fixed catalog of implementation variants ([`Gear`]), the
//! opaque values kernels exchange ([`OpValue`]), and the declarative
//! workflow schema ([`WorkflowStep`], [`Argument`]). Authoring order is
//! preserved wherever it matters (via `IndexMap`) so keyword arguments and
//! gear catalogs render and execute in a predictable sequence.

pub mod gear;
pub mod value;
pub mod workflow;

pub use gear::{Gear, ParseGearError};
pub use value::{KwArgs, OpValue};
pub use workflow::{Argument, WorkflowStep};
