//! Registry crate for operation and kernel bindings.
//!
//! The surrounding toolkit registers each logical operation here together
//! with the ordered set of gears it implements and the callable bound to
//! each gear. The engine consults the registry at dispatch time and treats
//! every kernel as an opaque, timeable unit of work.

pub mod models;

pub use models::{Kernel, OperationBinding, Registry, RegistryError};
