//! Core registry data structures.

use std::sync::Arc;

use anyhow::Result;
use indexmap::IndexMap;
use thiserror::Error;

use gearbox_types::{Gear, KwArgs, OpValue};

/// Execute a single operation kernel.
///
/// The surrounding toolkit provides concrete implementations backed by GPU,
/// thread-pool, JIT, or interpreted code. The engine calls them synchronously
/// and never inspects the result shape: a kernel returns one value per
/// output slot, and a single-value kernel returns exactly one element.
pub trait Kernel: Send + Sync {
    /// Run the kernel with positional and keyword arguments.
    fn invoke(&self, args: &[OpValue], kwargs: &KwArgs) -> Result<Vec<OpValue>>;
}

impl<F> Kernel for F
where
    F: Fn(&[OpValue], &KwArgs) -> Result<Vec<OpValue>> + Send + Sync,
{
    fn invoke(&self, args: &[OpValue], kwargs: &KwArgs) -> Result<Vec<OpValue>> {
        self(args, kwargs)
    }
}

/// Errors surfaced by registry construction.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Two bindings were registered under the same operation name.
    #[error("duplicate operation name detected: '{name}'")]
    DuplicateOperation { name: String },

    /// A binding was registered without any gear.
    #[error("operation '{name}' must bind at least one gear")]
    EmptyBinding { name: String },
}

/// A logical operation with its ordered gear catalog and bound kernels.
///
/// Gear order is the registration order; the engine's selection policy is
/// expressed over exactly this catalog.
#[derive(Clone)]
pub struct OperationBinding {
    name: String,
    kernels: IndexMap<Gear, Arc<dyn Kernel>>,
}

impl OperationBinding {
    /// Creates an empty binding for the named operation.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kernels: IndexMap::new(),
        }
    }

    /// Binds a kernel to a gear. Re-binding a gear replaces the previous
    /// kernel and keeps the gear's original catalog position.
    #[must_use]
    pub fn gear(mut self, gear: Gear, kernel: impl Kernel + 'static) -> Self {
        self.kernels.insert(gear, Arc::new(kernel));
        self
    }

    /// The operation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The ordered gear catalog for this operation.
    pub fn gears(&self) -> Vec<Gear> {
        self.kernels.keys().copied().collect()
    }

    /// Looks up the kernel bound to a gear.
    pub fn kernel(&self, gear: Gear) -> Option<&Arc<dyn Kernel>> {
        self.kernels.get(&gear)
    }

    /// Number of gears bound to this operation.
    pub fn gear_count(&self) -> usize {
        self.kernels.len()
    }
}

impl std::fmt::Debug for OperationBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationBinding")
            .field("name", &self.name)
            .field("gears", &self.gears())
            .finish()
    }
}

/// Catalog of all registered operations, keyed by name in registration order.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    operations: IndexMap<String, OperationBinding>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an operation binding. Duplicate names and empty bindings
    /// are rejected so a misconfigured toolkit fails at startup rather than
    /// at dispatch time.
    pub fn register(&mut self, binding: OperationBinding) -> Result<(), RegistryError> {
        if binding.kernels.is_empty() {
            return Err(RegistryError::EmptyBinding {
                name: binding.name.clone(),
            });
        }
        if self.operations.contains_key(&binding.name) {
            return Err(RegistryError::DuplicateOperation {
                name: binding.name.clone(),
            });
        }
        self.operations.insert(binding.name.clone(), binding);
        Ok(())
    }

    /// Looks up an operation by name.
    pub fn get(&self, operation: &str) -> Option<&OperationBinding> {
        self.operations.get(operation)
    }

    /// Names of all registered operations, in registration order.
    pub fn operation_names(&self) -> Vec<&str> {
        self.operations.keys().map(String::as_str).collect()
    }

    /// Number of registered operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether the registry has no operations.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
