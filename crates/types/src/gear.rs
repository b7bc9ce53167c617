//! The fixed, ordered catalog of implementation variants ("gears").

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One concrete implementation variant of a logical operation.
///
/// The catalog is fixed and ordered: device-backed gears first, then the
/// threaded CPU family, then the single-threaded fallbacks. An operation
/// registers an ordered subset of this catalog; the engine only ever
/// chooses among the gears an operation actually binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gear {
    /// Kernel compiled for the primary OpenCL device.
    OpenCl1,
    /// Kernel compiled for the secondary OpenCL device.
    OpenCl2,
    /// Thread pool with dynamic work scheduling.
    ThreadedDynamic,
    /// Thread pool with guided work scheduling.
    ThreadedGuided,
    /// Thread pool with static work scheduling.
    ThreadedStatic,
    /// Single-threaded compiled kernel.
    Unthreaded,
    /// JIT-compiled kernel.
    JitCompiled,
    /// Plain interpreted fallback.
    Interpreted,
}

impl Gear {
    /// The full catalog in canonical order.
    pub const ALL: [Gear; 8] = [
        Gear::OpenCl1,
        Gear::OpenCl2,
        Gear::ThreadedDynamic,
        Gear::ThreadedGuided,
        Gear::ThreadedStatic,
        Gear::Unthreaded,
        Gear::JitCompiled,
        Gear::Interpreted,
    ];

    /// Canonical wire name, stable across serialization and display.
    pub const fn as_str(self) -> &'static str {
        match self {
            Gear::OpenCl1 => "open_cl1",
            Gear::OpenCl2 => "open_cl2",
            Gear::ThreadedDynamic => "threaded_dynamic",
            Gear::ThreadedGuided => "threaded_guided",
            Gear::ThreadedStatic => "threaded_static",
            Gear::Unthreaded => "unthreaded",
            Gear::JitCompiled => "jit_compiled",
            Gear::Interpreted => "interpreted",
        }
    }
}

impl fmt::Display for Gear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown gear name.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown gear name: '{0}'")]
pub struct ParseGearError(pub String);

impl FromStr for Gear {
    type Err = ParseGearError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Gear::ALL
            .into_iter()
            .find(|gear| gear.as_str() == name)
            .ok_or_else(|| ParseGearError(name.to_string()))
    }
}
