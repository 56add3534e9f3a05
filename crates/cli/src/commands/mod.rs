//! Command implementations.

mod info;
mod run;
mod validate;

use dispatcher::{BackendRegistry, MemoryBroker};

pub use info::run_info;
pub use run::run_pipeline;
pub use validate::run_validate;

/// Built-in backends plus the in-process `memory` broker for dry runs
pub(crate) fn default_registry() -> BackendRegistry {
    BackendRegistry::with_builtin().with("memory", MemoryBroker::new().factory())
}
