//! modelgrid-registry — the model registry.
//!
//! Maps model ids to versioned metadata and lifecycle stage. Stage
//! transitions are forward-only single steps
//! (development → staging → production); moving backward requires the
//! distinct rollback operation. Models are archived, never deleted.

pub mod error;
pub mod registry;

pub use error::{RegistryError, RegistryResult};
pub use registry::{ModelRegistry, NewModel};
