//! modelgrid-state — embedded state store for the modelgrid control plane.
//!
//! Backed by [redb](https://docs.rs/redb), holds the four independent
//! record sets the dashboard reads: models, deployments, experiments, and
//! alerts, plus a persisted counter table backing sequence allocation.
//!
//! # Architecture
//!
//! All domain records are JSON-serialized into redb's `&[u8]` value
//! columns under their generated id (`model-7`, `dep-3`, ...). redb gives
//! single-writer / MVCC-reader semantics: readers always observe the last
//! committed snapshot and never block writers. Ordering is never taken
//! from key iteration order — every record carries a monotonic `seq` the
//! domain crates sort by.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by
//! `Arc<Database>`) and is shared across the domain services and the
//! daemon's background loops.

pub mod error;
pub mod locks;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use locks::KeyLocks;
pub use store::StateStore;
pub use types::*;
