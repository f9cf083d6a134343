//! redb table definitions for the modelgrid state store.
//!
//! Record tables use `&str` keys (generated ids) and `&[u8]` values
//! (JSON-serialized domain records). The counters table maps a counter
//! name to its last allocated value.

use redb::TableDefinition;

/// Model records keyed by `model-{seq}`.
pub const MODELS: TableDefinition<&str, &[u8]> = TableDefinition::new("models");

/// Deployment records keyed by `dep-{seq}`.
pub const DEPLOYMENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("deployments");

/// Experiment records keyed by `exp-{seq}`.
pub const EXPERIMENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("experiments");

/// Alert records keyed by `alert-{seq}`.
pub const ALERTS: TableDefinition<&str, &[u8]> = TableDefinition::new("alerts");

/// Monotonic counters keyed by counter name (`seq`, `revision`).
pub const COUNTERS: TableDefinition<&str, u64> = TableDefinition::new("counters");
