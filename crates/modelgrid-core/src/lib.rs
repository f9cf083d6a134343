//! modelgrid-core — shared configuration and time helpers.
//!
//! Holds the `modelgrid.toml` daemon configuration and the epoch-millis
//! clock used to stamp records across the domain crates.

pub mod config;
pub mod time;

pub use config::ModelgridConfig;
pub use time::epoch_millis;
