//! State, memory and candidate selection for the fable bridge.
//!
//! Everything in this crate is synchronous and free of I/O apart from
//! reading the configuration file. The bridge wraps [`StateStore`] and
//! [`ObservationMemory`] in async locks; the spatial filter in
//! [`observation`] is a pure function.
//!
//! # Modules
//!
//! - [`store`] -- Persona records and the rolling tick history
//! - [`memory`] -- Per-observer record of the last observation set shown
//! - [`observation`] -- Radius/limit candidate filter
//! - [`config`] -- YAML configuration for the bridge binary

pub mod config;
pub mod memory;
pub mod observation;
pub mod store;

pub use config::{BridgeConfig, ConfigError};
pub use memory::ObservationMemory;
pub use observation::{FilterParams, select_candidates};
pub use store::{StateStore, StoreError};
