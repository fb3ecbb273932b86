//! `graphtx_engine` — a distributed, in-memory, multi-version property-graph
//! transaction engine.
//!
//! The crate is organized around the three subsystems that make up the
//! transactional core:
//!
//! - [`storage`] — the MVCC storage layer (value store, version chains, row
//!   lists, vertex/edge maps).
//! - [`txn`] — transaction bookkeeping (status service, undo log, the
//!   recently-committed-transactions table).
//! - [`plan`] — the per-transaction execution plan (statement DAG,
//!   placeholders, dependency tracking).
//! - [`operators`] — the typed dataflow units that read and mutate storage.
//!
//! [`engine::Engine`] wires these together; [`messaging`] and [`bulk_load`]
//! describe the external collaborators (messaging fabric, bulk loader) as
//! traits rather than concrete transports.

pub mod bulk_load;
pub mod config;
pub mod dictionary;
pub mod engine;
pub mod error;
pub mod ids;
pub mod messaging;
pub mod metrics;
pub mod operators;
pub mod plan;
pub mod storage;
pub mod txn;

#[cfg(test)]
mod tests;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::EngineError;
pub use ids::{EId, EPropId, Primitive, Timestamp, TrxId, VId, VPropId};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
