//! sealgrid-sim — an in-process stand-in for a secure node cluster.
//!
//! Real deployments run packages on hardware secure elements. This crate
//! provides everything needed to run a search end to end without one:
//!
//! - **`node`** — [`SimNode`], a [`Node`](sealgrid_core::Node) with
//!   credential-bound packages, latency and fault injection
//! - **`program`** — the scoring programs simulated packages carry
//! - **`dataset`** — [`JsonDataset`], a JSON record store
//! - **`query`** — [`LinearQuery`], which builds a [`Job`](sealgrid_core::Job)
//!   from attribute weights

pub mod dataset;
pub mod node;
pub mod program;
pub mod query;

pub use dataset::JsonDataset;
pub use node::{SimNode, cluster};
pub use program::Program;
pub use query::LinearQuery;
