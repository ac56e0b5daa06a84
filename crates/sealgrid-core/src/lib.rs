//! sealgrid-core — shared types for private map-reduce over secure nodes.
//!
//! A search is expressed as a [`Job`]: three opaque secure packages, one per
//! [`Role`], that only execute on the node they are bound to. This crate
//! defines the vocabulary every other sealgrid crate speaks:
//!
//! - **`types`** — roles, per-role maps, node and output identifiers, credentials
//! - **`node`** — the [`Node`] capability set and [`SecurePackage`] / [`Invocation`]
//! - **`dataset`** — the read-only [`Dataset`] the map phase scans
//! - **`job`** — the job model: binding, invocation building, migration, serialization
//! - **`output`** — decoding of the fixed-layout result record

pub mod dataset;
pub mod error;
pub mod job;
pub mod node;
pub mod output;
pub mod types;

pub use dataset::{Dataset, Record};
pub use error::{JobError, JobResult, NodeError, NodeResult};
pub use job::{AttributeSpec, Job, JobRecord, RoleInput};
pub use node::{AttributeType, Invocation, Node, SecurePackage};
pub use output::{DecodedOutput, unpack_output};
pub use types::*;
