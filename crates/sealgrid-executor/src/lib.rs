//! sealgrid-executor — runs a job's actions on a pool of secure nodes.
//!
//! The executor owns the moving parts of one job execution: a worker per
//! node, a single results channel, the shared output and ownership tables,
//! and a [`Planner`](sealgrid_planner::Planner) deciding what runs next.
//!
//! # Architecture
//!
//! ```text
//! Executor::execute
//!   ├── credential fan-out (one blocking task per node, joined)
//!   ├── Job::bind(root credentials)
//!   ├── coordinator loop
//!   │     next_actions() ──► per-node queue ──► Worker (own OS thread)
//!   │           ▲                                   │
//!   │           └── action_done() ◄── results ◄─────┘
//!   └── SharedState (one mutex)
//!         ├── role → node → package copy
//!         ├── node credentials
//!         ├── outputs by id
//!         └── timing accumulators
//! ```
//!
//! Node calls block and never happen while the state lock is held.

pub mod config;
pub mod error;
pub mod executor;
mod state;
pub mod timing;
mod worker;

pub use config::ExecutorConfig;
pub use error::{ExecutorError, ExecutorResult};
pub use executor::{Execution, Executor};
pub use timing::TimingReport;
