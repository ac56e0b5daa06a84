//! sealgrid-planner — action planning for private map-reduce.
//!
//! The planner is a pure state machine. It never touches nodes or data; it
//! only decides *who does what next*:
//!
//! ```text
//! next_actions() ──► [Migrate | Map | Reduce | Finalize] ──► executor
//!       ▲                                                      │
//!       └──────────────── action_done(action) ◄────────────────┘
//! ```
//!
//! Every batch returned by [`Planner::next_actions`] contains mutually
//! independent actions whose dependencies are already satisfied, and never
//! names the same node twice. Outputs get ids from a single counter, so for
//! `N` items the last reduce always produces id `2N-2` and the finalize
//! produces id `2N-1`.
//!
//! # Components
//!
//! - **`action`** — the closed [`Action`] enum exchanged with the executor
//! - **`planner`** — the [`Planner`] trait and the default [`MapReducePlanner`]
//! - **`ranking`** — the fixed node order that steers migration and dispatch
//! - **`replay`** — drivers that run a planner to completion without nodes

pub mod action;
pub mod error;
pub mod planner;
pub mod ranking;
pub mod replay;

pub use action::{Action, ActionKind};
pub use error::{PlanError, PlanResult};
pub use planner::{MapReducePlanner, Planner};
pub use ranking::NodeRanking;
pub use replay::{Consumption, replay};
