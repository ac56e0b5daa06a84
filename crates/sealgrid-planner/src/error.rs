//! Planner error types.

use sealgrid_core::{NodeIndex, Role};
use thiserror::Error;

/// Errors detected when constructing a planner.
///
/// Violations of the planner's runtime contract (reporting an action that
/// was never issued, for example) are scheduler bugs and panic instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("a job needs at least one item")]
    NoItems,

    #[error("a job needs at least one node")]
    NoNodes,

    #[error("{role} root node {node} is outside a pool of {nodes} nodes")]
    RootOutOfRange {
        role: Role,
        node: NodeIndex,
        nodes: usize,
    },
}

pub type PlanResult<T> = Result<T, PlanError>;
