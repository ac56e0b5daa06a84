//! Executor error types.

use sealgrid_core::{JobError, NodeError, NodeIndex, OutputId, Role};
use sealgrid_planner::{Action, ActionKind, PlanError};
use thiserror::Error;

/// Errors that abort a job execution.
///
/// A single failed action fails the whole job; nothing is retried.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("planning error: {0}")]
    Plan(#[from] PlanError),

    #[error("job error: {0}")]
    Job(#[from] JobError),

    #[error("node {node} failed to report its credential: {source}")]
    Credential {
        node: NodeIndex,
        #[source]
        source: NodeError,
    },

    #[error("node {node} failed a {kind} action: {source}")]
    Node {
        node: NodeIndex,
        kind: ActionKind,
        #[source]
        source: NodeError,
    },

    #[error("node {node} holds no {role} package")]
    PackageNotHeld { role: Role, node: NodeIndex },

    #[error("output #{0} is not available")]
    MissingOutput(OutputId),

    #[error("dataset has no item at index {0}")]
    MissingItem(usize),

    #[error("action names node {0}, which is not in the pool")]
    UnknownNode(NodeIndex),

    #[error("worker for node {0} has shut down")]
    WorkerLost(NodeIndex),

    #[error("failed to start the worker thread for node {node}: {source}")]
    WorkerSpawn {
        node: NodeIndex,
        #[source]
        source: std::io::Error,
    },

    #[error("worker for node {node} panicked while running: {action}")]
    WorkerPanicked { node: NodeIndex, action: Action },

    #[error("planner issued no actions while none were in flight")]
    Stalled,

    #[error("planner finished without naming a final output")]
    NoFinalOutput,

    #[error("results channel closed with actions still in flight")]
    ResultsClosed,

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type ExecutorResult<T> = Result<T, ExecutorError>;

impl ExecutorError {
    /// Attribute a job-level failure to the node and action kind that hit it.
    ///
    /// Node errors keep their node; every other job error passes through.
    pub(crate) fn from_action(node: NodeIndex, kind: ActionKind, err: JobError) -> Self {
        match err {
            JobError::Node(source) => ExecutorError::Node { node, kind, source },
            other => ExecutorError::Job(other),
        }
    }
}
