//! Error types for nodes and the job model.

use thiserror::Error;

use crate::node::AttributeType;
use crate::types::Role;

/// Result type alias for node operations.
pub type NodeResult<T> = Result<T, NodeError>;

/// Result type alias for job model operations.
pub type JobResult<T> = Result<T, JobError>;

/// Errors reported by a secure execution node.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeError {
    #[error("package is not bound to this node")]
    NotBound,

    #[error("malformed package: {0}")]
    MalformedPackage(String),

    #[error("input in slot {0} failed its integrity check")]
    Tampered(String),

    #[error("execution failed: {0}")]
    Execution(String),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("identity credential unavailable: {0}")]
    Credential(String),

    #[error("node unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised while building, binding, or running a job.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("unknown role: {0}")]
    UnknownRole(String),

    #[error("job has no {0} package")]
    MissingPackage(Role),

    #[error("expected a {expected} package, got a {found} package")]
    RoleMismatch { expected: Role, found: Role },

    #[error("record has no integer attribute {0:?}")]
    MissingAttribute(String),

    #[error("attribute {name:?} value {value} does not fit a {kind} slot")]
    AttributeOutOfRange {
        name: String,
        value: i64,
        kind: AttributeType,
    },

    #[error("output is {0} bytes, too short to decode")]
    TruncatedOutput(usize),

    #[error("node error: {0}")]
    Node(#[from] NodeError),
}
