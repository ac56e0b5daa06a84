//! Executor options.

use serde::{Deserialize, Serialize};

/// Per-execution options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Accumulate node-call time per node and per action kind, and return a
    /// [`TimingReport`](crate::TimingReport) with the result.
    pub timing: bool,
}

impl ExecutorConfig {
    pub fn with_timing() -> Self {
        Self { timing: true }
    }
}
