//! Node-call timing.
//!
//! Only time spent inside [`Node`](sealgrid_core::Node) calls is counted.
//! Queueing, locking and planning are excluded.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::Serialize;

use sealgrid_core::NodeIndex;
use sealgrid_planner::ActionKind;

/// Accumulated node-call time, filled in by workers under the state lock.
#[derive(Debug, Clone)]
pub(crate) struct TimingAccumulator {
    per_node: Vec<Duration>,
    per_kind: BTreeMap<ActionKind, Duration>,
}

impl TimingAccumulator {
    pub(crate) fn new(nodes: usize) -> Self {
        Self {
            per_node: vec![Duration::ZERO; nodes],
            per_kind: ActionKind::ALL
                .into_iter()
                .map(|kind| (kind, Duration::ZERO))
                .collect(),
        }
    }

    pub(crate) fn record(&mut self, node: NodeIndex, kind: ActionKind, elapsed: Duration) {
        if let Some(total) = self.per_node.get_mut(node) {
            *total += elapsed;
        }
        *self.per_kind.entry(kind).or_default() += elapsed;
    }

    pub(crate) fn report(&self) -> TimingReport {
        TimingReport {
            per_node: self.per_node.clone(),
            per_kind: self.per_kind.clone(),
        }
    }
}

/// Node-call time of one execution, by node and by action kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimingReport {
    /// Indexed by node.
    pub per_node: Vec<Duration>,
    pub per_kind: BTreeMap<ActionKind, Duration>,
}

impl TimingReport {
    /// Total node-call time across the pool.
    pub fn total(&self) -> Duration {
        self.per_kind.values().sum()
    }

    pub fn kind(&self, kind: ActionKind) -> Duration {
        self.per_kind.get(&kind).copied().unwrap_or_default()
    }
}

impl fmt::Display for TimingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "node-call time: {:?}", self.total())?;
        for (kind, elapsed) in &self.per_kind {
            writeln!(f, "  {kind:<9} {elapsed:?}")?;
        }
        for (node, elapsed) in self.per_node.iter().enumerate() {
            writeln!(f, "  node {node:<4} {elapsed:?}")?;
        }
        Ok(())
    }
}
