//! Drive a planner to completion without any nodes.
//!
//! Used to inspect the action stream a planner produces for a given pool and
//! to pin it down in regression tests.

use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::planner::Planner;

/// How completions are fed back to the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Consumption {
    /// Every action of a batch completes before the next batch is planned.
    Parallel,
    /// Exactly one pending action (the oldest) completes between batches.
    Serial,
}

/// Run `planner` until it is done and return every batch it issued, empty
/// batches included.
pub fn replay<P: Planner + ?Sized>(planner: &mut P, consumption: Consumption) -> Vec<Vec<Action>> {
    let mut batches = Vec::new();
    let mut pending: Vec<Action> = Vec::new();

    while !planner.is_done() {
        let batch = planner.next_actions();
        assert!(
            !batch.is_empty() || !pending.is_empty(),
            "planner stalled with nothing in flight"
        );
        match consumption {
            Consumption::Parallel => {
                for action in &batch {
                    planner.action_done(action);
                }
            }
            Consumption::Serial => {
                pending.extend(batch.iter().copied());
                if !pending.is_empty() {
                    let action = pending.remove(0);
                    planner.action_done(&action);
                }
            }
        }
        batches.push(batch);
    }
    batches
}
