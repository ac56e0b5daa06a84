//! Per-node workers.
//!
//! Each worker owns one node and the receiving end of that node's action
//! queue. It runs on its own OS thread, executes one action at a time, and
//! reports every completion, failed or not, on the shared results channel.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, trace};

use sealgrid_core::{Dataset, Job, JobResult, Node, NodeIndex, OutputId, Role, RoleInput};
use sealgrid_planner::{Action, ActionKind};

use crate::error::{ExecutorError, ExecutorResult};
use crate::state::SharedState;

/// The outcome of one dispatched action.
#[derive(Debug)]
pub(crate) struct Completion {
    pub(crate) action: Action,
    pub(crate) result: ExecutorResult<()>,
}

/// What every worker of one execution reads and writes.
pub(crate) struct JobContext {
    pub(crate) job: Job,
    pub(crate) dataset: Arc<dyn Dataset>,
    pub(crate) state: Mutex<SharedState>,
}

pub(crate) struct Worker {
    index: NodeIndex,
    node: Arc<dyn Node>,
    context: Arc<JobContext>,
}

impl Worker {
    pub(crate) fn new(index: NodeIndex, node: Arc<dyn Node>, context: Arc<JobContext>) -> Self {
        Self {
            index,
            node,
            context,
        }
    }

    /// Serve the queue until it closes or the coordinator stops listening.
    pub(crate) fn run(
        self,
        mut actions: UnboundedReceiver<Action>,
        results: UnboundedSender<Completion>,
    ) {
        debug!(node = self.index, "worker started");
        while let Some(action) = actions.blocking_recv() {
            let result = catch_unwind(AssertUnwindSafe(|| self.perform(&action)))
                .unwrap_or_else(|_| {
                    error!(node = self.index, %action, "worker panicked");
                    Err(ExecutorError::WorkerPanicked {
                        node: self.index,
                        action,
                    })
                });
            if results.send(Completion { action, result }).is_err() {
                break;
            }
        }
        debug!(node = self.index, "worker stopped");
    }

    pub(crate) fn perform(&self, action: &Action) -> ExecutorResult<()> {
        debug_assert_eq!(action.node(), self.index, "action routed to the wrong worker");
        trace!(%action, "performing");
        match *action {
            Action::Migrate { role, target, .. } => self.migrate(role, target),
            Action::Map { item, output_id, .. } => self.map(item, output_id),
            Action::Reduce {
                first_input,
                second_input,
                output_id,
                ..
            } => self.reduce(first_input, second_input, output_id),
            Action::Finalize {
                input_id,
                output_id,
                ..
            } => self.finalize(input_id, output_id),
        }
    }

    fn migrate(&self, role: Role, target: NodeIndex) -> ExecutorResult<()> {
        let (package, credential) = {
            let state = self.context.state.lock();
            (state.package(role, self.index)?, state.credential(target)?)
        };

        let migrated = self.call(ActionKind::Migrate, |job, node| {
            job.migrate(&package, &credential, node)
        })?;

        let mut state = self.context.state.lock();
        state.store_package(target, migrated);
        Ok(())
    }

    fn map(&self, item: usize, output_id: OutputId) -> ExecutorResult<()> {
        let (package, record) = {
            let state = self.context.state.lock();
            let package = state.package(Role::Mapper, self.index)?;
            let record = self
                .context
                .dataset
                .item(item)
                .ok_or(ExecutorError::MissingItem(item))?;
            (package, record)
        };

        let output = self.call(ActionKind::Map, |job, node| {
            job.execute_for(&package, RoleInput::Map(&record), node)
        })?;

        let mut state = self.context.state.lock();
        state.store_output(output_id, output);
        Ok(())
    }

    fn reduce(&self, first: OutputId, second: OutputId, output_id: OutputId) -> ExecutorResult<()> {
        let (package, first_bytes, second_bytes) = {
            let state = self.context.state.lock();
            (
                state.package(Role::Reducer, self.index)?,
                state.output(first)?,
                state.output(second)?,
            )
        };

        let output = self.call(ActionKind::Reduce, |job, node| {
            job.execute_for(&package, RoleInput::Reduce(&first_bytes, &second_bytes), node)
        })?;

        let mut state = self.context.state.lock();
        state.consume_outputs(&[first, second]);
        state.store_output(output_id, output);
        Ok(())
    }

    fn finalize(&self, input_id: OutputId, output_id: OutputId) -> ExecutorResult<()> {
        let (package, input) = {
            let state = self.context.state.lock();
            (
                state.package(Role::Finalizer, self.index)?,
                state.output(input_id)?,
            )
        };

        let output = self.call(ActionKind::Finalize, |job, node| {
            job.execute_for(&package, RoleInput::Finalize(&input), node)
        })?;

        let mut state = self.context.state.lock();
        state.consume_outputs(&[input_id]);
        state.store_output(output_id, output);
        Ok(())
    }

    /// Run one node call with no lock held. The call's time is recorded
    /// whether or not it succeeds.
    fn call<T>(
        &self,
        kind: ActionKind,
        f: impl FnOnce(&Job, &dyn Node) -> JobResult<T>,
    ) -> ExecutorResult<T> {
        let started = Instant::now();
        let result = f(&self.context.job, self.node.as_ref());
        self.context
            .state
            .lock()
            .record_timing(self.index, kind, started.elapsed());
        result.map_err(|err| {
            error!(node = self.index, %kind, error = %err, "node call failed");
            ExecutorError::from_action(self.index, kind, err)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use sealgrid_core::{NodeError, RoleMap};
    use sealgrid_sim::{JsonDataset, LinearQuery, SimNode};

    const LATENCY: Duration = Duration::from_millis(5);

    /// A single-node context holding every root copy, with timing enabled.
    fn context(node: &SimNode) -> Arc<JobContext> {
        let mut job = LinearQuery::fares(1000, -1, 1).build_job().unwrap();
        job.bind(&RoleMap::uniform(node.credential().clone()))
            .unwrap();
        let state = SharedState::seed(
            &job,
            &RoleMap::uniform(0),
            vec![node.credential().clone()],
            true,
        );
        Arc::new(JobContext {
            job,
            dataset: Arc::new(JsonDataset::from_records(Vec::new(), "flight")),
            state: Mutex::new(state),
        })
    }

    #[test]
    fn failed_calls_are_still_timed() {
        let node = SimNode::new("worker", 0).with_latency(LATENCY);
        let context = context(&node);
        {
            let mut state = context.state.lock();
            state.store_output(0, vec![0; 16]);
            state.store_output(1, vec![0; 16]);
        }
        let worker = Worker::new(0, Arc::new(node), Arc::clone(&context));

        let err = worker
            .perform(&Action::Reduce {
                node: 0,
                first_input: 0,
                second_input: 1,
                output_id: 2,
            })
            .unwrap_err();
        assert!(matches!(
            err,
            ExecutorError::Node {
                node: 0,
                kind: ActionKind::Reduce,
                source: NodeError::Tampered(_)
            }
        ));

        let report = context.state.lock().timing_report().unwrap();
        assert!(report.kind(ActionKind::Reduce) >= LATENCY);
        assert!(report.per_node[0] >= LATENCY);
        // The failed reduce leaves its inputs in place.
        assert!(context.state.lock().output(0).is_ok());
    }

    #[test]
    fn missing_item_fails_before_calling_the_node() {
        let node = Arc::new(SimNode::new("worker", 0));
        let context = context(&node);
        let worker = Worker::new(0, Arc::clone(&node) as Arc<dyn Node>, context);

        let err = worker
            .perform(&Action::Map {
                node: 0,
                item: 3,
                output_id: 0,
            })
            .unwrap_err();
        assert!(matches!(err, ExecutorError::MissingItem(3)));
        assert_eq!(node.calls(), 0);
    }
}
