//! Executor — drives a planner against a live node pool.
//!
//! One call to [`Executor::execute`] runs one job from credential
//! collection to the final output. The coordinator is the only task that
//! talks to the planner; it dispatches every batch, then waits for exactly
//! one completion before asking for more work.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

use sealgrid_core::{
    Credential, Dataset, DecodedOutput, Job, JobResult, Node, NodeIndex, OutputId, RoleMap,
    unpack_output,
};
use sealgrid_planner::{Action, MapReducePlanner, PlanError, Planner};

use crate::config::ExecutorConfig;
use crate::error::{ExecutorError, ExecutorResult};
use crate::state::SharedState;
use crate::timing::TimingReport;
use crate::worker::{Completion, JobContext, Worker};

/// The result of a finished job.
#[derive(Debug, Clone)]
pub struct Execution {
    /// Plaintext produced by the finalizer.
    pub output: Vec<u8>,
    pub output_id: OutputId,
    /// Number of actions dispatched, migrations included.
    pub actions: usize,
    /// Wall-clock time from credential collection to the final completion.
    pub elapsed: Duration,
    /// Present when [`ExecutorConfig::timing`] is set.
    pub timing: Option<TimingReport>,
}

impl Execution {
    /// Decode the output as a `(id, score, check)` result record.
    pub fn decode(&self) -> JobResult<DecodedOutput> {
        unpack_output(&self.output)
    }
}

/// Runs one job over a node pool.
pub struct Executor<P: Planner = MapReducePlanner> {
    job: Job,
    dataset: Arc<dyn Dataset>,
    nodes: Vec<Arc<dyn Node>>,
    roots: RoleMap<NodeIndex>,
    config: ExecutorConfig,
    planner: P,
}

impl Executor<MapReducePlanner> {
    /// Create an executor using the default map-reduce planner, with one
    /// item per dataset record.
    pub fn new(
        job: Job,
        dataset: Arc<dyn Dataset>,
        nodes: Vec<Arc<dyn Node>>,
        roots: RoleMap<NodeIndex>,
        config: ExecutorConfig,
    ) -> ExecutorResult<Self> {
        let planner = MapReducePlanner::new(dataset.len(), nodes.len(), roots)?;
        Self::with_planner(job, dataset, nodes, roots, config, planner)
    }
}

impl<P: Planner> Executor<P> {
    /// Create an executor driven by a caller-supplied planner.
    pub fn with_planner(
        job: Job,
        dataset: Arc<dyn Dataset>,
        nodes: Vec<Arc<dyn Node>>,
        roots: RoleMap<NodeIndex>,
        config: ExecutorConfig,
        planner: P,
    ) -> ExecutorResult<Self> {
        if nodes.is_empty() {
            return Err(PlanError::NoNodes.into());
        }
        for (role, &node) in roots.iter() {
            if node >= nodes.len() {
                return Err(PlanError::RootOutOfRange {
                    role,
                    node,
                    nodes: nodes.len(),
                }
                .into());
            }
        }
        Ok(Self {
            job,
            dataset,
            nodes,
            roots,
            config,
            planner,
        })
    }

    /// Run the job to completion.
    ///
    /// Any failed action aborts the job. Actions already running on other
    /// nodes are allowed to finish before this returns.
    pub async fn execute(self) -> ExecutorResult<Execution> {
        let Self {
            mut job,
            dataset,
            nodes,
            roots,
            config,
            mut planner,
        } = self;
        let started = Instant::now();
        info!(
            nodes = nodes.len(),
            items = dataset.len(),
            mapper_root = roots.mapper,
            reducer_root = roots.reducer,
            finalizer_root = roots.finalizer,
            "starting job"
        );

        let credentials = collect_credentials(&nodes).await?;
        job.bind(&roots.map(|_, &node| credentials[node].clone()))?;
        let state = SharedState::seed(&job, &roots, credentials, config.timing);
        let context = Arc::new(JobContext {
            job,
            dataset,
            state: Mutex::new(state),
        });

        let (results_tx, mut results_rx) = mpsc::unbounded_channel();
        let mut queues = Vec::with_capacity(nodes.len());
        let mut workers = Vec::with_capacity(nodes.len());
        let mut spawned = Ok(());
        for (index, node) in nodes.into_iter().enumerate() {
            let (queue_tx, queue_rx) = mpsc::unbounded_channel();
            let worker = Worker::new(index, node, Arc::clone(&context));
            let results = results_tx.clone();
            // One OS thread per node for the whole job.
            match thread::Builder::new()
                .name(format!("sealgrid-node-{index}"))
                .spawn(move || worker.run(queue_rx, results))
            {
                Ok(handle) => workers.push(handle),
                Err(source) => {
                    spawned = Err(ExecutorError::WorkerSpawn {
                        node: index,
                        source,
                    });
                    break;
                }
            }
            queues.push(queue_tx);
        }
        drop(results_tx);

        let outcome = match spawned {
            Ok(()) => coordinate(&mut planner, &queues, &mut results_rx).await,
            Err(e) => Err(e),
        };

        // Closing the queues and the results channel lets every worker exit
        // once its current node call returns.
        drop(queues);
        drop(results_rx);
        if let Err(e) = join_workers(workers).await {
            warn!(error = %e, "worker threads did not shut down cleanly");
        }

        let (output_id, actions) = match outcome {
            Ok(done) => done,
            Err(e) => {
                warn!(error = %e, "job failed");
                return Err(e);
            }
        };

        let (output, timing) = {
            let mut state = context.state.lock();
            (state.take_output(output_id)?, state.timing_report())
        };
        let elapsed = started.elapsed();
        info!(output_id, actions, ?elapsed, "job complete");

        Ok(Execution {
            output,
            output_id,
            actions,
            elapsed,
            timing,
        })
    }
}

/// Wait for every worker thread to exit, off the async runtime.
async fn join_workers(workers: Vec<JoinHandle<()>>) -> Result<(), JoinError> {
    tokio::task::spawn_blocking(move || {
        for handle in workers {
            let name = handle.thread().name().map(str::to_owned);
            if handle.join().is_err() {
                warn!(worker = ?name, "worker thread panicked outside an action");
            }
        }
    })
    .await
}

/// Ask every node for its credential in parallel and wait for all of them.
async fn collect_credentials(nodes: &[Arc<dyn Node>]) -> ExecutorResult<Vec<Credential>> {
    let mut tasks = JoinSet::new();
    for (index, node) in nodes.iter().enumerate() {
        let node = Arc::clone(node);
        tasks.spawn_blocking(move || (index, node.identity_credential()));
    }

    let mut credentials: Vec<Option<Credential>> = vec![None; nodes.len()];
    while let Some(joined) = tasks.join_next().await {
        let (index, result) = joined?;
        let credential = result.map_err(|source| ExecutorError::Credential {
            node: index,
            source,
        })?;
        debug!(node = index, credential = %credential.fingerprint(), "credential collected");
        credentials[index] = Some(credential);
    }

    credentials
        .into_iter()
        .enumerate()
        .map(|(index, credential)| credential.ok_or(ExecutorError::UnknownNode(index)))
        .collect()
}

/// The coordination loop. Returns the final output id and the number of
/// actions dispatched.
async fn coordinate<P: Planner + ?Sized>(
    planner: &mut P,
    queues: &[UnboundedSender<Action>],
    results: &mut UnboundedReceiver<Completion>,
) -> ExecutorResult<(OutputId, usize)> {
    let mut in_flight = 0usize;
    let mut dispatched = 0usize;

    while !planner.is_done() {
        let batch = planner.next_actions();
        if !batch.is_empty() {
            debug!(size = batch.len(), in_flight, "dispatching batch");
        }
        for action in batch {
            let node = action.node();
            let queue = queues.get(node).ok_or(ExecutorError::UnknownNode(node))?;
            queue
                .send(action)
                .map_err(|_| ExecutorError::WorkerLost(node))?;
            in_flight += 1;
            dispatched += 1;
        }

        if in_flight == 0 {
            return Err(ExecutorError::Stalled);
        }

        let Completion { action, result } =
            results.recv().await.ok_or(ExecutorError::ResultsClosed)?;
        in_flight -= 1;
        result?;
        debug!(%action, "action complete");
        planner.action_done(&action);
    }

    let output_id = planner.output_id().ok_or(ExecutorError::NoFinalOutput)?;
    Ok((output_id, dispatched))
}
