//! State shared between the coordinator and the workers.
//!
//! Everything here sits behind one mutex. Workers copy their inputs out,
//! release the lock for the node call, and take it again to write results.

use std::collections::HashMap;
use std::time::Duration;

use sealgrid_core::{Credential, Job, NodeIndex, OutputId, Role, RoleMap, SecurePackage};
use sealgrid_planner::ActionKind;

use crate::error::{ExecutorError, ExecutorResult};
use crate::timing::{TimingAccumulator, TimingReport};

#[derive(Debug)]
pub(crate) struct SharedState {
    /// Role → holding node → that node's bound copy.
    packages: RoleMap<HashMap<NodeIndex, SecurePackage>>,
    /// Identity credentials, indexed by node.
    credentials: Vec<Credential>,
    outputs: HashMap<OutputId, Vec<u8>>,
    timing: Option<TimingAccumulator>,
}

impl SharedState {
    /// Seed the ownership table with a bound job's root copies.
    pub(crate) fn seed(
        job: &Job,
        roots: &RoleMap<NodeIndex>,
        credentials: Vec<Credential>,
        timing: bool,
    ) -> Self {
        let packages = roots.map(|role, &root| HashMap::from([(root, job.package(role).clone())]));
        let timing = timing.then(|| TimingAccumulator::new(credentials.len()));
        Self {
            packages,
            credentials,
            outputs: HashMap::new(),
            timing,
        }
    }

    /// The copy of `role`'s package held by `node`.
    pub(crate) fn package(&self, role: Role, node: NodeIndex) -> ExecutorResult<SecurePackage> {
        self.packages[role]
            .get(&node)
            .cloned()
            .ok_or(ExecutorError::PackageNotHeld { role, node })
    }

    pub(crate) fn store_package(&mut self, node: NodeIndex, package: SecurePackage) {
        self.packages[package.role()].insert(node, package);
    }

    pub(crate) fn credential(&self, node: NodeIndex) -> ExecutorResult<Credential> {
        self.credentials
            .get(node)
            .cloned()
            .ok_or(ExecutorError::UnknownNode(node))
    }

    pub(crate) fn output(&self, id: OutputId) -> ExecutorResult<Vec<u8>> {
        self.outputs
            .get(&id)
            .cloned()
            .ok_or(ExecutorError::MissingOutput(id))
    }

    pub(crate) fn store_output(&mut self, id: OutputId, bytes: Vec<u8>) {
        self.outputs.insert(id, bytes);
    }

    /// Drop outputs that have been folded into a later one.
    pub(crate) fn consume_outputs(&mut self, ids: &[OutputId]) {
        for id in ids {
            self.outputs.remove(id);
        }
    }

    pub(crate) fn take_output(&mut self, id: OutputId) -> ExecutorResult<Vec<u8>> {
        self.outputs
            .remove(&id)
            .ok_or(ExecutorError::MissingOutput(id))
    }

    pub(crate) fn record_timing(&mut self, node: NodeIndex, kind: ActionKind, elapsed: Duration) {
        if let Some(timing) = self.timing.as_mut() {
            timing.record(node, kind, elapsed);
        }
    }

    pub(crate) fn timing_report(&self) -> Option<TimingReport> {
        self.timing.as_ref().map(TimingAccumulator::report)
    }
}
