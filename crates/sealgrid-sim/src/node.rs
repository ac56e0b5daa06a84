//! In-process secure node.
//!
//! A [`SimNode`] stands in for a hardware secure element. Its credential is
//! a SHA-256 digest of a cluster seed and the node index, and it refuses to
//! run or migrate any package not bound to that credential. Latency and
//! failures can be injected to exercise the executor.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use sha2::{Digest, Sha256};
use tracing::trace;

use sealgrid_core::{Credential, Invocation, Node, NodeError, NodeResult, SecurePackage};

use crate::program::{NONCE_LEN, Nonce, Program};

#[derive(Debug)]
pub struct SimNode {
    index: usize,
    credential: Credential,
    latency: Option<Duration>,
    fail_after: Option<usize>,
    calls: AtomicUsize,
}

impl SimNode {
    pub fn new(seed: &str, index: usize) -> Self {
        let digest = Sha256::digest(format!("{seed}:{index}").as_bytes());
        Self {
            index,
            credential: Credential::new(digest.to_vec()),
            latency: None,
            fail_after: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Sleep for `latency` on every execute or migrate call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Let the first `calls` execute or migrate calls succeed and fail every
    /// later one with [`NodeError::Unavailable`].
    pub fn failing_after(mut self, calls: usize) -> Self {
        self.fail_after = Some(calls);
        self
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Execute and migrate calls received so far, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn enter(&self) -> NodeResult<usize> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(limit) = self.fail_after.filter(|limit| call >= *limit) {
            return Err(NodeError::Unavailable(format!(
                "node {} stopped after {limit} calls",
                self.index
            )));
        }
        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }
        Ok(call)
    }

    fn check_binding(&self, package: &SecurePackage) -> NodeResult<()> {
        if package.is_bound_to(&self.credential) {
            Ok(())
        } else {
            Err(NodeError::NotBound)
        }
    }

    /// Per-call nonce, so equal results never look alike on the wire.
    fn nonce(&self, call: usize) -> Nonce {
        let mut hasher = Sha256::new();
        hasher.update(self.credential.as_bytes());
        hasher.update((call as u64).to_be_bytes());
        let digest = hasher.finalize();
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&digest[..NONCE_LEN]);
        nonce
    }
}

impl Node for SimNode {
    fn identity_credential(&self) -> NodeResult<Credential> {
        Ok(self.credential.clone())
    }

    fn execute(&self, package: &SecurePackage, invocation: &Invocation) -> NodeResult<Vec<u8>> {
        let call = self.enter()?;
        self.check_binding(package)?;
        let program = Program::from_package(package)?;
        trace!(node = self.index, role = %package.role(), call, "executing");
        program.run(invocation, self.nonce(call))
    }

    fn migrate(&self, package: &SecurePackage, target: &Credential) -> NodeResult<SecurePackage> {
        self.enter()?;
        self.check_binding(package)?;
        trace!(
            node = self.index,
            role = %package.role(),
            target = %target.fingerprint(),
            "migrating"
        );
        Ok(package.clone().rebind(target.clone()))
    }
}

/// `count` simulated nodes sharing `seed`, ready to hand to an executor.
pub fn cluster(seed: &str, count: usize, latency: Option<Duration>) -> Vec<Arc<dyn Node>> {
    (0..count)
        .map(|index| {
            let node = SimNode::new(seed, index);
            let node = match latency {
                Some(latency) => node.with_latency(latency),
                None => node,
            };
            Arc::new(node) as Arc<dyn Node>
        })
        .collect()
}
