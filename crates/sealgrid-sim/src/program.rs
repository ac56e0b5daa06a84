//! Scoring programs carried inside simulated packages.
//!
//! A simulated package's bytes are a JSON-encoded [`Program`]. Every result
//! a program produces uses the 16-byte record layout decoded by
//! [`unpack_output`]: item id, score, a fresh nonce, and the job's check
//! bytes. Reduce and finalize programs refuse inputs whose check bytes do
//! not match their own.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use sealgrid_core::node::{FIRST_OUTPUT_SLOT, ID_SLOT, OUTPUT_SLOT, SECOND_OUTPUT_SLOT};
use sealgrid_core::{
    AttributeSpec, Invocation, NodeError, NodeResult, Role, SecurePackage, unpack_output,
};

pub const CHECK_LEN: usize = 3;
pub const NONCE_LEN: usize = 3;
/// Id and score, the part of a record that survives a reduce.
const PAYLOAD_LEN: usize = 10;
pub const RECORD_LEN: usize = PAYLOAD_LEN + NONCE_LEN + CHECK_LEN;

pub type Check = [u8; CHECK_LEN];
pub type Nonce = [u8; NONCE_LEN];

/// The computation inside one simulated package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "program", rename_all = "snake_case")]
pub enum Program {
    /// Mapper: `bias + Σ weight · attribute`, saturated to 16 bits.
    Score {
        attributes: Vec<AttributeSpec>,
        weights: BTreeMap<String, i64>,
        bias: i64,
        check: Check,
    },
    /// Reducer: keep the higher-scoring input; ties keep the first.
    PickHighest { check: Check },
    /// Finalizer: verify the reduced record and re-emit it.
    Release { check: Check },
}

impl Program {
    pub fn role(&self) -> Role {
        match self {
            Program::Score { .. } => Role::Mapper,
            Program::PickHighest { .. } => Role::Reducer,
            Program::Release { .. } => Role::Finalizer,
        }
    }

    /// Wrap this program in an unbound package for its role.
    pub fn to_package(&self) -> serde_json::Result<SecurePackage> {
        Ok(SecurePackage::new(self.role(), serde_json::to_vec(self)?))
    }

    /// Load the program carried by `package`.
    pub fn from_package(package: &SecurePackage) -> NodeResult<Self> {
        let program: Program = serde_json::from_slice(package.bytes())
            .map_err(|e| NodeError::MalformedPackage(e.to_string()))?;
        if program.role() != package.role() {
            return Err(NodeError::MalformedPackage(format!(
                "{} package carries a {} program",
                package.role(),
                program.role()
            )));
        }
        Ok(program)
    }

    /// Run against `invocation`, stamping the result with `nonce`.
    pub fn run(&self, invocation: &Invocation, nonce: Nonce) -> NodeResult<Vec<u8>> {
        match self {
            Program::Score {
                attributes,
                weights,
                bias,
                check,
            } => {
                let id = invocation
                    .bytes(ID_SLOT)
                    .filter(|id| id.len() == 8)
                    .ok_or_else(|| NodeError::Execution(format!("missing {ID_SLOT} slot")))?;

                let mut score = *bias;
                for attribute in attributes {
                    let value = invocation
                        .value(&attribute.name, attribute.kind)
                        .ok_or_else(|| {
                            NodeError::Execution(format!("missing {} slot", attribute.name))
                        })?;
                    let weight = weights.get(&attribute.name).copied().unwrap_or(0);
                    score = score.saturating_add(weight.saturating_mul(value));
                }
                let score = score.clamp(i64::from(i16::MIN), i64::from(i16::MAX)) as i16;

                let mut payload = id.to_vec();
                payload.extend_from_slice(&score.to_be_bytes());
                Ok(record(&payload, nonce, check))
            }
            Program::PickHighest { check } => {
                let first = verified(invocation, FIRST_OUTPUT_SLOT, check)?;
                let second = verified(invocation, SECOND_OUTPUT_SLOT, check)?;
                let winner = if score_of(second)? > score_of(first)? {
                    second
                } else {
                    first
                };
                Ok(record(&winner[..PAYLOAD_LEN], nonce, check))
            }
            Program::Release { check } => {
                let input = verified(invocation, OUTPUT_SLOT, check)?;
                Ok(record(&input[..PAYLOAD_LEN], nonce, check))
            }
        }
    }
}

fn record(payload: &[u8], nonce: Nonce, check: &Check) -> Vec<u8> {
    let mut out = Vec::with_capacity(RECORD_LEN);
    out.extend_from_slice(payload);
    out.extend_from_slice(&nonce);
    out.extend_from_slice(check);
    out
}

/// The record in `slot`, if it is well formed and carries `check`.
fn verified<'a>(invocation: &'a Invocation, slot: &str, check: &Check) -> NodeResult<&'a [u8]> {
    let bytes = invocation
        .bytes(slot)
        .ok_or_else(|| NodeError::Execution(format!("missing {slot} slot")))?;
    if bytes.len() != RECORD_LEN || bytes[PAYLOAD_LEN + NONCE_LEN..] != check[..] {
        return Err(NodeError::Tampered(slot.to_string()));
    }
    Ok(bytes)
}

fn score_of(bytes: &[u8]) -> NodeResult<i16> {
    unpack_output(bytes)
        .map(|out| out.score)
        .map_err(|e| NodeError::Execution(e.to_string()))
}
