//! Secure execution nodes and the packages they run.
//!
//! A [`SecurePackage`] is opaque to everything outside a node. The core only
//! tracks which role it serves and which credential it is bound to; the
//! bytes are handed to [`Node::execute`] together with an [`Invocation`]
//! carrying the role-specific inputs.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{JobError, JobResult, NodeResult};
use crate::types::{Credential, Role};

/// Slot holding the 8-byte big-endian item id in a mapper invocation.
pub const ID_SLOT: &str = "_id";
/// First input slot of a reducer invocation.
pub const FIRST_OUTPUT_SLOT: &str = "_output1";
/// Second input slot of a reducer invocation.
pub const SECOND_OUTPUT_SLOT: &str = "_output2";
/// Input slot of a finalizer invocation.
pub const OUTPUT_SLOT: &str = "_output";

/// Capabilities the scheduler needs from a secure execution node.
///
/// Calls are synchronous and may block for a long time; the executor runs
/// each node on its own dedicated worker.
pub trait Node: Send + Sync {
    /// The node's public identity credential.
    fn identity_credential(&self) -> NodeResult<Credential>;

    /// Run a bound package against the given inputs.
    fn execute(&self, package: &SecurePackage, invocation: &Invocation) -> NodeResult<Vec<u8>>;

    /// Re-bind the package's state to `target`. The source copy stays valid.
    fn migrate(&self, package: &SecurePackage, target: &Credential) -> NodeResult<SecurePackage>;
}

/// Opaque computation state for one role of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurePackage {
    role: Role,
    bytes: Vec<u8>,
    binding: Option<Credential>,
}

impl SecurePackage {
    /// An unbound package.
    pub fn new(role: Role, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            role,
            bytes: bytes.into(),
            binding: None,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The credential this package is bound to, if any.
    pub fn binding(&self) -> Option<&Credential> {
        self.binding.as_ref()
    }

    pub fn is_bound_to(&self, credential: &Credential) -> bool {
        self.binding.as_ref() == Some(credential)
    }

    /// The same package bound to `credential`.
    pub fn rebind(mut self, credential: Credential) -> Self {
        self.binding = Some(credential);
        self
    }
}

/// Wire width and signedness of a query attribute inside an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    Byte,
    UByte,
    Short,
    UShort,
}

impl AttributeType {
    pub fn width(&self) -> usize {
        match self {
            AttributeType::Byte | AttributeType::UByte => 1,
            AttributeType::Short | AttributeType::UShort => 2,
        }
    }

    /// Big-endian encoding, or `None` if the value is out of range.
    pub fn encode(&self, value: i64) -> Option<Vec<u8>> {
        match self {
            AttributeType::Byte => i8::try_from(value).ok().map(|v| v.to_be_bytes().to_vec()),
            AttributeType::UByte => u8::try_from(value).ok().map(|v| vec![v]),
            AttributeType::Short => i16::try_from(value).ok().map(|v| v.to_be_bytes().to_vec()),
            AttributeType::UShort => u16::try_from(value).ok().map(|v| v.to_be_bytes().to_vec()),
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> Option<i64> {
        if bytes.len() != self.width() {
            return None;
        }
        Some(match self {
            AttributeType::Byte => i64::from(bytes[0] as i8),
            AttributeType::UByte => i64::from(bytes[0]),
            AttributeType::Short => i64::from(i16::from_be_bytes([bytes[0], bytes[1]])),
            AttributeType::UShort => i64::from(u16::from_be_bytes([bytes[0], bytes[1]])),
        })
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttributeType::Byte => "byte",
            AttributeType::UByte => "ubyte",
            AttributeType::Short => "short",
            AttributeType::UShort => "ushort",
        };
        f.write_str(name)
    }
}

/// Role-specific inputs for one package execution, as named byte slots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    slots: BTreeMap<String, Vec<u8>>,
}

impl Invocation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_bytes(&mut self, slot: &str, bytes: impl Into<Vec<u8>>) {
        self.slots.insert(slot.to_string(), bytes.into());
    }

    pub fn bytes(&self, slot: &str) -> Option<&[u8]> {
        self.slots.get(slot).map(Vec::as_slice)
    }

    /// Encode `value` into `slot` at the width of `kind`.
    pub fn set_value(&mut self, slot: &str, kind: AttributeType, value: i64) -> JobResult<()> {
        let bytes = kind.encode(value).ok_or_else(|| JobError::AttributeOutOfRange {
            name: slot.to_string(),
            value,
            kind,
        })?;
        self.set_bytes(slot, bytes);
        Ok(())
    }

    pub fn value(&self, slot: &str, kind: AttributeType) -> Option<i64> {
        self.bytes(slot).and_then(|b| kind.decode(b))
    }

    pub fn slot_names(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }
}
