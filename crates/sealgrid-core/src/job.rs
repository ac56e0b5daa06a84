//! Job model — the three role-bound packages of one search.
//!
//! A [`Job`] is created once per search request. Before any action runs, the
//! executor calls [`Job::bind`] to bind each role's package to the credential
//! of that role's root node. From then on packages only spread through
//! [`Job::migrate`], which asks a node already holding a copy to re-bind it
//! to another node's credential.
//!
//! For transport, a job converts to and from a [`JobRecord`]: a flat
//! `role → package bytes` map plus the query metadata needed to build mapper
//! invocations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::dataset::Record;
use crate::error::{JobError, JobResult};
use crate::node::{
    AttributeType, FIRST_OUTPUT_SLOT, ID_SLOT, Invocation, Node, OUTPUT_SLOT, SECOND_OUTPUT_SLOT,
    SecurePackage,
};
use crate::output::{DecodedOutput, unpack_output};
use crate::types::{Credential, Role, RoleMap};

/// A record attribute imported into the mapper, with its wire type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AttributeType,
}

impl AttributeSpec {
    pub fn new(name: &str, kind: AttributeType) -> Self {
        Self {
            name: name.to_string(),
            kind,
        }
    }
}

/// Inputs for one role execution.
#[derive(Debug, Clone, Copy)]
pub enum RoleInput<'a> {
    /// A dataset record to score.
    Map(&'a Record),
    /// Two earlier map or reduce outputs to combine.
    Reduce(&'a [u8], &'a [u8]),
    /// The fully reduced output.
    Finalize(&'a [u8]),
}

impl RoleInput<'_> {
    pub fn role(&self) -> Role {
        match self {
            RoleInput::Map(_) => Role::Mapper,
            RoleInput::Reduce(..) => Role::Reducer,
            RoleInput::Finalize(_) => Role::Finalizer,
        }
    }
}

/// Transport-neutral form of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub attributes: Vec<AttributeSpec>,
    pub id_attribute: String,
    /// Role name → package bytes.
    pub packages: BTreeMap<String, Vec<u8>>,
}

/// A map-reduce search job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    attributes: Vec<AttributeSpec>,
    id_attribute: String,
    packages: RoleMap<SecurePackage>,
}

impl Job {
    /// Create a job from its packages.
    ///
    /// Each package must serve the role it is filed under and carry bytes.
    pub fn new(
        attributes: Vec<AttributeSpec>,
        id_attribute: &str,
        packages: RoleMap<SecurePackage>,
    ) -> JobResult<Self> {
        for (role, package) in packages.iter() {
            check_package(role, package)?;
        }
        Ok(Self {
            attributes,
            id_attribute: id_attribute.to_string(),
            packages,
        })
    }

    /// Rebuild a job from its transport form.
    pub fn from_record(record: JobRecord) -> JobResult<Self> {
        let mut found: BTreeMap<Role, Vec<u8>> = BTreeMap::new();
        for (name, bytes) in record.packages {
            let role: Role = name.parse()?;
            found.insert(role, bytes);
        }

        let mut take = |role: Role| {
            found
                .remove(&role)
                .map(|bytes| SecurePackage::new(role, bytes))
                .ok_or(JobError::MissingPackage(role))
        };
        let packages = RoleMap::new(
            take(Role::Mapper)?,
            take(Role::Reducer)?,
            take(Role::Finalizer)?,
        );

        Self::new(record.attributes, &record.id_attribute, packages)
    }

    /// Transport form of this job. Bindings are node state and are not
    /// carried over.
    pub fn to_record(&self) -> JobRecord {
        JobRecord {
            attributes: self.attributes.clone(),
            id_attribute: self.id_attribute.clone(),
            packages: self
                .packages
                .iter()
                .map(|(role, package)| (role.to_string(), package.bytes().to_vec()))
                .collect(),
        }
    }

    pub fn attributes(&self) -> &[AttributeSpec] {
        &self.attributes
    }

    pub fn id_attribute(&self) -> &str {
        &self.id_attribute
    }

    pub fn package(&self, role: Role) -> &SecurePackage {
        &self.packages[role]
    }

    pub fn mapper(&self) -> &SecurePackage {
        &self.packages.mapper
    }

    pub fn reducer(&self) -> &SecurePackage {
        &self.packages.reducer
    }

    pub fn finalizer(&self) -> &SecurePackage {
        &self.packages.finalizer
    }

    /// Bind every role's package to the credential of its root node.
    ///
    /// Nothing is modified unless every package is usable.
    pub fn bind(&mut self, credentials: &RoleMap<Credential>) -> JobResult<()> {
        for (role, package) in self.packages.iter() {
            check_package(role, package)?;
        }
        for role in Role::ALL {
            let credential = credentials[role].clone();
            debug!(%role, credential = %credential.fingerprint(), "binding package");
            let package = self.packages[role].clone();
            self.packages[role] = package.rebind(credential);
        }
        Ok(())
    }

    /// Build the invocation for one role execution.
    pub fn invocation_for(&self, input: RoleInput<'_>) -> JobResult<Invocation> {
        let mut invocation = Invocation::new();
        match input {
            RoleInput::Map(record) => {
                let id = record
                    .get_i64(&self.id_attribute)
                    .ok_or_else(|| JobError::MissingAttribute(self.id_attribute.clone()))?;
                invocation.set_bytes(ID_SLOT, id.to_be_bytes());
                for attribute in &self.attributes {
                    let value = record
                        .get_i64(&attribute.name)
                        .ok_or_else(|| JobError::MissingAttribute(attribute.name.clone()))?;
                    invocation.set_value(&attribute.name, attribute.kind, value)?;
                }
            }
            RoleInput::Reduce(first, second) => {
                invocation.set_bytes(FIRST_OUTPUT_SLOT, first);
                invocation.set_bytes(SECOND_OUTPUT_SLOT, second);
            }
            RoleInput::Finalize(output) => {
                invocation.set_bytes(OUTPUT_SLOT, output);
            }
        }
        Ok(invocation)
    }

    /// Build the role's invocation and run `package` with it on `node`.
    ///
    /// `package` is the copy held by `node`, which is not necessarily the
    /// root copy stored in this job.
    pub fn execute_for(
        &self,
        package: &SecurePackage,
        input: RoleInput<'_>,
        node: &dyn Node,
    ) -> JobResult<Vec<u8>> {
        let role = input.role();
        if package.role() != role {
            return Err(JobError::RoleMismatch {
                expected: role,
                found: package.role(),
            });
        }
        let invocation = self.invocation_for(input)?;
        trace!(%role, slots = invocation.slot_names().count(), "executing package");
        Ok(node.execute(package, &invocation)?)
    }

    /// Ask `node`, which holds `package`, to migrate it to `target`.
    pub fn migrate(
        &self,
        package: &SecurePackage,
        target: &Credential,
        node: &dyn Node,
    ) -> JobResult<SecurePackage> {
        let migrated = node.migrate(package, target)?;
        if migrated.role() != package.role() {
            return Err(JobError::RoleMismatch {
                expected: package.role(),
                found: migrated.role(),
            });
        }
        Ok(migrated)
    }

    /// Decode a plaintext result produced by this job's packages.
    pub fn unpack_output(&self, bytes: &[u8]) -> JobResult<DecodedOutput> {
        unpack_output(bytes)
    }
}

fn check_package(role: Role, package: &SecurePackage) -> JobResult<()> {
    if package.role() != role {
        return Err(JobError::RoleMismatch {
            expected: role,
            found: package.role(),
        });
    }
    if package.bytes().is_empty() {
        return Err(JobError::MissingPackage(role));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{NodeError, NodeResult};
    use serde_json::json;

    /// Echoes the invocation's slots back as bytes; refuses unbound packages.
    struct EchoNode {
        credential: Credential,
    }

    impl Node for EchoNode {
        fn identity_credential(&self) -> NodeResult<Credential> {
            Ok(self.credential.clone())
        }

        fn execute(&self, package: &SecurePackage, invocation: &Invocation) -> NodeResult<Vec<u8>> {
            if !package.is_bound_to(&self.credential) {
                return Err(NodeError::NotBound);
            }
            let mut out = Vec::new();
            for slot in invocation.slot_names() {
                out.extend_from_slice(invocation.bytes(slot).unwrap_or_default());
            }
            Ok(out)
        }

        fn migrate(&self, package: &SecurePackage, target: &Credential) -> NodeResult<SecurePackage> {
            if !package.is_bound_to(&self.credential) {
                return Err(NodeError::NotBound);
            }
            Ok(package.clone().rebind(target.clone()))
        }
    }

    fn fare_job() -> Job {
        Job::new(
            vec![
                AttributeSpec::new("price", AttributeType::Short),
                AttributeSpec::new("layovers", AttributeType::UByte),
            ],
            "flight",
            RoleMap::new(
                SecurePackage::new(Role::Mapper, b"map".to_vec()),
                SecurePackage::new(Role::Reducer, b"reduce".to_vec()),
                SecurePackage::new(Role::Finalizer, b"finalize".to_vec()),
            ),
        )
        .unwrap()
    }

    fn fare(flight: i64) -> Record {
        serde_json::from_value(json!({
            "flight": flight,
            "price": 150,
            "layovers": 1,
            "from": "BOS",
        }))
        .unwrap()
    }

    const PACKED: [u8; 16] = [
        0, 0, 0, 0, 0x12, 0x34, 0x56, 0x78, 0x31, 0x41, 0xCC, 0xCD, 0xCE, 0xBE, 0xEF, 0xFE,
    ];

    #[test]
    fn map_invocation_embeds_id_and_attributes() {
        let job = fare_job();
        let record = fare(0x12345678);
        let inv = job.invocation_for(RoleInput::Map(&record)).unwrap();

        assert_eq!(
            inv.bytes(ID_SLOT),
            Some(&[0, 0, 0, 0, 0x12, 0x34, 0x56, 0x78][..])
        );
        assert_eq!(inv.value("price", AttributeType::Short), Some(150));
        assert_eq!(inv.value("layovers", AttributeType::UByte), Some(1));
        assert!(inv.bytes("from").is_none());
    }

    #[test]
    fn map_invocation_requires_declared_attributes() {
        let job = fare_job();
        let record: Record = serde_json::from_value(json!({"flight": 3, "price": 10})).unwrap();
        let err = job.invocation_for(RoleInput::Map(&record)).unwrap_err();
        assert_eq!(err, JobError::MissingAttribute("layovers".to_string()));
    }

    #[test]
    fn reduce_invocation_embeds_both_outputs() {
        let job = fare_job();
        let first: Vec<u8> = (1..=16).collect();
        let second: Vec<u8> = (17..=32).collect();
        let inv = job
            .invocation_for(RoleInput::Reduce(&first, &second))
            .unwrap();
        assert_eq!(inv.bytes(FIRST_OUTPUT_SLOT), Some(first.as_slice()));
        assert_eq!(inv.bytes(SECOND_OUTPUT_SLOT), Some(second.as_slice()));
    }

    #[test]
    fn unpack_output_decodes_fixed_layout() {
        let out = fare_job().unpack_output(&PACKED).unwrap();
        assert_eq!(out.id, 0x12345678);
        assert_eq!(out.score, 0x3141);
        assert_eq!(out.check, vec![0xBE, 0xEF, 0xFE]);
    }

    #[test]
    fn job_survives_record_round_trip() {
        let job = fare_job();
        let json = serde_json::to_string(&job.to_record()).unwrap();
        let restored = Job::from_record(serde_json::from_str(&json).unwrap()).unwrap();

        assert_eq!(restored, job);
        assert_eq!(
            restored.unpack_output(&PACKED).unwrap(),
            job.unpack_output(&PACKED).unwrap()
        );

        let record = fare(42);
        assert_eq!(
            restored.invocation_for(RoleInput::Map(&record)).unwrap(),
            job.invocation_for(RoleInput::Map(&record)).unwrap()
        );
    }

    #[test]
    fn record_uses_role_names_as_keys() {
        let record = fare_job().to_record();
        let keys: Vec<_> = record.packages.keys().cloned().collect();
        assert_eq!(keys, vec!["finalizer", "mapper", "reducer"]);
    }

    #[test]
    fn from_record_rejects_unknown_role() {
        let mut record = fare_job().to_record();
        record.packages.insert("combiner".to_string(), vec![1]);
        assert_eq!(
            Job::from_record(record),
            Err(JobError::UnknownRole("combiner".to_string()))
        );
    }

    #[test]
    fn from_record_rejects_missing_package() {
        let mut record = fare_job().to_record();
        record.packages.remove("reducer");
        assert_eq!(
            Job::from_record(record),
            Err(JobError::MissingPackage(Role::Reducer))
        );
    }

    #[test]
    fn empty_package_fails_fast() {
        let err = Job::new(
            Vec::new(),
            "id",
            RoleMap::new(
                SecurePackage::new(Role::Mapper, b"map".to_vec()),
                SecurePackage::new(Role::Reducer, Vec::new()),
                SecurePackage::new(Role::Finalizer, b"fin".to_vec()),
            ),
        )
        .unwrap_err();
        assert_eq!(err, JobError::MissingPackage(Role::Reducer));
    }

    #[test]
    fn misfiled_package_is_rejected() {
        let err = Job::new(
            Vec::new(),
            "id",
            RoleMap::new(
                SecurePackage::new(Role::Reducer, b"map".to_vec()),
                SecurePackage::new(Role::Reducer, b"reduce".to_vec()),
                SecurePackage::new(Role::Finalizer, b"fin".to_vec()),
            ),
        )
        .unwrap_err();
        assert_eq!(
            err,
            JobError::RoleMismatch {
                expected: Role::Mapper,
                found: Role::Reducer
            }
        );
    }

    #[test]
    fn bind_then_execute_and_migrate() {
        let root = EchoNode {
            credential: Credential::new(b"root".to_vec()),
        };
        let other = EchoNode {
            credential: Credential::new(b"other".to_vec()),
        };

        let mut job = fare_job();
        let record = fare(7);
        let err = job
            .execute_for(job.mapper(), RoleInput::Map(&record), &root)
            .unwrap_err();
        assert_eq!(err, JobError::Node(NodeError::NotBound));

        job.bind(&RoleMap::uniform(root.credential.clone())).unwrap();
        for role in Role::ALL {
            assert!(job.package(role).is_bound_to(&root.credential));
        }

        let out = job
            .execute_for(job.mapper(), RoleInput::Map(&record), &root)
            .unwrap();
        assert!(!out.is_empty());

        let migrated = job
            .migrate(job.reducer(), &other.credential, &root)
            .unwrap();
        assert!(migrated.is_bound_to(&other.credential));
        assert!(job.reducer().is_bound_to(&root.credential));

        let first = [1u8; 16];
        let second = [2u8; 16];
        let reduced = job
            .execute_for(&migrated, RoleInput::Reduce(&first, &second), &other)
            .unwrap();
        assert_eq!(reduced.len(), 32);
    }

    #[test]
    fn execute_for_checks_package_role() {
        let node = EchoNode {
            credential: Credential::new(b"root".to_vec()),
        };
        let mut job = fare_job();
        job.bind(&RoleMap::uniform(node.credential.clone())).unwrap();

        let out = [0u8; 16];
        let err = job
            .execute_for(job.mapper(), RoleInput::Finalize(&out), &node)
            .unwrap_err();
        assert_eq!(
            err,
            JobError::RoleMismatch {
                expected: Role::Finalizer,
                found: Role::Mapper
            }
        );
    }
}
