//! Shared identifiers and the per-role map.

use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::JobError;

/// Position of a node within the pool for one job execution.
pub type NodeIndex = usize;

/// Identifier of a map, reduce, or finalize result within one job execution.
pub type OutputId = u64;

/// A stage of the map-reduce pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Mapper,
    Reducer,
    Finalizer,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Mapper, Role::Reducer, Role::Finalizer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Mapper => "mapper",
            Role::Reducer => "reducer",
            Role::Finalizer => "finalizer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mapper" => Ok(Role::Mapper),
            "reducer" => Ok(Role::Reducer),
            "finalizer" => Ok(Role::Finalizer),
            other => Err(JobError::UnknownRole(other.to_string())),
        }
    }
}

/// One value per role.
///
/// Used for root-node assignments, credentials by role, and the job's
/// packages. Serializes as a struct with `mapper`, `reducer` and `finalizer`
/// fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoleMap<T> {
    pub mapper: T,
    pub reducer: T,
    pub finalizer: T,
}

impl<T> RoleMap<T> {
    pub fn new(mapper: T, reducer: T, finalizer: T) -> Self {
        Self {
            mapper,
            reducer,
            finalizer,
        }
    }

    /// The same value for every role.
    pub fn uniform(value: T) -> Self
    where
        T: Clone,
    {
        Self {
            mapper: value.clone(),
            reducer: value.clone(),
            finalizer: value,
        }
    }

    pub fn get(&self, role: Role) -> &T {
        match role {
            Role::Mapper => &self.mapper,
            Role::Reducer => &self.reducer,
            Role::Finalizer => &self.finalizer,
        }
    }

    pub fn get_mut(&mut self, role: Role) -> &mut T {
        match role {
            Role::Mapper => &mut self.mapper,
            Role::Reducer => &mut self.reducer,
            Role::Finalizer => &mut self.finalizer,
        }
    }

    /// Iterate in pipeline order: mapper, reducer, finalizer.
    pub fn iter(&self) -> impl Iterator<Item = (Role, &T)> {
        Role::ALL.into_iter().map(move |role| (role, self.get(role)))
    }

    pub fn map<U>(&self, mut f: impl FnMut(Role, &T) -> U) -> RoleMap<U> {
        RoleMap {
            mapper: f(Role::Mapper, &self.mapper),
            reducer: f(Role::Reducer, &self.reducer),
            finalizer: f(Role::Finalizer, &self.finalizer),
        }
    }
}

impl<T> Index<Role> for RoleMap<T> {
    type Output = T;

    fn index(&self, role: Role) -> &T {
        self.get(role)
    }
}

impl<T> IndexMut<Role> for RoleMap<T> {
    fn index_mut(&mut self, role: Role) -> &mut T {
        self.get_mut(role)
    }
}

/// Public identity credential of a node (an endorsement certificate or
/// equivalent). Packages are bound to credentials, never to node indices.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Credential(Vec<u8>);

impl Credential {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Short hex prefix for logs.
    pub fn fingerprint(&self) -> String {
        hex::encode(&self.0[..self.0.len().min(8)])
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({})", self.fingerprint())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_its_own_name() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn unknown_role_is_rejected() {
        let err = "combiner".parse::<Role>().unwrap_err();
        assert_eq!(err, JobError::UnknownRole("combiner".to_string()));
    }

    #[test]
    fn role_map_indexes_by_role() {
        let mut roots = RoleMap::new(0, 3, 1);
        assert_eq!(roots[Role::Reducer], 3);
        roots[Role::Finalizer] = 2;
        assert_eq!(roots.finalizer, 2);

        let collected: Vec<_> = roots.iter().map(|(role, v)| (role, *v)).collect();
        assert_eq!(
            collected,
            vec![(Role::Mapper, 0), (Role::Reducer, 3), (Role::Finalizer, 2)]
        );
    }

    #[test]
    fn role_map_serializes_as_struct() {
        let roots = RoleMap::uniform(1usize);
        let json = serde_json::to_value(roots).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"mapper": 1, "reducer": 1, "finalizer": 1})
        );
    }

    #[test]
    fn credential_debug_shows_fingerprint_only() {
        let cred = Credential::new(vec![0xAB; 32]);
        assert_eq!(format!("{cred:?}"), "Credential(abababababababab)");
    }
}
