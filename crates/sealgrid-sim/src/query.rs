//! Linear scoring queries.
//!
//! A [`LinearQuery`] scores each record as `bias + Σ weight · attribute`
//! and keeps the highest score. [`LinearQuery::fares`] is the flight-fare
//! ranking: cheaper, shorter, and with fewer layovers is better.

use std::collections::BTreeMap;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};

use sealgrid_core::{AttributeSpec, AttributeType, Job, Record, RoleMap};

use crate::program::{CHECK_LEN, Check, Program};

/// Check bytes used when a query does not choose its own.
pub const DEFAULT_CHECK: Check = [0xBE, 0xEF, 0xFE];

/// A query whose score is linear in the record's attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinearQuery {
    pub id_attribute: String,
    #[serde(default)]
    pub bias: i64,
    #[serde(default = "default_check")]
    pub check: Vec<u8>,
    pub attributes: Vec<AttributeSpec>,
    /// Attribute name → weight. Attributes without a weight are imported but
    /// do not affect the score.
    #[serde(default)]
    pub weights: BTreeMap<String, i64>,
}

fn default_check() -> Vec<u8> {
    DEFAULT_CHECK.to_vec()
}

impl LinearQuery {
    /// Flight-fare ranking over `price`, `start_time`, `end_time` and
    /// `layovers`:
    ///
    /// ```text
    /// 20000 - price - (end_time - start_time) * duration_cost
    ///       - start_time * start_time_cost - layovers * layovers_cost
    /// ```
    pub fn fares(layovers_cost: i64, start_time_cost: i64, duration_cost: i64) -> Self {
        let attributes = ["price", "start_time", "end_time", "layovers"]
            .into_iter()
            .map(|name| AttributeSpec::new(name, AttributeType::Short))
            .collect();
        let weights = BTreeMap::from([
            ("price".to_string(), -1),
            ("start_time".to_string(), duration_cost - start_time_cost),
            ("end_time".to_string(), -duration_cost),
            ("layovers".to_string(), -layovers_cost),
        ]);
        Self {
            id_attribute: "flight".to_string(),
            bias: 20000,
            check: default_check(),
            attributes,
            weights,
        }
    }

    /// Compute a record's score in the clear, the way the mapper would.
    pub fn score(&self, record: &Record) -> Option<i16> {
        let mut score = self.bias;
        for attribute in &self.attributes {
            let value = record.get_i64(&attribute.name)?;
            let weight = self.weights.get(&attribute.name).copied().unwrap_or(0);
            score = score.saturating_add(weight.saturating_mul(value));
        }
        Some(score.clamp(i64::from(i16::MIN), i64::from(i16::MAX)) as i16)
    }

    fn check_bytes(&self) -> anyhow::Result<Check> {
        let Ok(check) = Check::try_from(self.check.as_slice()) else {
            bail!("check must be {CHECK_LEN} bytes, got {}", self.check.len());
        };
        Ok(check)
    }

    /// Build the three packages for this query.
    pub fn build_job(&self) -> anyhow::Result<Job> {
        for name in self.weights.keys() {
            if !self.attributes.iter().any(|a| &a.name == name) {
                bail!("weight given for unknown attribute {name:?}");
            }
        }
        let check = self.check_bytes()?;

        let programs = RoleMap::new(
            Program::Score {
                attributes: self.attributes.clone(),
                weights: self.weights.clone(),
                bias: self.bias,
                check,
            },
            Program::PickHighest { check },
            Program::Release { check },
        );
        let packages = RoleMap::new(
            programs.mapper.to_package()?,
            programs.reducer.to_package()?,
            programs.finalizer.to_package()?,
        );
        Job::new(self.attributes.clone(), &self.id_attribute, packages)
            .context("assembling job packages")
    }
}
