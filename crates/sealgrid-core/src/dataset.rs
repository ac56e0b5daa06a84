//! Read-only record store consumed by the map phase.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One dataset record: a flat mapping of attribute name to JSON value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Integer attribute lookup; `None` if missing or not an integer.
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.0.get(name).and_then(Value::as_i64)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for Record {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// A read-only dataset addressed by scan position.
pub trait Dataset: Send + Sync {
    /// Number of records.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The record at scan position `index`.
    fn item(&self, index: usize) -> Option<Record>;

    /// The record whose id attribute equals `id`.
    fn item_by_id(&self, id: i64) -> Option<Record>;
}
