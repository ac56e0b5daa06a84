//! JSON-backed dataset.

use std::path::Path;

use anyhow::{Context, bail};

use sealgrid_core::{Dataset, Record};

/// An in-memory record list loaded from a JSON array of objects.
#[derive(Debug, Clone)]
pub struct JsonDataset {
    records: Vec<Record>,
    id_attribute: String,
}

impl JsonDataset {
    pub fn from_records(records: Vec<Record>, id_attribute: &str) -> Self {
        Self {
            records,
            id_attribute: id_attribute.to_string(),
        }
    }

    /// Load a JSON array of records. Every record must carry an integer
    /// `id_attribute`.
    pub fn from_file(path: &Path, id_attribute: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading dataset {}", path.display()))?;
        let records: Vec<Record> = serde_json::from_str(&content)
            .with_context(|| format!("parsing dataset {}", path.display()))?;
        for (index, record) in records.iter().enumerate() {
            if record.get_i64(id_attribute).is_none() {
                bail!("record {index} has no integer {id_attribute:?} attribute");
            }
        }
        Ok(Self::from_records(records, id_attribute))
    }

    pub fn id_attribute(&self) -> &str {
        &self.id_attribute
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }
}

impl Dataset for JsonDataset {
    fn len(&self) -> usize {
        self.records.len()
    }

    fn item(&self, index: usize) -> Option<Record> {
        self.records.get(index).cloned()
    }

    fn item_by_id(&self, id: i64) -> Option<Record> {
        self.records
            .iter()
            .find(|record| record.get_i64(&self.id_attribute) == Some(id))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FARES: &str = r#"[
        {"from": "BOS", "to": "NYC", "price": 150, "start_time": 900, "end_time": 1000, "layovers": 1, "flight": 15},
        {"from": "BOS", "to": "NYC", "price": 250, "start_time": 600, "end_time": 700, "layovers": 0, "flight": 18}
    ]"#;

    fn write_temp(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_records_in_order() {
        let file = write_temp(FARES);
        let db = JsonDataset::from_file(file.path(), "flight").unwrap();
        assert_eq!(db.len(), 2);
        let first = db.item(0).unwrap();
        assert_eq!(first.get_i64("price"), Some(150));
        assert_eq!(first.get("from").and_then(|v| v.as_str()), Some("BOS"));
        assert!(db.item(2).is_none());
    }

    #[test]
    fn finds_items_by_id() {
        let file = write_temp(FARES);
        let db = JsonDataset::from_file(file.path(), "flight").unwrap();
        assert_eq!(db.item_by_id(18).unwrap().get_i64("price"), Some(250));
        assert!(db.item_by_id(99).is_none());
    }

    #[test]
    fn rejects_records_without_id() {
        let file = write_temp(r#"[{"price": 1}]"#);
        let err = JsonDataset::from_file(file.path(), "flight").unwrap_err();
        assert!(err.to_string().contains("flight"));
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = JsonDataset::from_file(Path::new("/nonexistent/fares.json"), "flight")
            .unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/fares.json"));
    }
}
