//! search.toml configuration parser.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};

use sealgrid_core::{NodeIndex, RoleMap};
use sealgrid_executor::ExecutorConfig;
use sealgrid_sim::LinearQuery;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub roots: RoleMap<NodeIndex>,
    #[serde(default)]
    pub executor: ExecutorConfig,
    pub dataset: DatasetConfig,
    pub query: LinearQuery,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub nodes: usize,
    /// Credential seed shared by the simulated nodes.
    #[serde(default = "default_seed")]
    pub seed: String,
    /// Simulated per-call latency.
    pub latency_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// JSON record file. Relative paths are resolved against the config
    /// file's directory.
    pub path: PathBuf,
}

fn default_seed() -> String {
    "sealgrid".to_string()
}

impl ClusterConfig {
    pub fn latency(&self) -> Option<Duration> {
        self.latency_ms.map(Duration::from_millis)
    }
}

impl SearchConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let mut config: SearchConfig =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;

        if config.dataset.path.is_relative() {
            if let Some(dir) = path.parent() {
                config.dataset.path = dir.join(&config.dataset.path);
            }
        }
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check everything that can be checked without touching the dataset.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.cluster.nodes == 0 {
            bail!("cluster.nodes must be at least 1");
        }
        for (role, &node) in self.roots.iter() {
            if node >= self.cluster.nodes {
                bail!(
                    "roots.{role} = {node} is outside a cluster of {} nodes",
                    self.cluster.nodes
                );
            }
        }
        self.query.build_job().context("invalid [query]")?;
        Ok(())
    }

    /// Scaffold a fare search over `nodes` simulated nodes.
    pub fn scaffold(nodes: usize, dataset: &Path) -> Self {
        SearchConfig {
            cluster: ClusterConfig {
                nodes,
                seed: default_seed(),
                latency_ms: None,
            },
            roots: RoleMap::uniform(0),
            executor: ExecutorConfig::with_timing(),
            dataset: DatasetConfig {
                path: dataset.to_path_buf(),
            },
            query: LinearQuery::fares(1000, -1, 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealgrid_core::AttributeType;

    #[test]
    fn scaffold_round_trips() {
        let config = SearchConfig::scaffold(4, Path::new("fares.json"));
        let toml_str = config.to_toml_string().unwrap();
        assert!(toml_str.contains("fares.json"));
        assert!(toml_str.contains("flight"));

        let parsed: SearchConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
        parsed.validate().unwrap();
    }

    #[test]
    fn parse_minimal() {
        let toml_str = r#"
[cluster]
nodes = 2

[dataset]
path = "data.json"

[query]
id_attribute = "id"
attributes = [{ name = "x", type = "ubyte" }]
"#;
        let config: SearchConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.cluster.seed, "sealgrid");
        assert_eq!(config.roots, RoleMap::uniform(0));
        assert!(!config.executor.timing);
        assert_eq!(config.query.attributes[0].kind, AttributeType::UByte);
        assert!(config.cluster.latency().is_none());
        config.validate().unwrap();
    }

    #[test]
    fn dataset_path_is_relative_to_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("search.toml");
        let config = SearchConfig::scaffold(1, Path::new("fares.json"));
        std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();

        let loaded = SearchConfig::from_file(&path).unwrap();
        assert_eq!(loaded.dataset.path, dir.path().join("fares.json"));
    }

    #[test]
    fn rejects_root_outside_cluster() {
        let mut config = SearchConfig::scaffold(2, Path::new("fares.json"));
        config.roots.reducer = 2;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("roots.reducer"));
    }

    #[test]
    fn demo_config_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos/search.toml");
        let config = SearchConfig::from_file(&path).unwrap();
        config.validate().unwrap();
        assert_eq!(config.query, LinearQuery::fares(1000, -1, 1));
        assert!(config.dataset.path.ends_with("fares.json"));
        assert!(config.dataset.path.exists());
    }

    #[test]
    fn rejects_empty_cluster() {
        let config = SearchConfig::scaffold(0, Path::new("fares.json"));
        assert!(config.validate().is_err());
    }
}
