use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Errors loading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The file is not valid configuration JSON.
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Connection parameters for the GProM command-line client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpromConfig {
    /// Path to the `gprom` executable.
    pub binary: PathBuf,
    /// Database name (`-db`).
    pub database: String,
    /// Storage backend GProM connects through (`-backend`).
    pub backend: String,
    /// Database host (`-host`).
    pub host: String,
    /// Database port (`-port`).
    pub port: u16,
    /// Database user (`-user`).
    pub user: String,
}

impl Default for GpromConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("gprom"),
            database: "gprom_db".to_string(),
            backend: "postgres".to_string(),
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
        }
    }
}

/// How to reach `psql` inside the `ProvSQL` container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvSqlConfig {
    /// Docker executable.
    pub docker: PathBuf,
    /// Name or id of the running container.
    pub container: String,
    /// Database user (`-U`).
    pub user: String,
    /// Database name.
    pub database: String,
    /// `search_path` set before exporting formulas.
    pub search_path: String,
    /// Directory inside the container for export scripts and CSV files.
    pub container_tmp: String,
}

impl Default for ProvSqlConfig {
    fn default() -> Self {
        Self {
            docker: PathBuf::from("docker"),
            container: "provsql-demo".to_string(),
            user: "test".to_string(),
            database: "test".to_string(),
            search_path: "provsql_test, provsql".to_string(),
            container_tmp: "/tmp".to_string(),
        }
    }
}

/// Graphviz renderer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphvizConfig {
    /// Path to the `dot` executable.
    pub binary: PathBuf,
}

impl Default for GraphvizConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("dot"),
        }
    }
}

/// Settings for engines, rendering, and artifacts. Every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// GProM client settings.
    pub gprom: GpromConfig,
    /// `ProvSQL` container settings.
    pub provsql: ProvSqlConfig,
    /// Graphviz settings.
    pub graphviz: GraphvizConfig,
    /// Upper bound on any single external process, in seconds.
    pub timeout_secs: u64,
    /// Directory under which each request gets its own artifact directory.
    pub artifact_root: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            gprom: GpromConfig::default(),
            provsql: ProvSqlConfig::default(),
            graphviz: GraphvizConfig::default(),
            timeout_secs: 60,
            artifact_root: PathBuf::from("provscope-artifacts"),
        }
    }
}

impl EngineConfig {
    /// Parse configuration JSON; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Process timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
