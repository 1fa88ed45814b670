//! YAML node configuration.
//!
//! One file per node, listing the node's address and its direct neighbours:
//!
//! ```yaml
//! id: 2
//! address: 127.0.0.2
//! port: 30000
//! neighbours:
//!   - id: 1
//!     address: 127.0.0.1
//!     edge_weight: 4
//! ```
//!
//! `port` is optional and defaults to [`DEFAULT_PORT`]. All nodes of a
//! deployment share one port because senders are identified by IP alone.

use std::{
    collections::BTreeSet,
    fs,
    net::IpAddr,
    path::{Path, PathBuf},
};

use canopy_core::{EdgeWeight, Neighbour, NodeAddr, NodeIdentity};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Port every node listens on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 30000;

/// Configuration errors. All are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read config {path}: {source}")]
    Io {
        /// Path of the file
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// File is not valid YAML for a node configuration
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Values parse but are inconsistent
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration of a single node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Human-readable node number (display only)
    pub id: u32,

    /// Address the node listens on and sends from
    pub address: IpAddr,

    /// Listening port, shared by all nodes
    #[serde(default = "default_port")]
    pub port: u16,

    /// Direct neighbours
    #[serde(default)]
    pub neighbours: Vec<NeighbourConfig>,
}

/// A neighbour entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighbourConfig {
    /// Neighbour's node number (display only)
    pub id: u32,

    /// Neighbour's address
    pub address: IpAddr,

    /// Edge weight; unused by the traversal itself
    #[serde(default)]
    pub edge_weight: i64,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl NodeConfig {
    /// Parse and validate a configuration from YAML text.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] for malformed YAML, [`ConfigError::Invalid`] if
    /// validation fails.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`NodeConfig::from_yaml_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_yaml_str(&yaml)
    }

    /// Check the configuration for self loops, duplicates and a zero port.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::Invalid(format!("node {}: port must be non-zero", self.id)));
        }

        let mut seen = BTreeSet::new();
        for neighbour in &self.neighbours {
            if neighbour.address == self.address {
                return Err(ConfigError::Invalid(format!(
                    "node {} lists itself as neighbour {}",
                    self.id, neighbour.id
                )));
            }
            if !seen.insert(neighbour.address) {
                return Err(ConfigError::Invalid(format!(
                    "node {} lists neighbour {} more than once",
                    self.id, neighbour.address
                )));
            }
        }

        Ok(())
    }

    /// This node's address.
    #[must_use]
    pub fn addr(&self) -> NodeAddr {
        NodeAddr::from(self.address)
    }

    /// Build the node identity used by the state machine.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the neighbour list is inconsistent.
    pub fn identity(&self) -> Result<NodeIdentity, ConfigError> {
        let neighbours = self.neighbours.iter().map(|n| {
            Neighbour::new(NodeAddr::from(n.address), EdgeWeight(n.edge_weight))
        });

        NodeIdentity::new(self.addr(), neighbours)
            .map_err(|e| ConfigError::Invalid(format!("node {}: {}", self.id, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NODE_2: &str = "
id: 2
address: 127.0.0.2
neighbours:
  - id: 1
    address: 127.0.0.1
    edge_weight: 4
  - id: 3
    address: 127.0.0.3
    edge_weight: 1
";

    #[test]
    fn parses_node_file() {
        let config = NodeConfig::from_yaml_str(NODE_2).unwrap();

        assert_eq!(config.id, 2);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.neighbours.len(), 2);
        assert_eq!(config.neighbours[0].edge_weight, 4);

        let identity = config.identity().unwrap();
        assert_eq!(identity.addr, "127.0.0.2".parse().unwrap());
        assert_eq!(identity.neighbours.weight(&"127.0.0.3".parse().unwrap()), Some(EdgeWeight(1)));
    }

    #[test]
    fn missing_weight_defaults_to_zero() {
        let config = NodeConfig::from_yaml_str(
            "id: 1\naddress: 10.0.0.1\nport: 4000\nneighbours:\n  - id: 2\n    address: 10.0.0.2\n",
        )
        .unwrap();

        assert_eq!(config.port, 4000);
        assert_eq!(config.neighbours[0].edge_weight, 0);
    }

    #[test]
    fn node_without_neighbours_is_valid() {
        let config = NodeConfig::from_yaml_str("id: 1\naddress: 10.0.0.1\n").unwrap();
        assert!(config.identity().unwrap().neighbours.is_empty());
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let err = NodeConfig::from_yaml_str("id: [1\naddress: nowhere").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));

        let err = NodeConfig::from_yaml_str("id: 1\naddress: not-an-ip\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn self_loop_and_duplicates_are_invalid() {
        let err = NodeConfig::from_yaml_str(
            "id: 1\naddress: 10.0.0.1\nneighbours:\n  - id: 1\n    address: 10.0.0.1\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = NodeConfig::from_yaml_str(
            "id: 1\naddress: 10.0.0.1\nneighbours:\n\
             \x20 - id: 2\n    address: 10.0.0.2\n\
             \x20 - id: 3\n    address: 10.0.0.2\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn zero_port_is_invalid() {
        let err = NodeConfig::from_yaml_str("id: 1\naddress: 10.0.0.1\nport: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = NodeConfig::load("/nonexistent/canopy/node-1.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
