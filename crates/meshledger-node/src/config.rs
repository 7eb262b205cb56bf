//! Node configuration.
//!
//! Loaded from a TOML file, then selectively overridden from the command line.

use meshledger_consensus::OrchestratorConfig;
use meshledger_network::TransportConfig;
use meshledger_types::Address;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Node name, used in logs
    pub name: String,
    /// Data directory
    pub data_dir: PathBuf,
    pub network: NetworkConfig,
    pub consensus: ConsensusConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: "meshledger-node".to_string(),
            data_dir: PathBuf::from("./data"),
            network: NetworkConfig::default(),
            consensus: ConsensusConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        let config: NodeConfig = toml::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e))?;
        Ok(config)
    }

    /// Save configuration to file.
    pub fn to_file(&self, path: &Path) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .map_err(|e| anyhow::anyhow!("Failed to write config file '{}': {}", path.display(), e))?;
        Ok(())
    }

    /// Validate configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.network.max_sessions == 0 {
            anyhow::bail!("max_sessions must be at least 1");
        }
        if self.network.gossip_epoch_secs == 0 || self.network.round_epoch_secs == 0 {
            anyhow::bail!("Epoch lengths must be positive");
        }
        if self.network.proposal_window_secs >= self.network.round_epoch_secs {
            anyhow::bail!(
                "proposal_window_secs ({}) must be shorter than round_epoch_secs ({})",
                self.network.proposal_window_secs,
                self.network.round_epoch_secs
            );
        }
        if self.network.bootstrap_peers.contains(&self.network.listen_addr) {
            anyhow::bail!("Bootstrap peers must not include the node's own listen address");
        }
        if self.consensus.sync_timeout_ms == 0 {
            anyhow::bail!("sync_timeout_ms must be positive");
        }
        if !(1..=22).contains(&self.storage.compression_level) {
            anyhow::bail!("compression_level must be between 1 and 22");
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            anyhow::bail!("Unknown log format '{}', expected pretty or json", self.logging.format);
        }
        Ok(())
    }

    /// Where the miner key lives when none is configured.
    pub fn miner_key_path(&self) -> PathBuf {
        self.consensus
            .miner_key
            .clone()
            .unwrap_or_else(|| self.data_dir.join("miner.key"))
    }

    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            max_sessions: self.network.max_sessions,
            gossip_epoch: Duration::from_secs(self.network.gossip_epoch_secs),
            round_epoch: Duration::from_secs(self.network.round_epoch_secs),
            proposal_window: Duration::from_secs(self.network.proposal_window_secs),
        }
    }

    pub fn orchestrator_config(&self, miner: Address) -> OrchestratorConfig {
        OrchestratorConfig {
            chain_id: self.consensus.chain_id,
            miner,
            sync_timeout: Duration::from_millis(self.consensus.sync_timeout_ms),
            ..OrchestratorConfig::default()
        }
    }
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub listen_addr: SocketAddr,
    /// Peers dialled while browsing
    pub bootstrap_peers: Vec<SocketAddr>,
    /// Session bound; discovery is suspended while it is reached
    pub max_sessions: usize,
    pub gossip_epoch_secs: u64,
    pub round_epoch_secs: u64,
    pub proposal_window_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 30400)),
            bootstrap_peers: vec![],
            max_sessions: 8,
            gossip_epoch_secs: 30,
            round_epoch_secs: 60,
            proposal_window_secs: 10,
        }
    }
}

/// Consensus configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    pub chain_id: u64,
    /// Upper bound on one chain-sync round trip
    pub sync_timeout_ms: u64,
    /// Hex-encoded 32-byte seed file; generated under the data dir if unset
    pub miner_key: Option<PathBuf>,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            chain_id: 1337,
            sync_timeout_ms: 10_000,
            miner_key: None,
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Keep blocks in memory only
    pub in_memory: bool,
    /// zstd level for wire frames and fingerprints
    pub compression_level: i32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            in_memory: false,
            compression_level: 3,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or `EnvFilter` directive
    pub level: String,
    /// Log to file
    pub log_file: Option<PathBuf>,
    /// Log format (json|pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_file: None,
            format: "pretty".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = NodeConfig::default();
        assert_eq!(config.name, "meshledger-node");
        assert_eq!(config.network.max_sessions, 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = NodeConfig::default();
        config.network.max_sessions = 0;
        assert!(config.validate().is_err());

        let mut config = NodeConfig::default();
        config.network.proposal_window_secs = 60;
        assert!(config.validate().is_err());

        let mut config = NodeConfig::default();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());

        let mut config = NodeConfig::default();
        config.network.bootstrap_peers = vec![config.network.listen_addr];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("node.toml");

        let mut config = NodeConfig::default();
        config.consensus.chain_id = 42;
        config.network.bootstrap_peers = vec!["10.0.0.2:30400".parse().unwrap()];
        config.to_file(&path).unwrap();

        let loaded = NodeConfig::from_file(&path).unwrap();
        assert_eq!(loaded.consensus.chain_id, 42);
        assert_eq!(loaded.network.bootstrap_peers, config.network.bootstrap_peers);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("node.toml");
        std::fs::write(&path, "name = \"kitchen\"\n[network]\nmax_sessions = 3\n").unwrap();

        let config = NodeConfig::from_file(&path).unwrap();
        assert_eq!(config.name, "kitchen");
        assert_eq!(config.network.max_sessions, 3);
        assert_eq!(config.network.gossip_epoch_secs, 30);
        assert_eq!(config.consensus.chain_id, 1337);
    }

    #[test]
    fn test_derived_configs() {
        let config = NodeConfig::default();
        let transport = config.transport_config();
        assert_eq!(transport.gossip_epoch, Duration::from_secs(30));
        assert_eq!(transport.proposal_window, Duration::from_secs(10));

        let orchestrator = config.orchestrator_config(Address::from_bytes([1u8; 20]));
        assert_eq!(orchestrator.chain_id, 1337);
        assert_eq!(orchestrator.sync_timeout, Duration::from_secs(10));
    }
}
