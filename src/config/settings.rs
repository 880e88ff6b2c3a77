use crate::cli::Opt;
use crate::core::{ConsensusParams, DEFAULT_DIFFICULTY_BITS, DEFAULT_NONCE_BATCH, INITIAL_BLOCK_REWARD};
use crate::error::{BlockchainError, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

const NODE_HOST_KEY: &str = "NODE_HOST";
const NODE_PORT_KEY: &str = "NODE_PORT";
const INITIAL_PEER_KEY: &str = "INITIAL_PEER";

/// Node settings
///
/// Resolved in layers: built-in defaults, then the TOML file given with
/// `--config`, then `NODE_HOST` / `NODE_PORT` / `INITIAL_PEER` from the
/// environment, then the command-line flags.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub initial_peer: Option<String>,
    pub difficulty_bits: u32,
    /// In base units
    pub block_reward: u64,
    pub max_block_transactions: usize,
    pub nonce_batch: u64,
    pub mining_max_delay_ms: u64,
    pub tx_generation_max_delay_ms: u64,
    pub peer_exchange_interval_ms: u64,
    pub status_interval_ms: u64,
    pub peer_timeout_ms: u64,
    pub mining: bool,
    pub generate_transactions: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "localhost".to_string(),
            port: 8000,
            initial_peer: None,
            difficulty_bits: DEFAULT_DIFFICULTY_BITS,
            block_reward: INITIAL_BLOCK_REWARD,
            max_block_transactions: 10,
            nonce_batch: DEFAULT_NONCE_BATCH,
            mining_max_delay_ms: 200,
            tx_generation_max_delay_ms: 1_000,
            peer_exchange_interval_ms: 1_000,
            status_interval_ms: 2_000,
            peer_timeout_ms: 2_000,
            mining: true,
            generate_transactions: true,
        }
    }
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Config> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file(path: &Path) -> Result<Config> {
        let text = fs::read_to_string(path)
            .map_err(|e| BlockchainError::Config(format!("cannot read {}: {e}", path.display())))?;
        Config::from_toml_str(&text)
    }

    /// Override from environment-style variables provided by `lookup`
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(NODE_HOST_KEY) {
            self.host = host;
        }
        if let Some(port) = lookup(NODE_PORT_KEY) {
            self.port = port
                .parse()
                .map_err(|_| BlockchainError::Config(format!("{NODE_PORT_KEY}={port:?} is not a port")))?;
        }
        if let Some(peer) = lookup(INITIAL_PEER_KEY) {
            self.initial_peer = Some(peer);
        }
        Ok(())
    }

    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| env::var(key).ok())
    }

    pub fn apply_cli(&mut self, opt: &Opt) {
        if let Some(host) = &opt.host {
            self.host = host.clone();
        }
        if let Some(port) = opt.port {
            self.port = port;
        }
        if let Some(peer) = &opt.initial_peer {
            self.initial_peer = Some(peer.clone());
        }
        if let Some(bits) = opt.difficulty_bits {
            self.difficulty_bits = bits;
        }
        if opt.no_mining {
            self.mining = false;
        }
        if opt.no_tx_generation {
            self.generate_transactions = false;
        }
    }

    /// Resolve every layer and validate the result
    pub fn load(opt: &Opt) -> Result<Config> {
        let mut config = match &opt.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        config.apply_env()?;
        config.apply_cli(opt);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=255).contains(&self.difficulty_bits) {
            return Err(BlockchainError::Config(format!(
                "difficulty_bits must be between 1 and 255, got {}",
                self.difficulty_bits
            )));
        }
        if self.port == 0 {
            return Err(BlockchainError::Config("port must not be 0".to_string()));
        }
        if self.nonce_batch == 0 {
            return Err(BlockchainError::Config("nonce_batch must be at least 1".to_string()));
        }
        if self.max_block_transactions == 0 {
            return Err(BlockchainError::Config(
                "max_block_transactions must be at least 1".to_string(),
            ));
        }
        if self.host.trim().is_empty() {
            return Err(BlockchainError::Config("host must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn consensus_params(&self) -> ConsensusParams {
        ConsensusParams {
            difficulty_bits: self.difficulty_bits,
            block_reward: self.block_reward,
        }
    }

    /// URL other nodes reach us at
    pub fn self_address(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn peer_timeout(&self) -> Duration {
        Duration::from_millis(self.peer_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testnet::create_temp_dir;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.self_address(), "http://localhost:8000");
        assert_eq!(config.bind_address(), "localhost:8000");
        assert_eq!(config.consensus_params(), ConsensusParams::default());
        assert_eq!(config.peer_timeout(), Duration::from_secs(2));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str("port = 8001\ndifficulty_bits = 12\nmining = false\n").unwrap();
        assert_eq!(config.port, 8001);
        assert_eq!(config.difficulty_bits, 12);
        assert!(!config.mining);
        assert_eq!(config.host, "localhost");
        assert_eq!(config.nonce_batch, DEFAULT_NONCE_BATCH);
    }

    #[test]
    fn test_unknown_toml_key_is_an_error() {
        assert!(matches!(
            Config::from_toml_str("prot = 8001"),
            Err(BlockchainError::Config(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let dir = create_temp_dir().unwrap();
        let path = dir.path().join("node.toml");
        fs::write(&path, "host = \"127.0.0.1\"\ninitial_peer = \"http://127.0.0.1:8000\"\n").unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.initial_peer.as_deref(), Some("http://127.0.0.1:8000"));
        assert!(Config::from_file(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_environment_then_cli() {
        let vars: HashMap<&str, &str> = [(NODE_HOST_KEY, "node-a"), (NODE_PORT_KEY, "9000")]
            .into_iter()
            .collect();
        let mut config = Config::default();
        config
            .apply_env_from(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.self_address(), "http://node-a:9000");

        let opt = Opt {
            port: Some(9001),
            no_tx_generation: true,
            ..Opt::default()
        };
        config.apply_cli(&opt);
        assert_eq!(config.self_address(), "http://node-a:9001");
        assert!(!config.generate_transactions);
        assert!(config.mining);
    }

    #[test]
    fn test_bad_environment_port() {
        let mut config = Config::default();
        let result = config.apply_env_from(|key| (key == NODE_PORT_KEY).then(|| "eighty".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_validation() {
        let bad = [
            Config { difficulty_bits: 0, ..Config::default() },
            Config { difficulty_bits: 256, ..Config::default() },
            Config { port: 0, ..Config::default() },
            Config { nonce_batch: 0, ..Config::default() },
            Config { max_block_transactions: 0, ..Config::default() },
        ];
        for config in bad {
            assert!(matches!(config.validate(), Err(BlockchainError::Config(_))));
        }
    }
}
