//! Configuration management for FloodChain

use crate::error::ChainError;
use crate::transaction::Amount;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Consensus constants. Every node of a network must agree on these.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainParams {
    /// Retarget window, in accepted blocks after genesis.
    pub adjust_difficulty_in_every: u64,
    /// Difficulty of the genesis block and of the chain until the first retarget.
    pub init_difficulty: u32,
    /// Target average block time in seconds.
    pub block_time_in_every: u64,
    pub mining_rewards: Amount,
    pub max_transactions_in_block: usize,
}

impl ChainParams {
    pub const ADJUST_DIFFICULTY_IN_EVERY: u64 = 10;
    pub const INIT_DIFFICULTY: u32 = 1;
    pub const BLOCK_TIME_IN_EVERY: u64 = 30;
    pub const MINING_REWARDS: i32 = 10;
    pub const MAX_TRANSACTIONS_IN_BLOCK: usize = 32;
}

impl Default for ChainParams {
    fn default() -> Self {
        Self {
            adjust_difficulty_in_every: Self::ADJUST_DIFFICULTY_IN_EVERY,
            init_difficulty: Self::INIT_DIFFICULTY,
            block_time_in_every: Self::BLOCK_TIME_IN_EVERY,
            mining_rewards: Amount::from_num(Self::MINING_REWARDS),
            max_transactions_in_block: Self::MAX_TRANSACTIONS_IN_BLOCK,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub miner: MinerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    /// Host name peers should use to reach this node.
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_p2p_port")]
    pub p2p_port: u16,
    /// `host:port` entries joined and cloned from at startup.
    #[serde(default)]
    pub bootstrap_peers: Vec<String>,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MinerConfig {
    #[serde(default = "default_wallet_path")]
    pub wallet_path: String,
    #[serde(default = "default_mining_enabled")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            p2p_port: default_p2p_port(),
            bootstrap_peers: Vec::new(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            wallet_path: default_wallet_path(),
            enabled: default_mining_enabled(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ChainError> {
        if self.network.host.trim().is_empty() {
            return Err(ChainError::ConfigError(
                "network.host must not be empty".to_string(),
            ));
        }
        if self.network.p2p_port == 0 {
            return Err(ChainError::ConfigError(
                "network.p2p_port must be non-zero".to_string(),
            ));
        }
        if self.miner.wallet_path.trim().is_empty() {
            return Err(ChainError::ConfigError(
                "miner.wallet_path must be set".to_string(),
            ));
        }
        for peer in &self.network.bootstrap_peers {
            parse_host_port(peer)?;
        }
        Ok(())
    }
}

/// Splits a `host:port` string.
pub fn parse_host_port(value: &str) -> Result<(String, u16), ChainError> {
    let (host, port) = value
        .rsplit_once(':')
        .ok_or_else(|| ChainError::ConfigError(format!("expected host:port, got '{}'", value)))?;
    let port = port
        .parse::<u16>()
        .map_err(|e| ChainError::ConfigError(format!("invalid port in '{}': {}", value, e)))?;
    if host.is_empty() {
        return Err(ChainError::ConfigError(format!(
            "missing host in '{}'",
            value
        )));
    }
    Ok((host.to_string(), port))
}

/// Loads `path`, falling back to defaults when the file is absent.
pub fn load_config_from(path: &Path) -> Result<Config, ChainError> {
    let config: Config = match fs::read_to_string(path) {
        Ok(config_str) => toml::from_str(&config_str)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Config::default(),
        Err(e) => return Err(e.into()),
    };

    config.validate()?;
    Ok(config)
}

pub fn load_config() -> Result<Config, ChainError> {
    load_config_from(Path::new("config.toml"))
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_p2p_port() -> u16 {
    8333
}

fn default_connect_timeout_ms() -> u64 {
    3_000
}

fn default_wallet_path() -> String {
    "./data/wallet.json".to_string()
}

fn default_mining_enabled() -> bool {
    false
}

fn default_log_level() -> String {
    "info".to_string()
}
