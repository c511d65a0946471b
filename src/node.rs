use crate::blockchain::Blockchain;
use crate::config::{parse_host_port, ChainParams, Config};
use crate::error::ChainError;
use crate::network::{NetworkNode, Peer};
use crate::wallet::Wallet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Booting,
    Syncing,
    Ready,
}

/// Installs the global `tracing` subscriber. `RUST_LOG` wins over `level` when set.
/// Calling it again is a no-op.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

pub struct Node {
    pub config: Config,
    pub wallet: Wallet,
    pub blockchain: Arc<RwLock<Blockchain>>,
    pub network: Arc<NetworkNode>,
    pub state: Arc<RwLock<NodeState>>,
}

impl Node {
    /// Loads or creates the miner wallet and starts a fresh chain whose genesis rewards it.
    pub async fn init(config: Config) -> Result<Self, ChainError> {
        config.validate()?;
        info!(
            "Starting FloodChain node on {}:{}",
            config.network.host, config.network.p2p_port
        );

        let wallet = Wallet::load_or_create(Path::new(&config.miner.wallet_path), None)?;
        info!("Miner address: {}", wallet.address);

        let genesis_miner = wallet.address.clone();
        let blockchain = tokio::task::spawn_blocking(move || {
            Blockchain::new(genesis_miner, ChainParams::default())
        })
        .await
        .map_err(|e| ChainError::IoError(format!("genesis task failed: {}", e)))??;
        info!("Genesis block {}", blockchain.tip_hash());

        let blockchain = Arc::new(RwLock::new(blockchain));
        let local = Peer::new(config.network.host.clone(), config.network.p2p_port);
        let network = Arc::new(NetworkNode::new(
            blockchain.clone(),
            local,
            wallet.address.clone(),
            Duration::from_millis(config.network.connect_timeout_ms),
        ));

        Ok(Self {
            config,
            wallet,
            blockchain,
            network,
            state: Arc::new(RwLock::new(NodeState::Booting)),
        })
    }

    /// Listens for peers, joins the bootstrap peers, optionally starts mining and then logs
    /// the node's health until the process ends.
    pub async fn start(self: Arc<Self>) -> Result<(), ChainError> {
        let host = self.config.network.host.as_str();
        let p2p_port = self.config.network.p2p_port;
        let listener = TcpListener::bind((host, p2p_port)).await.map_err(|e| {
            ChainError::NetworkError(format!("cannot listen on {}:{}: {}", host, p2p_port, e))
        })?;

        let net = self.network.clone();
        tokio::spawn(async move {
            if let Err(e) = net.serve(listener).await {
                error!("P2P server failed: {}", e);
            }
        });

        *self.state.write().await = NodeState::Syncing;
        let mut bootstrap = Vec::new();
        for entry in &self.config.network.bootstrap_peers {
            let (host, port) = parse_host_port(entry)?;
            bootstrap.push(Peer::new(host, port));
        }
        if bootstrap.is_empty() {
            info!("No bootstrap peers configured; starting a new network");
        } else {
            self.network.bootstrap(bootstrap).await;
        }
        *self.state.write().await = NodeState::Ready;

        if self.config.miner.enabled {
            self.network.start_mining();
        }

        loop {
            let (height, difficulty, pending) = {
                let chain = self.blockchain.read().await;
                (chain.height(), chain.difficulty, chain.mempool.len())
            };
            let peers = self.network.peers().peer_count().await;
            if peers == 0 && !self.config.network.bootstrap_peers.is_empty() {
                warn!("No reachable peers");
            }
            let miner = self.network.miner();
            info!(
                "Node running: chain height = {}, difficulty = {}, pending = {}, peers = {}, mining = {}, mined = {}, seen = {}",
                height,
                difficulty,
                pending,
                peers,
                miner.is_running(),
                miner.blocks_mined(),
                self.network.seen_items().await
            );
            tokio::time::sleep(HEALTH_LOG_INTERVAL).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{send_message, Message, Reply};

    #[tokio::test]
    async fn test_init_creates_wallet_and_genesis() {
        tokio::time::timeout(Duration::from_secs(10), async {
            let dir = tempfile::TempDir::new().unwrap();
            let mut config = Config::default();
            config.miner.wallet_path = dir
                .path()
                .join("wallet.json")
                .to_string_lossy()
                .into_owned();

            let node = Node::init(config.clone()).await.unwrap();
            assert!(dir.path().join("wallet.json").exists());
            assert_eq!(*node.state.read().await, NodeState::Booting);

            let chain = node.blockchain.read().await;
            assert_eq!(chain.height(), 1);
            assert_eq!(
                chain.balance_of(&node.wallet.address),
                ChainParams::default().mining_rewards
            );
            drop(chain);

            // A restart keeps the same miner identity.
            let again = Node::init(config).await.unwrap();
            assert_eq!(again.wallet.address, node.wallet.address);
        })
        .await
        .expect("test_init_creates_wallet_and_genesis timed out");
    }

    #[tokio::test]
    async fn test_start_serves_on_configured_host() {
        tokio::time::timeout(Duration::from_secs(10), async {
            let dir = tempfile::TempDir::new().unwrap();
            let port = {
                let spare = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
                spare.local_addr().unwrap().port()
            };
            let mut config = Config::default();
            config.network.host = "127.0.0.1".to_string();
            config.network.p2p_port = port;
            config.miner.wallet_path = dir
                .path()
                .join("wallet.json")
                .to_string_lossy()
                .into_owned();

            let node = Arc::new(Node::init(config).await.unwrap());
            let address = node.wallet.address.clone();
            let running = tokio::spawn(Arc::clone(&node).start());

            let addr = format!("127.0.0.1:{}", port);
            let request = Message::GetBalance(address);
            loop {
                if let Ok(reply) = send_message(&addr, &request, Duration::from_millis(500)).await {
                    assert_eq!(reply, Reply::Balance(ChainParams::default().mining_rewards));
                    break;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            while *node.state.read().await != NodeState::Ready {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            running.abort();
        })
        .await
        .expect("test_start_serves_on_configured_host timed out");
    }

    #[tokio::test]
    async fn test_init_rejects_invalid_config() {
        tokio::time::timeout(Duration::from_secs(5), async {
            let mut config = Config::default();
            config.network.bootstrap_peers = vec!["no-port".to_string()];
            assert!(matches!(
                Node::init(config).await,
                Err(ChainError::ConfigError(_))
            ));
        })
        .await
        .expect("test_init_rejects_invalid_config timed out");
    }
}
