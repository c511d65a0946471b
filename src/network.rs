//! Peer-to-peer transport: TCP listener, request dispatch, flooding and chain cloning.
//!
//! Every connection is served by its own task. Chain and pool sit behind one `RwLock`; the
//! lock is never held while talking to another node.

pub mod message;
pub mod peer;

pub use message::{ChainSnapshot, Message, Reply};
pub use peer::Peer;

use crate::blockchain::{Block, Blockchain};
use crate::cache::SeenCache;
use crate::crypto::Address;
use crate::error::ChainError;
use crate::miner::{mine_block, MiningEngine, MiningOutcome};
use crate::sync::PeerRegistry;
use crate::transaction::{Amount, Transaction};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Sends one request to `addr` and waits for its reply line.
pub async fn send_message(
    addr: &str,
    message: &Message,
    timeout: Duration,
) -> Result<Reply, ChainError> {
    send_line(addr, &message.encode(), timeout).await
}

async fn send_line(addr: &str, line: &str, timeout: Duration) -> Result<Reply, ChainError> {
    let exchange = async {
        let mut stream = TcpStream::connect(addr).await?;
        stream.write_all(format!("{}\n", line).as_bytes()).await?;

        let mut reader = BufReader::new(stream);
        let mut reply = String::new();
        if reader.read_line(&mut reply).await? == 0 {
            return Err(ChainError::NetworkError(format!(
                "{} closed the connection without replying",
                addr
            )));
        }
        Reply::decode(&reply)
    };

    tokio::time::timeout(timeout, exchange)
        .await
        .map_err(|_| ChainError::NetworkError(format!("request to {} timed out", addr)))?
}

pub struct NetworkNode {
    blockchain: Arc<RwLock<Blockchain>>,
    peers: PeerRegistry,
    seen: SeenCache,
    miner: Arc<MiningEngine>,
    miner_address: Address,
    local: Peer,
    timeout: Duration,
}

impl NetworkNode {
    /// `local` is the endpoint other nodes reach this one at; it is announced with
    /// `miner_address` declared.
    pub fn new(
        blockchain: Arc<RwLock<Blockchain>>,
        local: Peer,
        miner_address: Address,
        timeout: Duration,
    ) -> Self {
        let local = local.with_address(miner_address.clone());
        Self {
            blockchain,
            peers: PeerRegistry::new(&local),
            seen: SeenCache::default(),
            miner: Arc::new(MiningEngine::new()),
            miner_address,
            local,
            timeout,
        }
    }

    pub fn blockchain(&self) -> &Arc<RwLock<Blockchain>> {
        &self.blockchain
    }

    pub fn peers(&self) -> &PeerRegistry {
        &self.peers
    }

    pub fn local(&self) -> &Peer {
        &self.local
    }

    pub fn miner(&self) -> &Arc<MiningEngine> {
        &self.miner
    }

    /// Gossip items currently remembered as seen.
    pub async fn seen_items(&self) -> usize {
        self.seen.len().await
    }

    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<(), ChainError> {
        info!("P2P server listening on {}", listener.local_addr()?);
        loop {
            match listener.accept().await {
                Ok((stream, remote)) => {
                    let node = Arc::clone(&self);
                    tokio::spawn(async move {
                        node.handle_connection(stream, remote).await;
                    });
                }
                Err(e) => warn!("Failed to accept connection: {}", e),
            }
        }
    }

    /// Answers request lines until the peer hangs up. A line that does not decode ends the
    /// connection.
    async fn handle_connection(self: Arc<Self>, stream: TcpStream, remote: SocketAddr) {
        debug!("{} connected", remote);
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();

        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    warn!("Read from {} failed: {}", remote, e);
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            let message = match Message::decode(&line) {
                Ok(message) => message,
                Err(e) => {
                    warn!("Dropping connection from {}: {}", remote, e);
                    break;
                }
            };

            debug!("{} sent {}", remote, message.tag());
            let reply = self.dispatch(message).await;
            let out = format!("{}\n", reply.encode());
            if let Err(e) = write_half.write_all(out.as_bytes()).await {
                warn!("Reply to {} failed: {}", remote, e);
                break;
            }
        }
    }

    pub async fn dispatch(self: &Arc<Self>, message: Message) -> Reply {
        match message {
            Message::GetBalance(address) => Reply::Balance(self.balance_of(&address).await),
            Message::DoTransact(tx) | Message::BroadcastedTransaction(tx) => {
                Reply::from_result(self.submit_transaction(tx).await)
            }
            Message::BroadcastedBlock(block) => Reply::from_result(self.submit_block(block).await),
            Message::JoinNetwork(peer) | Message::BroadcastedNewNode(peer) => {
                if self.join(peer).await {
                    Reply::Ok
                } else {
                    Reply::Dup
                }
            }
            Message::CloneBlockchain => Reply::Chain(self.snapshot().await),
            Message::GetCloneChainFrom(peer) => {
                Reply::from_result(self.clone_chain_from(&peer).await)
            }
            Message::StartMining => {
                self.start_mining();
                Reply::Ok
            }
            Message::StopMining => {
                self.stop_mining();
                Reply::Ok
            }
        }
    }

    pub async fn balance_of(&self, address: &str) -> Amount {
        self.blockchain.read().await.balance_of(address)
    }

    /// Admits a transaction from a client, a peer or this node, then floods it.
    pub async fn submit_transaction(&self, tx: Transaction) -> Result<(), ChainError> {
        let hash = tx.hash();
        if !self.seen.insert_if_new(&hash).await {
            return Err(ChainError::DuplicateTransaction(format!(
                "{} was already seen",
                hash
            )));
        }

        let admitted = self.blockchain.write().await.submit_transaction(tx.clone());
        match admitted {
            Ok(_) => {
                info!("Admitted transaction {} to the pool", hash);
                self.broadcast(&Message::BroadcastedTransaction(tx), None)
                    .await;
                Ok(())
            }
            Err(e) => {
                if !e.is_duplicate() {
                    self.seen.forget(&hash).await;
                }
                debug!("Transaction {} rejected: {}", hash, e);
                Err(e)
            }
        }
    }

    /// Runs a block through the acceptance rules, mined locally or received, then floods it.
    pub async fn submit_block(&self, block: Block) -> Result<(), ChainError> {
        if !self.seen.insert_if_new(&block.hash).await {
            return Err(ChainError::DuplicateBlock(format!(
                "{} was already seen",
                block.hash
            )));
        }

        let accepted = {
            let mut chain = self.blockchain.write().await;
            let result = chain.apply_block(block.clone());
            if result.is_ok() {
                self.miner.notify_tip_changed();
            }
            result.map(|_| (chain.height(), chain.difficulty))
        };

        match accepted {
            Ok((height, difficulty)) => {
                info!(
                    "Accepted block {} at height {} (next difficulty {})",
                    block.hash, height, difficulty
                );
                self.broadcast(&Message::BroadcastedBlock(block), None).await;
                Ok(())
            }
            Err(e) => {
                self.seen.forget(&block.hash).await;
                debug!("Block {} rejected: {}", block.hash, e);
                Err(e)
            }
        }
    }

    /// Registers `peer` and, if it was unknown, announces it to every other known peer.
    /// Returns false for a peer already known, or for this node itself.
    pub async fn join(&self, peer: Peer) -> bool {
        if !self.peers.register_peer(peer.clone()).await {
            debug!("Peer {} already known", peer);
            return false;
        }
        info!("Registered peer {}", peer);
        let addr = peer.addr();
        self.broadcast(&Message::BroadcastedNewNode(peer), Some(&addr))
            .await;
        true
    }

    /// Registers `peer` locally and asks it to register this node in turn.
    pub async fn connect_peer(&self, peer: Peer) -> Result<(), ChainError> {
        let addr = peer.addr();
        self.peers.register_peer(peer).await;

        match send_message(&addr, &Message::JoinNetwork(self.local.clone()), self.timeout).await {
            Ok(Reply::Ok) | Ok(Reply::Dup) => {
                self.peers.record_delivery(&addr).await;
                info!("Joined network through {}", addr);
                Ok(())
            }
            Ok(other) => {
                self.peers.record_failure(&addr).await;
                Err(ChainError::NetworkError(format!(
                    "{} refused join: {:?}",
                    addr, other
                )))
            }
            Err(e) => {
                self.peers.record_failure(&addr).await;
                Err(e)
            }
        }
    }

    pub async fn snapshot(&self) -> ChainSnapshot {
        let (difficulty, blocks) = {
            let chain = self.blockchain.read().await;
            (chain.difficulty, chain.blocks.clone())
        };
        ChainSnapshot {
            difficulty,
            peers: self.peers.get_all_peers().await,
            blocks,
        }
    }

    /// Fetches `peer`'s chain and adopts it if it is longer and valid from genesis on. Local
    /// state is untouched on any failure. Peers listed in the snapshot are registered.
    pub async fn clone_chain_from(&self, peer: &Peer) -> Result<(), ChainError> {
        self.peers.begin_sync().await;
        let result = self.try_clone_chain_from(peer).await;
        match &result {
            Ok(()) => self.peers.finish_sync(true).await,
            Err(e) if e.is_rejection() => {
                info!("Kept local chain over {}'s: {}", peer, e);
                self.peers.finish_sync(false).await;
            }
            Err(e) => {
                warn!("Cloning from {} failed: {}", peer, e);
                self.peers.fail_sync().await;
            }
        }
        result
    }

    async fn try_clone_chain_from(&self, peer: &Peer) -> Result<(), ChainError> {
        let snapshot =
            match send_message(&peer.addr(), &Message::CloneBlockchain, self.timeout).await? {
                Reply::Chain(snapshot) => snapshot,
                other => {
                    return Err(ChainError::NetworkError(format!(
                        "{} answered clone request with {:?}",
                        peer, other
                    )))
                }
            };

        let (local_height, params) = {
            let chain = self.blockchain.read().await;
            (chain.height(), chain.params.clone())
        };
        if snapshot.blocks.len() <= local_height {
            return Err(ChainError::ChainNotLonger {
                received: snapshot.blocks.len(),
                local: local_height,
            });
        }

        let hashes: Vec<String> = snapshot.blocks.iter().map(|b| b.hash.clone()).collect();
        let blocks = snapshot.blocks;
        let candidate = tokio::task::spawn_blocking(move || Blockchain::from_blocks(blocks, params))
            .await
            .map_err(|e| ChainError::NetworkError(format!("chain validation task failed: {}", e)))??;
        if candidate.difficulty != snapshot.difficulty {
            debug!(
                "{} reported difficulty {}, replay gives {}",
                peer, snapshot.difficulty, candidate.difficulty
            );
        }

        let height = candidate.height();
        let requeued = {
            let mut chain = self.blockchain.write().await;
            let requeued = chain.replace_chain(candidate)?;
            self.miner.notify_tip_changed();
            requeued
        };
        info!(
            "Cloned chain of height {} from {} ({} orphaned transactions re-queued)",
            height, peer, requeued
        );

        for hash in hashes {
            self.seen.insert_if_new(&hash).await;
        }
        self.peers.register_peer(peer.clone()).await;
        for known in snapshot.peers {
            self.peers.register_peer(known).await;
        }
        Ok(())
    }

    /// Joins every bootstrap peer and clones from the first one that answers.
    pub async fn bootstrap(&self, peers: Vec<Peer>) {
        let mut cloned = false;
        for peer in peers {
            if let Err(e) = self.connect_peer(peer.clone()).await {
                warn!("Bootstrap peer {} unreachable: {}", peer, e);
                continue;
            }
            if !cloned {
                cloned = true;
                // Rejections are logged by clone_chain_from.
                let _ = self.clone_chain_from(&peer).await;
            }
        }
    }

    /// Sends `message` to every known peer except `exclude`, encoding it once. Returns the
    /// number of peers that replied.
    pub async fn broadcast(&self, message: &Message, exclude: Option<&str>) -> usize {
        let targets = match exclude {
            Some(addr) => self.peers.peers_except(addr).await,
            None => self.peers.get_all_peers().await,
        };
        if targets.is_empty() {
            return 0;
        }

        let line = Arc::new(message.encode());
        let mut deliveries = JoinSet::new();
        for peer in targets {
            let line = Arc::clone(&line);
            let timeout = self.timeout;
            deliveries.spawn(async move {
                let addr = peer.addr();
                let result = send_line(&addr, &line, timeout).await;
                (addr, result)
            });
        }

        let mut delivered = 0;
        while let Some(joined) = deliveries.join_next().await {
            match joined {
                Ok((addr, Ok(reply))) => {
                    debug!("{} to {}: {:?}", message.tag(), addr, reply);
                    self.peers.record_delivery(&addr).await;
                    delivered += 1;
                }
                Ok((addr, Err(e))) => {
                    warn!("{} to {} failed: {}", message.tag(), addr, e);
                    self.peers.record_failure(&addr).await;
                }
                Err(e) => error!("Broadcast task panicked: {}", e),
            }
        }
        delivered
    }

    /// Switches mining on, spawning the mining task unless one is already running.
    pub fn start_mining(self: &Arc<Self>) -> bool {
        let started = self.miner.start();
        if self.miner.try_enter_loop() {
            let node = Arc::clone(self);
            tokio::spawn(async move { node.mining_loop().await });
        }
        started
    }

    /// The running search stops after at most one more hash.
    pub fn stop_mining(&self) -> bool {
        let stopped = self.miner.stop();
        if stopped {
            info!("Mining stop requested");
        }
        stopped
    }

    async fn mining_loop(self: Arc<Self>) {
        info!("Mining started for {}", self.miner_address);
        loop {
            while self.miner.is_running() {
                self.mine_one().await;
            }
            if !self.miner.leave_loop() {
                break;
            }
        }
        info!("Mining has stopped");
    }

    async fn mine_one(&self) {
        let (candidate, version) = {
            let chain = self.blockchain.read().await;
            (
                chain.new_candidate_block(self.miner_address.clone()),
                self.miner.tip_version(),
            )
        };
        let should_stop = self.miner.cancel_check(version);

        match tokio::task::spawn_blocking(move || mine_block(candidate, should_stop)).await {
            Ok(MiningOutcome::Mined { block, attempts }) => {
                let hash = block.hash.clone();
                match self.submit_block(block).await {
                    Ok(()) => {
                        let mined = self.miner.record_mined();
                        info!(
                            "Mined block {} after {} hashes ({} mined so far)",
                            hash, attempts, mined
                        );
                    }
                    Err(e) => warn!("Mined block {} was rejected: {}", hash, e),
                }
            }
            Ok(MiningOutcome::Cancelled) => debug!("Mining candidate abandoned"),
            Err(e) => {
                error!("Mining task failed: {}", e);
                self.miner.stop();
            }
        }
    }
}
