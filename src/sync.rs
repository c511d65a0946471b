//! Peer registry and chain synchronization bookkeeping for FloodChain
//!
//! This module tracks:
//! - Known peers, deduplicated by `host:port`, never including the local node
//! - Delivery successes and failures per peer, for diagnostics only
//! - The state of the most recent chain clone
//!
//! The registry only grows. A peer that keeps failing is still flooded; the failure counters
//! exist so operators can see it.

use crate::network::Peer;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::warn;

/// Failures after which a peer is reported as unreliable.
const UNRELIABLE_AFTER_FAILURES: u32 = 3;

#[derive(Debug, Clone)]
pub struct PeerInfo {
    pub peer: Peer,
    pub last_seen: Instant,
    pub deliveries: u64,
    pub failures: u32,
}

impl PeerInfo {
    pub fn new(peer: Peer) -> Self {
        Self {
            peer,
            last_seen: Instant::now(),
            deliveries: 0,
            failures: 0,
        }
    }

    pub fn is_unreliable(&self) -> bool {
        self.failures >= UNRELIABLE_AFTER_FAILURES
    }
}

/// Sync state tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Syncing,
    Synced,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub clones_attempted: u64,
    pub chains_replaced: u64,
    pub chains_rejected: u64,
}

/// Known peers plus clone progress, shared by every connection task.
#[derive(Clone)]
pub struct PeerRegistry {
    local_addr: String,
    peers: Arc<RwLock<HashMap<String, PeerInfo>>>,
    sync_state: Arc<RwLock<SyncState>>,
    stats: Arc<RwLock<SyncStats>>,
}

impl PeerRegistry {
    /// Creates an empty registry for the node reachable at `local`.
    pub fn new(local: &Peer) -> Self {
        Self {
            local_addr: local.addr(),
            peers: Arc::new(RwLock::new(HashMap::new())),
            sync_state: Arc::new(RwLock::new(SyncState::Idle)),
            stats: Arc::new(RwLock::new(SyncStats::default())),
        }
    }

    /// Registers `peer`, returning true if it was unknown. The local node is never registered.
    /// A known peer that now declares an address gets it recorded.
    pub async fn register_peer(&self, peer: Peer) -> bool {
        if self.is_local(&peer) {
            return false;
        }
        let key = peer.addr();

        let mut peers = self.peers.write().await;
        match peers.get_mut(&key) {
            Some(existing) => {
                if existing.peer.address.is_none() && peer.address.is_some() {
                    existing.peer.address = peer.address;
                }
                false
            }
            None => {
                peers.insert(key, PeerInfo::new(peer));
                true
            }
        }
    }

    pub async fn contains(&self, addr: &str) -> bool {
        self.peers.read().await.contains_key(addr)
    }

    pub fn is_local(&self, peer: &Peer) -> bool {
        peer.addr() == self.local_addr
    }

    /// Get list of all registered peers
    pub async fn get_all_peers(&self) -> Vec<Peer> {
        let peers = self.peers.read().await;
        let mut all: Vec<Peer> = peers.values().map(|p| p.peer.clone()).collect();
        all.sort_by_key(Peer::addr);
        all
    }

    /// Every peer except `excluded`, used to avoid echoing a message to its sender.
    pub async fn peers_except(&self, excluded: &str) -> Vec<Peer> {
        self.get_all_peers()
            .await
            .into_iter()
            .filter(|p| p.addr() != excluded)
            .collect()
    }

    pub async fn peer_count(&self) -> usize {
        self.peers.read().await.len()
    }

    pub async fn record_delivery(&self, addr: &str) {
        let mut peers = self.peers.write().await;
        if let Some(info) = peers.get_mut(addr) {
            info.deliveries += 1;
            info.last_seen = Instant::now();
        }
    }

    pub async fn record_failure(&self, addr: &str) {
        let mut peers = self.peers.write().await;
        if let Some(info) = peers.get_mut(addr) {
            info.failures += 1;
            if info.failures == UNRELIABLE_AFTER_FAILURES {
                warn!("Peer {} marked as unreliable", addr);
            }
        }
    }

    pub async fn get_peer_info(&self, addr: &str) -> Option<PeerInfo> {
        self.peers.read().await.get(addr).cloned()
    }

    pub async fn get_sync_state(&self) -> SyncState {
        *self.sync_state.read().await
    }

    pub async fn begin_sync(&self) {
        *self.sync_state.write().await = SyncState::Syncing;
        self.stats.write().await.clones_attempted += 1;
    }

    /// Records how a clone ended: `replaced` when the local chain was swapped.
    pub async fn finish_sync(&self, replaced: bool) {
        let mut stats = self.stats.write().await;
        if replaced {
            stats.chains_replaced += 1;
        } else {
            stats.chains_rejected += 1;
        }
        drop(stats);
        *self.sync_state.write().await = SyncState::Synced;
    }

    pub async fn fail_sync(&self) {
        *self.sync_state.write().await = SyncState::Failed;
    }

    pub async fn get_stats(&self) -> SyncStats {
        self.stats.read().await.clone()
    }
}
