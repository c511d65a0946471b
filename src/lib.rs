//! FloodChain - a proof-of-work ledger node that replicates by flooding
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Blockchain
//! - [`blockchain`] - Blocks, acceptance rules, derived balances and the chain aggregate
//! - [`transaction`] - Transaction types, signing and validation
//! - [`merkle`] - Merkle tree over transaction hashes
//! - [`mempool`] - Pending transaction pool
//!
//! ## Consensus
//! - [`miner`] - Proof-of-work nonce search and mining switches
//!
//! ## Cryptography & Encoding
//! - [`crypto`] - Hashing, addresses and signatures (secp256k1)
//! - [`codec`] - Canonical base64 record encoding
//! - [`wallet`] - Key storage
//!
//! ## Networking
//! - [`network`] - Line protocol, TCP server, flooding and cloning
//! - [`sync`] - Peer registry and clone bookkeeping
//! - [`cache`] - Seen-set for gossip deduplication
//!
//! ## Node & Utilities
//! - [`node`] - Node orchestration
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Core Blockchain
// ============================================================================
pub mod blockchain;
pub mod mempool;
pub mod merkle;
pub mod transaction;

// ============================================================================
// Consensus & Mining
// ============================================================================
pub mod miner;

// ============================================================================
// Cryptography & Encoding
// ============================================================================
pub mod codec;
pub mod crypto;
pub mod wallet;

// ============================================================================
// Networking
// ============================================================================
pub mod cache;
pub mod network;
pub mod sync;

// ============================================================================
// Node & Utilities
// ============================================================================
pub mod config;
pub mod error;
pub mod node;
