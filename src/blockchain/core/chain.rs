use crate::config::ChainParams;
use crate::crypto::Address;
use crate::error::ChainError;
use crate::mempool::Mempool;
use crate::miner::{mine_block, MiningOutcome};
use crate::transaction::{Amount, Transaction};
use std::collections::HashSet;

use super::block::Block;
use super::state::{balance_of, LedgerView};
use super::validation::{validate_block, validate_genesis};

/// The accepted chain together with the pool of transactions waiting for it. Both change only
/// through the methods below so that block acceptance and pool reconciliation happen as one step.
#[derive(Debug, Clone)]
pub struct Blockchain {
    pub blocks: Vec<Block>,
    /// Difficulty required of the next block.
    pub difficulty: u32,
    pub mempool: Mempool,
    pub params: ChainParams,
}

impl Blockchain {
    /// Starts a new chain whose genesis block rewards `genesis_miner`.
    pub fn new(genesis_miner: Address, params: ChainParams) -> Result<Self, ChainError> {
        let candidate = Block::genesis(
            genesis_miner,
            params.init_difficulty,
            params.mining_rewards,
        );
        let genesis = match mine_block(candidate, || false) {
            MiningOutcome::Mined { block, .. } => block,
            MiningOutcome::Cancelled => {
                return Err(ChainError::InvalidGenesis(
                    "genesis mining was cancelled".to_string(),
                ))
            }
        };
        Self::from_genesis(genesis, params)
    }

    fn from_genesis(genesis: Block, params: ChainParams) -> Result<Self, ChainError> {
        validate_genesis(&genesis, &params)?;
        Ok(Blockchain {
            blocks: vec![genesis],
            difficulty: params.init_difficulty,
            mempool: Mempool::new(),
            params,
        })
    }

    /// Rebuilds a chain from received blocks, running every acceptance rule from genesis on.
    pub fn from_blocks(blocks: Vec<Block>, params: ChainParams) -> Result<Self, ChainError> {
        let mut blocks = blocks.into_iter();
        let genesis = blocks
            .next()
            .ok_or_else(|| ChainError::InvalidGenesis("received chain is empty".to_string()))?;

        let mut chain = Self::from_genesis(genesis, params)?;
        for block in blocks {
            chain.apply_block(block)?;
        }
        Ok(chain)
    }

    pub fn last_block(&self) -> &Block {
        // `blocks` always holds at least the genesis block.
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn tip_hash(&self) -> &str {
        &self.last_block().hash
    }

    pub fn height(&self) -> usize {
        self.blocks.len()
    }

    pub fn balance_of(&self, address: &str) -> Amount {
        balance_of(&self.blocks, address)
    }

    pub fn contains_transaction(&self, hash: &str) -> bool {
        self.blocks
            .iter()
            .flat_map(|block| block.transactions.iter())
            .any(|tx| tx.hash() == hash)
    }

    pub fn validate_block(&self, block: &Block) -> Result<(), ChainError> {
        validate_block(&self.blocks, self.difficulty, &self.params, block)
    }

    /// Validates and appends `block`, drops its transactions from the pool and retargets.
    pub fn apply_block(&mut self, block: Block) -> Result<(), ChainError> {
        self.validate_block(&block)?;

        self.mempool.remove_included(&block);
        self.blocks.push(block);
        self.adjust_difficulty();
        Ok(())
    }

    /// Admits a transaction to the pool, returning its hash.
    pub fn submit_transaction(&mut self, tx: Transaction) -> Result<String, ChainError> {
        tx.validate()?;

        let hash = tx.hash();
        if self.mempool.contains(&hash) || self.contains_transaction(&hash) {
            return Err(ChainError::DuplicateTransaction(format!(
                "{} is already known",
                hash
            )));
        }

        let balance = self.balance_of(&tx.sender);
        if balance < tx.total_cost() {
            return Err(ChainError::InsufficientFunds(format!(
                "{} has {} but transaction {} needs {}",
                tx.sender,
                balance,
                hash,
                tx.total_cost()
            )));
        }

        self.mempool.add_transaction(tx)
    }

    /// Pool transactions in arrival order, skipping any that would overdraw its sender given
    /// the ones picked before it.
    pub fn candidate_transactions(&self) -> Vec<Transaction> {
        let mut ledger = LedgerView::new(&self.blocks);
        let mut selected = Vec::new();

        for tx in self.mempool.iter() {
            if selected.len() >= self.params.max_transactions_in_block {
                break;
            }
            if ledger.apply(tx).is_ok() {
                selected.push(tx.clone());
            }
        }
        selected
    }

    /// Unmined block on top of the current tip. Stamped no earlier than the tip, even when the
    /// tip came from a peer whose clock runs ahead.
    pub fn new_candidate_block(&self, miner: Address) -> Block {
        let block = Block::new(
            self.tip_hash().to_string(),
            self.difficulty,
            self.candidate_transactions(),
            miner,
            self.params.mining_rewards,
        );
        let tip_timestamp = self.last_block().timestamp;
        if block.timestamp < tip_timestamp {
            block.with_timestamp(tip_timestamp)
        } else {
            block
        }
    }

    /// Swaps in a validated chain if it is strictly longer. Pending transactions it already
    /// includes are dropped from the pool. Transactions from local blocks the new chain
    /// abandons go back through pool admission against the new chain. Returns how many were
    /// re-queued.
    pub fn replace_chain(&mut self, candidate: Blockchain) -> Result<usize, ChainError> {
        if candidate.blocks.len() <= self.blocks.len() {
            return Err(ChainError::ChainNotLonger {
                received: candidate.blocks.len(),
                local: self.blocks.len(),
            });
        }

        let kept: HashSet<&str> = candidate.blocks.iter().map(|b| b.hash.as_str()).collect();
        let orphaned: Vec<Transaction> = self
            .blocks
            .iter()
            .filter(|block| !kept.contains(block.hash.as_str()))
            .flat_map(|block| block.transactions.iter().cloned())
            .collect();

        for block in &candidate.blocks {
            self.mempool.remove_included(block);
        }
        self.blocks = candidate.blocks;
        self.difficulty = candidate.difficulty;

        let requeued = orphaned
            .into_iter()
            .filter(|tx| self.submit_transaction(tx.clone()).is_ok())
            .count();
        Ok(requeued)
    }

    /// Every `adjust_difficulty_in_every` blocks after genesis, compares the time the window
    /// took against the target and moves the difficulty by one.
    fn adjust_difficulty(&mut self) {
        let interval = self.params.adjust_difficulty_in_every as usize;
        let accepted = self.blocks.len() - 1;
        if interval == 0 || accepted == 0 || !accepted.is_multiple_of(interval) {
            return;
        }

        let window_start = &self.blocks[self.blocks.len() - 1 - interval];
        let elapsed_ms = self
            .last_block()
            .timestamp
            .saturating_sub(window_start.timestamp);
        let target_ms = self.params.adjust_difficulty_in_every
            * self.params.block_time_in_every
            * 1000;

        self.difficulty = if elapsed_ms > target_ms {
            self.difficulty.saturating_sub(1)
        } else {
            self.difficulty.saturating_add(1)
        };
    }
}
