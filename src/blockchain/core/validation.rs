use crate::config::ChainParams;
use crate::crypto::validate_address;
use crate::error::ChainError;
use std::collections::HashSet;

use super::block::Block;
use super::state::LedgerView;

/// How far past the local clock a block timestamp may lie, in milliseconds.
pub const MAX_FUTURE_DRIFT_MS: u64 = 2 * 60 * 60 * 1000;

/// Runs the acceptance rules for `block` on top of `blocks`, in order, stopping at the first
/// failure:
///
/// 1. `previous_hash` is the tip hash
/// 2. the claimed hash is the recomputed hash
/// 3. the block's difficulty is at least `required_difficulty` and its hash meets it
/// 4. the claimed Merkle root is the recomputed root
/// 5. the timestamp is not before the tip's and at most [`MAX_FUTURE_DRIFT_MS`] ahead of now
/// 6. the reward and every transaction are well formed, unique and not already on chain
/// 7. every sender can pay, counting earlier transactions of the same block
pub fn validate_block(
    blocks: &[Block],
    required_difficulty: u32,
    params: &ChainParams,
    block: &Block,
) -> Result<(), ChainError> {
    let tip = blocks.last().ok_or_else(|| {
        ChainError::InvalidGenesis("cannot extend an empty chain".to_string())
    })?;

    if block.previous_hash != tip.hash {
        return Err(ChainError::StaleOrForkedBlock(format!(
            "block {} builds on {}, tip is {}",
            block.hash, block.previous_hash, tip.hash
        )));
    }

    block.check_hash()?;

    if block.difficulty < required_difficulty {
        return Err(ChainError::InsufficientWork(format!(
            "block difficulty {} is below the required {}",
            block.difficulty, required_difficulty
        )));
    }
    block.check_work()?;

    block.check_merkle_root()?;

    validate_timestamp(tip, block)?;

    validate_block_contents(blocks, params, block)?;

    let mut ledger = LedgerView::new(blocks);
    for tx in &block.transactions {
        ledger.apply(tx)?;
    }

    Ok(())
}

fn validate_timestamp(tip: &Block, block: &Block) -> Result<(), ChainError> {
    if block.timestamp < tip.timestamp {
        return Err(ChainError::InvalidTimestamp(format!(
            "block {} is stamped {}, before its parent's {}",
            block.hash, block.timestamp, tip.timestamp
        )));
    }

    check_not_in_future(block)
}

fn check_not_in_future(block: &Block) -> Result<(), ChainError> {
    let now = chrono::Utc::now().timestamp_millis() as u64;
    if block.timestamp > now.saturating_add(MAX_FUTURE_DRIFT_MS) {
        return Err(ChainError::InvalidTimestamp(format!(
            "block {} is stamped {}, more than {} ms ahead of {}",
            block.hash, block.timestamp, MAX_FUTURE_DRIFT_MS, now
        )));
    }
    Ok(())
}

fn validate_block_contents(
    blocks: &[Block],
    params: &ChainParams,
    block: &Block,
) -> Result<(), ChainError> {
    if block.miner_rewards != params.mining_rewards {
        return Err(ChainError::InvalidTransaction(format!(
            "miner reward {} differs from {}",
            block.miner_rewards, params.mining_rewards
        )));
    }
    validate_address(&block.miner)
        .map_err(|e| ChainError::InvalidTransaction(format!("Invalid miner address: {}", e)))?;

    if block.transactions.len() > params.max_transactions_in_block {
        return Err(ChainError::InvalidTransaction(format!(
            "block carries {} transactions, the maximum is {}",
            block.transactions.len(),
            params.max_transactions_in_block
        )));
    }

    let on_chain: HashSet<String> = blocks
        .iter()
        .flat_map(|b| b.transactions.iter().map(|tx| tx.hash()))
        .collect();
    let mut in_block = HashSet::new();

    for tx in &block.transactions {
        tx.validate()?;
        let hash = tx.hash();
        if on_chain.contains(&hash) {
            return Err(ChainError::InvalidTransaction(format!(
                "transaction {} is already on chain",
                hash
            )));
        }
        if !in_block.insert(hash.clone()) {
            return Err(ChainError::InvalidTransaction(format!(
                "transaction {} appears twice in the block",
                hash
            )));
        }
    }
    Ok(())
}

/// Checks the first block of a chain received from a peer. Any genesis is accepted as long as
/// it is well formed: nodes that started independently agree on history through cloning.
pub fn validate_genesis(block: &Block, params: &ChainParams) -> Result<(), ChainError> {
    if !block.is_genesis() {
        return Err(ChainError::InvalidGenesis(format!(
            "previous hash is {}",
            block.previous_hash
        )));
    }
    if !block.transactions.is_empty() {
        return Err(ChainError::InvalidGenesis(
            "genesis must not carry transactions".to_string(),
        ));
    }
    if block.difficulty != params.init_difficulty {
        return Err(ChainError::InvalidGenesis(format!(
            "difficulty {} differs from {}",
            block.difficulty, params.init_difficulty
        )));
    }
    if block.miner_rewards != params.mining_rewards {
        return Err(ChainError::InvalidGenesis(format!(
            "miner reward {} differs from {}",
            block.miner_rewards, params.mining_rewards
        )));
    }
    validate_address(&block.miner)
        .map_err(|e| ChainError::InvalidGenesis(format!("miner address: {}", e)))?;
    check_not_in_future(block)?;

    block.verify_self_consistency()
}
