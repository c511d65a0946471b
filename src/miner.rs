//! Proof-of-work nonce search and the shared mining switches.

use crate::blockchain::Block;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MiningOutcome {
    Mined { block: Block, attempts: u64 },
    Cancelled,
}

/// Increments the nonce from its current value until the hash meets the block's difficulty.
///
/// `should_stop` is polled before every hash. When the nonce space is exhausted the nonce wraps
/// to 0 and the timestamp moves forward by at least one millisecond, so the search continues
/// over fresh hashes.
pub fn mine_block<F>(mut block: Block, should_stop: F) -> MiningOutcome
where
    F: Fn() -> bool,
{
    let mut attempts: u64 = 0;
    loop {
        if should_stop() {
            return MiningOutcome::Cancelled;
        }

        block.hash = block.calculate_hash();
        attempts = attempts.wrapping_add(1);
        if block.meets_difficulty() {
            return MiningOutcome::Mined { block, attempts };
        }

        advance_nonce(&mut block);
    }
}

/// Steps to the next nonce. Past `u64::MAX` the nonce restarts at 0 with a later timestamp.
fn advance_nonce(block: &mut Block) {
    match block.nonce.checked_add(1) {
        Some(next) => block.nonce = next,
        None => {
            let now = chrono::Utc::now().timestamp_millis() as u64;
            block.timestamp = now.max(block.timestamp.saturating_add(1));
            block.nonce = 0;
        }
    }
}

/// Flags shared between the node and its mining task.
#[derive(Debug, Default)]
pub struct MiningEngine {
    running: AtomicBool,
    loop_active: AtomicBool,
    tip_version: AtomicU64,
    blocks_mined: AtomicU64,
}

impl MiningEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if mining was already switched on.
    pub fn start(&self) -> bool {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Returns false if mining was already off.
    pub fn stop(&self) -> bool {
        self.running
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Claims the single mining loop slot.
    pub fn try_enter_loop(&self) -> bool {
        self.loop_active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Releases the loop slot. Returns true if mining was switched back on meanwhile and the
    /// caller re-claimed the slot, in which case it must keep looping.
    pub fn leave_loop(&self) -> bool {
        self.loop_active.store(false, Ordering::SeqCst);
        self.is_running() && self.try_enter_loop()
    }

    /// Invalidates every candidate built on the previous tip.
    pub fn notify_tip_changed(&self) {
        self.tip_version.fetch_add(1, Ordering::SeqCst);
    }

    pub fn tip_version(&self) -> u64 {
        self.tip_version.load(Ordering::SeqCst)
    }

    pub fn record_mined(&self) -> u64 {
        self.blocks_mined.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn blocks_mined(&self) -> u64 {
        self.blocks_mined.load(Ordering::SeqCst)
    }

    /// Cancellation check for a search started at `version`: stops when mining is switched off
    /// or the tip moves.
    pub fn cancel_check(self: &Arc<Self>, version: u64) -> impl Fn() -> bool + Send + 'static {
        let engine = Arc::clone(self);
        move || !engine.is_running() || engine.tip_version() != version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::leading_zero_digits;
    use crate::transaction::Amount;
    use crate::wallet::Wallet;
    use std::cell::Cell;

    fn candidate(difficulty: u32) -> Block {
        Block::genesis(Wallet::new(None).address, difficulty, Amount::from_num(10))
    }

    #[test]
    fn test_mined_hash_meets_difficulty() {
        for difficulty in 0..=3 {
            match mine_block(candidate(difficulty), || false) {
                MiningOutcome::Mined { block, attempts } => {
                    assert!(leading_zero_digits(&block.hash) >= difficulty as usize);
                    assert!(block.check_hash().is_ok());
                    assert!(attempts >= 1);
                }
                MiningOutcome::Cancelled => panic!("search was not cancelled"),
            }
        }
    }

    #[test]
    fn test_stop_is_observed_between_hashes() {
        let calls = Cell::new(0u32);
        let outcome = mine_block(candidate(64), || {
            calls.set(calls.get() + 1);
            calls.get() > 5
        });
        assert_eq!(outcome, MiningOutcome::Cancelled);
        assert_eq!(calls.get(), 6);
    }

    #[test]
    fn test_nonce_wraps_and_refreshes_timestamp() {
        let mut block = candidate(1);
        block.nonce = u64::MAX;
        let start_timestamp = block.timestamp;

        advance_nonce(&mut block);
        assert_eq!(block.nonce, 0);
        assert!(block.timestamp > start_timestamp);
    }

    #[test]
    fn test_nonce_steps_by_one_without_touching_timestamp() {
        let mut block = candidate(1);
        block.nonce = 41;
        let start_timestamp = block.timestamp;

        advance_nonce(&mut block);
        assert_eq!(block.nonce, 42);
        assert_eq!(block.timestamp, start_timestamp);
    }

    #[test]
    fn test_search_continues_after_wrap() {
        let mut block = candidate(1);
        block.nonce = u64::MAX;

        match mine_block(block, || false) {
            MiningOutcome::Mined { block, .. } => {
                assert!(block.meets_difficulty());
                assert!(block.check_hash().is_ok());
            }
            MiningOutcome::Cancelled => panic!("search was not cancelled"),
        }
    }

    #[test]
    fn test_engine_switches() {
        let engine = Arc::new(MiningEngine::new());
        assert!(engine.start());
        assert!(!engine.start());

        let check = engine.cancel_check(engine.tip_version());
        assert!(!check());
        engine.notify_tip_changed();
        assert!(check());

        assert!(engine.stop());
        assert!(!engine.stop());
    }

    #[test]
    fn test_single_loop_slot() {
        let engine = MiningEngine::new();
        assert!(engine.try_enter_loop());
        assert!(!engine.try_enter_loop());

        // Mining off: leaving releases the slot for good.
        assert!(!engine.leave_loop());
        assert!(engine.try_enter_loop());

        // Mining switched on while leaving: the slot is re-claimed.
        engine.start();
        assert!(engine.leave_loop());
        assert!(!engine.try_enter_loop());
    }
}
