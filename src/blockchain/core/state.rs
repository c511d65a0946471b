use crate::crypto::Address;
use crate::error::ChainError;
use crate::transaction::{Amount, Transaction};
use std::collections::HashMap;

use super::block::Block;

/// Balance of `address` derived from the full history: received amounts plus mining rewards,
/// minus everything spent (amount and fee). Fees are burned.
pub fn balance_of(blocks: &[Block], address: &str) -> Amount {
    let mut balance = Amount::ZERO;
    for block in blocks {
        if block.miner == address {
            balance = balance.saturating_add(block.miner_rewards);
        }
        for tx in &block.transactions {
            if tx.receiver == address {
                balance = balance.saturating_add(tx.amount);
            }
            if tx.sender == address {
                balance = balance.saturating_sub(tx.total_cost());
            }
        }
    }
    balance
}

/// Balances over a chain prefix plus pending debits and credits, used to check a sequence of
/// transactions without touching the chain.
#[derive(Debug, Clone)]
pub struct LedgerView<'a> {
    blocks: &'a [Block],
    deltas: HashMap<Address, Amount>,
}

impl<'a> LedgerView<'a> {
    pub fn new(blocks: &'a [Block]) -> Self {
        Self {
            blocks,
            deltas: HashMap::new(),
        }
    }

    pub fn balance(&self, address: &str) -> Amount {
        let base = balance_of(self.blocks, address);
        match self.deltas.get(address) {
            Some(delta) => base.saturating_add(*delta),
            None => base,
        }
    }

    /// Debits the sender and credits the receiver, or fails leaving the view unchanged.
    pub fn apply(&mut self, tx: &Transaction) -> Result<(), ChainError> {
        let available = self.balance(&tx.sender);
        if available < tx.total_cost() {
            return Err(ChainError::InsufficientFunds(format!(
                "{} has {} but transaction {} needs {}",
                tx.sender,
                available,
                tx.hash(),
                tx.total_cost()
            )));
        }

        let sender = self.deltas.entry(tx.sender.clone()).or_insert(Amount::ZERO);
        *sender = sender.saturating_sub(tx.total_cost());
        let receiver = self.deltas.entry(tx.receiver.clone()).or_insert(Amount::ZERO);
        *receiver = receiver.saturating_add(tx.amount);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::Wallet;

    fn reward_block(miner: &str, transactions: Vec<Transaction>) -> Block {
        Block::new(
            "0".to_string(),
            0,
            transactions,
            miner.to_string(),
            Amount::from_num(10),
        )
    }

    fn transfer(from: &Wallet, to: &Wallet, amount: i32, fee: i32) -> Transaction {
        let mut tx = Transaction::new(
            from.address.clone(),
            to.address.clone(),
            Amount::from_num(amount),
            Amount::from_num(fee),
            "",
        );
        tx.sign(from).unwrap();
        tx
    }

    #[test]
    fn test_rewards_accumulate() {
        let a = Wallet::new(None);
        let blocks = vec![reward_block(&a.address, vec![]), reward_block(&a.address, vec![])];
        assert_eq!(balance_of(&blocks, &a.address), Amount::from_num(20));
    }

    #[test]
    fn test_transfer_burns_fee() {
        let a = Wallet::new(None);
        let b = Wallet::new(None);
        let blocks = vec![
            reward_block(&a.address, vec![]),
            reward_block(&a.address, vec![]),
            reward_block(&a.address, vec![transfer(&a, &b, 3, 1)]),
        ];
        assert_eq!(balance_of(&blocks, &a.address), Amount::from_num(26));
        assert_eq!(balance_of(&blocks, &b.address), Amount::from_num(3));
    }

    #[test]
    fn test_unknown_address_has_zero_balance() {
        let a = Wallet::new(None);
        let blocks = vec![reward_block(&a.address, vec![])];
        assert_eq!(balance_of(&blocks, "nobody"), Amount::ZERO);
    }

    #[test]
    fn test_ledger_view_tracks_pending_spends() {
        let a = Wallet::new(None);
        let b = Wallet::new(None);
        let blocks = vec![reward_block(&a.address, vec![])];
        let mut view = LedgerView::new(&blocks);

        view.apply(&transfer(&a, &b, 6, 1)).unwrap();
        assert_eq!(view.balance(&a.address), Amount::from_num(3));
        assert_eq!(view.balance(&b.address), Amount::from_num(6));

        let overdraw = transfer(&a, &b, 3, 1);
        assert!(matches!(
            view.apply(&overdraw),
            Err(ChainError::InsufficientFunds(_))
        ));
        assert_eq!(view.balance(&a.address), Amount::from_num(3));

        // b can spend what it received earlier in the same sequence.
        view.apply(&transfer(&b, &a, 5, 1)).unwrap();
        assert_eq!(view.balance(&b.address), Amount::ZERO);
    }
}
