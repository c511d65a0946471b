//! Pool of verified transactions waiting to be mined.
//!
//! Entries are keyed by transaction hash and remembered in arrival order, which is the order
//! miners draw candidates in. Admission checks that need chain state live on
//! [`crate::blockchain::Blockchain::submit_transaction`]; the pool itself only rejects duplicates.

use crate::blockchain::Block;
use crate::error::ChainError;
use crate::transaction::Transaction;
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone, Default)]
pub struct Mempool {
    transactions: HashMap<String, Transaction>,
    arrival_order: VecDeque<String>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a transaction, returning its hash.
    pub fn add_transaction(&mut self, tx: Transaction) -> Result<String, ChainError> {
        let hash = tx.hash();
        if self.transactions.contains_key(&hash) {
            return Err(ChainError::DuplicateTransaction(format!(
                "{} is already pending",
                hash
            )));
        }
        self.arrival_order.push_back(hash.clone());
        self.transactions.insert(hash.clone(), tx);
        Ok(hash)
    }

    /// Drops every pending transaction that `block` includes.
    pub fn remove_included(&mut self, block: &Block) -> usize {
        let before = self.transactions.len();
        for tx in &block.transactions {
            self.transactions.remove(&tx.hash());
        }
        let transactions = &self.transactions;
        self.arrival_order.retain(|h| transactions.contains_key(h));
        before - self.transactions.len()
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.transactions.contains_key(hash)
    }

    /// Pending transactions in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.arrival_order
            .iter()
            .filter_map(|hash| self.transactions.get(hash))
    }

    pub fn get_transactions(&self, limit: usize) -> Vec<Transaction> {
        self.iter().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::Amount;
    use crate::wallet::Wallet;

    fn tx(from: &Wallet, to: &Wallet, amount: i32) -> Transaction {
        let mut tx = Transaction::new(
            from.address.clone(),
            to.address.clone(),
            Amount::from_num(amount),
            Amount::from_num(0),
            "",
        );
        tx.sign(from).unwrap();
        tx
    }

    #[test]
    fn test_arrival_order_preserved() {
        let a = Wallet::new(None);
        let b = Wallet::new(None);
        let mut pool = Mempool::new();
        let hashes: Vec<String> = (1..=3)
            .map(|n| pool.add_transaction(tx(&a, &b, n)).unwrap())
            .collect();

        let listed: Vec<String> = pool.iter().map(Transaction::hash).collect();
        assert_eq!(listed, hashes);
        assert_eq!(pool.get_transactions(2).len(), 2);
    }

    #[test]
    fn test_duplicate_rejected() {
        let a = Wallet::new(None);
        let b = Wallet::new(None);
        let mut pool = Mempool::new();
        let t = tx(&a, &b, 1);
        pool.add_transaction(t.clone()).unwrap();
        assert!(matches!(
            pool.add_transaction(t),
            Err(ChainError::DuplicateTransaction(_))
        ));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_remove_included() {
        let a = Wallet::new(None);
        let b = Wallet::new(None);
        let mut pool = Mempool::new();
        let kept = tx(&a, &b, 1);
        let mined = tx(&a, &b, 2);
        pool.add_transaction(kept.clone()).unwrap();
        pool.add_transaction(mined.clone()).unwrap();

        let block = Block::new(
            "0".to_string(),
            0,
            vec![mined],
            a.address.clone(),
            Amount::from_num(10),
        );
        assert_eq!(pool.remove_included(&block), 1);
        assert_eq!(pool.get_transactions(10), vec![kept.clone()]);
        assert!(pool.contains(&kept.hash()));

        let rest = Block::new(
            "0".to_string(),
            0,
            vec![kept],
            a.address.clone(),
            Amount::from_num(10),
        );
        assert_eq!(pool.remove_included(&rest), 1);
        assert!(pool.is_empty());
        assert_eq!(pool.iter().count(), 0);
    }
}
