//! Merkle tree over transaction hashes.
//!
//! Each level pairs adjacent hashes, concatenates their hex text and hashes the result. An odd
//! level pairs its last hash with itself. The tree over zero leaves has the hash of the empty
//! string as its root.

use crate::crypto::hash_str;
use crate::transaction::Transaction;

#[derive(Debug, Clone)]
pub struct MerkleTree {
    /// `levels[0]` are the leaves, the last level holds the root.
    levels: Vec<Vec<String>>,
}

impl MerkleTree {
    pub fn from_hashes(leaves: Vec<String>) -> Self {
        let mut levels = vec![leaves];

        while let Some(current) = levels.last().filter(|level| level.len() > 1) {
            let next: Vec<String> = current
                .chunks(2)
                .map(|pair| {
                    let left = &pair[0];
                    let right = pair.get(1).unwrap_or(left);
                    hash_str(&format!("{}{}", left, right))
                })
                .collect();
            levels.push(next);
        }

        MerkleTree { levels }
    }

    pub fn from_transactions(transactions: &[Transaction]) -> Self {
        Self::from_hashes(transactions.iter().map(Transaction::hash).collect())
    }

    pub fn root(&self) -> String {
        match self.levels.last().and_then(|level| level.first()) {
            Some(root) => root.clone(),
            None => hash_str(""),
        }
    }
}

/// Convenience wrapper used by blocks.
pub fn merkle_root(transactions: &[Transaction]) -> String {
    MerkleTree::from_transactions(transactions).root()
}
