/// Validation logic for transactions separated from type definitions
use crate::crypto::{validate_address, verify_signature};
use crate::error::ChainError;
use crate::transaction::types::{Amount, Transaction, MAX_MESSAGE_LENGTH};

impl Transaction {
    /// Validates just the signature of the transaction, without access to chain state.
    pub fn validate_signature(&self) -> Result<(), ChainError> {
        let signature = self.signature.as_deref().ok_or_else(|| {
            ChainError::InvalidTransaction(format!("Transaction {} is not signed", self.hash()))
        })?;

        verify_signature(&self.sender, self.content_encoding().as_bytes(), signature).map_err(
            |e| ChainError::InvalidTransaction(format!("Transaction {}: {}", self.hash(), e)),
        )
    }

    /// Stateless validation: signature, addresses, amounts and message bounds.
    /// Balance checks need chain state and live in the ledger view.
    pub fn validate(&self) -> Result<(), ChainError> {
        if self.sender == self.receiver {
            return Err(ChainError::InvalidTransaction(
                "Sender and receiver cannot be the same".to_string(),
            ));
        }

        validate_address(&self.receiver).map_err(|e| {
            ChainError::InvalidTransaction(format!("Invalid receiver address: {}", e))
        })?;

        if self.amount <= Amount::from_num(0) {
            return Err(ChainError::InvalidTransaction(format!(
                "Transfer amount must be positive, got {}",
                self.amount
            )));
        }
        if self.fee < Amount::from_num(0) {
            return Err(ChainError::InvalidTransaction(format!(
                "Fee cannot be negative, got {}",
                self.fee
            )));
        }

        if self.message.len() > MAX_MESSAGE_LENGTH {
            return Err(ChainError::InvalidTransaction(format!(
                "Message exceeds maximum length of {} bytes",
                MAX_MESSAGE_LENGTH
            )));
        }

        self.validate_signature()
    }
}
