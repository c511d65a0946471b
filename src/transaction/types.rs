/// Transaction types for FloodChain
use crate::codec::{RecordReader, RecordWriter};
use crate::crypto::{hash_str, Address};
use crate::error::ChainError;
use crate::wallet::Wallet;
use fixed::types::I32F32;

/// Deterministic decimal used for amounts, fees and rewards.
pub type Amount = I32F32;

/// Maximum message length in bytes to keep records small on the wire
pub const MAX_MESSAGE_LENGTH: usize = 256;

const RECORD_NAME: &str = "Transaction";

/// A value transfer between two addresses.
///
/// The signature covers [`Transaction::content_encoding`], which is everything except the
/// signature itself. The hash is taken over the same text, so re-signing never changes a
/// transaction's identity.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Transaction {
    pub sender: Address,
    pub receiver: Address,
    pub amount: Amount,
    pub fee: Amount,
    pub timestamp: u64,
    pub message: String,
    pub signature: Option<String>,
}

impl Transaction {
    /// Creates an unsigned transaction stamped with the current time.
    pub fn new(
        sender: Address,
        receiver: Address,
        amount: Amount,
        fee: Amount,
        message: impl Into<String>,
    ) -> Self {
        Self::with_timestamp(
            sender,
            receiver,
            amount,
            fee,
            chrono::Utc::now().timestamp_millis() as u64,
            message,
        )
    }

    pub fn with_timestamp(
        sender: Address,
        receiver: Address,
        amount: Amount,
        fee: Amount,
        timestamp: u64,
        message: impl Into<String>,
    ) -> Self {
        Transaction {
            sender,
            receiver,
            amount,
            fee,
            timestamp,
            message: message.into(),
            signature: None,
        }
    }

    fn content_writer(&self) -> RecordWriter {
        RecordWriter::new(RECORD_NAME)
            .field("sender", &self.sender)
            .field("receiver", &self.receiver)
            .field("amount", self.amount.to_string())
            .field("fee", self.fee.to_string())
            .field("timestamp", self.timestamp.to_string())
            .field("message", &self.message)
    }

    /// The canonical text that is signed and hashed.
    pub fn content_encoding(&self) -> String {
        self.content_writer().finish()
    }

    /// Full wire form, signature included (empty when unsigned).
    pub fn to_wire(&self) -> String {
        self.content_writer()
            .field("signature", self.signature.as_deref().unwrap_or(""))
            .finish()
    }

    pub fn from_wire(text: &str) -> Result<Self, ChainError> {
        let mut reader = RecordReader::parse(RECORD_NAME, text)?;
        let sender = reader.next("sender")?;
        let receiver = reader.next("receiver")?;
        let amount = reader.next_parsed::<Amount>("amount")?;
        let fee = reader.next_parsed::<Amount>("fee")?;
        let timestamp = reader.next_parsed::<u64>("timestamp")?;
        let message = reader.next("message")?;
        let signature = reader.next("signature")?;
        reader.finish()?;

        Ok(Transaction {
            sender,
            receiver,
            amount,
            fee,
            timestamp,
            message,
            signature: if signature.is_empty() {
                None
            } else {
                Some(signature)
            },
        })
    }

    /// Calculate the hash of this transaction (signature excluded)
    pub fn hash(&self) -> String {
        hash_str(&self.content_encoding())
    }

    /// Amount plus fee, the total debited from the sender.
    pub fn total_cost(&self) -> Amount {
        self.amount.saturating_add(self.fee)
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    /// Signs with the wallet that owns the sender address.
    pub fn sign(&mut self, wallet: &Wallet) -> Result<(), ChainError> {
        if wallet.address != self.sender {
            return Err(ChainError::SignatureError(format!(
                "Wallet {} cannot sign for sender {}",
                wallet.address, self.sender
            )));
        }
        let signature = wallet.sign(self.content_encoding().as_bytes())?;
        self.signature = Some(signature);
        Ok(())
    }
}
