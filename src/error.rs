//! Error types for FloodChain

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    // Block rejections, in the order the acceptance rules are evaluated.
    #[error("Stale or forked block: {0}")]
    StaleOrForkedBlock(String),
    #[error("Hash mismatch: {0}")]
    HashMismatch(String),
    #[error("Insufficient work: {0}")]
    InsufficientWork(String),
    #[error("Merkle root mismatch: {0}")]
    MerkleMismatch(String),
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    // Pool admission, gossip and chain cloning rejections.
    #[error("Duplicate transaction: {0}")]
    DuplicateTransaction(String),
    #[error("Duplicate block: {0}")]
    DuplicateBlock(String),
    #[error("Received chain is not longer than the local chain ({received} <= {local})")]
    ChainNotLonger { received: usize, local: usize },
    #[error("Invalid genesis block: {0}")]
    InvalidGenesis(String),

    #[error("Signature error: {0}")]
    SignatureError(String),
    #[error("Codec error: {0}")]
    Codec(String),
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ChainError {
    /// True when the item was already known, which the wire protocol reports as `Dup`.
    pub fn is_duplicate(&self) -> bool {
        matches!(
            self,
            ChainError::DuplicateTransaction(_) | ChainError::DuplicateBlock(_)
        )
    }

    /// True for errors that reject a block, transaction or chain on its merits, as opposed to
    /// failures of the node's own plumbing.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            ChainError::StaleOrForkedBlock(_)
                | ChainError::HashMismatch(_)
                | ChainError::InsufficientWork(_)
                | ChainError::MerkleMismatch(_)
                | ChainError::InvalidTimestamp(_)
                | ChainError::InvalidTransaction(_)
                | ChainError::InsufficientFunds(_)
                | ChainError::DuplicateTransaction(_)
                | ChainError::DuplicateBlock(_)
                | ChainError::ChainNotLonger { .. }
                | ChainError::InvalidGenesis(_)
        )
    }
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::IoError(err.to_string())
    }
}

impl From<base64::DecodeError> for ChainError {
    fn from(err: base64::DecodeError) -> Self {
        ChainError::Codec(format!("invalid base64: {}", err))
    }
}

impl From<std::string::FromUtf8Error> for ChainError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        ChainError::Codec(format!("invalid utf-8: {}", err))
    }
}

impl From<toml::de::Error> for ChainError {
    fn from(err: toml::de::Error) -> Self {
        ChainError::ConfigError(err.to_string())
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        ChainError::IoError(format!("JSON error: {}", err))
    }
}
