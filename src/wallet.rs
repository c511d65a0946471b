//! Wallet: an address plus, optionally, the secret key that can sign for it.
//!
//! Wallets are stored as pretty-printed JSON. A watch-only wallet carries no secret key and
//! fails every signing request with [`ChainError::SignatureError`].

use crate::crypto::{validate_address, Address, KeyPair};
use crate::error::ChainError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub name: Option<String>,
    pub address: Address,
    #[serde(default)]
    pub secret_key_hex: Option<String>,
    /// RFC3339 creation time
    pub created: String,
}

impl Wallet {
    /// Generates a wallet with a fresh key pair.
    pub fn new(name: Option<String>) -> Self {
        Self::from_keypair(name, &KeyPair::generate())
    }

    pub fn from_keypair(name: Option<String>, keypair: &KeyPair) -> Self {
        Wallet {
            name,
            address: keypair.address(),
            secret_key_hex: Some(keypair.secret_hex()),
            created: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn watch_only(name: Option<String>, address: Address) -> Result<Self, ChainError> {
        validate_address(&address)?;
        Ok(Wallet {
            name,
            address,
            secret_key_hex: None,
            created: chrono::Utc::now().to_rfc3339(),
        })
    }

    pub fn can_sign(&self) -> bool {
        self.secret_key_hex.is_some()
    }

    pub fn keypair(&self) -> Result<KeyPair, ChainError> {
        let secret = self.secret_key_hex.as_deref().ok_or_else(|| {
            ChainError::SignatureError(format!("Wallet {} has no private key", self.address))
        })?;
        let keypair = KeyPair::from_secret_hex(secret)?;
        if keypair.address() != self.address {
            return Err(ChainError::SignatureError(
                "Wallet secret key does not match its address".to_string(),
            ));
        }
        Ok(keypair)
    }

    /// Signs `message`, returning the hex compact signature.
    pub fn sign(&self, message: &[u8]) -> Result<String, ChainError> {
        self.keypair()?.sign(message)
    }

    pub fn save(&self, path: &Path) -> Result<(), ChainError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ChainError> {
        let content = fs::read_to_string(path)?;
        let wallet: Wallet = serde_json::from_str(&content)?;
        validate_address(&wallet.address)?;
        Ok(wallet)
    }

    /// Loads the wallet at `path`, creating and saving a new one if the file does not exist.
    pub fn load_or_create(path: &Path, name: Option<String>) -> Result<Self, ChainError> {
        if path.exists() {
            Self::load(path)
        } else {
            let wallet = Self::new(name);
            wallet.save(path)?;
            Ok(wallet)
        }
    }
}
