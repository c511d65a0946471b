//! Cryptographic primitives for FloodChain
//!
//! Hashing is SHA-256 rendered as lowercase hex. Addresses are the hex encoding of a compressed
//! secp256k1 public key, so any address can verify signatures made by its owner without a
//! separate key lookup.

use crate::error::ChainError;
use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use secp256k1::{
    constants::{COMPACT_SIGNATURE_SIZE, PUBLIC_KEY_SIZE, SECRET_KEY_SIZE},
    ecdsa::Signature,
    All, Message, PublicKey, Secp256k1, SecretKey,
};
use sha2::{Digest, Sha256};

/// A thread-safe, lazily initialized Secp256k1 context.
static SECP256K1_CONTEXT: Lazy<Secp256k1<All>> = Lazy::new(Secp256k1::new);

/// Hex-encoded compressed public key.
pub type Address = String;

/// SHA-256 of `data` as a 64 character lowercase hex string.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Hashes the UTF-8 bytes of a string.
pub fn hash_str(s: &str) -> String {
    sha256_hex(s.as_bytes())
}

/// Number of leading `'0'` characters in a hex digest.
pub fn leading_zero_digits(hash_hex: &str) -> usize {
    hash_hex.bytes().take_while(|b| *b == b'0').count()
}

/// Checks that an address is the canonical (lowercase) encoding of a valid compressed public
/// key. Each key has exactly one accepted address.
pub fn validate_address(address: &str) -> Result<(), ChainError> {
    public_key_from_address(address).map(|_| ())
}

fn public_key_from_address(address: &str) -> Result<PublicKey, ChainError> {
    let bytes = hex::decode(address)
        .map_err(|e| ChainError::SignatureError(format!("Invalid hex address: {}", e)))?;
    if bytes.len() != PUBLIC_KEY_SIZE {
        return Err(ChainError::SignatureError(format!(
            "Address must encode a {} byte compressed public key, got {} bytes",
            PUBLIC_KEY_SIZE,
            bytes.len()
        )));
    }
    let public_key = PublicKey::from_slice(&bytes)
        .map_err(|e| ChainError::SignatureError(format!("Invalid public key: {}", e)))?;
    if hex::encode(public_key.serialize()) != address {
        return Err(ChainError::SignatureError(format!(
            "Address {} is not in canonical lowercase form",
            address
        )));
    }
    Ok(public_key)
}

#[derive(Debug, Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generates a new random KeyPair using the OS random number generator.
    pub fn generate() -> Self {
        let secret_key = SecretKey::new(&mut OsRng);
        Self::from_secret_key(secret_key)
    }

    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let public_key = PublicKey::from_secret_key(&SECP256K1_CONTEXT, &secret_key);
        KeyPair {
            secret_key,
            public_key,
        }
    }

    /// Creates a KeyPair from raw secret key bytes.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, ChainError> {
        let secret_key = SecretKey::from_slice(bytes).map_err(|e| {
            if bytes.len() != SECRET_KEY_SIZE {
                ChainError::SignatureError(format!(
                    "Secret key must be {} bytes, got {}",
                    SECRET_KEY_SIZE,
                    bytes.len()
                ))
            } else {
                ChainError::SignatureError(format!("Invalid secret key bytes: {}", e))
            }
        })?;

        Ok(Self::from_secret_key(secret_key))
    }

    pub fn from_secret_hex(secret_hex: &str) -> Result<Self, ChainError> {
        let bytes = hex::decode(secret_hex)
            .map_err(|e| ChainError::SignatureError(format!("Invalid secret key hex: {}", e)))?;
        Self::from_secret_bytes(&bytes)
    }

    pub fn secret_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }

    /// The address owned by this key pair.
    pub fn address(&self) -> Address {
        hex::encode(self.public_key.serialize())
    }

    /// Signs the SHA-256 digest of `message`, returning the compact signature as hex.
    pub fn sign(&self, message: &[u8]) -> Result<String, ChainError> {
        let digest = Sha256::digest(message);
        let message = Message::from_digest_slice(&digest)
            .map_err(|e| ChainError::SignatureError(format!("Failed to create message: {}", e)))?;

        let signature = SECP256K1_CONTEXT.sign_ecdsa(&message, &self.secret_key);
        let compact: [u8; COMPACT_SIGNATURE_SIZE] = signature.serialize_compact();
        Ok(hex::encode(compact))
    }
}

/// Verifies a hex compact signature over `message` against the public key in `address`.
pub fn verify_signature(
    address: &str,
    message: &[u8],
    signature_hex: &str,
) -> Result<(), ChainError> {
    let public_key = public_key_from_address(address)?;

    let signature_bytes = hex::decode(signature_hex)
        .map_err(|e| ChainError::SignatureError(format!("Invalid signature hex: {}", e)))?;
    if signature_bytes.len() != COMPACT_SIGNATURE_SIZE {
        return Err(ChainError::SignatureError(format!(
            "Signature must be exactly {} bytes (compact), got {}",
            COMPACT_SIGNATURE_SIZE,
            signature_bytes.len()
        )));
    }

    let digest = Sha256::digest(message);
    let message = Message::from_digest_slice(&digest)
        .map_err(|e| ChainError::SignatureError(format!("Failed to create message: {}", e)))?;

    let signature = Signature::from_compact(&signature_bytes)
        .map_err(|e| ChainError::SignatureError(format!("Invalid signature: {}", e)))?;

    SECP256K1_CONTEXT
        .verify_ecdsa(&message, &signature, &public_key)
        .map_err(|_| ChainError::SignatureError("Signature verification failed".to_string()))
}
