//! Integration tests for wallet creation and transaction handling

use floodchain::blockchain::Blockchain;
use floodchain::config::ChainParams;
use floodchain::crypto::{validate_address, verify_signature, KeyPair};
use floodchain::error::ChainError;
use floodchain::transaction::{Amount, Transaction, MAX_MESSAGE_LENGTH};
use floodchain::wallet::Wallet;
use tempfile::TempDir;

/// Helper to create a named test wallet
fn create_test_wallet(name: &str) -> Wallet {
    Wallet::new(Some(name.to_string()))
}

#[test]
fn test_wallet_creation() -> Result<(), Box<dyn std::error::Error>> {
    let wallet = create_test_wallet("test_wallet");

    assert_eq!(wallet.name, Some("test_wallet".to_string()));
    assert!(wallet.can_sign());
    assert!(!wallet.created.is_empty());

    // Compressed public key: 33 bytes, 66 hex characters
    assert_eq!(wallet.address.len(), 66);
    validate_address(&wallet.address)?;

    Ok(())
}

#[test]
fn test_wallet_persistence() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let wallet_path = temp_dir.path().join("wallet.json");

    let original_wallet = create_test_wallet("persistent");
    original_wallet.save(&wallet_path)?;
    assert!(wallet_path.exists());

    let loaded_wallet = Wallet::load(&wallet_path)?;
    assert_eq!(original_wallet.address, loaded_wallet.address);
    assert_eq!(original_wallet.name, loaded_wallet.name);
    assert_eq!(original_wallet.secret_key_hex, loaded_wallet.secret_key_hex);
    assert_eq!(original_wallet.created, loaded_wallet.created);

    Ok(())
}

#[test]
fn test_wallet_keypair_derivation() -> Result<(), Box<dyn std::error::Error>> {
    let wallet = create_test_wallet("keypair_test");
    let keypair = wallet.keypair()?;
    assert_eq!(wallet.address, keypair.address());

    let restored = KeyPair::from_secret_hex(&keypair.secret_hex())?;
    assert_eq!(restored.address(), wallet.address);

    Ok(())
}

#[test]
fn test_corrupt_wallet_file_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("broken.json");
    std::fs::write(&path, "{ not json")?;
    assert!(Wallet::load(&path).is_err());

    let mut wallet = create_test_wallet("tampered");
    wallet.address = create_test_wallet("other").address;
    assert!(matches!(wallet.keypair(), Err(ChainError::SignatureError(_))));

    Ok(())
}

#[test]
fn test_alice_to_bob_transaction() -> Result<(), Box<dyn std::error::Error>> {
    let alice = create_test_wallet("alice");
    let bob = create_test_wallet("bob");

    let mut tx = Transaction::new(
        alice.address.clone(),
        bob.address.clone(),
        Amount::from_num(50),
        Amount::from_num(2.5),
        "Payment from Alice to Bob",
    );
    assert!(!tx.is_signed());
    tx.sign(&alice)?;
    tx.validate()?;

    assert_eq!(tx.total_cost(), Amount::from_num(52.5));
    let signature = tx.signature.clone().unwrap_or_default();
    verify_signature(&alice.address, tx.content_encoding().as_bytes(), &signature)?;

    // The hash is a SHA-256 hex digest
    assert_eq!(tx.hash().len(), 64);

    Ok(())
}

#[test]
fn test_transaction_signed_by_wrong_key_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let alice = create_test_wallet("alice");
    let bob = create_test_wallet("bob");
    let mallory = create_test_wallet("mallory");

    let mut tx = Transaction::new(
        alice.address.clone(),
        bob.address.clone(),
        Amount::from_num(1),
        Amount::from_num(0),
        "",
    );
    tx.sign(&mallory)?;
    assert!(matches!(
        tx.validate(),
        Err(ChainError::InvalidTransaction(_))
    ));

    Ok(())
}

#[test]
fn test_oversized_message_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let alice = create_test_wallet("alice");
    let bob = create_test_wallet("bob");

    let mut tx = Transaction::new(
        alice.address.clone(),
        bob.address.clone(),
        Amount::from_num(1),
        Amount::from_num(0),
        "x".repeat(MAX_MESSAGE_LENGTH + 1),
    );
    tx.sign(&alice)?;
    assert!(tx.validate().is_err());

    Ok(())
}

#[test]
fn test_miner_wallet_funds_first_transfer() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("miner.json");
    let miner = Wallet::load_or_create(&path, Some("miner".to_string()))?;
    let friend = create_test_wallet("friend");

    let mut chain = Blockchain::new(miner.address.clone(), ChainParams::default())?;
    assert_eq!(chain.balance_of(&miner.address), Amount::from_num(10));

    // Reloading the wallet must still sign for the funded address.
    let reloaded = Wallet::load(&path)?;
    let mut tx = Transaction::new(
        reloaded.address.clone(),
        friend.address.clone(),
        Amount::from_num(7),
        Amount::from_num(3),
        "all in",
    );
    tx.sign(&reloaded)?;
    chain.submit_transaction(tx)?;
    assert_eq!(chain.mempool.len(), 1);

    Ok(())
}
