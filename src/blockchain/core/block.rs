use crate::codec::{decode_list, encode_list, RecordReader, RecordWriter};
use crate::crypto::{hash_str, leading_zero_digits, Address};
use crate::error::ChainError;
use crate::merkle::merkle_root;
use crate::transaction::{Amount, Transaction};

/// `previous_hash` of every genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "0";

const RECORD_NAME: &str = "Block";

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Block {
    pub previous_hash: String,
    pub hash: String,
    pub difficulty: u32,
    pub nonce: u64,
    pub timestamp: u64,
    pub transactions: Vec<Transaction>,
    pub merkle_root: String,
    pub miner: Address,
    pub miner_rewards: Amount,
}

impl Block {
    /// Assembles a candidate with nonce 0 and the current time. The hash is filled in but will
    /// only meet `difficulty` once mined.
    pub fn new(
        previous_hash: String,
        difficulty: u32,
        transactions: Vec<Transaction>,
        miner: Address,
        miner_rewards: Amount,
    ) -> Self {
        let timestamp = chrono::Utc::now().timestamp_millis() as u64;
        let merkle_root = merkle_root(&transactions);

        let mut block = Block {
            previous_hash,
            hash: String::new(),
            difficulty,
            nonce: 0,
            timestamp,
            transactions,
            merkle_root,
            miner,
            miner_rewards,
        };
        block.hash = block.calculate_hash();
        block
    }

    /// Candidate genesis block: sentinel parent, no transactions.
    pub fn genesis(miner: Address, difficulty: u32, miner_rewards: Amount) -> Self {
        Block::new(
            GENESIS_PREVIOUS_HASH.to_string(),
            difficulty,
            Vec::new(),
            miner,
            miner_rewards,
        )
    }

    /// Rebuilds the candidate at a given time (used by tests and nonce wraparound).
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self.hash = self.calculate_hash();
        self
    }

    pub fn is_genesis(&self) -> bool {
        self.previous_hash == GENESIS_PREVIOUS_HASH
    }

    /// The canonical text covered by the block hash.
    pub fn content_encoding(&self) -> String {
        RecordWriter::new(RECORD_NAME)
            .field("previousHash", &self.previous_hash)
            .field("difficulty", self.difficulty.to_string())
            .field("nonce", self.nonce.to_string())
            .field("timestamp", self.timestamp.to_string())
            .field("merkleRoot", &self.merkle_root)
            .field("miner", &self.miner)
            .field("minerRewards", self.miner_rewards.to_string())
            .finish()
    }

    pub fn calculate_hash(&self) -> String {
        hash_str(&self.content_encoding())
    }

    pub fn calculate_merkle_root(&self) -> String {
        merkle_root(&self.transactions)
    }

    /// True when the claimed hash has at least `difficulty` leading zero hex digits.
    pub fn meets_difficulty(&self) -> bool {
        leading_zero_digits(&self.hash) >= self.difficulty as usize
    }

    pub fn check_hash(&self) -> Result<(), ChainError> {
        let calculated = self.calculate_hash();
        if calculated != self.hash {
            return Err(ChainError::HashMismatch(format!(
                "claimed {}, calculated {}",
                self.hash, calculated
            )));
        }
        Ok(())
    }

    pub fn check_work(&self) -> Result<(), ChainError> {
        if !self.meets_difficulty() {
            return Err(ChainError::InsufficientWork(format!(
                "hash {} has fewer than {} leading zeros",
                self.hash, self.difficulty
            )));
        }
        Ok(())
    }

    pub fn check_merkle_root(&self) -> Result<(), ChainError> {
        let calculated = self.calculate_merkle_root();
        if calculated != self.merkle_root {
            return Err(ChainError::MerkleMismatch(format!(
                "claimed {}, calculated {}",
                self.merkle_root, calculated
            )));
        }
        Ok(())
    }

    /// Recomputes hash and Merkle root and checks the proof of work, without chain context.
    pub fn verify_self_consistency(&self) -> Result<(), ChainError> {
        self.check_hash()?;
        self.check_work()?;
        self.check_merkle_root()
    }

    pub fn to_wire(&self) -> String {
        RecordWriter::new(RECORD_NAME)
            .field("previousHash", &self.previous_hash)
            .field("hash", &self.hash)
            .field("difficulty", self.difficulty.to_string())
            .field("nonce", self.nonce.to_string())
            .field("timestamp", self.timestamp.to_string())
            .field(
                "transactions",
                encode_list(self.transactions.iter().map(Transaction::to_wire)),
            )
            .field("merkleRoot", &self.merkle_root)
            .field("miner", &self.miner)
            .field("minerRewards", self.miner_rewards.to_string())
            .finish()
    }

    /// Decodes the wire form as-is. The claimed hash and Merkle root are kept so the
    /// validator can compare them against recomputed values.
    pub fn from_wire(text: &str) -> Result<Self, ChainError> {
        let mut reader = RecordReader::parse(RECORD_NAME, text)?;
        let previous_hash = reader.next("previousHash")?;
        let hash = reader.next("hash")?;
        let difficulty = reader.next_parsed::<u32>("difficulty")?;
        let nonce = reader.next_parsed::<u64>("nonce")?;
        let timestamp = reader.next_parsed::<u64>("timestamp")?;
        let transactions = decode_list(&reader.next("transactions")?)?
            .iter()
            .map(|tx| Transaction::from_wire(tx))
            .collect::<Result<Vec<_>, _>>()?;
        let merkle_root = reader.next("merkleRoot")?;
        let miner = reader.next("miner")?;
        let miner_rewards = reader.next_parsed::<Amount>("minerRewards")?;
        reader.finish()?;

        Ok(Block {
            previous_hash,
            hash,
            difficulty,
            nonce,
            timestamp,
            transactions,
            merkle_root,
            miner,
            miner_rewards,
        })
    }
}
