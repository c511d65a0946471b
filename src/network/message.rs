//! Line protocol spoken between nodes and clients.
//!
//! A request is one line `tag, payload` where the payload is the base64 of the entity's
//! canonical text; messages without a payload are the bare tag. A reply is one line holding the
//! base64 of `Ok`, `Dup`, `Error:<reason>`, `Balance:<amount>` or a chain snapshot.

use crate::blockchain::Block;
use crate::codec::{decode_b64, decode_list, encode_b64, encode_list, RecordReader, RecordWriter};
use crate::crypto::Address;
use crate::error::ChainError;
use crate::transaction::{Amount, Transaction};

use super::peer::Peer;

const PAYLOAD_SEPARATOR: &str = ", ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    GetBalance(Address),
    DoTransact(Transaction),
    JoinNetwork(Peer),
    CloneBlockchain,
    GetCloneChainFrom(Peer),
    StartMining,
    StopMining,
    BroadcastedBlock(Block),
    BroadcastedTransaction(Transaction),
    BroadcastedNewNode(Peer),
}

impl Message {
    pub fn tag(&self) -> &'static str {
        match self {
            Message::GetBalance(_) => "getBalance",
            Message::DoTransact(_) => "doTransact",
            Message::JoinNetwork(_) => "joinNetwork",
            Message::CloneBlockchain => "cloneBlockchain",
            Message::GetCloneChainFrom(_) => "getCloneChainFrom",
            Message::StartMining => "startMining",
            Message::StopMining => "stopMining",
            Message::BroadcastedBlock(_) => "broadcastedBlock",
            Message::BroadcastedTransaction(_) => "broadcastedTransaction",
            Message::BroadcastedNewNode(_) => "broadcastedNewNode",
        }
    }

    fn payload(&self) -> Option<String> {
        match self {
            Message::GetBalance(address) => Some(address.clone()),
            Message::DoTransact(tx) | Message::BroadcastedTransaction(tx) => Some(tx.to_wire()),
            Message::JoinNetwork(peer)
            | Message::GetCloneChainFrom(peer)
            | Message::BroadcastedNewNode(peer) => Some(peer.to_wire()),
            Message::BroadcastedBlock(block) => Some(block.to_wire()),
            Message::CloneBlockchain | Message::StartMining | Message::StopMining => None,
        }
    }

    /// Renders the request line, without the trailing newline.
    pub fn encode(&self) -> String {
        match self.payload() {
            Some(payload) => format!("{}{}{}", self.tag(), PAYLOAD_SEPARATOR, encode_b64(&payload)),
            None => self.tag().to_string(),
        }
    }

    pub fn decode(line: &str) -> Result<Self, ChainError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let (tag, payload) = match line.split_once(PAYLOAD_SEPARATOR) {
            Some((tag, encoded)) => (tag, Some(decode_b64(encoded)?)),
            None => (line, None),
        };

        let required = |payload: Option<String>| {
            payload.ok_or_else(|| ChainError::Codec(format!("'{}' requires a payload", tag)))
        };

        let message = match tag {
            "getBalance" => Message::GetBalance(required(payload)?),
            "doTransact" => Message::DoTransact(Transaction::from_wire(&required(payload)?)?),
            "joinNetwork" => Message::JoinNetwork(Peer::from_wire(&required(payload)?)?),
            "getCloneChainFrom" => {
                Message::GetCloneChainFrom(Peer::from_wire(&required(payload)?)?)
            }
            "broadcastedBlock" => Message::BroadcastedBlock(Block::from_wire(&required(payload)?)?),
            "broadcastedTransaction" => {
                Message::BroadcastedTransaction(Transaction::from_wire(&required(payload)?)?)
            }
            "broadcastedNewNode" => {
                Message::BroadcastedNewNode(Peer::from_wire(&required(payload)?)?)
            }
            "cloneBlockchain" | "startMining" | "stopMining" => {
                if payload.is_some() {
                    return Err(ChainError::Codec(format!("'{}' takes no payload", tag)));
                }
                match tag {
                    "cloneBlockchain" => Message::CloneBlockchain,
                    "startMining" => Message::StartMining,
                    _ => Message::StopMining,
                }
            }
            other => {
                return Err(ChainError::Codec(format!(
                    "unknown message type '{}'",
                    other
                )))
            }
        };
        Ok(message)
    }
}

/// A node's full state as returned to `cloneBlockchain`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSnapshot {
    pub difficulty: u32,
    pub peers: Vec<Peer>,
    pub blocks: Vec<Block>,
}

impl ChainSnapshot {
    const RECORD_NAME: &'static str = "Blockchain";

    pub fn to_wire(&self) -> String {
        RecordWriter::new(Self::RECORD_NAME)
            .field("difficulty", self.difficulty.to_string())
            .field("peers", encode_list(self.peers.iter().map(Peer::to_wire)))
            .field("chain", encode_list(self.blocks.iter().map(Block::to_wire)))
            .finish()
    }

    pub fn from_wire(text: &str) -> Result<Self, ChainError> {
        let mut reader = RecordReader::parse(Self::RECORD_NAME, text)?;
        let difficulty = reader.next_parsed::<u32>("difficulty")?;
        let peers = decode_list(&reader.next("peers")?)?
            .iter()
            .map(|p| Peer::from_wire(p))
            .collect::<Result<Vec<_>, _>>()?;
        let blocks = decode_list(&reader.next("chain")?)?
            .iter()
            .map(|b| Block::from_wire(b))
            .collect::<Result<Vec<_>, _>>()?;
        reader.finish()?;

        Ok(Self {
            difficulty,
            peers,
            blocks,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ok,
    Dup,
    Error(String),
    Balance(Amount),
    Chain(ChainSnapshot),
}

impl Reply {
    /// Renders the reply line, without the trailing newline.
    pub fn encode(&self) -> String {
        let text = match self {
            Reply::Ok => "Ok".to_string(),
            Reply::Dup => "Dup".to_string(),
            Reply::Error(reason) => format!("Error:{}", reason),
            Reply::Balance(amount) => format!("Balance:{}", amount),
            Reply::Chain(snapshot) => snapshot.to_wire(),
        };
        encode_b64(&text)
    }

    pub fn decode(line: &str) -> Result<Self, ChainError> {
        let text = decode_b64(line.trim_end_matches(['\r', '\n']))?;
        if text == "Ok" {
            return Ok(Reply::Ok);
        }
        if text == "Dup" {
            return Ok(Reply::Dup);
        }
        if let Some(reason) = text.strip_prefix("Error:") {
            return Ok(Reply::Error(reason.to_string()));
        }
        if let Some(amount) = text.strip_prefix("Balance:") {
            let amount = amount
                .parse::<Amount>()
                .map_err(|e| ChainError::Codec(format!("invalid balance '{}': {}", amount, e)))?;
            return Ok(Reply::Balance(amount));
        }
        if text.starts_with(ChainSnapshot::RECORD_NAME) {
            return Ok(Reply::Chain(ChainSnapshot::from_wire(&text)?));
        }
        Err(ChainError::Codec(format!("unrecognised reply '{}'", text)))
    }

    /// Maps a submission result onto the wire: duplicates become `Dup`, other failures `Error`.
    pub fn from_result(result: Result<(), ChainError>) -> Self {
        match result {
            Ok(()) => Reply::Ok,
            Err(e) if e.is_duplicate() => Reply::Dup,
            Err(e) => Reply::Error(e.to_string()),
        }
    }
}
