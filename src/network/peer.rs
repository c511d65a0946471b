use crate::codec::{RecordReader, RecordWriter};
use crate::crypto::Address;
use crate::error::ChainError;

const RECORD_NAME: &str = "Peer";

/// A node's reachable endpoint plus the wallet address it declared, if any.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Peer {
    pub host: String,
    pub port: u16,
    pub address: Option<Address>,
}

impl Peer {
    pub fn new(host: String, port: u16) -> Self {
        Self {
            host,
            port,
            address: None,
        }
    }

    pub fn with_address(mut self, address: Address) -> Self {
        self.address = Some(address);
        self
    }

    /// `host:port`, the identity peers are deduplicated by.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn to_wire(&self) -> String {
        RecordWriter::new(RECORD_NAME)
            .field("host", &self.host)
            .field("port", self.port.to_string())
            .field("address", self.address.as_deref().unwrap_or(""))
            .finish()
    }

    pub fn from_wire(text: &str) -> Result<Self, ChainError> {
        let mut reader = RecordReader::parse(RECORD_NAME, text)?;
        let host = reader.next("host")?;
        let port = reader.next_parsed::<u16>("port")?;
        let address = reader.next("address")?;
        reader.finish()?;

        if host.is_empty() {
            return Err(ChainError::Codec("Peer record without host".to_string()));
        }

        Ok(Peer {
            host,
            port,
            address: if address.is_empty() {
                None
            } else {
                Some(address)
            },
        })
    }
}

impl std::fmt::Display for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.addr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_wire_form() {
        let peer = Peer::new("127.0.0.1".to_string(), 8333);
        assert_eq!(peer.to_wire(), "Peer [host:MTI3LjAuMC4x, port:ODMzMw==, address:]");
        assert_eq!(Peer::from_wire(&peer.to_wire()).unwrap(), peer);

        let declared = peer.with_address("02ff".to_string());
        assert_eq!(Peer::from_wire(&declared.to_wire()).unwrap(), declared);
    }

    #[test]
    fn test_peer_without_host_rejected() {
        let text = RecordWriter::new(RECORD_NAME)
            .field("host", "")
            .field("port", "1")
            .field("address", "")
            .finish();
        assert!(matches!(Peer::from_wire(&text), Err(ChainError::Codec(_))));
    }
}
