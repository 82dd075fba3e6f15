//! Peer identity URIs.
//!
//! A node describes itself as `enode://<key>@<address>:<port>`. Freshly
//! initialised nodes report the unspecified address, which has to be replaced
//! with the node's reachable address before other nodes can dial it.

use std::fmt;

/// Placeholder address a node reports before it knows where it is reachable.
pub const UNSPECIFIED_ADDRESS: &str = "[::]";

const SCHEME: &str = "enode://";

/// A parsed peer identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerIdentity {
    /// Opaque node public key.
    pub key: String,
    /// Bracketed IPv6 or dotted IPv4 address.
    pub address: String,
    pub port: u16,
}

impl PeerIdentity {
    /// Parse `enode://<key>@<address>:<port>`. Returns `None` for anything else.
    pub fn parse(uri: &str) -> Option<Self> {
        let rest = uri.strip_prefix(SCHEME)?;
        let (key, endpoint) = rest.split_once('@')?;
        let (address, port) = endpoint.rsplit_once(':')?;
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric()) {
            return None;
        }
        if address.is_empty() {
            return None;
        }
        Some(PeerIdentity {
            key: key.to_string(),
            address: address.to_string(),
            port: port.parse().ok()?,
        })
    }

    /// Whether the address is the unspecified placeholder.
    pub fn is_placeholder(&self) -> bool {
        self.address == UNSPECIFIED_ADDRESS || self.address == "0.0.0.0"
    }

    /// The same identity reachable at `address`. Key and port are kept.
    pub fn with_address(&self, address: &str) -> Self {
        PeerIdentity {
            key: self.key.clone(),
            address: address.to_string(),
            port: self.port,
        }
    }
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}@{}:{}", SCHEME, self.key, self.address, self.port)
    }
}
