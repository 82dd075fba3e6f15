//! Per-node credentials.

use serde::{Deserialize, Serialize};

/// The account generated for exactly one node.
///
/// `raw` is the keystore file content with double quotes already escaped, so
/// it can be embedded in a double-quoted shell string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub address: String,
    pub raw: String,
}

impl Wallet {
    /// Build a wallet from an address and the unescaped keystore content.
    pub fn new(address: impl Into<String>, keystore: &str) -> Self {
        Wallet {
            address: address.into(),
            raw: escape_quotes(keystore),
        }
    }
}

/// Escape double quotes for embedding in `"..."`.
pub fn escape_quotes(s: &str) -> String {
    s.replace('"', "\\\"")
}

/// Comma-joined addresses in node order, the value every node unlocks.
pub fn unlock_list(wallets: &[Wallet]) -> String {
    wallets
        .iter()
        .map(|w| w.address.as_str())
        .collect::<Vec<_>>()
        .join(",")
}
