//! Extraction of structured values from tool output.
//!
//! Each `Grammar` names one value the pipeline reads out of command output,
//! with an explicit pattern. Extraction reports no match and ambiguous match
//! as distinct errors: repeated matches are fine as long as they agree on
//! the value (for peer identities, on the node key), anything else is
//! refused rather than silently picking one.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::types::peer::PeerIdentity;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("no {what} found in output: {excerpt}")]
    NoMatch { what: &'static str, excerpt: String },
    #[error("ambiguous {what} in output, candidates: {}", candidates.join(", "))]
    Ambiguous {
        what: &'static str,
        candidates: Vec<String>,
    },
}

/// A value that can be pulled out of command output.
pub trait Grammar {
    type Output;

    /// Human-readable name, used in errors.
    const WHAT: &'static str;

    fn pattern() -> &'static Regex;

    /// Turn one raw match into a value.
    fn convert(matched: &str) -> Option<Self::Output>;

    /// Key two values must share to count as the same match.
    fn identity(value: &Self::Output) -> String;

    /// Extract exactly one value from `output`.
    fn extract(output: &str) -> Result<Self::Output, ParseError> {
        let mut found: Option<Self::Output> = None;
        let mut candidates: Vec<String> = Vec::new();
        for m in Self::pattern().find_iter(output) {
            let Some(value) = Self::convert(m.as_str()) else {
                continue;
            };
            let key = Self::identity(&value);
            if !candidates.contains(&key) {
                candidates.push(key);
            }
            if found.is_none() {
                found = Some(value);
            }
        }
        match found {
            None => Err(ParseError::NoMatch {
                what: Self::WHAT,
                excerpt: excerpt(output),
            }),
            Some(_) if candidates.len() > 1 => Err(ParseError::Ambiguous {
                what: Self::WHAT,
                candidates,
            }),
            Some(value) => Ok(value),
        }
    }
}

fn excerpt(output: &str) -> String {
    const LIMIT: usize = 120;
    let trimmed = output.trim();
    match trimmed.char_indices().nth(LIMIT) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}


// ---------------------------------------------------------------------------
// Account address
// ---------------------------------------------------------------------------

/// `{<hex>}` as printed by `account new`; the braces are trimmed.
pub struct AccountAddress;

impl Grammar for AccountAddress {
    type Output = String;
    const WHAT: &'static str = "account address";

    fn pattern() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| Regex::new(r"\{[A-Za-z0-9]+\}").expect("valid regex"))
    }

    fn convert(matched: &str) -> Option<String> {
        Some(matched[1..matched.len() - 1].to_string())
    }

    fn identity(value: &String) -> String {
        value.to_ascii_lowercase()
    }
}


// ---------------------------------------------------------------------------
// Peer identity
// ---------------------------------------------------------------------------

/// `enode://<key>@<[::] | dotted quad>:<port>`.
pub struct PeerIdentityUri;

impl Grammar for PeerIdentityUri {
    type Output = PeerIdentity;
    const WHAT: &'static str = "peer identity";

    fn pattern() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| {
            Regex::new(r"enode://[A-Za-z0-9]+@(\[::\]|[0-9]{1,3}(\.[0-9]{1,3}){3}):[0-9]+")
                .expect("valid regex")
        })
    }

    fn convert(matched: &str) -> Option<PeerIdentity> {
        PeerIdentity::parse(matched)
    }

    fn identity(value: &PeerIdentity) -> String {
        value.key.clone()
    }
}
