//! Client identity keys.

use std::borrow::Borrow;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

/// Identity used when the transport cannot report a peer address.
const FALLBACK_PEER: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// An opaque key scoping all per-client admission state.
///
/// Typically the textual form of the client's network address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    /// Create an identity from any string-like key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Derive an identity from the peer address reported by the transport.
    ///
    /// Requests without a peer address share the loopback identity.
    pub fn from_peer(peer: Option<IpAddr>) -> Self {
        Self(peer.unwrap_or(FALLBACK_PEER).to_string())
    }

    /// The identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ClientIdentity {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ClientIdentity {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for ClientIdentity {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
