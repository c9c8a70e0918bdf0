//! Link-layer addressing.

use std::fmt;
use std::str::FromStr;

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// EtherType used to tag SCNP frames on the shared link.
pub const ETHERTYPE: u16 = 0x8888;

/// A 6-byte link-layer hardware address.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode, Default,
)]
pub struct LinkAddr(pub [u8; 6]);

impl LinkAddr {
    /// The all-ones broadcast address.
    pub const BROADCAST: LinkAddr = LinkAddr([0xFF; 6]);

    #[must_use]
    pub fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    #[must_use]
    pub fn is_broadcast(self) -> bool {
        self == Self::BROADCAST
    }

    #[must_use]
    pub fn octets(self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for LinkAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

/// Error parsing a textual link address.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid link address: {0}")]
pub struct ParseLinkAddrError(String);

impl FromStr for LinkAddr {
    type Err = ParseLinkAddrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; 6];
        let mut parts = s.split(':');
        for octet in &mut octets {
            let part = parts
                .next()
                .ok_or_else(|| ParseLinkAddrError(s.to_string()))?;
            *octet =
                u8::from_str_radix(part, 16).map_err(|_| ParseLinkAddrError(s.to_string()))?;
        }
        if parts.next().is_some() {
            return Err(ParseLinkAddrError(s.to_string()));
        }
        Ok(Self(octets))
    }
}
