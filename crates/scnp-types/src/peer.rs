//! Peer descriptors.

use std::fmt;

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::link::LinkAddr;

/// Process-local peer identifier, assigned monotonically by the registry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Encode,
    Decode,
)]
pub struct PeerId(pub u32);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Display resolution of a peer's screen, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::new(1920, 1080)
    }
}

/// Screen offset, reserved for multi-monitor layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Encode, Decode)]
pub struct Offset {
    pub x: i32,
    pub y: i32,
}

/// One machine participating in the shared-control ring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct Peer {
    pub id: PeerId,
    /// Exactly one peer per registry is the local machine.
    pub is_local: bool,
    /// Exactly one peer has focus: the current target of local input.
    pub has_focus: bool,
    pub display_name: String,
    /// Hardware address; meaningless for the local peer.
    pub link_addr: LinkAddr,
    pub resolution: Resolution,
    pub offset: Offset,
}

impl Peer {
    /// Create the local peer. It starts focused: local input applies locally.
    #[must_use]
    pub fn local(id: PeerId, display_name: &str, resolution: Resolution) -> Self {
        Self {
            id,
            is_local: true,
            has_focus: true,
            display_name: display_name.to_string(),
            link_addr: LinkAddr::default(),
            resolution,
            offset: Offset::default(),
        }
    }

    /// Create a newly discovered remote peer.
    #[must_use]
    pub fn remote(id: PeerId, display_name: &str, link_addr: LinkAddr) -> Self {
        Self {
            id,
            is_local: false,
            has_focus: false,
            display_name: display_name.to_string(),
            link_addr,
            resolution: Resolution::default(),
            offset: Offset::default(),
        }
    }
}
