//! Shared types for scnp.
//!
//! This crate contains all types shared across the scnp workspace: link-layer
//! addresses, peer descriptors, SCNP packets, controller events, and shortcut
//! step definitions.

pub mod event;
pub mod link;
pub mod packet;
pub mod peer;
pub mod shortcut;

pub use event::{axis, key_state, ControllerEvent, InputClass};
pub use link::{LinkAddr, ETHERTYPE};
pub use packet::{ScnpPacket, ScreenDirection, ScreenSide, HOSTNAME_LEN};
pub use peer::{Offset, Peer, PeerId, Resolution};
pub use shortcut::{ExitDirection, ShortcutStep, WILDCARD_CODE};
