//! Link-layer transport and wire protocol for scnp.
//!
//! This crate handles the SCNP wire codec (compact network-byte-order
//! frames), the link socket abstraction with its in-memory and UDP backends,
//! the acknowledge/retry reliability layer, and the per-interface session
//! advertiser.

pub mod advertiser;
pub mod codec;
pub mod error;
pub mod link;
pub mod memory;
pub mod transport;
pub mod udp;

pub use advertiser::{SessionAdvertiser, HEARTBEAT};
pub use error::ProtocolError;
pub use link::{LinkBackend, LinkSocket, LinkSubscription};
pub use memory::{MemoryEndpoint, MemoryHub};
pub use transport::{ReliableTransport, ACK_TIMEOUT, SEND_ATTEMPTS};
pub use udp::{UdpInterface, UdpLinkBackend};
