//! Acknowledge/retry reliability layer over a [`LinkSocket`].
//!
//! Key and ScreenOut packets must be acknowledged; each send makes up to
//! [`SEND_ATTEMPTS`] attempts with a short per-attempt deadline and reports
//! a timeout once they are exhausted. Movement and Management packets are
//! fire-and-forget. Received ack-required packets are acknowledged before
//! they are handed to the caller, and bare acks never surface from
//! [`ReliableTransport::recv`].

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{timeout_at, Instant};
use tracing::{trace, warn};

use scnp_types::{LinkAddr, ScnpPacket};

use crate::codec;
use crate::error::ProtocolError;
use crate::link::LinkSocket;

/// Per-attempt wait for an acknowledgement.
pub const ACK_TIMEOUT: Duration = Duration::from_millis(1);

/// Number of delivery attempts for ack-required packets.
pub const SEND_ATTEMPTS: u32 = 3;

pub struct ReliableTransport {
    link: Arc<dyn LinkSocket>,
    ack_timeout: Duration,
}

impl ReliableTransport {
    #[must_use]
    pub fn new(link: Arc<dyn LinkSocket>) -> Self {
        Self {
            link,
            ack_timeout: ACK_TIMEOUT,
        }
    }

    /// Override the per-attempt ack deadline. Test hook.
    #[must_use]
    pub fn with_ack_timeout(mut self, ack_timeout: Duration) -> Self {
        self.ack_timeout = ack_timeout;
        self
    }

    #[must_use]
    pub fn local_addr(&self) -> LinkAddr {
        self.link.local_addr()
    }

    #[must_use]
    pub fn interface(&self) -> &str {
        self.link.interface()
    }

    /// Send one packet to `dest`, waiting for an acknowledgement when the
    /// packet kind requires one.
    pub async fn send(&self, dest: LinkAddr, packet: &ScnpPacket) -> Result<(), ProtocolError> {
        let frame = codec::encode(packet);
        if !packet.requires_ack() {
            return self.link.send_frame(dest, &frame).await;
        }

        // Subscribe before the first send so an ack racing the send is not
        // lost between attempts.
        let mut sub = self.link.subscribe();
        for attempt in 1..=SEND_ATTEMPTS {
            self.link.send_frame(dest, &frame).await?;
            let deadline = Instant::now() + self.ack_timeout;
            loop {
                let Ok(received) = timeout_at(deadline, sub.recv_frame()).await else {
                    break;
                };
                let (src, payload) = received?;
                if src != dest {
                    continue;
                }
                match codec::decode(&payload) {
                    Ok(ScnpPacket::Ack) => {
                        trace!(kind = packet.kind_name(), dest = %dest, attempt, "acked");
                        return Ok(());
                    }
                    Ok(_) | Err(_) => {}
                }
            }
            trace!(kind = packet.kind_name(), dest = %dest, attempt, "no ack, retrying");
        }
        warn!(kind = packet.kind_name(), dest = %dest, "delivery timed out");
        Err(ProtocolError::Timeout {
            attempts: SEND_ATTEMPTS,
        })
    }

    /// Broadcast one packet. Only valid for fire-and-forget kinds.
    pub async fn broadcast(&self, packet: &ScnpPacket) -> Result<(), ProtocolError> {
        self.link
            .send_frame(LinkAddr::BROADCAST, &codec::encode(packet))
            .await
    }

    /// Receive the next packet. Ack-required packets are acknowledged back
    /// to the sender before returning; bare acks and malformed frames are
    /// skipped.
    pub async fn recv(&self) -> Result<(ScnpPacket, LinkAddr), ProtocolError> {
        loop {
            let (src, payload) = self.link.recv_frame().await?;
            let packet = match codec::decode(&payload) {
                Ok(packet) => packet,
                Err(err) => {
                    warn!(src = %src, error = %err, "dropping malformed frame");
                    continue;
                }
            };
            if packet == ScnpPacket::Ack {
                // Acks are consumed by pending sends, never dispatched.
                continue;
            }
            if packet.requires_ack() {
                self.link
                    .send_frame(src, &codec::encode(&ScnpPacket::Ack))
                    .await?;
            }
            return Ok((packet, src));
        }
    }
}
