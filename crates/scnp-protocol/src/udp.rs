//! UDP-encapsulated link backend.
//!
//! Wraps each SCNP frame in a small link header and ships it as a UDP
//! broadcast datagram on the segment, preserving hardware addressing on top
//! of an ordinary socket:
//!
//! ```text
//! [dst:6][src:6][ethertype:2][scnp payload...]
//! ```
//!
//! The receiver drops datagrams with a foreign ethertype, datagrams not
//! addressed to it, and its own broadcasts echoed back by the network.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use scnp_types::{LinkAddr, ETHERTYPE};

use crate::error::ProtocolError;
use crate::link::{FrameFanout, InboundFrame, LinkBackend, LinkSocket, LinkSubscription};

const HEADER_LEN: usize = 14;
const MAX_DATAGRAM: usize = 2048;

/// Description of one bindable interface.
#[derive(Debug, Clone)]
pub struct UdpInterface {
    /// Interface name shown to operators.
    pub name: String,
    /// Hardware address this machine uses on the interface.
    pub addr: LinkAddr,
    /// Local address to bind the UDP socket on.
    pub bind: SocketAddr,
    /// Destination all frames are sent to, normally a broadcast address.
    pub broadcast: SocketAddr,
}

/// [`LinkBackend`] encapsulating frames in UDP broadcast datagrams.
pub struct UdpLinkBackend {
    interfaces: Vec<UdpInterface>,
}

impl UdpLinkBackend {
    #[must_use]
    pub fn new(interfaces: Vec<UdpInterface>) -> Self {
        Self { interfaces }
    }
}

#[async_trait]
impl LinkBackend for UdpLinkBackend {
    fn interfaces(&self) -> Vec<String> {
        self.interfaces.iter().map(|i| i.name.clone()).collect()
    }

    async fn open(&self, interface: &str) -> Result<Arc<dyn LinkSocket>, ProtocolError> {
        let config = self
            .interfaces
            .iter()
            .find(|i| i.name == interface)
            .ok_or_else(|| ProtocolError::UnknownInterface(interface.to_string()))?
            .clone();

        let socket = UdpSocket::bind(config.bind).await?;
        socket.set_broadcast(true)?;
        let socket = Arc::new(socket);
        debug!(interface = %config.name, bind = %config.bind, addr = %config.addr, "link bound");

        let fanout = FrameFanout::new();
        let reader = spawn_reader(Arc::clone(&socket), Arc::clone(&fanout), config.addr);

        Ok(Arc::new(UdpLink {
            config,
            socket,
            fanout,
            reader,
        }))
    }
}

fn spawn_reader(
    socket: Arc<UdpSocket>,
    fanout: Arc<FrameFanout>,
    local: LinkAddr,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut buf = [0u8; MAX_DATAGRAM];
        loop {
            let len = match socket.recv(&mut buf).await {
                Ok(len) => len,
                Err(err) => {
                    warn!(error = %err, "link receive failed, stopping reader");
                    return;
                }
            };
            if let Some(frame) = parse_frame(&buf[..len], local) {
                fanout.deliver(&frame);
            }
        }
    })
}

fn parse_frame(datagram: &[u8], local: LinkAddr) -> Option<InboundFrame> {
    if datagram.len() < HEADER_LEN {
        trace!(len = datagram.len(), "runt datagram dropped");
        return None;
    }
    let mut dst = [0u8; 6];
    let mut src = [0u8; 6];
    dst.copy_from_slice(&datagram[0..6]);
    src.copy_from_slice(&datagram[6..12]);
    let dst = LinkAddr::new(dst);
    let src = LinkAddr::new(src);
    let ethertype = u16::from_be_bytes([datagram[12], datagram[13]]);

    if ethertype != ETHERTYPE {
        return None;
    }
    // Our own broadcasts come back on a broadcast socket.
    if src == local {
        return None;
    }
    if !dst.is_broadcast() && dst != local {
        return None;
    }
    Some((src, datagram[HEADER_LEN..].to_vec()))
}

struct UdpLink {
    config: UdpInterface,
    socket: Arc<UdpSocket>,
    fanout: Arc<FrameFanout>,
    reader: JoinHandle<()>,
}

impl Drop for UdpLink {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

#[async_trait]
impl LinkSocket for UdpLink {
    fn local_addr(&self) -> LinkAddr {
        self.config.addr
    }

    fn interface(&self) -> &str {
        &self.config.name
    }

    async fn send_frame(&self, dest: LinkAddr, payload: &[u8]) -> Result<(), ProtocolError> {
        let mut datagram = Vec::with_capacity(HEADER_LEN + payload.len());
        datagram.extend_from_slice(&dest.octets());
        datagram.extend_from_slice(&self.config.addr.octets());
        datagram.extend_from_slice(&ETHERTYPE.to_be_bytes());
        datagram.extend_from_slice(payload);
        // Unicast frames still go out on the broadcast address; the
        // destination field filters on the receive side.
        self.socket.send_to(&datagram, self.config.broadcast).await?;
        Ok(())
    }

    async fn recv_frame(&self) -> Result<InboundFrame, ProtocolError> {
        self.fanout.recv().await
    }

    fn subscribe(&self) -> LinkSubscription {
        self.fanout.subscribe()
    }
}
