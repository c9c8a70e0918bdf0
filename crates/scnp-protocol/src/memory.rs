//! In-memory link hub for tests.
//!
//! A [`MemoryHub`] connects any number of endpoints attached to the same
//! interface name. Unicast frames are delivered to the matching endpoint;
//! broadcast frames fan out to every other endpoint. Frames addressed to an
//! unknown endpoint are silently dropped, matching the unreliable link.

use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;

use scnp_types::LinkAddr;

use crate::error::ProtocolError;
use crate::link::{FrameFanout, InboundFrame, LinkBackend, LinkSocket, LinkSubscription};

struct Attached {
    interface: String,
    addr: LinkAddr,
    fanout: Weak<FrameFanout>,
}

struct HubState {
    links: Vec<Attached>,
}

/// Shared in-process hub a set of [`MemoryEndpoint`]s attach to.
#[derive(Clone)]
pub struct MemoryHub {
    state: Arc<Mutex<HubState>>,
    interfaces: Vec<String>,
}

impl MemoryHub {
    #[must_use]
    pub fn new(interfaces: &[&str]) -> Self {
        Self {
            state: Arc::new(Mutex::new(HubState { links: Vec::new() })),
            interfaces: interfaces.iter().map(ToString::to_string).collect(),
        }
    }

    /// A backend view of the hub for one machine with the given address.
    #[must_use]
    pub fn endpoint(&self, addr: LinkAddr) -> MemoryEndpoint {
        MemoryEndpoint {
            hub: self.clone(),
            addr,
        }
    }

    fn route(&self, interface: &str, src: LinkAddr, dest: LinkAddr, payload: &[u8]) {
        let frame: InboundFrame = (src, payload.to_vec());
        let mut state = self.state.lock().unwrap();
        state.links.retain(|link| link.fanout.strong_count() > 0);
        for link in &state.links {
            if link.interface != interface || link.addr == src {
                continue;
            }
            if dest.is_broadcast() || link.addr == dest {
                if let Some(fanout) = link.fanout.upgrade() {
                    fanout.deliver(&frame);
                }
            }
        }
    }
}

/// One machine's attachment point to a [`MemoryHub`].
pub struct MemoryEndpoint {
    hub: MemoryHub,
    addr: LinkAddr,
}

#[async_trait]
impl LinkBackend for MemoryEndpoint {
    fn interfaces(&self) -> Vec<String> {
        self.hub.interfaces.clone()
    }

    async fn open(&self, interface: &str) -> Result<Arc<dyn LinkSocket>, ProtocolError> {
        if !self.hub.interfaces.iter().any(|name| name == interface) {
            return Err(ProtocolError::UnknownInterface(interface.to_string()));
        }
        let fanout = FrameFanout::new();
        self.hub.state.lock().unwrap().links.push(Attached {
            interface: interface.to_string(),
            addr: self.addr,
            fanout: Arc::downgrade(&fanout),
        });
        Ok(Arc::new(MemoryLink {
            hub: self.hub.clone(),
            interface: interface.to_string(),
            addr: self.addr,
            fanout,
        }))
    }
}

struct MemoryLink {
    hub: MemoryHub,
    interface: String,
    addr: LinkAddr,
    fanout: Arc<FrameFanout>,
}

#[async_trait]
impl LinkSocket for MemoryLink {
    fn local_addr(&self) -> LinkAddr {
        self.addr
    }

    fn interface(&self) -> &str {
        &self.interface
    }

    async fn send_frame(&self, dest: LinkAddr, payload: &[u8]) -> Result<(), ProtocolError> {
        self.hub.route(&self.interface, self.addr, dest, payload);
        Ok(())
    }

    async fn recv_frame(&self) -> Result<InboundFrame, ProtocolError> {
        self.fanout.recv().await
    }

    fn subscribe(&self) -> LinkSubscription {
        self.fanout.subscribe()
    }
}
