//! Link socket abstraction.
//!
//! The daemon speaks SCNP over raw link-layer frames addressed by 6-byte
//! hardware address. Backends implement [`LinkSocket`]; the workspace ships
//! a UDP-encapsulating backend for deployment and an in-memory hub for
//! tests. The transport's short-lived ack wait uses [`LinkSocket::subscribe`]
//! to observe inbound traffic independently of the main receive path.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use scnp_types::LinkAddr;

use crate::error::ProtocolError;

/// An inbound frame: sender hardware address plus SCNP payload.
pub type InboundFrame = (LinkAddr, Vec<u8>);

/// A socket bound to one network interface, sending and receiving SCNP
/// frames by hardware address.
#[async_trait]
pub trait LinkSocket: Send + Sync + 'static {
    /// Hardware address this socket answers to.
    fn local_addr(&self) -> LinkAddr;

    /// Name of the interface this socket is bound to.
    fn interface(&self) -> &str;

    /// Send one frame to `dest` (which may be [`LinkAddr::BROADCAST`]).
    async fn send_frame(&self, dest: LinkAddr, payload: &[u8]) -> Result<(), ProtocolError>;

    /// Receive the next inbound frame addressed to this socket.
    async fn recv_frame(&self) -> Result<InboundFrame, ProtocolError>;

    /// Open an independent view of inbound traffic on the same interface.
    fn subscribe(&self) -> LinkSubscription;
}

/// Independent inbound-frame subscription, used for ack waits.
pub struct LinkSubscription {
    rx: mpsc::UnboundedReceiver<InboundFrame>,
}

impl LinkSubscription {
    /// Receive the next frame seen on the interface.
    pub async fn recv_frame(&mut self) -> Result<InboundFrame, ProtocolError> {
        self.rx.recv().await.ok_or(ProtocolError::LinkClosed)
    }
}

/// Fans inbound frames out to the main receive queue and any live
/// subscriptions. Shared by all [`LinkSocket`] backends.
pub(crate) struct FrameFanout {
    main_tx: mpsc::UnboundedSender<InboundFrame>,
    main_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<InboundFrame>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<InboundFrame>>>,
}

impl FrameFanout {
    pub(crate) fn new() -> Arc<Self> {
        let (main_tx, main_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            main_tx,
            main_rx: tokio::sync::Mutex::new(main_rx),
            subscribers: Mutex::new(Vec::new()),
        })
    }

    /// Deliver one inbound frame to every consumer.
    pub(crate) fn deliver(&self, frame: &InboundFrame) {
        let _ = self.main_tx.send(frame.clone());
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain(|tx| tx.send(frame.clone()).is_ok());
    }

    pub(crate) async fn recv(&self) -> Result<InboundFrame, ProtocolError> {
        let mut rx = self.main_rx.lock().await;
        rx.recv().await.ok_or(ProtocolError::LinkClosed)
    }

    pub(crate) fn subscribe(&self) -> LinkSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().unwrap().push(tx);
        LinkSubscription { rx }
    }
}

/// Provides the interface list and opens [`LinkSocket`]s on them.
#[async_trait]
pub trait LinkBackend: Send + Sync + 'static {
    /// Names of the interfaces this backend can bind, in a stable order.
    fn interfaces(&self) -> Vec<String>;

    /// Bind a socket on the named interface. Bind failure is fatal to
    /// daemon startup.
    async fn open(&self, interface: &str) -> Result<Arc<dyn LinkSocket>, ProtocolError>;
}
