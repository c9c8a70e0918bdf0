//! Local control channel.
//!
//! Request/reply contract between the daemon and its front-ends. The message
//! types derive `bincode` codecs so an out-of-process front-end can reuse the
//! contract verbatim; in-process clients go through [`ControlClient`], which
//! pairs each request with a oneshot reply.

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use scnp_types::{Peer, PeerId};

use crate::error::DaemonError;

/// A command sent to the daemon's control worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub enum ControlRequest {
    /// Rebind the transport and advertiser to another interface, by index
    /// into the backend's interface list.
    SetInterface { index: usize },
    GetInterface,
    /// The ring in its current order.
    GetCurrentList,
    /// Every known peer, including ones a front-end may want to re-add.
    GetAllList,
    /// Reorder the ring to follow the given ids.
    SetCurrentList { ids: Vec<PeerId> },
    Start,
    Stop,
    Pause,
    Resume,
    SaveShortcuts,
    /// Reload shortcuts from the store, or restore the built-in defaults.
    LoadShortcuts { reset: bool },
}

/// Machine-readable failure category in an error reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub enum ErrorCode {
    NotFound,
    AlreadyRunning,
    NotRunning,
    Io,
    Internal,
}

impl From<&DaemonError> for ErrorCode {
    fn from(err: &DaemonError) -> Self {
        match err {
            DaemonError::PeerNotFound(_) | DaemonError::InterfaceNotFound(_) => Self::NotFound,
            DaemonError::AlreadyRunning => Self::AlreadyRunning,
            DaemonError::NotRunning => Self::NotRunning,
            DaemonError::Io(_) => Self::Io,
            _ => Self::Internal,
        }
    }
}

/// Payload of a successful reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub enum ReplyValue {
    None,
    Interface { index: usize, name: String },
    Peers(Vec<Peer>),
}

/// The daemon's answer to one [`ControlRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub enum ControlReply {
    Ok(ReplyValue),
    Error { code: ErrorCode, message: String },
}

impl ControlReply {
    #[must_use]
    pub fn ok() -> Self {
        Self::Ok(ReplyValue::None)
    }

    #[must_use]
    pub fn from_error(err: &DaemonError) -> Self {
        Self::Error {
            code: ErrorCode::from(err),
            message: err.to_string(),
        }
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }
}

/// One in-flight request with its reply slot.
pub struct ControlEnvelope {
    pub request: ControlRequest,
    pub reply: oneshot::Sender<ControlReply>,
}

/// Client half of the in-process control channel.
#[derive(Clone)]
pub struct ControlClient {
    tx: mpsc::Sender<ControlEnvelope>,
}

impl ControlClient {
    /// Send one request and wait for the daemon's reply.
    pub async fn request(&self, request: ControlRequest) -> Result<ControlReply, DaemonError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(ControlEnvelope {
                request,
                reply: reply_tx,
            })
            .await
            .map_err(|_| DaemonError::NotRunning)?;
        reply_rx.await.map_err(|_| DaemonError::NotRunning)
    }
}

/// Create the control channel: a client for front-ends and the receiver the
/// daemon's control worker drains.
#[must_use]
pub fn control_channel() -> (ControlClient, mpsc::Receiver<ControlEnvelope>) {
    let (tx, rx) = mpsc::channel(64);
    (ControlClient { tx }, rx)
}
