//! Daemon errors.

use thiserror::Error;

use scnp_types::PeerId;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("unknown peer: {0}")]
    PeerNotFound(PeerId),

    #[error("unknown interface index: {0}")]
    InterfaceNotFound(usize),

    #[error("already running")]
    AlreadyRunning,

    #[error("not running")]
    NotRunning,

    #[error("protocol error: {0}")]
    Protocol(#[from] scnp_protocol::ProtocolError),

    #[error("input error: {0}")]
    Input(#[from] scnp_input::InputError),

    #[error("store error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
