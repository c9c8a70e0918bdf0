//! Protocol and transport errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Malformed or unknown frame on decode.
    #[error("framing error: {0}")]
    Framing(String),

    /// An ack-required send exhausted its retries.
    #[error("acknowledgement timed out after {attempts} attempts")]
    Timeout { attempts: u32 },

    /// OS-level socket failure.
    #[error("socket error: {0}")]
    Socket(#[from] std::io::Error),

    /// The link was torn down while a receive was pending.
    #[error("link closed")]
    LinkClosed,

    /// Unknown interface name or index.
    #[error("unknown interface: {0}")]
    UnknownInterface(String),

    /// A session is already active on the interface.
    #[error("session already running on interface {0}")]
    AlreadyRunning(String),

    /// No session is active on the interface.
    #[error("no session running on interface {0}")]
    NotRunning(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ProtocolError {
    /// Whether this error is a delivery timeout (dropped event, not fatal).
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
