//! The scnp daemon: peer discovery, shortcut recognition, and the HERE/AWAY
//! hand-off state machine over the shared-control network protocol.
//!
//! [`Daemon`] is assembled from a [`LinkBackend`](scnp_protocol::LinkBackend)
//! and a [`Controller`](scnp_input::Controller), runs until stopped, and is
//! steered through the [`ControlClient`] returned at construction.

pub mod combo;
pub mod config;
pub mod control;
pub mod daemon;
pub mod error;
pub mod registry;
pub mod state;
pub mod store;

pub use combo::{ComboAction, ComboMatcher, EdgeMatcher, Fired, SequenceMatcher};
pub use config::{
    load_config, Config, DaemonConfig, IdentityConfig, LinkConfig, ShortcutConfig, StepConfig,
};
pub use control::{
    control_channel, ControlClient, ControlEnvelope, ControlReply, ControlRequest, ErrorCode,
    ReplyValue,
};
pub use daemon::{Daemon, DaemonStatus, Timings};
pub use error::DaemonError;
pub use registry::{LivenessMap, PeerRegistry, LIVENESS_TIMEOUT};
pub use state::{FocusState, HandoffGate, RunState};
