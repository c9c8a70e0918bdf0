//! SCNP packet variants.
//!
//! These are the five packet kinds carried on the shared link. The wire
//! codec lives in `scnp-protocol`; this module only defines the value types
//! and the acknowledgement policy.

/// Fixed size of the Management payload: raw hostname bytes, zero-padded.
pub const HOSTNAME_LEN: usize = 64;

/// Direction of a screen-edge hand-off signal.
///
/// Egress announces a cursor leaving a screen; Ingress requests cursor
/// placement on arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenDirection {
    Egress,
    Ingress,
}

/// Which vertical screen edge a hand-off crosses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenSide {
    Left,
    Right,
}

impl ScreenSide {
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

/// One SCNP packet.
#[derive(Debug, Clone, PartialEq)]
pub enum ScnpPacket {
    /// A key press, release, or repeat.
    Key { code: u16, pressed: bool, repeated: bool },

    /// Relative movement along one axis.
    Movement { code: u16, value: i32 },

    /// Screen-edge hand-off signal. `height` is the vertical position of the
    /// crossing as a fraction of the screen height, in `[0, 1]`.
    ScreenOut {
        direction: ScreenDirection,
        side: ScreenSide,
        height: f32,
    },

    /// Liveness beacon carrying the sender's hostname.
    Management { hostname: String },

    /// Acknowledgement of a received Key or ScreenOut.
    Ack,
}

impl ScnpPacket {
    /// Whether this packet kind must be acknowledged by the receiver.
    #[must_use]
    pub fn requires_ack(&self) -> bool {
        matches!(self, Self::Key { .. } | Self::ScreenOut { .. })
    }

    /// Short name of the packet kind, for logging.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Key { .. } => "key",
            Self::Movement { .. } => "movement",
            Self::ScreenOut { .. } => "screen-out",
            Self::Management { .. } => "management",
            Self::Ack => "ack",
        }
    }
}
