//! Hand-off and run state.

use scnp_types::PeerId;

/// Whether local physical input applies locally or is forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusState {
    /// This machine owns physical input.
    Here,
    /// A remote peer is focused; local input is captured and forwarded.
    Away,
}

impl FocusState {
    #[must_use]
    pub fn is_away(self) -> bool {
        self == Self::Away
    }
}

impl std::fmt::Display for FocusState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Here => write!(f, "here"),
            Self::Away => write!(f, "away"),
        }
    }
}

/// Lifecycle of the daemon's worker set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    /// Only the control channel is serviced until resume or stop.
    Paused,
    Stopped,
}

/// The "waiting for egress" gate armed around a hand-off exchange.
///
/// The gate itself is a plain boolean; the expected sender is kept only so
/// a mismatched Egress can be logged with the peer it came from.
#[derive(Debug, Default)]
pub struct HandoffGate {
    waiting: bool,
    expected_from: Option<PeerId>,
}

impl HandoffGate {
    pub fn arm(&mut self, expected_from: PeerId) {
        self.waiting = true;
        self.expected_from = Some(expected_from);
    }

    /// Clear the gate, returning the peer it was armed for.
    pub fn disarm(&mut self) -> Option<PeerId> {
        self.waiting = false;
        self.expected_from.take()
    }

    #[must_use]
    pub fn is_waiting(&self) -> bool {
        self.waiting
    }

    #[must_use]
    pub fn expected_from(&self) -> Option<PeerId> {
        self.expected_from
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_arms_and_disarms() {
        let mut gate = HandoffGate::default();
        assert!(!gate.is_waiting());

        gate.arm(PeerId(3));
        assert!(gate.is_waiting());
        assert_eq!(gate.expected_from(), Some(PeerId(3)));

        assert_eq!(gate.disarm(), Some(PeerId(3)));
        assert!(!gate.is_waiting());
        assert_eq!(gate.expected_from(), None);
    }

    #[test]
    fn focus_state_predicates() {
        assert!(FocusState::Away.is_away());
        assert!(!FocusState::Here.is_away());
        assert_eq!(FocusState::Here.to_string(), "here");
    }
}
