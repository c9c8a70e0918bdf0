//! Controller event types.
//!
//! Platform-agnostic representation of the events the Controller I/O
//! collaborator polls and injects. `code` and `value` follow the evdev
//! convention: key events carry the key code and a press state, movement
//! events carry an axis code and a relative delta.

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Key state values carried in a key event's `value` field.
pub mod key_state {
    pub const RELEASED: i32 = 0;
    pub const PRESSED: i32 = 1;
    /// Auto-repeat while a key is held. Ignored by shortcut matching.
    pub const REPEATED: i32 = 2;
}

/// Axis codes carried in a movement event's `code` field.
pub mod axis {
    pub const X: u16 = 0;
    pub const Y: u16 = 1;
}

/// Broad class of an input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode)]
pub enum InputClass {
    Key,
    Mouse,
}

/// One input event polled from or injected into the Controller collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct ControllerEvent {
    pub class: InputClass,
    /// Raw event subtype from the platform backend.
    pub kind: u16,
    pub code: u16,
    pub value: i32,
}

impl ControllerEvent {
    /// A key event: `value` is one of the [`key_state`] constants.
    #[must_use]
    pub fn key(code: u16, value: i32) -> Self {
        Self {
            class: InputClass::Key,
            kind: 0,
            code,
            value,
        }
    }

    /// A relative movement event along one [`axis`].
    #[must_use]
    pub fn movement(code: u16, value: i32) -> Self {
        Self {
            class: InputClass::Mouse,
            kind: 0,
            code,
            value,
        }
    }

    #[must_use]
    pub fn is_key(&self) -> bool {
        self.class == InputClass::Key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_class() {
        assert_eq!(ControllerEvent::key(30, key_state::PRESSED).class, InputClass::Key);
        assert_eq!(ControllerEvent::movement(axis::X, -3).class, InputClass::Mouse);
    }

    #[test]
    fn event_bincode_roundtrip() {
        let event = ControllerEvent::key(30, key_state::REPEATED);
        let config = bincode::config::standard();
        let bytes = bincode::encode_to_vec(event, config).unwrap();
        let (decoded, _): (ControllerEvent, _) =
            bincode::decode_from_slice(&bytes, config).unwrap();
        assert_eq!(event, decoded);
    }
}
