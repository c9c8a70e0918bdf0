//! Shortcut step definitions.

use std::time::Duration;

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Code matching any key in a shortcut step.
pub const WILDCARD_CODE: u16 = u16::MAX;

/// Which way focus moves when a shortcut or edge gesture fires.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode, Default,
)]
pub enum ExitDirection {
    Left,
    Right,
    #[default]
    None,
}

/// One step of an ordered shortcut sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortcutStep {
    /// Expected key code, or [`WILDCARD_CODE`] to match any key.
    pub code: u16,
    /// Expected key state (see [`crate::event::key_state`]).
    pub state: i32,
    /// Maximum time since the previous step; `None` means no timeout.
    pub timeout: Option<Duration>,
}

impl ShortcutStep {
    #[must_use]
    pub fn new(code: u16, state: i32, timeout: Option<Duration>) -> Self {
        Self {
            code,
            state,
            timeout,
        }
    }
}
