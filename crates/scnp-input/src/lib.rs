//! Platform-abstracted controller access for scnp.
//!
//! This crate defines the [`Controller`] trait that platform backends must
//! implement: reading events from the shared keyboard and mouse, injecting
//! remote events locally, and managing grab/cursor state during hand-offs.
//! An in-memory mock backend is provided for the daemon's tests.

use async_trait::async_trait;

use scnp_types::ControllerEvent;

pub mod error;
pub mod mock;

pub use error::InputError;
pub use mock::{MockController, MockControllerHandle};

/// Access to the machine's shared keyboard and mouse.
///
/// All methods take `&self`; the daemon polls events from one worker while
/// another injects remote events, sharing a single backend handle.
#[async_trait]
pub trait Controller: Send + Sync + 'static {
    /// Open the underlying devices. Called once before any other method.
    async fn init(&self) -> Result<(), InputError>;

    /// Wait for the next event from the physical devices.
    async fn poll(&self) -> Result<ControllerEvent, InputError>;

    /// Replay an event received from a peer into the local session.
    async fn inject(&self, event: ControllerEvent) -> Result<(), InputError>;

    /// Grab or release the physical devices. While grabbed, events still
    /// reach [`Controller::poll`] but no longer reach local applications.
    async fn set_grabbed(&self, grabbed: bool) -> Result<(), InputError>;

    /// Move the cursor to an absolute screen position.
    async fn warp_cursor(&self, x: i32, y: i32) -> Result<(), InputError>;

    /// Show or hide the local cursor.
    async fn set_cursor_visible(&self, visible: bool) -> Result<(), InputError>;

    /// Release devices and tear the backend down.
    async fn shutdown(&self) -> Result<(), InputError>;
}
