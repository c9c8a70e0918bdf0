//! Mock controller backend for testing.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::trace;

use scnp_types::ControllerEvent;

use crate::error::InputError;
use crate::Controller;

/// Shared state for observing what the mock did.
#[derive(Debug, Default)]
struct MockState {
    initialized: bool,
    shutdown: bool,
    grabbed: bool,
    cursor_visible: bool,
    injected: Vec<ControllerEvent>,
    warps: Vec<(i32, i32)>,
}

/// Mock controller backend.
///
/// Tests feed "physical" events through the returned sender; the daemon
/// reads them back via [`Controller::poll`]. Everything the daemon does to
/// the backend is recorded and observable through [`MockControllerHandle`].
pub struct MockController {
    feed_rx: tokio::sync::Mutex<mpsc::Receiver<ControllerEvent>>,
    state: Arc<Mutex<MockState>>,
}

impl MockController {
    /// Create a mock controller and a sender for injecting physical events.
    pub fn new() -> (Self, mpsc::Sender<ControllerEvent>) {
        let (feed_tx, feed_rx) = mpsc::channel(1024);
        let controller = Self {
            feed_rx: tokio::sync::Mutex::new(feed_rx),
            state: Arc::new(Mutex::new(MockState {
                cursor_visible: true,
                ..MockState::default()
            })),
        };
        (controller, feed_tx)
    }

    /// Get a clonable handle for observing the backend from tests.
    pub fn handle(&self) -> MockControllerHandle {
        MockControllerHandle {
            state: Arc::clone(&self.state),
        }
    }
}

/// Clonable observer handle for [`MockController`].
#[derive(Clone)]
pub struct MockControllerHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockControllerHandle {
    pub fn is_initialized(&self) -> bool {
        self.state.lock().unwrap().initialized
    }

    pub fn is_shutdown(&self) -> bool {
        self.state.lock().unwrap().shutdown
    }

    pub fn is_grabbed(&self) -> bool {
        self.state.lock().unwrap().grabbed
    }

    pub fn is_cursor_visible(&self) -> bool {
        self.state.lock().unwrap().cursor_visible
    }

    /// Snapshot of events injected into the local session.
    pub fn injected_events(&self) -> Vec<ControllerEvent> {
        self.state.lock().unwrap().injected.clone()
    }

    /// Snapshot of absolute cursor warps.
    pub fn warps(&self) -> Vec<(i32, i32)> {
        self.state.lock().unwrap().warps.clone()
    }
}

#[async_trait]
impl Controller for MockController {
    async fn init(&self) -> Result<(), InputError> {
        self.state.lock().unwrap().initialized = true;
        Ok(())
    }

    async fn poll(&self) -> Result<ControllerEvent, InputError> {
        let mut feed_rx = self.feed_rx.lock().await;
        feed_rx.recv().await.ok_or(InputError::Closed)
    }

    async fn inject(&self, event: ControllerEvent) -> Result<(), InputError> {
        self.state.lock().unwrap().injected.push(event);
        Ok(())
    }

    async fn set_grabbed(&self, grabbed: bool) -> Result<(), InputError> {
        trace!(grabbed, "mock grab state changed");
        self.state.lock().unwrap().grabbed = grabbed;
        Ok(())
    }

    async fn warp_cursor(&self, x: i32, y: i32) -> Result<(), InputError> {
        self.state.lock().unwrap().warps.push((x, y));
        Ok(())
    }

    async fn set_cursor_visible(&self, visible: bool) -> Result<(), InputError> {
        self.state.lock().unwrap().cursor_visible = visible;
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), InputError> {
        self.state.lock().unwrap().shutdown = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fed_events_come_back_out_of_poll() {
        let (controller, feed) = MockController::new();
        let event = ControllerEvent::key(30, 1);
        feed.send(event).await.unwrap();
        assert_eq!(controller.poll().await.unwrap(), event);
    }

    #[tokio::test]
    async fn poll_fails_once_the_feed_is_dropped() {
        let (controller, feed) = MockController::new();
        drop(feed);
        assert!(matches!(
            controller.poll().await.unwrap_err(),
            InputError::Closed
        ));
    }

    #[tokio::test]
    async fn handle_observes_backend_calls() {
        let (controller, _feed) = MockController::new();
        let handle = controller.handle();

        controller.init().await.unwrap();
        controller.set_grabbed(true).await.unwrap();
        controller.set_cursor_visible(false).await.unwrap();
        controller.warp_cursor(10, 20).await.unwrap();
        controller
            .inject(ControllerEvent::movement(0, 5))
            .await
            .unwrap();
        controller.shutdown().await.unwrap();

        assert!(handle.is_initialized());
        assert!(handle.is_grabbed());
        assert!(!handle.is_cursor_visible());
        assert_eq!(handle.warps(), vec![(10, 20)]);
        assert_eq!(handle.injected_events(), vec![ControllerEvent::movement(0, 5)]);
        assert!(handle.is_shutdown());
    }
}
