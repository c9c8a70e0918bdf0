//! End-to-end daemon tests over an in-memory link.
//!
//! Each test wires one or two daemons to a shared [`MemoryHub`] with mock
//! controllers, drives physical input through the mock feed, and observes
//! the other side's backend and the status watch.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use scnp_daemon::{
    Config, ControlClient, ControlReply, ControlRequest, Daemon, DaemonError, DaemonStatus,
    ErrorCode, FocusState, IdentityConfig, ReplyValue, Timings,
};
use scnp_input::{Controller, MockController, MockControllerHandle};
use scnp_protocol::MemoryHub;
use scnp_types::{axis, key_state, ControllerEvent, LinkAddr};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn addr(last: u8) -> LinkAddr {
    LinkAddr::new([2, 0, 0, 0, 0, last])
}

fn test_timings() -> Timings {
    Timings {
        ack_timeout: Duration::from_millis(50),
        heartbeat: Duration::from_millis(25),
        liveness_timeout: Duration::from_secs(10),
    }
}

struct TestDaemon {
    client: ControlClient,
    status: watch::Receiver<DaemonStatus>,
    feed: mpsc::Sender<ControllerEvent>,
    handle: MockControllerHandle,
    task: JoinHandle<Result<(), DaemonError>>,
    state_dir: TempDir,
}

impl TestDaemon {
    async fn spawn(hub: &MemoryHub, last: u8, name: &str, timings: Timings) -> Self {
        let state_dir = tempfile::tempdir().unwrap();
        Self::spawn_with_state(hub, last, name, timings, state_dir).await
    }

    async fn spawn_with_state(
        hub: &MemoryHub,
        last: u8,
        name: &str,
        timings: Timings,
        state_dir: TempDir,
    ) -> Self {
        let mut config = Config::default();
        config.identity = IdentityConfig {
            name: name.to_string(),
        };
        config.daemon.state_dir = Some(state_dir.path().to_path_buf());

        let (controller, feed) = MockController::new();
        let handle = controller.handle();
        let controller: Arc<dyn Controller> = Arc::new(controller);
        let backend = Arc::new(hub.endpoint(addr(last)));

        let (daemon, client) = Daemon::with_timings(config, backend, controller, timings)
            .await
            .unwrap();
        let status = daemon.status();
        let task = tokio::spawn(daemon.run());

        Self {
            client,
            status,
            feed,
            handle,
            task,
            state_dir,
        }
    }

    async fn peers(&self) -> Vec<scnp_types::Peer> {
        match self
            .client
            .request(ControlRequest::GetCurrentList)
            .await
            .unwrap()
        {
            ControlReply::Ok(ReplyValue::Peers(peers)) => peers,
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    /// Block until the ring holds `count` peers.
    async fn wait_for_peer_count(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if self.peers().await.len() == count {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("never reached {count} peers"));
    }

    async fn wait_for_focus(&mut self, focus: FocusState) {
        tokio::time::timeout(
            Duration::from_secs(5),
            self.status.wait_for(|s| s.focus == focus),
        )
        .await
        .expect("focus state never reached")
        .unwrap();
    }

    async fn press(&self, code: u16) {
        self.feed
            .send(ControllerEvent::key(code, key_state::PRESSED))
            .await
            .unwrap();
    }

    async fn release(&self, code: u16) {
        self.feed
            .send(ControllerEvent::key(code, key_state::RELEASED))
            .await
            .unwrap();
    }

    /// Drive the built-in switch-right chord, presses and releases.
    async fn fire_switch_right(&self) {
        self.press(29).await;
        self.press(106).await;
        self.release(29).await;
        self.release(106).await;
    }

    async fn stop(self) -> Result<(), DaemonError> {
        let _ = self.client.request(ControlRequest::Stop).await;
        self.task.await.unwrap()
    }
}

async fn wait_until(what: &str, mut check: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {what}"));
}

#[tokio::test]
async fn peers_discover_each_other_via_heartbeats() {
    init_tracing();
    let hub = MemoryHub::new(&["mem0"]);
    let alpha = TestDaemon::spawn(&hub, 1, "alpha", test_timings()).await;
    let beta = TestDaemon::spawn(&hub, 2, "beta", test_timings()).await;

    alpha.wait_for_peer_count(2).await;
    beta.wait_for_peer_count(2).await;

    // Discovery happens off the heartbeat, which carries the hostname.
    let peers = alpha.peers().await;
    let local = peers.iter().find(|p| p.is_local).unwrap();
    let remote = peers.iter().find(|p| !p.is_local).unwrap();
    assert_eq!(local.display_name, "alpha");
    assert!(local.has_focus);
    assert_eq!(remote.display_name, "beta");
    assert_eq!(remote.link_addr, addr(2));

    alpha.stop().await.unwrap();
    beta.stop().await.unwrap();
}

#[tokio::test]
async fn shortcut_hand_off_forwards_input_to_the_peer() {
    init_tracing();
    let hub = MemoryHub::new(&["mem0"]);
    let mut alpha = TestDaemon::spawn(&hub, 1, "alpha", test_timings()).await;
    let beta = TestDaemon::spawn(&hub, 2, "beta", test_timings()).await;

    alpha.wait_for_peer_count(2).await;
    beta.wait_for_peer_count(2).await;

    alpha.fire_switch_right().await;
    alpha.wait_for_focus(FocusState::Away).await;

    // Alpha captured its input devices and hid the cursor.
    wait_until("alpha to grab input", || alpha.handle.is_grabbed()).await;
    assert!(!alpha.handle.is_cursor_visible());
    assert_eq!(alpha.status.borrow().current_peer_name, "beta");

    // Beta placed the cursor at its left edge, mid-height, on the ingress.
    wait_until("beta cursor placement", || !beta.handle.warps().is_empty()).await;
    assert_eq!(beta.handle.warps()[0], (0, 540));
    // Focus did not move at beta; the exchange is still open.
    let beta_status = beta.status.borrow().clone();
    assert_eq!(beta_status.focus, FocusState::Here);
    assert_eq!(beta_status.current_peer_name, "beta");

    // Local input at alpha now lands in beta's session.
    alpha.press(30).await;
    alpha.release(30).await;
    alpha
        .feed
        .send(ControllerEvent::movement(axis::Y, 7))
        .await
        .unwrap();

    wait_until("events to arrive at beta", || {
        beta.handle.injected_events().len() >= 3
    })
    .await;
    let injected = beta.handle.injected_events();
    assert_eq!(injected[0], ControllerEvent::key(30, key_state::PRESSED));
    assert_eq!(injected[1], ControllerEvent::key(30, key_state::RELEASED));
    assert_eq!(injected[2], ControllerEvent::movement(axis::Y, 7));

    alpha.stop().await.unwrap();
    beta.stop().await.unwrap();
}

#[tokio::test]
async fn edge_crossing_returns_control_around_the_ring() {
    init_tracing();
    let hub = MemoryHub::new(&["mem0"]);
    let mut alpha = TestDaemon::spawn(&hub, 1, "alpha", test_timings()).await;
    let mut beta = TestDaemon::spawn(&hub, 2, "beta", test_timings()).await;

    alpha.wait_for_peer_count(2).await;
    beta.wait_for_peer_count(2).await;

    alpha.fire_switch_right().await;
    alpha.wait_for_focus(FocusState::Away).await;
    wait_until("beta ingress", || !beta.handle.warps().is_empty()).await;

    // While away, alpha's edge matcher models the remote screen. A long
    // move to the right crosses that screen's right edge; with two peers
    // the ring wraps and control comes home.
    alpha
        .feed
        .send(ControllerEvent::movement(axis::X, 5000))
        .await
        .unwrap();

    alpha.wait_for_focus(FocusState::Here).await;
    wait_until("alpha to release the grab", || !alpha.handle.is_grabbed()).await;
    assert!(alpha.handle.is_cursor_visible());
    assert_eq!(alpha.status.borrow().current_peer_name, "alpha");

    // Beta saw the egress that closed the exchange and kept its own focus.
    beta.wait_for_focus(FocusState::Here).await;
    assert_eq!(beta.status.borrow().current_peer_name, "beta");

    alpha.stop().await.unwrap();
    beta.stop().await.unwrap();
}

#[tokio::test]
async fn quit_shortcut_stops_the_daemon() {
    init_tracing();
    let hub = MemoryHub::new(&["mem0"]);
    let daemon = TestDaemon::spawn(&hub, 1, "solo", test_timings()).await;

    daemon.press(29).await;
    daemon.press(16).await;

    let result = tokio::time::timeout(Duration::from_secs(5), daemon.task)
        .await
        .expect("daemon did not stop")
        .unwrap();
    result.unwrap();
    assert!(daemon.handle.is_shutdown());
    assert!(!daemon.handle.is_grabbed());
}

#[tokio::test]
async fn pause_blocks_everything_but_control() {
    init_tracing();
    let hub = MemoryHub::new(&["mem0"]);
    let daemon = TestDaemon::spawn(&hub, 1, "solo", test_timings()).await;

    let reply = daemon.client.request(ControlRequest::Pause).await.unwrap();
    assert!(reply.is_ok());

    // Pausing twice is an error, as is resuming a running daemon later.
    let reply = daemon.client.request(ControlRequest::Pause).await.unwrap();
    assert_eq!(
        reply,
        ControlReply::Error {
            code: ErrorCode::NotRunning,
            message: DaemonError::NotRunning.to_string(),
        }
    );

    let reply = daemon.client.request(ControlRequest::Resume).await.unwrap();
    assert!(reply.is_ok());
    let reply = daemon.client.request(ControlRequest::Resume).await.unwrap();
    assert!(!reply.is_ok());
    let reply = daemon.client.request(ControlRequest::Start).await.unwrap();
    assert_eq!(
        reply,
        ControlReply::Error {
            code: ErrorCode::AlreadyRunning,
            message: DaemonError::AlreadyRunning.to_string(),
        }
    );

    // The quit chord is not matched while paused.
    let reply = daemon.client.request(ControlRequest::Pause).await.unwrap();
    assert!(reply.is_ok());
    daemon.press(29).await;
    daemon.press(16).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!daemon.task.is_finished());

    let reply = daemon.client.request(ControlRequest::Resume).await.unwrap();
    assert!(reply.is_ok());

    // The queued chord is consumed on resume and stops the daemon.
    let result = tokio::time::timeout(Duration::from_secs(5), daemon.task)
        .await
        .expect("daemon did not stop after resume")
        .unwrap();
    result.unwrap();
}

#[tokio::test]
async fn silent_peer_expires_and_focus_falls_back() {
    init_tracing();
    let hub = MemoryHub::new(&["mem0"]);
    let timings = Timings {
        liveness_timeout: Duration::from_millis(200),
        ..test_timings()
    };
    let mut alpha = TestDaemon::spawn(&hub, 1, "alpha", timings).await;
    let beta = TestDaemon::spawn(&hub, 2, "beta", timings).await;

    alpha.wait_for_peer_count(2).await;
    beta.wait_for_peer_count(2).await;

    // Hand control to beta, then make beta vanish.
    alpha.fire_switch_right().await;
    alpha.wait_for_focus(FocusState::Away).await;
    beta.stop().await.unwrap();

    // The sweep drops the silent peer and control returns home.
    alpha.wait_for_peer_count(1).await;
    alpha.wait_for_focus(FocusState::Here).await;
    wait_until("alpha to release the grab", || !alpha.handle.is_grabbed()).await;
    assert_eq!(alpha.status.borrow().current_peer_name, "alpha");

    alpha.stop().await.unwrap();
}

#[tokio::test]
async fn peer_list_survives_a_restart() {
    init_tracing();
    let hub = MemoryHub::new(&["mem0"]);
    let alpha = TestDaemon::spawn(&hub, 1, "alpha", test_timings()).await;
    let beta = TestDaemon::spawn(&hub, 2, "beta", test_timings()).await;

    alpha.wait_for_peer_count(2).await;
    let TestDaemon {
        client,
        task,
        state_dir,
        ..
    } = alpha;
    let _ = client.request(ControlRequest::Stop).await;
    task.await.unwrap().unwrap();

    // A fresh daemon on the same state directory remembers beta.
    let restarted =
        TestDaemon::spawn_with_state(&hub, 1, "alpha", test_timings(), state_dir).await;
    let peers = restarted.peers().await;
    assert_eq!(peers.len(), 2);
    assert!(peers.iter().any(|p| !p.is_local && p.link_addr == addr(2)));

    restarted.stop().await.unwrap();
    beta.stop().await.unwrap();
}

#[tokio::test]
async fn ring_reorder_and_interface_queries() {
    init_tracing();
    let hub = MemoryHub::new(&["mem0", "mem1"]);
    let alpha = TestDaemon::spawn(&hub, 1, "alpha", test_timings()).await;
    let beta = TestDaemon::spawn(&hub, 2, "beta", test_timings()).await;

    alpha.wait_for_peer_count(2).await;

    let reply = alpha
        .client
        .request(ControlRequest::GetInterface)
        .await
        .unwrap();
    assert_eq!(
        reply,
        ControlReply::Ok(ReplyValue::Interface {
            index: 0,
            name: "mem0".to_string(),
        })
    );

    // Put the remote peer first; the ring order is what GetCurrentList says.
    let peers = alpha.peers().await;
    let remote_id = peers.iter().find(|p| !p.is_local).unwrap().id;
    let reply = alpha
        .client
        .request(ControlRequest::SetCurrentList {
            ids: vec![remote_id],
        })
        .await
        .unwrap();
    assert!(reply.is_ok());
    let peers = alpha.peers().await;
    assert_eq!(peers[0].id, remote_id);

    // Out-of-range interface index is a clean error.
    let reply = alpha
        .client
        .request(ControlRequest::SetInterface { index: 9 })
        .await
        .unwrap();
    assert_eq!(
        reply,
        ControlReply::Error {
            code: ErrorCode::NotFound,
            message: DaemonError::InterfaceNotFound(9).to_string(),
        }
    );

    alpha.stop().await.unwrap();
    beta.stop().await.unwrap();
}

#[tokio::test]
async fn shortcuts_save_and_reload_through_control() {
    init_tracing();
    let hub = MemoryHub::new(&["mem0"]);
    let daemon = TestDaemon::spawn(&hub, 1, "solo", test_timings()).await;

    let reply = daemon
        .client
        .request(ControlRequest::SaveShortcuts)
        .await
        .unwrap();
    assert!(reply.is_ok());
    assert!(daemon.state_dir.path().join("shortcuts.bin").exists());

    let reply = daemon
        .client
        .request(ControlRequest::LoadShortcuts { reset: false })
        .await
        .unwrap();
    assert!(reply.is_ok());
    let reply = daemon
        .client
        .request(ControlRequest::LoadShortcuts { reset: true })
        .await
        .unwrap();
    assert!(reply.is_ok());

    // The quit chord still works after the reload cycle.
    daemon.press(29).await;
    daemon.press(16).await;
    let result = tokio::time::timeout(Duration::from_secs(5), daemon.task)
        .await
        .expect("daemon did not stop")
        .unwrap();
    result.unwrap();
}
