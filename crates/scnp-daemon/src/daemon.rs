//! Core daemon orchestration.
//!
//! Ties the transport, the shortcut matchers, and the peer registry together
//! into the HERE/AWAY hand-off state machine, run by four workers: network
//! receive, local input send, liveness sweep, and the control channel.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use scnp_input::Controller;
use scnp_protocol::{
    LinkBackend, ReliableTransport, SessionAdvertiser, ACK_TIMEOUT, HEARTBEAT,
};
use scnp_types::{
    key_state, ControllerEvent, ExitDirection, InputClass, LinkAddr, Peer, PeerId, Resolution,
    ScnpPacket, ScreenDirection, ScreenSide,
};

use crate::combo::{ComboMatcher, EdgeMatcher, Fired, SequenceMatcher};
use crate::config::{default_shortcuts, Config, ShortcutConfig};
use crate::control::{
    control_channel, ControlClient, ControlEnvelope, ControlReply, ControlRequest, ReplyValue,
};
use crate::error::DaemonError;
use crate::registry::{LivenessMap, PeerRegistry, LIVENESS_TIMEOUT};
use crate::state::{FocusState, HandoffGate, RunState};
use crate::store;

/// Snapshot of the daemon published through a watch channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonStatus {
    pub run_state: RunState,
    pub focus: FocusState,
    pub current_peer: PeerId,
    pub current_peer_name: String,
    pub peer_count: usize,
}

/// Protocol timing knobs, overridable for tests.
#[derive(Debug, Clone, Copy)]
pub struct Timings {
    pub ack_timeout: Duration,
    pub heartbeat: Duration,
    pub liveness_timeout: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            ack_timeout: ACK_TIMEOUT,
            heartbeat: HEARTBEAT,
            liveness_timeout: LIVENESS_TIMEOUT,
        }
    }
}

struct Handoff {
    focus: FocusState,
    gate: HandoffGate,
}

struct Shared {
    backend: Arc<dyn LinkBackend>,
    controller: Arc<dyn Controller>,
    advertiser: SessionAdvertiser,
    timings: Timings,
    screen: Resolution,
    transport: RwLock<Arc<ReliableTransport>>,
    /// Bumped whenever the transport is swapped so the receive worker rebinds.
    epoch: watch::Sender<u64>,
    registry: Mutex<PeerRegistry>,
    liveness: Mutex<LivenessMap>,
    matchers: Mutex<Vec<ComboMatcher>>,
    shortcut_defs: Mutex<Vec<ShortcutConfig>>,
    handoff: tokio::sync::Mutex<Handoff>,
    run: watch::Sender<RunState>,
    status: watch::Sender<DaemonStatus>,
    fired_tx: mpsc::UnboundedSender<Fired>,
    shortcut_store: PathBuf,
    peer_store: PathBuf,
}

/// The scnp daemon.
pub struct Daemon {
    shared: Arc<Shared>,
    control_rx: mpsc::Receiver<ControlEnvelope>,
    fired_rx: mpsc::UnboundedReceiver<Fired>,
}

impl Daemon {
    /// Build a daemon with default protocol timings.
    pub async fn new(
        config: Config,
        backend: Arc<dyn LinkBackend>,
        controller: Arc<dyn Controller>,
    ) -> Result<(Self, ControlClient), DaemonError> {
        Self::with_timings(config, backend, controller, Timings::default()).await
    }

    /// Build a daemon. Bind failure on the startup interface is fatal.
    pub async fn with_timings(
        config: Config,
        backend: Arc<dyn LinkBackend>,
        controller: Arc<dyn Controller>,
        timings: Timings,
    ) -> Result<(Self, ControlClient), DaemonError> {
        let interfaces = backend.interfaces();
        let interface = match &config.daemon.interface {
            Some(name) => {
                if !interfaces.iter().any(|i| i == name) {
                    return Err(DaemonError::Config(format!("unknown interface: {name}")));
                }
                name.clone()
            }
            None => interfaces
                .first()
                .cloned()
                .ok_or_else(|| DaemonError::Config("no usable network interface".to_string()))?,
        };

        let link = backend.open(&interface).await?;
        let transport =
            Arc::new(ReliableTransport::new(link).with_ack_timeout(timings.ack_timeout));
        controller.init().await?;

        let screen = Resolution::new(config.daemon.screen_width, config.daemon.screen_height);
        let mut registry = PeerRegistry::new(
            Peer::local(PeerId(0), &config.identity.name, screen),
            config.daemon.wrap,
        );
        let mut liveness = LivenessMap::with_timeout(timings.liveness_timeout);

        // Remembered ring from an earlier run. Restored peers start on the
        // liveness clock like any other and expire if they stay silent.
        let peer_store = config.peer_store();
        if let Ok(saved) = store::load_peers(&peer_store) {
            let mut restored = 0usize;
            for peer in saved.into_iter().filter(|p| !p.is_local) {
                let id = registry.mint_id();
                registry.add(Peer {
                    id,
                    has_focus: false,
                    ..peer
                });
                liveness.touch(id);
                restored += 1;
            }
            if restored > 0 {
                info!(count = restored, "restored peer list");
            }
        }

        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        let shortcut_defs = config.effective_shortcuts();
        let matchers = build_matchers(&shortcut_defs, screen, &fired_tx);

        let (run, _) = watch::channel(RunState::Running);
        let (status, _) = watch::channel(DaemonStatus {
            run_state: RunState::Running,
            focus: FocusState::Here,
            current_peer: PeerId(0),
            current_peer_name: config.identity.name.clone(),
            peer_count: registry.len(),
        });
        let (epoch, _) = watch::channel(0u64);

        let advertiser =
            SessionAdvertiser::new(&config.identity.name).with_heartbeat(timings.heartbeat);

        let shared = Arc::new(Shared {
            backend,
            controller,
            advertiser,
            timings,
            screen,
            transport: RwLock::new(transport),
            epoch,
            registry: Mutex::new(registry),
            liveness: Mutex::new(liveness),
            matchers: Mutex::new(matchers),
            shortcut_defs: Mutex::new(shortcut_defs),
            handoff: tokio::sync::Mutex::new(Handoff {
                focus: FocusState::Here,
                gate: HandoffGate::default(),
            }),
            run,
            status,
            fired_tx,
            shortcut_store: config.shortcut_store(),
            peer_store,
        });
        let (client, control_rx) = control_channel();

        Ok((
            Self {
                shared,
                control_rx,
                fired_rx,
            },
            client,
        ))
    }

    /// Observe daemon status snapshots.
    #[must_use]
    pub fn status(&self) -> watch::Receiver<DaemonStatus> {
        self.shared.status.subscribe()
    }

    /// Run the four workers until a stop command or the quit shortcut.
    pub async fn run(self) -> Result<(), DaemonError> {
        let Self {
            shared,
            control_rx,
            fired_rx,
        } = self;

        shared.advertiser.start_session(shared.transport())?;
        info!(interface = %shared.transport().interface(), "daemon running");

        let recv = tokio::spawn(recv_worker(Arc::clone(&shared)));
        let send = tokio::spawn(send_worker(Arc::clone(&shared), fired_rx));
        let sweep = tokio::spawn(sweep_worker(Arc::clone(&shared)));
        let control = tokio::spawn(control_worker(Arc::clone(&shared), control_rx));

        let mut run_rx = shared.run.subscribe();
        while *run_rx.borrow() != RunState::Stopped {
            if run_rx.changed().await.is_err() {
                break;
            }
        }

        let _ = tokio::join!(recv, send, sweep, control);
        shared.advertiser.stop_all().await;

        {
            let registry = shared.registry.lock().unwrap();
            if let Err(err) = store::save_peers(&shared.peer_store, registry.peers()) {
                warn!(error = %err, "failed to save peer list");
            }
        }

        let _ = shared.controller.set_grabbed(false).await;
        shared.controller.shutdown().await?;
        info!("daemon stopped");
        Ok(())
    }
}

fn build_matchers(
    defs: &[ShortcutConfig],
    screen: Resolution,
    fired_tx: &mpsc::UnboundedSender<Fired>,
) -> Vec<ComboMatcher> {
    let mut matchers = Vec::with_capacity(defs.len() + 1);
    for def in defs {
        let tx = fired_tx.clone();
        let mut matcher = SequenceMatcher::new(
            &def.name,
            &def.description,
            def.direction,
            def.steps(),
            Box::new(move |fired| {
                let _ = tx.send(fired);
            }),
        );
        if def.direction != ExitDirection::None {
            matcher.append_release_mirror();
        }
        matchers.push(ComboMatcher::Sequence(matcher));
    }
    let tx = fired_tx.clone();
    matchers.push(ComboMatcher::Edge(EdgeMatcher::new(
        screen.width,
        screen.height,
        Box::new(move |fired| {
            let _ = tx.send(fired);
        }),
    )));
    matchers
}

/// Block while paused; returns the state that ended the wait.
async fn wait_while_paused(run_rx: &mut watch::Receiver<RunState>) -> RunState {
    loop {
        let state = *run_rx.borrow();
        if state != RunState::Paused {
            return state;
        }
        if run_rx.changed().await.is_err() {
            return RunState::Stopped;
        }
    }
}

async fn recv_worker(shared: Arc<Shared>) {
    let mut run_rx = shared.run.subscribe();
    let mut epoch_rx = shared.epoch.subscribe();
    loop {
        if wait_while_paused(&mut run_rx).await == RunState::Stopped {
            break;
        }
        let transport = shared.transport();
        tokio::select! {
            _ = run_rx.changed() => {}
            _ = epoch_rx.changed() => {}
            result = transport.recv() => match result {
                Ok((packet, src)) => shared.dispatch_packet(packet, src).await,
                Err(err) => {
                    warn!(error = %err, "receive failed");
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }
    debug!("receive worker stopped");
}

async fn send_worker(shared: Arc<Shared>, mut fired_rx: mpsc::UnboundedReceiver<Fired>) {
    let mut run_rx = shared.run.subscribe();
    loop {
        if wait_while_paused(&mut run_rx).await == RunState::Stopped {
            break;
        }
        tokio::select! {
            _ = run_rx.changed() => {}
            result = shared.controller.poll() => match result {
                Ok(event) => shared.handle_local_event(event, &mut fired_rx).await,
                Err(err) => {
                    warn!(error = %err, "input poll failed, stopping");
                    shared.run.send_replace(RunState::Stopped);
                    break;
                }
            }
        }
    }
    debug!("send worker stopped");
}

async fn sweep_worker(shared: Arc<Shared>) {
    let mut run_rx = shared.run.subscribe();
    let period = shared.timings.liveness_timeout;
    loop {
        if wait_while_paused(&mut run_rx).await == RunState::Stopped {
            break;
        }
        shared.sweep_expired().await;
        tokio::select! {
            _ = run_rx.changed() => {}
            () = tokio::time::sleep(period) => {}
        }
    }
    debug!("sweep worker stopped");
}

async fn control_worker(shared: Arc<Shared>, mut rx: mpsc::Receiver<ControlEnvelope>) {
    let mut run_rx = shared.run.subscribe();
    loop {
        if *run_rx.borrow() == RunState::Stopped {
            break;
        }
        tokio::select! {
            _ = run_rx.changed() => {}
            envelope = rx.recv() => match envelope {
                Some(ControlEnvelope { request, reply }) => {
                    let response = shared.handle_control(request).await;
                    let _ = reply.send(response);
                }
                None => {
                    debug!("control channel closed");
                    shared.run.send_replace(RunState::Stopped);
                    break;
                }
            }
        }
    }
    debug!("control worker stopped");
}

impl Shared {
    fn transport(&self) -> Arc<ReliableTransport> {
        Arc::clone(&self.transport.read().unwrap())
    }

    fn publish_status_with(&self, focus: Option<FocusState>) {
        let (current_peer, current_peer_name, peer_count) = {
            let registry = self.registry.lock().unwrap();
            let current = registry.current();
            (current.id, current.display_name.clone(), registry.len())
        };
        let focus = focus.unwrap_or_else(|| self.status.borrow().focus);
        self.status.send_replace(DaemonStatus {
            run_state: *self.run.borrow(),
            focus,
            current_peer,
            current_peer_name,
            peer_count,
        });
    }

    /// Attribute a packet to a peer, discovering it if needed, and refresh
    /// its liveness.
    fn note_peer(&self, src: LinkAddr, hostname: Option<&str>) -> PeerId {
        let id = {
            let mut registry = self.registry.lock().unwrap();
            match registry.by_addr(src) {
                Some(peer) => {
                    let id = peer.id;
                    if let Some(name) = hostname {
                        if peer.display_name != name {
                            let _ = registry.rename(id, name);
                        }
                    }
                    id
                }
                None => {
                    let id = registry.mint_id();
                    // Placeholder until a Management packet supplies the
                    // real hostname.
                    let name = hostname.map_or_else(|| format!("peer-{src}"), ToString::to_string);
                    info!(peer = %id, name = %name, addr = %src, "peer discovered");
                    registry.add(Peer::remote(id, &name, src));
                    id
                }
            }
        };
        self.liveness.lock().unwrap().touch(id);
        self.publish_status_with(None);
        id
    }

    async fn dispatch_packet(&self, packet: ScnpPacket, src: LinkAddr) {
        let hostname = match &packet {
            ScnpPacket::Management { hostname } => Some(hostname.as_str()),
            _ => None,
        };
        let from = self.note_peer(src, hostname);

        match packet {
            ScnpPacket::Key {
                code,
                pressed,
                repeated,
            } => {
                let value = if repeated {
                    key_state::REPEATED
                } else if pressed {
                    key_state::PRESSED
                } else {
                    key_state::RELEASED
                };
                if let Err(err) = self.controller.inject(ControllerEvent::key(code, value)).await {
                    warn!(error = %err, "failed to inject key event");
                }
            }
            ScnpPacket::Movement { code, value } => {
                if let Err(err) = self
                    .controller
                    .inject(ControllerEvent::movement(code, value))
                    .await
                {
                    warn!(error = %err, "failed to inject movement event");
                }
            }
            ScnpPacket::ScreenOut {
                direction,
                side,
                height,
            } => self.handle_screen_out(from, direction, side, height).await,
            // Discovery and liveness were handled in note_peer; acks are
            // consumed inside the transport and never reach dispatch.
            ScnpPacket::Management { .. } | ScnpPacket::Ack => {}
        }
    }

    /// Screen coordinates where a cursor crossing `side` at `height` enters
    /// the local screen: the opposite edge, same vertical fraction.
    fn entry_point(&self, side: ScreenSide, height: f32) -> (i32, i32) {
        let width = i32::try_from(self.screen.width).unwrap_or(i32::MAX);
        let screen_height = i32::try_from(self.screen.height).unwrap_or(i32::MAX);
        let x = match side {
            ScreenSide::Right => 0,
            ScreenSide::Left => width - 1,
        };
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
        let y = (height.clamp(0.0, 1.0) * (screen_height - 1) as f32).round() as i32;
        (x, y)
    }

    async fn handle_screen_out(
        &self,
        from: PeerId,
        direction: ScreenDirection,
        side: ScreenSide,
        height: f32,
    ) {
        let mut handoff = self.handoff.lock().await;
        match direction {
            ScreenDirection::Ingress => {
                // The remote focused peer's input is about to arrive here.
                // Cursor placement only; focus does not move until the
                // Egress completes the exchange.
                let (x, y) = self.entry_point(side, height);
                if let Err(err) = self.controller.warp_cursor(x, y).await {
                    warn!(error = %err, "failed to place cursor on ingress");
                }
                {
                    let mut registry = self.registry.lock().unwrap();
                    if registry.point_at(from).is_err() {
                        warn!(peer = %from, "ingress from unknown peer");
                        return;
                    }
                }
                handoff.gate.arm(from);
                debug!(peer = %from, ?side, height, "ingress: awaiting egress");
            }
            ScreenDirection::Egress => {
                if !handoff.gate.is_waiting() {
                    debug!(peer = %from, "stale egress ignored");
                    return;
                }
                if let Some(expected) = handoff.gate.expected_from() {
                    if expected != from {
                        warn!(expected = %expected, got = %from, "egress from unexpected peer");
                    }
                }
                handoff.gate.disarm();

                let new_is_local = {
                    let mut registry = self.registry.lock().unwrap();
                    let new_id = match side {
                        ScreenSide::Right => registry.next(),
                        ScreenSide::Left => registry.previous(),
                    };
                    let _ = registry.set_focus(new_id);
                    registry.current().is_local
                };

                if new_is_local {
                    handoff.focus = FocusState::Here;
                    let _ = self.controller.set_grabbed(false).await;
                    let _ = self.controller.set_cursor_visible(true).await;
                    let (x, y) = self.entry_point(side, height);
                    if let Err(err) = self.controller.warp_cursor(x, y).await {
                        warn!(error = %err, "failed to warp cursor on egress");
                    }
                    info!(?side, height, "hand-off complete, control is here");
                } else {
                    handoff.focus = FocusState::Away;
                    let _ = self.controller.set_grabbed(true).await;
                    let _ = self.controller.set_cursor_visible(false).await;
                    info!(?side, "hand-off complete, focus moved on");
                }
                self.publish_status_with(Some(handoff.focus));
            }
        }
    }

    async fn handle_local_event(
        &self,
        event: ControllerEvent,
        fired_rx: &mut mpsc::UnboundedReceiver<Fired>,
    ) {
        {
            let mut matchers = self.matchers.lock().unwrap();
            for matcher in matchers.iter_mut() {
                let _ = matcher.update(&event);
            }
        }
        let mut handed_off = false;
        while let Ok(fired) = fired_rx.try_recv() {
            self.perform_local_handoff(fired).await;
            handed_off = true;
        }
        // The event that completed a gesture belongs to the gesture; it is
        // never forwarded to the peer focus just moved to.
        if handed_off {
            return;
        }

        let away = self.handoff.lock().await.focus.is_away();
        if !away {
            return;
        }

        let (addr, peer) = {
            let registry = self.registry.lock().unwrap();
            let current = registry.current();
            (current.link_addr, current.id)
        };
        let packet = match event.class {
            InputClass::Key => ScnpPacket::Key {
                code: event.code,
                pressed: event.value != key_state::RELEASED,
                repeated: event.value == key_state::REPEATED,
            },
            InputClass::Mouse => ScnpPacket::Movement {
                code: event.code,
                value: event.value,
            },
        };
        match self.transport().send(addr, &packet).await {
            Ok(()) => {}
            Err(err) if err.is_timeout() => {
                debug!(peer = %peer, kind = packet.kind_name(), "delivery timed out, event dropped");
            }
            Err(err) => warn!(peer = %peer, error = %err, "failed to forward event"),
        }
    }

    /// The hand-off procedure for a locally fired directional gesture.
    async fn perform_local_handoff(&self, fired: Fired) {
        if fired.direction == ExitDirection::None {
            info!("quit shortcut fired, stopping");
            self.run.send_replace(RunState::Stopped);
            self.publish_status_with(None);
            return;
        }
        let side = match fired.direction {
            ExitDirection::Right => ScreenSide::Right,
            ExitDirection::Left | ExitDirection::None => ScreenSide::Left,
        };

        let mut handoff = self.handoff.lock().await;
        let transport = self.transport();

        let (old_is_local, old_addr, old_id) = {
            let registry = self.registry.lock().unwrap();
            let current = registry.current();
            (current.is_local, current.link_addr, current.id)
        };

        if !old_is_local {
            // The old focus target must not retain stuck keys from the
            // gesture that fired.
            for &code in &fired.codes {
                let release = ScnpPacket::Key {
                    code,
                    pressed: false,
                    repeated: false,
                };
                if let Err(err) = transport.send(old_addr, &release).await {
                    debug!(peer = %old_id, code, error = %err, "release event not delivered");
                }
            }
            // An edge crossing while away means the shared cursor left the
            // remote screen; tell that peer so it completes its exchange.
            if let Some(height) = fired.height {
                let egress = ScnpPacket::ScreenOut {
                    direction: ScreenDirection::Egress,
                    side,
                    height,
                };
                if let Err(err) = transport.send(old_addr, &egress).await {
                    warn!(peer = %old_id, error = %err, "egress announcement not delivered");
                }
            }
        }

        let (new_id, new_is_local, new_addr) = {
            let mut registry = self.registry.lock().unwrap();
            let new_id = match fired.direction {
                ExitDirection::Right => registry.next(),
                ExitDirection::Left | ExitDirection::None => registry.previous(),
            };
            let _ = registry.set_focus(new_id);
            let current = registry.current();
            (new_id, current.is_local, current.link_addr)
        };

        if new_is_local {
            handoff.focus = FocusState::Here;
            handoff.gate.disarm();
            let _ = self.controller.set_grabbed(false).await;
            let _ = self.controller.set_cursor_visible(true).await;
            if let Some(height) = fired.height {
                let (x, y) = self.entry_point(side, height);
                let _ = self.controller.warp_cursor(x, y).await;
            }
            info!("control returned here");
        } else {
            handoff.focus = FocusState::Away;
            let _ = self.controller.set_grabbed(true).await;
            let _ = self.controller.set_cursor_visible(false).await;
            let ingress = ScnpPacket::ScreenOut {
                direction: ScreenDirection::Ingress,
                side,
                height: fired.height.unwrap_or(0.5),
            };
            match transport.send(new_addr, &ingress).await {
                Ok(()) => handoff.gate.arm(new_id),
                Err(err) => {
                    warn!(peer = %new_id, error = %err, "ingress announcement not delivered");
                }
            }
            info!(peer = %new_id, ?side, "control handed off");
        }
        self.publish_status_with(Some(handoff.focus));
    }

    async fn sweep_expired(&self) {
        loop {
            let Some(id) = self.liveness.lock().unwrap().next_expired() else {
                break;
            };
            let mut handoff = self.handoff.lock().await;
            let lost_focus = {
                let mut registry = self.registry.lock().unwrap();
                match registry.remove(id) {
                    Ok(peer) => {
                        info!(peer = %id, name = %peer.display_name, "peer expired");
                        peer.has_focus
                    }
                    Err(_) => false,
                }
            };
            self.liveness.lock().unwrap().remove(id);

            if lost_focus {
                {
                    let mut registry = self.registry.lock().unwrap();
                    let local_id = registry.local().id;
                    let _ = registry.set_focus(local_id);
                }
                handoff.focus = FocusState::Here;
                handoff.gate.disarm();
                let _ = self.controller.set_grabbed(false).await;
                let _ = self.controller.set_cursor_visible(true).await;
                warn!(peer = %id, "focused peer expired, control returned here");
            }
            self.publish_status_with(Some(handoff.focus));
        }
    }

    async fn handle_control(&self, request: ControlRequest) -> ControlReply {
        debug!(?request, "control request");
        let result = match request {
            ControlRequest::SetInterface { index } => {
                self.set_interface(index).await.map(|()| ReplyValue::None)
            }
            ControlRequest::GetInterface => {
                let name = self.transport().interface().to_string();
                let index = self
                    .backend
                    .interfaces()
                    .iter()
                    .position(|i| *i == name)
                    .unwrap_or(0);
                Ok(ReplyValue::Interface { index, name })
            }
            ControlRequest::GetCurrentList => {
                Ok(ReplyValue::Peers(self.registry.lock().unwrap().peers().to_vec()))
            }
            ControlRequest::GetAllList => {
                let mut peers = self.registry.lock().unwrap().peers().to_vec();
                peers.sort_by_key(|p| p.id);
                Ok(ReplyValue::Peers(peers))
            }
            ControlRequest::SetCurrentList { ids } => {
                let outcome = self.registry.lock().unwrap().reorder(&ids);
                self.publish_status_with(None);
                outcome.map(|()| ReplyValue::None)
            }
            ControlRequest::Start => {
                if *self.run.borrow() == RunState::Running {
                    Err(DaemonError::AlreadyRunning)
                } else {
                    self.run.send_replace(RunState::Running);
                    self.publish_status_with(None);
                    Ok(ReplyValue::None)
                }
            }
            ControlRequest::Stop => {
                self.run.send_replace(RunState::Stopped);
                self.publish_status_with(None);
                Ok(ReplyValue::None)
            }
            ControlRequest::Pause => {
                if *self.run.borrow() == RunState::Running {
                    self.run.send_replace(RunState::Paused);
                    self.publish_status_with(None);
                    Ok(ReplyValue::None)
                } else {
                    Err(DaemonError::NotRunning)
                }
            }
            ControlRequest::Resume => {
                if *self.run.borrow() == RunState::Paused {
                    self.run.send_replace(RunState::Running);
                    self.publish_status_with(None);
                    Ok(ReplyValue::None)
                } else {
                    Err(DaemonError::NotRunning)
                }
            }
            ControlRequest::SaveShortcuts => {
                let defs = self.shortcut_defs.lock().unwrap().clone();
                store::save_shortcuts(&self.shortcut_store, &defs)
                    .map(|()| ReplyValue::None)
                    .map_err(Into::into)
            }
            ControlRequest::LoadShortcuts { reset } => {
                self.reload_shortcuts(reset);
                Ok(ReplyValue::None)
            }
        };
        match result {
            Ok(value) => ControlReply::Ok(value),
            Err(err) => {
                warn!(error = %err, "control request failed");
                ControlReply::from_error(&err)
            }
        }
    }

    /// Replace the matcher set from the store or the built-in defaults.
    /// A missing or unreadable store counts as "no saved state".
    fn reload_shortcuts(&self, reset: bool) {
        let defs = if reset {
            default_shortcuts()
        } else {
            match store::load_shortcuts(&self.shortcut_store) {
                Ok(defs) => defs,
                Err(err) => {
                    info!(error = %err, "no saved shortcuts, using defaults");
                    default_shortcuts()
                }
            }
        };
        *self.matchers.lock().unwrap() = build_matchers(&defs, self.screen, &self.fired_tx);
        *self.shortcut_defs.lock().unwrap() = defs;
    }

    /// Rebind the transport and advertiser to another interface.
    async fn set_interface(&self, index: usize) -> Result<(), DaemonError> {
        let interfaces = self.backend.interfaces();
        let name = interfaces
            .get(index)
            .ok_or(DaemonError::InterfaceNotFound(index))?
            .clone();
        let old = self.transport().interface().to_string();
        if old == name {
            return Ok(());
        }

        let link = self.backend.open(&name).await?;
        let transport =
            Arc::new(ReliableTransport::new(link).with_ack_timeout(self.timings.ack_timeout));

        if let Err(err) = self.advertiser.stop_session(&old).await {
            debug!(interface = %old, error = %err, "no session to stop");
        }
        *self.transport.write().unwrap() = Arc::clone(&transport);
        self.epoch.send_modify(|e| *e += 1);
        self.advertiser.start_session(transport)?;
        info!(interface = %name, "interface switched");
        Ok(())
    }
}
