//! Periodic presence announcements.
//!
//! Each active interface runs one advertiser session that broadcasts a
//! Management packet carrying the local hostname every [`HEARTBEAT`].
//! Peers use these beacons both for discovery and as a liveness signal.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use scnp_types::ScnpPacket;

use crate::error::ProtocolError;
use crate::transport::ReliableTransport;

/// Interval between presence broadcasts.
pub const HEARTBEAT: Duration = Duration::from_secs(1);

struct Session {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

pub struct SessionAdvertiser {
    hostname: String,
    heartbeat: Duration,
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionAdvertiser {
    #[must_use]
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            heartbeat: HEARTBEAT,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Override the broadcast interval. Test hook.
    #[must_use]
    pub fn with_heartbeat(mut self, heartbeat: Duration) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    #[must_use]
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    #[must_use]
    pub fn is_running(&self, interface: &str) -> bool {
        self.sessions.lock().unwrap().contains_key(interface)
    }

    /// Start advertising on the transport's interface.
    pub fn start_session(&self, transport: Arc<ReliableTransport>) -> Result<(), ProtocolError> {
        let interface = transport.interface().to_string();
        let mut sessions = self.sessions.lock().unwrap();
        if sessions.contains_key(&interface) {
            return Err(ProtocolError::AlreadyRunning(interface));
        }

        let (stop, mut stopped) = watch::channel(false);
        let packet = ScnpPacket::Management {
            hostname: self.hostname.clone(),
        };
        let heartbeat = self.heartbeat;
        let task_interface = interface.clone();
        let handle = tokio::spawn(async move {
            debug!(interface = %task_interface, "advertiser session started");
            loop {
                if let Err(err) = transport.broadcast(&packet).await {
                    warn!(interface = %task_interface, error = %err, "presence broadcast failed");
                }
                tokio::select! {
                    () = tokio::time::sleep(heartbeat) => {}
                    _ = stopped.changed() => {
                        debug!(interface = %task_interface, "advertiser session stopped");
                        return;
                    }
                }
            }
        });

        sessions.insert(interface, Session { stop, handle });
        Ok(())
    }

    /// Stop the session on `interface`, waiting for its task to exit.
    pub async fn stop_session(&self, interface: &str) -> Result<(), ProtocolError> {
        let session = self
            .sessions
            .lock()
            .unwrap()
            .remove(interface)
            .ok_or_else(|| ProtocolError::NotRunning(interface.to_string()))?;
        let _ = session.stop.send(true);
        let _ = session.handle.await;
        Ok(())
    }

    /// Stop every active session.
    pub async fn stop_all(&self) {
        let sessions: Vec<Session> = self.sessions.lock().unwrap().drain().map(|(_, s)| s).collect();
        for session in sessions {
            let _ = session.stop.send(true);
            let _ = session.handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::LinkBackend;
    use crate::memory::MemoryHub;
    use scnp_types::LinkAddr;

    const A: LinkAddr = LinkAddr([2, 0, 0, 0, 0, 1]);
    const B: LinkAddr = LinkAddr([2, 0, 0, 0, 0, 2]);

    #[tokio::test]
    async fn beacons_arrive_at_peers() {
        let hub = MemoryHub::new(&["mem0"]);
        let a = Arc::new(ReliableTransport::new(
            hub.endpoint(A).open("mem0").await.unwrap(),
        ));
        let b = ReliableTransport::new(hub.endpoint(B).open("mem0").await.unwrap());

        let advertiser =
            SessionAdvertiser::new("host-a").with_heartbeat(Duration::from_millis(5));
        advertiser.start_session(a).unwrap();

        let (packet, src) = b.recv().await.unwrap();
        assert_eq!(
            packet,
            ScnpPacket::Management {
                hostname: "host-a".to_string()
            }
        );
        assert_eq!(src, A);

        // And again on the next heartbeat.
        let (packet, _) = b.recv().await.unwrap();
        assert_eq!(
            packet,
            ScnpPacket::Management {
                hostname: "host-a".to_string()
            }
        );

        advertiser.stop_session("mem0").await.unwrap();
    }

    #[tokio::test]
    async fn double_start_is_rejected() {
        let hub = MemoryHub::new(&["mem0"]);
        let transport = Arc::new(ReliableTransport::new(
            hub.endpoint(A).open("mem0").await.unwrap(),
        ));

        let advertiser = SessionAdvertiser::new("host-a");
        advertiser.start_session(Arc::clone(&transport)).unwrap();
        assert!(advertiser.is_running("mem0"));
        let err = advertiser.start_session(transport).unwrap_err();
        assert!(matches!(err, ProtocolError::AlreadyRunning(_)));
        advertiser.stop_all().await;
    }

    #[tokio::test]
    async fn stop_without_session_is_an_error() {
        let advertiser = SessionAdvertiser::new("host-a");
        let err = advertiser.stop_session("mem0").await.unwrap_err();
        assert!(matches!(err, ProtocolError::NotRunning(_)));
    }

    #[tokio::test]
    async fn stop_all_clears_every_session() {
        let hub = MemoryHub::new(&["mem0", "mem1"]);
        let advertiser = SessionAdvertiser::new("host-a");
        for name in ["mem0", "mem1"] {
            let transport = Arc::new(ReliableTransport::new(
                hub.endpoint(A).open(name).await.unwrap(),
            ));
            advertiser.start_session(transport).unwrap();
        }
        advertiser.stop_all().await;
        assert!(!advertiser.is_running("mem0"));
        assert!(!advertiser.is_running("mem1"));
    }
}
