//! Connection Lifecycle Manager
//!
//! The central state machine. It exclusively owns the connection
//! state and the live session, consults the permission gate, drives
//! the platform bridge, and publishes every committed transition as a
//! domain event.
//!
//! # State machine
//!
//! ```text
//! Disconnected --connect()--> Connecting --bridge ok--> Connected
//!                              |                          |  ^
//!                              | bridge err /             |  | bridge ok
//!                              | permission denied        v  |
//!                              +------> Disconnected <- Rotating
//!                                            ^    (bridge err tears
//!                                            |     down the session)
//!                                    disconnect() (forced)
//! ```
//!
//! # Concurrency
//!
//! The manager is not reentrant: one operation gate serializes the
//! public lifecycle calls. `connect` and `rotate` fail fast with
//! [`VpnError::ConcurrentOperation`] when another call is in flight;
//! `disconnect` queues behind the gate instead, so a disconnect
//! requested while `Connecting` is deferred until the in-flight call
//! settles and then always wins. Whoever acquires the gate first
//! wins any race; the loser observes the post-transition state and
//! becomes a no-op.

use crate::bridge::PlatformBridge;
use crate::config::{EncryptionLevel, VpnSettings};
use crate::directory::{Server, ServerDirectory};
use crate::events::VpnEvent;
use crate::permissions::{PermissionError, PermissionGate};
use crate::rotation::RotationScheduler;
use crate::session::{ConnectionSession, SessionStats, SyntheticTraffic, TrafficSource};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, broadcast};
use tracing::{debug, error, info, warn};

/// Connection state, owned exclusively by [`VpnManager`].
///
/// Every other component reads snapshots or reacts to events; none
/// mutates it directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Rotating,
}

impl ConnectionState {
    /// Check if a session is live (rotation keeps the session alive)
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected | ConnectionState::Rotating)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Rotating => "rotating",
        };
        write!(f, "{label}")
    }
}

/// Lifecycle failure taxonomy.
///
/// `InvalidServer`, `Permission`, and `ConcurrentOperation` are
/// rejected synchronously with no state change and no bridge call.
/// `Bridge` failures are recoverable: the state is already forced to
/// `Disconnected` when the error is returned.
#[derive(Debug, thiserror::Error)]
pub enum VpnError {
    #[error("Unknown server: {0}")]
    InvalidServer(String),

    #[error("Permission denied: {0}")]
    Permission(#[from] PermissionError),

    #[error("Bridge failure: {0}")]
    Bridge(#[from] crate::bridge::BridgeError),

    #[error("Another lifecycle operation is in flight")]
    ConcurrentOperation,
}

/// Snapshot of the UI-visible connection state
#[derive(Debug, Clone)]
pub struct VpnStatus {
    /// Committed connection state
    pub state: ConnectionState,
    /// Active endpoint, when a session is live
    pub server: Option<Server>,
    /// Session counters, when a session is live
    pub session: Option<SessionStats>,
}

/// Mutable state behind the manager's lock
struct Inner {
    state: ConnectionState,
    session: Option<ConnectionSession>,
    /// Bumped every time a session opens, so a stale telemetry task
    /// never writes into a newer session
    session_epoch: u64,
    preferred: String,
}

/// Rotation and labeling policy, adjustable at runtime
struct Policy {
    auto_rotate: bool,
    rotation_interval: Duration,
    encryption: EncryptionLevel,
}

/// Connection lifecycle manager.
///
/// Construct once per user session and share via [`Arc`]; there is no
/// global instance.
pub struct VpnManager {
    directory: Arc<ServerDirectory>,
    gate: PermissionGate,
    bridge: Arc<dyn PlatformBridge>,
    inner: Arc<RwLock<Inner>>,
    policy: Arc<RwLock<Policy>>,
    /// Serializes the public lifecycle operations (see module docs)
    op_gate: Mutex<()>,
    events: broadcast::Sender<VpnEvent>,
    scheduler: RotationScheduler,
    traffic: Arc<StdMutex<Box<dyn TrafficSource>>>,
}

impl VpnManager {
    /// Create a manager with the production traffic generator
    pub fn new(
        settings: &VpnSettings,
        directory: Arc<ServerDirectory>,
        gate: PermissionGate,
        bridge: Arc<dyn PlatformBridge>,
    ) -> Arc<Self> {
        Self::with_traffic(settings, directory, gate, bridge, Box::new(SyntheticTraffic))
    }

    /// Create a manager with an injected traffic generator
    pub fn with_traffic(
        settings: &VpnSettings,
        directory: Arc<ServerDirectory>,
        gate: PermissionGate,
        bridge: Arc<dyn PlatformBridge>,
        traffic: Box<dyn TrafficSource>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);

        Arc::new(Self {
            directory,
            gate,
            bridge,
            inner: Arc::new(RwLock::new(Inner {
                state: ConnectionState::Disconnected,
                session: None,
                session_epoch: 0,
                preferred: settings.preferred_server.clone(),
            })),
            policy: Arc::new(RwLock::new(Policy {
                auto_rotate: settings.auto_rotate,
                rotation_interval: settings.rotation_interval(),
                encryption: settings.encryption,
            })),
            op_gate: Mutex::new(()),
            events,
            scheduler: RotationScheduler::new(),
            traffic: Arc::new(StdMutex::new(traffic)),
        })
    }

    /// Subscribe to domain events
    pub fn subscribe(&self) -> broadcast::Receiver<VpnEvent> {
        self.events.subscribe()
    }

    /// Committed connection state
    pub async fn state(&self) -> ConnectionState {
        self.inner.read().await.state
    }

    /// UI-visible snapshot: state, active server, session counters
    pub async fn current_state(&self) -> VpnStatus {
        let inner = self.inner.read().await;
        VpnStatus {
            state: inner.state,
            server: inner.session.as_ref().map(|s| s.server.clone()),
            session: inner.session.as_ref().map(ConnectionSession::stats),
        }
    }

    /// Current rotation period
    pub async fn rotation_interval(&self) -> Duration {
        self.policy.read().await.rotation_interval
    }

    /// Whether auto-rotation is enabled
    pub async fn auto_rotate(&self) -> bool {
        self.policy.read().await.auto_rotate
    }

    /// Whether the rotation timer is armed
    pub fn rotation_armed(&self) -> bool {
        self.scheduler.is_armed()
    }

    /// One-line status for logs
    pub async fn status_line(&self) -> String {
        let status = self.current_state().await;
        match (&status.server, &status.session) {
            (Some(server), Some(session)) => {
                format!("{} | {} | {}", status.state, server, session.format())
            }
            _ => format!("{}", status.state),
        }
    }

    /// Change the preferred server without touching a live connection
    pub async fn select_server(&self, server_id: &str) -> Result<(), VpnError> {
        if self.directory.find(server_id).is_none() {
            return Err(VpnError::InvalidServer(server_id.to_string()));
        }
        self.inner.write().await.preferred = server_id.to_string();
        Ok(())
    }

    /// Connect to the preferred server
    pub async fn connect_preferred(self: &Arc<Self>) -> Result<ConnectionState, VpnError> {
        let preferred = self.inner.read().await.preferred.clone();
        self.connect(&preferred).await
    }

    /// Connect to a server by id.
    ///
    /// A no-op returning the current state unless `Disconnected`.
    /// Unknown ids and permission denials are rejected before any
    /// bridge call; a bridge failure forces the state back to
    /// `Disconnected` with no residual session.
    pub async fn connect(self: &Arc<Self>, server_id: &str) -> Result<ConnectionState, VpnError> {
        let _guard = self
            .op_gate
            .try_lock()
            .map_err(|_| VpnError::ConcurrentOperation)?;

        {
            let inner = self.inner.read().await;
            if inner.state != ConnectionState::Disconnected {
                debug!("connect({server_id}) ignored in state {}", inner.state);
                return Ok(inner.state);
            }
        }

        let server = self
            .directory
            .find(server_id)
            .ok_or_else(|| VpnError::InvalidServer(server_id.to_string()))?;

        self.gate.ensure().await?;

        info!("Connecting to {server}");
        self.transition(ConnectionState::Disconnected, ConnectionState::Connecting)
            .await;

        let profile = self.bridge.create_profile(&server);
        match self.bridge.connect(&profile).await {
            Ok(()) => {
                let encryption = self.policy.read().await.encryption;
                let epoch = {
                    let mut inner = self.inner.write().await;
                    inner.state = ConnectionState::Connected;
                    inner.session = Some(ConnectionSession::open(server.clone(), encryption));
                    inner.session_epoch += 1;
                    inner.session_epoch
                };

                self.emit(VpnEvent::StateChanged {
                    from: ConnectionState::Connecting,
                    to: ConnectionState::Connected,
                });
                self.emit(VpnEvent::Connected {
                    server_id: server.id.clone(),
                });
                info!("Connected to {server}");

                self.spawn_telemetry(epoch);
                if self.policy.read().await.auto_rotate {
                    self.scheduler.arm(self.clone());
                }

                Ok(ConnectionState::Connected)
            }
            Err(e) => {
                error!("Connection to {server} failed: {e}");
                self.inner.write().await.state = ConnectionState::Disconnected;
                self.emit(VpnEvent::StateChanged {
                    from: ConnectionState::Connecting,
                    to: ConnectionState::Disconnected,
                });
                Err(VpnError::Bridge(e))
            }
        }
    }

    /// Disconnect the live session.
    ///
    /// Queues behind any in-flight operation rather than failing, so a
    /// disconnect issued during `Connecting` runs as soon as the
    /// connect settles. Bridge teardown is best-effort: local state is
    /// forced to `Disconnected` regardless, and a teardown failure is
    /// still reported after the forced transition.
    pub async fn disconnect(&self) -> Result<ConnectionState, VpnError> {
        let _guard = self.op_gate.lock().await;

        {
            let inner = self.inner.read().await;
            if inner.state != ConnectionState::Connected {
                debug!("disconnect() ignored in state {}", inner.state);
                return Ok(inner.state);
            }
        }

        info!("Disconnecting");
        let teardown = self.bridge.disconnect().await;
        let forced = teardown.is_err();

        {
            let mut inner = self.inner.write().await;
            inner.state = ConnectionState::Disconnected;
            inner.session = None;
        }
        self.scheduler.disarm();

        self.emit(VpnEvent::StateChanged {
            from: ConnectionState::Connected,
            to: ConnectionState::Disconnected,
        });
        self.emit(VpnEvent::Disconnected { forced });

        match teardown {
            Ok(()) => {
                info!("Disconnected");
                Ok(ConnectionState::Disconnected)
            }
            Err(e) => {
                warn!("Bridge teardown failed ({e}); local state forced to disconnected");
                Err(VpnError::Bridge(e))
            }
        }
    }

    /// Rotate to the next server in round-robin order.
    ///
    /// A no-op outside `Connected` and on a single-entry directory.
    /// Rotation preserves the session identity; only the endpoint
    /// changes. A bridge failure mid-rotation tears down the whole
    /// session rather than leaving it half-rotated.
    pub async fn rotate(self: &Arc<Self>) -> Result<ConnectionState, VpnError> {
        let _guard = self
            .op_gate
            .try_lock()
            .map_err(|_| VpnError::ConcurrentOperation)?;

        let current = {
            let inner = self.inner.read().await;
            if inner.state != ConnectionState::Connected {
                debug!("rotate() ignored in state {}", inner.state);
                return Ok(inner.state);
            }
            match inner.session.as_ref() {
                Some(session) => session.server.clone(),
                None => return Ok(inner.state),
            }
        };

        let next = match self.directory.next_after(&current.id) {
            Some(next) => next,
            None => return Ok(ConnectionState::Connected),
        };
        if next.id == current.id {
            debug!("Single-entry directory; rotation is a no-op");
            return Ok(ConnectionState::Connected);
        }

        info!("Rotating {current} -> {next}");
        self.transition(ConnectionState::Connected, ConnectionState::Rotating)
            .await;

        let profile = self.bridge.create_profile(&next);
        match self.bridge.connect(&profile).await {
            Ok(()) => {
                {
                    let mut inner = self.inner.write().await;
                    inner.state = ConnectionState::Connected;
                    if let Some(session) = inner.session.as_mut() {
                        session.server = next.clone();
                    }
                }
                self.emit(VpnEvent::StateChanged {
                    from: ConnectionState::Rotating,
                    to: ConnectionState::Connected,
                });
                self.emit(VpnEvent::Rotated {
                    from_id: current.id,
                    to_id: next.id.clone(),
                });
                info!("Rotation complete: {next}");
                Ok(ConnectionState::Connected)
            }
            Err(e) => {
                error!("Rotation to {next} failed: {e}; tearing down session");

                // Never leave a half-rotated state behind
                let _ = self.bridge.disconnect().await;
                {
                    let mut inner = self.inner.write().await;
                    inner.state = ConnectionState::Disconnected;
                    inner.session = None;
                }
                self.scheduler.disarm();

                self.emit(VpnEvent::StateChanged {
                    from: ConnectionState::Rotating,
                    to: ConnectionState::Disconnected,
                });
                self.emit(VpnEvent::RotationFailed {
                    reason: e.to_string(),
                });
                self.emit(VpnEvent::Disconnected { forced: false });

                Err(VpnError::Bridge(e))
            }
        }
    }

    /// Toggle auto-rotation. Disarms the timer immediately when turned
    /// off; arms it when turned on while connected.
    pub async fn set_auto_rotate(self: &Arc<Self>, enabled: bool) {
        self.policy.write().await.auto_rotate = enabled;

        if !enabled {
            self.scheduler.disarm();
        } else if self.inner.read().await.state == ConnectionState::Connected {
            self.scheduler.arm(self.clone());
        }
    }

    /// Change the rotation period. Applies on the next connected tick;
    /// it never makes a pending tick fire early.
    pub async fn set_rotation_interval(&self, interval: Duration) {
        self.policy.write().await.rotation_interval = interval;
    }

    /// Permission status, as cached by the gate
    pub async fn permissions(&self) -> crate::permissions::Permissions {
        self.gate.status().await
    }

    async fn transition(&self, from: ConnectionState, to: ConnectionState) {
        self.inner.write().await.state = to;
        self.emit(VpnEvent::StateChanged { from, to });
    }

    fn emit(&self, event: VpnEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    /// Accumulate synthetic byte counters once per second while the
    /// session lives. The epoch check keeps a stale task from writing
    /// into a session created after its own ended.
    fn spawn_telemetry(&self, epoch: u64) {
        let inner = self.inner.clone();
        let traffic = self.traffic.clone();

        tokio::spawn(async move {
            let mut tick = tokio::time::interval(Duration::from_secs(1));
            tick.tick().await; // consume the immediate first tick

            loop {
                tick.tick().await;

                let mut inner = inner.write().await;
                if inner.session_epoch != epoch {
                    break;
                }
                match inner.session.as_mut() {
                    Some(session) => {
                        let sample = traffic.lock().unwrap().sample();
                        session.record(sample);
                    }
                    None => break,
                }
            }
        });
    }
}
