//! SecureVault VPN — connection lifecycle core
//!
//! The one real subsystem of the client: a connection state machine
//! over a server directory, gated by platform permissions, speaking to
//! the tunnel through a platform bridge, with automatic round-robin
//! server rotation and per-session telemetry.
//!
//! Construction wires the pieces together once:
//!
//! ```no_run
//! use std::sync::Arc;
//! use vault_vpn::{
//!     PermissionGate, ServerDirectory, SimulatedBridge, VpnManager, VpnSettings,
//! };
//!
//! # async fn run() -> Result<(), vault_vpn::VpnError> {
//! let settings = VpnSettings::default();
//! let manager = VpnManager::new(
//!     &settings,
//!     Arc::new(ServerDirectory::builtin()),
//!     PermissionGate::web(),
//!     Arc::new(SimulatedBridge::new(settings.connect_latency())),
//! );
//!
//! manager.connect("us-ny-1").await?;
//! manager.rotate().await?;
//! manager.disconnect().await?;
//! # Ok(())
//! # }
//! ```

mod bridge;
mod config;
mod directory;
mod events;
mod manager;
mod permissions;
mod rotation;
mod session;

pub use bridge::{BridgeError, NativeBridge, PlatformBridge, SimulatedBridge, TunnelProtocol, VpnProfile};
pub use config::{ConfigError, EncryptionLevel, Platform, VpnSettings};
pub use directory::{Server, ServerDirectory, address_for, exit_ip_for};
pub use events::VpnEvent;
pub use manager::{ConnectionState, VpnError, VpnManager, VpnStatus};
pub use permissions::{
    FixedPrompt, PermissionError, PermissionGate, PermissionPrompt, Permissions,
};
pub use rotation::RotationScheduler;
pub use session::{ConnectionSession, SessionStats, SteadyTraffic, SyntheticTraffic, TrafficSample, TrafficSource};
