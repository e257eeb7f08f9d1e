//! SecureVault: privacy-first VPN client
//!
//! Main entry point. Initializes the global allocator, sets up
//! logging, loads settings, wires the connection lifecycle manager,
//! and runs until Ctrl-C.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;
use vault_vpn::{
    FixedPrompt, PermissionGate, PlatformBridge, NativeBridge, ServerDirectory, SimulatedBridge,
    VpnEvent, VpnManager, VpnSettings,
};

// Use mimalloc as the global allocator for reduced memory fragmentation
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let _subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .compact()
        .init();

    info!("SecureVault starting...");

    let settings = match std::env::args().nth(1) {
        Some(path) => VpnSettings::from_file(std::path::Path::new(&path))
            .with_context(|| format!("loading settings from {path}"))?,
        None => VpnSettings::default(),
    };
    info!(
        "Platform: {:?}, encryption: {}, auto-rotate: {}",
        settings.platform,
        settings.encryption.name(),
        settings.auto_rotate
    );

    let bridge: Arc<dyn PlatformBridge> = if settings.platform.is_native() {
        Arc::new(NativeBridge::new())
    } else {
        Arc::new(SimulatedBridge::new(settings.connect_latency()))
    };
    let gate = if settings.platform.is_native() {
        PermissionGate::native(Arc::new(FixedPrompt::granted()))
    } else {
        PermissionGate::web()
    };

    let directory = Arc::new(ServerDirectory::builtin());
    info!("Server directory loaded: {} servers", directory.len());

    let manager = VpnManager::new(&settings, directory, gate, bridge);

    // Forward domain events to the log
    let mut events = manager.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                VpnEvent::StateChanged { from, to } => info!("State: {from} -> {to}"),
                VpnEvent::Connected { server_id } => info!("Session up on {server_id}"),
                VpnEvent::Rotated { from_id, to_id } => info!("Rotated {from_id} -> {to_id}"),
                VpnEvent::RotationFailed { reason } => warn!("Rotation failed: {reason}"),
                VpnEvent::Disconnected { forced } => {
                    if forced {
                        warn!("Session ended (teardown forced)");
                    } else {
                        info!("Session ended");
                    }
                }
            }
        }
    });

    manager.connect_preferred().await?;
    info!("{}", manager.status_line().await);

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("Shutting down");

    if let Err(e) = manager.disconnect().await {
        warn!("Teardown reported an error: {e}");
    }

    info!("SecureVault stopped");
    Ok(())
}
