//! Permission Gate
//!
//! Tracks and requests the capabilities a native platform demands
//! before a tunnel may be established: tunnel access, network
//! observation, and background execution.
//!
//! The three capabilities are requested in one batched platform
//! prompt. A user-level denial of tunnel access fails the whole batch
//! regardless of the other two; grants are cached for the process
//! lifetime and never silently downgraded by the core.
//!
//! On the web platform there is no native tunnel to authorize, so the
//! gate is a pass-through.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Granted capability set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Permissions {
    /// Establish VPN tunnels
    pub tunnel_access: bool,
    /// Observe and manage network connections
    pub network_observation: bool,
    /// Keep the tunnel alive while backgrounded
    pub background_execution: bool,
}

impl Permissions {
    /// All three capabilities granted
    pub fn granted() -> Self {
        Self {
            tunnel_access: true,
            network_observation: true,
            background_execution: true,
        }
    }

    /// Check whether every capability is granted
    pub fn all_granted(&self) -> bool {
        self.tunnel_access && self.network_observation && self.background_execution
    }
}

/// Permission failures
#[derive(Debug, Clone, thiserror::Error)]
pub enum PermissionError {
    #[error("Tunnel permission denied by the user")]
    TunnelDenied,

    #[error("Platform prompt failed: {0}")]
    Platform(String),
}

/// One batched platform permission prompt.
///
/// Implemented by the platform glue; returns whatever subset the user
/// granted.
#[async_trait]
pub trait PermissionPrompt: Send + Sync {
    /// Show the batched prompt and return the granted set
    async fn request(&self) -> Result<Permissions, PermissionError>;
}

/// Prompt with a preset outcome.
///
/// Stands in for the platform prompt in tests and on builds without
/// the OS glue wired up.
pub struct FixedPrompt {
    outcome: Permissions,
}

impl FixedPrompt {
    /// Prompt that grants the given set
    pub fn new(outcome: Permissions) -> Self {
        Self { outcome }
    }

    /// Prompt that grants everything
    pub fn granted() -> Self {
        Self::new(Permissions::granted())
    }
}

#[async_trait]
impl PermissionPrompt for FixedPrompt {
    async fn request(&self) -> Result<Permissions, PermissionError> {
        Ok(self.outcome)
    }
}

enum GateMode {
    /// Native platform: prompt required before the first connect
    Native(Arc<dyn PermissionPrompt>),
    /// Web platform: nothing to authorize
    Web,
}

/// Capability gate consulted before every native connect attempt
pub struct PermissionGate {
    mode: GateMode,
    granted: RwLock<Permissions>,
}

impl PermissionGate {
    /// Gate for a native platform, batching requests through `prompt`
    pub fn native(prompt: Arc<dyn PermissionPrompt>) -> Self {
        Self {
            mode: GateMode::Native(prompt),
            granted: RwLock::new(Permissions::default()),
        }
    }

    /// Pass-through gate for the web platform
    pub fn web() -> Self {
        Self {
            mode: GateMode::Web,
            granted: RwLock::new(Permissions::granted()),
        }
    }

    /// Currently granted capability set
    pub async fn status(&self) -> Permissions {
        *self.granted.read().await
    }

    /// Ensure the tunnel may be established.
    ///
    /// Returns immediately when tunnel access is already granted (or
    /// on the web platform). Otherwise runs one batched prompt; a
    /// tunnel-access denial fails the batch, though independently
    /// granted capabilities are still cached.
    pub async fn ensure(&self) -> Result<(), PermissionError> {
        let prompt = match &self.mode {
            GateMode::Web => return Ok(()),
            GateMode::Native(prompt) => prompt,
        };

        if self.granted.read().await.tunnel_access {
            return Ok(());
        }

        info!("Requesting VPN permissions (tunnel, network, background)");
        let outcome = prompt.request().await?;

        // Cache whatever the user granted; never downgrade
        {
            let mut granted = self.granted.write().await;
            granted.tunnel_access |= outcome.tunnel_access;
            granted.network_observation |= outcome.network_observation;
            granted.background_execution |= outcome.background_execution;
        }

        if !outcome.tunnel_access {
            warn!("Tunnel permission denied; connect attempts will be refused");
            return Err(PermissionError::TunnelDenied);
        }

        info!("VPN permissions granted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts prompt invocations to verify caching
    struct CountingPrompt {
        outcome: Permissions,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PermissionPrompt for CountingPrompt {
        async fn request(&self) -> Result<Permissions, PermissionError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(self.outcome)
        }
    }

    #[tokio::test]
    async fn test_web_gate_passes_through() {
        let gate = PermissionGate::web();

        assert!(gate.ensure().await.is_ok());
        assert!(gate.status().await.all_granted());
    }

    #[tokio::test]
    async fn test_native_grant_cached() {
        let prompt = Arc::new(CountingPrompt {
            outcome: Permissions::granted(),
            calls: AtomicUsize::new(0),
        });
        let gate = PermissionGate::native(prompt.clone());

        gate.ensure().await.unwrap();
        gate.ensure().await.unwrap();
        gate.ensure().await.unwrap();

        // Granted on the first call, cached afterwards
        assert_eq!(prompt.calls.load(Ordering::Relaxed), 1);
        assert!(gate.status().await.all_granted());
    }

    #[tokio::test]
    async fn test_tunnel_denial_fails_batch() {
        let outcome = Permissions {
            tunnel_access: false,
            network_observation: true,
            background_execution: true,
        };
        let gate = PermissionGate::native(Arc::new(FixedPrompt::new(outcome)));

        let result = gate.ensure().await;
        assert!(matches!(result, Err(PermissionError::TunnelDenied)));

        // Independent grants are still cached
        let status = gate.status().await;
        assert!(!status.tunnel_access);
        assert!(status.network_observation);
        assert!(status.background_execution);
    }

    #[tokio::test]
    async fn test_denied_gate_retries_prompt() {
        let prompt = Arc::new(CountingPrompt {
            outcome: Permissions::default(),
            calls: AtomicUsize::new(0),
        });
        let gate = PermissionGate::native(prompt.clone());

        assert!(gate.ensure().await.is_err());
        assert!(gate.ensure().await.is_err());

        // No grant was cached, so each ensure re-prompts
        assert_eq!(prompt.calls.load(Ordering::Relaxed), 2);
    }
}
