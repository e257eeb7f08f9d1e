//! Domain Events
//!
//! Typed events emitted by the state machine so collaborators (UI,
//! scheduler, telemetry views) react to committed transitions instead
//! of polling or scraping logs. Events are observed in commit order.

use crate::manager::ConnectionState;

/// Events published on the manager's broadcast channel
#[derive(Debug, Clone)]
pub enum VpnEvent {
    /// A state transition was committed
    StateChanged {
        from: ConnectionState,
        to: ConnectionState,
    },
    /// A session was established
    Connected { server_id: String },
    /// Rotation completed; the session endpoint changed
    Rotated { from_id: String, to_id: String },
    /// Rotation failed and the session was torn down
    RotationFailed { reason: String },
    /// The session ended. `forced` is set when the bridge teardown
    /// failed and local state was forced down anyway.
    Disconnected { forced: bool },
}
