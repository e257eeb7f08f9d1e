//! Rotation Scheduler
//!
//! A single cancellable timer task that asks the state machine to
//! rotate servers while connected with auto-rotation enabled.
//!
//! Arming and disarming are explicit, observable operations. The loop
//! invokes `rotate()` exactly once per tick and only re-arms after the
//! call settles, so two rotations can never overlap. Any transition
//! out of `Connected`, or toggling auto-rotation off, disarms it.

use crate::manager::{VpnError, VpnManager};
use std::sync::Arc;
use std::sync::Mutex;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Cancellable periodic rotation timer
pub struct RotationScheduler {
    cancel: Mutex<Option<watch::Sender<bool>>>,
}

impl RotationScheduler {
    /// Create a disarmed scheduler
    pub fn new() -> Self {
        Self {
            cancel: Mutex::new(None),
        }
    }

    /// Check whether a timer task is currently armed
    pub fn is_armed(&self) -> bool {
        self.cancel.lock().unwrap().is_some()
    }

    /// Arm the timer. Replaces any previously armed task.
    ///
    /// The interval is read fresh before every tick, so an interval
    /// change applies on the next connected tick and never fires
    /// early.
    pub fn arm(&self, manager: Arc<VpnManager>) {
        let (tx, mut rx) = watch::channel(false);
        {
            let mut slot = self.cancel.lock().unwrap();
            if let Some(old) = slot.replace(tx) {
                let _ = old.send(true);
            }
        }

        tokio::spawn(async move {
            debug!("Rotation scheduler armed");
            loop {
                let interval = manager.rotation_interval().await;

                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        if !manager.auto_rotate().await {
                            break;
                        }
                        if !manager.state().await.is_connected() {
                            break;
                        }

                        match manager.rotate().await {
                            Ok(_) => {}
                            Err(VpnError::ConcurrentOperation) => {
                                // Another operation won the race; the
                                // post-transition state decides next tick
                            }
                            Err(e) => {
                                warn!("Scheduled rotation failed: {e}");
                                break;
                            }
                        }
                    }
                    _ = rx.changed() => break,
                }
            }
            debug!("Rotation scheduler stopped");
        });
    }

    /// Cancel the timer task, if armed
    pub fn disarm(&self) {
        if let Some(tx) = self.cancel.lock().unwrap().take() {
            let _ = tx.send(true);
        }
    }
}

impl Default for RotationScheduler {
    fn default() -> Self {
        Self::new()
    }
}
