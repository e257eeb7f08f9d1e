//! Connection Session
//!
//! The record of one continuous logical connected period. Created on
//! a successful connect, destroyed synchronously with the transition
//! back to `Disconnected`, and it survives server rotations: only the
//! endpoint changes, never `started_at` or the byte counters.
//!
//! In the absence of a real tunnel the byte counters are synthetic,
//! but the update contract is real: monotonic accumulation while the
//! session lives, reset by session destruction. The generator sits
//! behind [`TrafficSource`] so tests inject a deterministic one.

use crate::config::EncryptionLevel;
use crate::directory::Server;
use std::time::{Duration, Instant};

/// Live session state, exclusively owned by the state machine
#[derive(Debug, Clone)]
pub struct ConnectionSession {
    /// Currently active endpoint (swapped by rotation)
    pub server: Server,
    /// Session start; set exactly once, preserved across rotations
    pub started_at: Instant,
    /// Cumulative bytes uploaded
    pub bytes_up: u64,
    /// Cumulative bytes downloaded
    pub bytes_down: u64,
    /// Cosmetic encryption label
    pub encryption: EncryptionLevel,
}

impl ConnectionSession {
    /// Open a session on the given endpoint
    pub fn open(server: Server, encryption: EncryptionLevel) -> Self {
        Self {
            server,
            started_at: Instant::now(),
            bytes_up: 0,
            bytes_down: 0,
            encryption,
        }
    }

    /// Time since the session started
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Accumulate one telemetry sample
    pub fn record(&mut self, sample: TrafficSample) {
        self.bytes_up += sample.up;
        self.bytes_down += sample.down;
    }

    /// Read-only snapshot for consumers
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            server_id: self.server.id.clone(),
            elapsed: self.elapsed(),
            bytes_up: self.bytes_up,
            bytes_down: self.bytes_down,
            encryption: self.encryption,
        }
    }
}

/// Session snapshot handed to the UI and other read-only consumers
#[derive(Debug, Clone)]
pub struct SessionStats {
    /// Active endpoint id
    pub server_id: String,
    /// Session duration so far
    pub elapsed: Duration,
    /// Cumulative bytes uploaded
    pub bytes_up: u64,
    /// Cumulative bytes downloaded
    pub bytes_down: u64,
    /// Cosmetic encryption label
    pub encryption: EncryptionLevel,
}

impl SessionStats {
    /// Format as a human-readable string
    pub fn format(&self) -> String {
        format!(
            "{} | up {:.1}KB, down {:.1}KB | {}s",
            self.server_id,
            self.bytes_up as f64 / 1024.0,
            self.bytes_down as f64 / 1024.0,
            self.elapsed.as_secs()
        )
    }
}

/// One second of transferred bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrafficSample {
    pub up: u64,
    pub down: u64,
}

/// Pluggable per-tick byte counter source
pub trait TrafficSource: Send {
    /// Bytes transferred since the previous sample
    fn sample(&mut self) -> TrafficSample;
}

/// Production generator: plausible randomized throughput
pub struct SyntheticTraffic;

impl TrafficSource for SyntheticTraffic {
    fn sample(&mut self) -> TrafficSample {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        TrafficSample {
            up: rng.gen_range(500..1500),
            down: rng.gen_range(1000..6000),
        }
    }
}

/// Deterministic generator for tests and injection
pub struct SteadyTraffic {
    sample: TrafficSample,
}

impl SteadyTraffic {
    /// Source that reports the same sample every tick
    pub fn new(up: u64, down: u64) -> Self {
        Self {
            sample: TrafficSample { up, down },
        }
    }
}

impl TrafficSource for SteadyTraffic {
    fn sample(&mut self) -> TrafficSample {
        self.sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::ServerDirectory;

    #[test]
    fn test_session_accumulates() {
        let directory = ServerDirectory::builtin();
        let mut session = directory
            .find("us-ny-1")
            .map(|s| ConnectionSession::open(s, EncryptionLevel::Military))
            .unwrap();

        session.record(TrafficSample { up: 100, down: 400 });
        session.record(TrafficSample { up: 50, down: 600 });

        assert_eq!(session.bytes_up, 150);
        assert_eq!(session.bytes_down, 1000);
    }

    #[test]
    fn test_rotation_preserves_identity() {
        let directory = ServerDirectory::builtin();
        let mut session = directory
            .find("us-ny-1")
            .map(|s| ConnectionSession::open(s, EncryptionLevel::Standard))
            .unwrap();
        session.record(TrafficSample { up: 10, down: 20 });

        let started_at = session.started_at;

        // Rotation swaps only the endpoint
        session.server = directory.find("uk-lon-1").unwrap();

        assert_eq!(session.started_at, started_at);
        assert_eq!(session.bytes_up, 10);
        assert_eq!(session.stats().server_id, "uk-lon-1");
    }

    #[test]
    fn test_steady_source_is_deterministic() {
        let mut source = SteadyTraffic::new(100, 500);

        assert_eq!(source.sample(), TrafficSample { up: 100, down: 500 });
        assert_eq!(source.sample(), TrafficSample { up: 100, down: 500 });
    }

    #[test]
    fn test_synthetic_source_bounds() {
        let mut source = SyntheticTraffic;

        for _ in 0..50 {
            let sample = source.sample();
            assert!((500..1500).contains(&sample.up));
            assert!((1000..6000).contains(&sample.down));
        }
    }
}
