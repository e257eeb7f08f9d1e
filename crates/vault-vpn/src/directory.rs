//! Server Directory
//!
//! Static catalog of candidate VPN endpoints. Entries are appended at
//! boot and live for the process lifetime; only the advisory ping and
//! load fields may be refreshed out-of-band.
//!
//! Rotation order is fixed round-robin over the listing order, never
//! randomized, so a connected client visits every endpoint before
//! repeating one.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::RwLock;
use std::time::Duration;

/// A candidate VPN endpoint.
///
/// Identity is `id`; the remaining fields are display metadata. Ping
/// and load are advisory and never gate connect or rotate decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    /// Unique identifier, e.g. "us-ny-1"
    pub id: String,
    /// Display name
    pub name: String,
    /// Country
    pub country: String,
    /// Flag label
    pub flag: String,
    /// Measured round-trip time (milliseconds)
    pub ping_ms: u32,
    /// Current load percentage [0, 100]
    pub load: u8,
    /// Premium-tier endpoint
    #[serde(default)]
    pub premium: bool,
}

impl Server {
    /// Measured round-trip time as a duration
    pub fn ping(&self) -> Duration {
        Duration::from_millis(u64::from(self.ping_ms))
    }
}

impl std::fmt::Display for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}, {})", self.name, self.country, self.id)
    }
}

/// Advisory metrics for one directory entry
#[derive(Debug, Clone, Copy, Default)]
struct Metrics {
    ping_ms: u32,
    load: u8,
}

/// Static, append-only server catalog.
///
/// `find` is O(1) by id; `next_after` implements the round-robin
/// rotation rule.
pub struct ServerDirectory {
    servers: Vec<Server>,
    by_id: HashMap<String, usize>,
    /// Out-of-band ping/load refreshes, keyed by listing position
    metrics: RwLock<HashMap<usize, Metrics>>,
}

impl ServerDirectory {
    /// Create a directory from a boot-time listing
    pub fn new(servers: Vec<Server>) -> Self {
        let by_id = servers
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.clone(), i))
            .collect();

        Self {
            servers,
            by_id,
            metrics: RwLock::new(HashMap::new()),
        }
    }

    /// The built-in SecureVault endpoint catalog
    pub fn builtin() -> Self {
        Self::new(builtin_servers())
    }

    /// Number of listed servers
    pub fn len(&self) -> usize {
        self.servers.len()
    }

    /// Check if the directory is empty
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Look up a server by id, with any refreshed metrics applied
    pub fn find(&self, id: &str) -> Option<Server> {
        let index = *self.by_id.get(id)?;
        Some(self.entry(index))
    }

    /// All servers in listing order
    pub fn list(&self) -> Vec<Server> {
        (0..self.servers.len()).map(|i| self.entry(i)).collect()
    }

    /// The next server in fixed round-robin order after `id`.
    ///
    /// Wraps after the last entry and skips the given server exactly
    /// once. On a directory of size 1 this returns the same server;
    /// callers treat that as a rotation no-op.
    pub fn next_after(&self, id: &str) -> Option<Server> {
        let index = *self.by_id.get(id)?;
        let next = (index + 1) % self.servers.len();
        Some(self.entry(next))
    }

    /// Refresh the advisory ping/load for an entry.
    ///
    /// Returns false if the id is unknown. Identity fields are
    /// immutable once listed.
    pub fn update_metrics(&self, id: &str, ping: Duration, load: u8) -> bool {
        let Some(&index) = self.by_id.get(id) else {
            return false;
        };

        let mut metrics = self.metrics.write().unwrap();
        metrics.insert(
            index,
            Metrics {
                ping_ms: ping.as_millis() as u32,
                load: load.min(100),
            },
        );
        true
    }

    fn entry(&self, index: usize) -> Server {
        let mut server = self.servers[index].clone();
        if let Some(m) = self.metrics.read().unwrap().get(&index) {
            server.ping_ms = m.ping_ms;
            server.load = m.load;
        }
        server
    }
}

impl Default for ServerDirectory {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Tunnel endpoint address for a server id.
///
/// Unknown ids fall back to the default endpoint.
pub fn address_for(id: &str) -> &'static str {
    match id {
        "us-ny-1" => "ny1.securevault.vpn",
        "us-ca-1" => "ca1.securevault.vpn",
        "uk-lon-1" => "lon1.securevault.vpn",
        "de-ber-1" => "ber1.securevault.vpn",
        "jp-tok-1" => "tok1.securevault.vpn",
        "sg-sin-1" => "sin1.securevault.vpn",
        "au-syd-1" => "syd1.securevault.vpn",
        _ => "default.securevault.vpn",
    }
}

/// Exit IP presented to the outside world for a server id
pub fn exit_ip_for(id: &str) -> IpAddr {
    let octets = match id {
        "us-ny-1" => [74, 125, 224, 72],
        "us-ca-1" => [104, 16, 123, 45],
        "uk-lon-1" => [51, 158, 99, 12],
        "de-ber-1" => [85, 159, 233, 44],
        "jp-tok-1" => [103, 4, 96, 167],
        "sg-sin-1" => [139, 180, 132, 101],
        "au-syd-1" => [103, 252, 114, 66],
        _ => [85, 159, 233, 44],
    };
    IpAddr::V4(Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3]))
}

fn builtin_servers() -> Vec<Server> {
    fn server(
        id: &str,
        name: &str,
        country: &str,
        flag: &str,
        ping_ms: u32,
        load: u8,
        premium: bool,
    ) -> Server {
        Server {
            id: id.to_string(),
            name: name.to_string(),
            country: country.to_string(),
            flag: flag.to_string(),
            ping_ms,
            load,
            premium,
        }
    }

    vec![
        server("us-ny-1", "New York", "United States", "🇺🇸", 45, 23, false),
        server("us-ca-1", "Los Angeles", "United States", "🇺🇸", 38, 67, false),
        server("uk-lon-1", "London", "United Kingdom", "🇬🇧", 89, 45, false),
        server("de-ber-1", "Berlin", "Germany", "🇩🇪", 76, 32, false),
        server("jp-tok-1", "Tokyo", "Japan", "🇯🇵", 145, 28, true),
        server("sg-sin-1", "Singapore", "Singapore", "🇸🇬", 156, 55, true),
        server("au-syd-1", "Sydney", "Australia", "🇦🇺", 178, 41, false),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog() {
        let directory = ServerDirectory::builtin();

        assert_eq!(directory.len(), 7);
        let ny = directory.find("us-ny-1").unwrap();
        assert_eq!(ny.name, "New York");
        assert_eq!(ny.ping(), Duration::from_millis(45));
        assert!(!ny.premium);

        let tokyo = directory.find("jp-tok-1").unwrap();
        assert!(tokyo.premium);
    }

    #[test]
    fn test_find_unknown() {
        let directory = ServerDirectory::builtin();
        assert!(directory.find("mars-1").is_none());
    }

    #[test]
    fn test_round_robin_wraps() {
        let directory = ServerDirectory::builtin();

        assert_eq!(directory.next_after("us-ny-1").unwrap().id, "us-ca-1");
        assert_eq!(directory.next_after("au-syd-1").unwrap().id, "us-ny-1");
    }

    #[test]
    fn test_round_robin_covers_all() {
        let directory = ServerDirectory::builtin();
        let mut current = "us-ny-1".to_string();
        let mut visited = vec![current.clone()];

        for _ in 1..directory.len() {
            current = directory.next_after(&current).unwrap().id;
            visited.push(current.clone());
        }

        visited.sort();
        visited.dedup();
        assert_eq!(visited.len(), directory.len());

        // One more step repeats the cycle
        assert_eq!(directory.next_after(&current).unwrap().id, "us-ny-1");
    }

    #[test]
    fn test_single_entry_rotates_to_itself() {
        let directory = ServerDirectory::new(vec![Server {
            id: "solo-1".to_string(),
            name: "Solo".to_string(),
            country: "Nowhere".to_string(),
            flag: "🏳️".to_string(),
            ping_ms: 10,
            load: 5,
            premium: false,
        }]);

        assert_eq!(directory.next_after("solo-1").unwrap().id, "solo-1");
    }

    #[test]
    fn test_metrics_refresh() {
        let directory = ServerDirectory::builtin();

        assert!(directory.update_metrics("uk-lon-1", Duration::from_millis(120), 80));
        let london = directory.find("uk-lon-1").unwrap();
        assert_eq!(london.ping_ms, 120);
        assert_eq!(london.load, 80);
        // Identity fields untouched
        assert_eq!(london.name, "London");

        assert!(!directory.update_metrics("mars-1", Duration::from_millis(1), 1));
    }

    #[test]
    fn test_address_tables() {
        assert_eq!(address_for("jp-tok-1"), "tok1.securevault.vpn");
        assert_eq!(address_for("mars-1"), "default.securevault.vpn");

        assert_eq!(
            exit_ip_for("us-ny-1"),
            IpAddr::V4(Ipv4Addr::new(74, 125, 224, 72))
        );
    }
}
