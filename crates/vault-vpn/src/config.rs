//! Client Configuration
//!
//! Provides the startup configuration surface for the connection
//! lifecycle core: which platform bridge to select, the cosmetic
//! encryption label, and the rotation policy defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Encryption level label shown to the user.
///
/// Cosmetic only: it is carried on the session and never alters
/// bridge behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncryptionLevel {
    Standard,
    Military,
    Quantum,
}

impl EncryptionLevel {
    /// Get display name
    pub fn name(&self) -> &'static str {
        match self {
            EncryptionLevel::Standard => "AES-256",
            EncryptionLevel::Military => "Military Grade",
            EncryptionLevel::Quantum => "Quantum Resistant",
        }
    }
}

impl Default for EncryptionLevel {
    fn default() -> Self {
        EncryptionLevel::Military
    }
}

impl std::fmt::Display for EncryptionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for EncryptionLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "standard" => Ok(EncryptionLevel::Standard),
            "military" => Ok(EncryptionLevel::Military),
            "quantum" => Ok(EncryptionLevel::Quantum),
            _ => Err(ConfigError::InvalidEncryptionLevel(s.to_string())),
        }
    }
}

/// Platform identity, consulted exactly once at construction to pick
/// the bridge implementation and permission gate. Nothing downstream
/// branches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Mobile platform with an OS VPN subsystem
    Native,
    /// Browser platform, simulated transport
    Web,
}

impl Platform {
    /// Check if this platform has a native tunnel to authorize
    pub fn is_native(&self) -> bool {
        matches!(self, Platform::Native)
    }
}

/// Client settings consumed at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VpnSettings {
    /// Platform identity (bridge selection only)
    #[serde(default = "default_platform")]
    pub platform: Platform,
    /// Encryption level label
    #[serde(default)]
    pub encryption: EncryptionLevel,
    /// Rotate servers automatically while connected
    #[serde(default)]
    pub auto_rotate: bool,
    /// Rotation period in seconds
    #[serde(default = "default_rotation_secs")]
    pub rotation_interval_secs: u64,
    /// Server to connect to when none is given explicitly
    #[serde(default = "default_preferred_server")]
    pub preferred_server: String,
    /// Simulated bridge latency in milliseconds
    #[serde(default = "default_connect_latency_ms")]
    pub connect_latency_ms: u64,
}

fn default_platform() -> Platform {
    Platform::Web
}

fn default_rotation_secs() -> u64 {
    300 // 5 minutes
}

fn default_preferred_server() -> String {
    "us-ny-1".to_string()
}

fn default_connect_latency_ms() -> u64 {
    2000
}

impl VpnSettings {
    /// Rotation period as a duration
    pub fn rotation_interval(&self) -> Duration {
        Duration::from_secs(self.rotation_interval_secs)
    }

    /// Simulated bridge latency as a duration
    pub fn connect_latency(&self) -> Duration {
        Duration::from_millis(self.connect_latency_ms)
    }

    /// Load from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let settings: Self =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load from a JSON string
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let settings: Self =
            serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load from a file, dispatching on the extension
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;

        match path.extension().and_then(|e| e.to_str()).unwrap_or("") {
            "toml" => Self::from_toml(&content),
            "json" => Self::from_json(&content),
            _ => Err(ConfigError::UnsupportedFormat),
        }
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rotation_interval_secs == 0 {
            return Err(ConfigError::InvalidRotationInterval);
        }
        if self.preferred_server.is_empty() {
            return Err(ConfigError::EmptyPreferredServer);
        }
        Ok(())
    }
}

impl Default for VpnSettings {
    fn default() -> Self {
        Self {
            platform: default_platform(),
            encryption: EncryptionLevel::default(),
            auto_rotate: false,
            rotation_interval_secs: default_rotation_secs(),
            preferred_server: default_preferred_server(),
            connect_latency_ms: default_connect_latency_ms(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("Rotation interval must be non-zero")]
    InvalidRotationInterval,

    #[error("Preferred server must not be empty")]
    EmptyPreferredServer,

    #[error("Invalid encryption level: {0}")]
    InvalidEncryptionLevel(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unsupported config format")]
    UnsupportedFormat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = VpnSettings::default();

        assert_eq!(settings.platform, Platform::Web);
        assert_eq!(settings.encryption, EncryptionLevel::Military);
        assert!(!settings.auto_rotate);
        assert_eq!(settings.rotation_interval(), Duration::from_secs(300));
        assert_eq!(settings.preferred_server, "us-ny-1");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_encryption_level_parse() {
        let level: EncryptionLevel = "quantum".parse().unwrap();
        assert_eq!(level, EncryptionLevel::Quantum);

        assert!("hyperdimensional".parse::<EncryptionLevel>().is_err());
    }

    #[test]
    fn test_toml_partial() {
        let settings = VpnSettings::from_toml(
            r#"
            platform = "native"
            auto_rotate = true
            rotation_interval_secs = 60
            "#,
        )
        .unwrap();

        assert!(settings.platform.is_native());
        assert!(settings.auto_rotate);
        assert_eq!(settings.rotation_interval(), Duration::from_secs(60));
        // Unspecified fields keep their defaults
        assert_eq!(settings.encryption, EncryptionLevel::Military);
    }

    #[test]
    fn test_json_roundtrip() {
        let settings = VpnSettings::default();
        let json = serde_json::to_string(&settings).unwrap();

        let parsed = VpnSettings::from_json(&json).unwrap();
        assert_eq!(parsed.preferred_server, settings.preferred_server);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let result = VpnSettings::from_toml("rotation_interval_secs = 0");
        assert!(result.is_err());
    }
}
