// Shared types between the snapshot sources, the monitor and the config

//! Shared data structures
//!
//! This module defines the peer observation types passed from the snapshot
//! sources to the activity monitor, the activity states it records, and the
//! configuration structures deserialized from the TOML file.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Rendering of a peer without a known endpoint
pub const NO_ENDPOINT: &str = "(none)";

/// Stable key of a configured peer: the same public key on two interfaces
/// is two distinct peers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PeerIdentity {
    /// WireGuard interface name (e.g. `wg0`)
    pub interface: String,
    /// Base64 public key of the peer
    pub public_key: String,
}

impl PeerIdentity {
    /// Build an identity from an interface name and a public key
    pub fn new(interface: impl Into<String>, public_key: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            public_key: public_key.into(),
        }
    }
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.interface, self.public_key)
    }
}

/// One observation of a peer at poll time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeerSnapshot {
    /// Interface and public key
    #[serde(flatten)]
    pub identity: PeerIdentity,
    /// Remote `address:port` as reported by WireGuard (IPv6 in brackets,
    /// possibly with a `%scope`), `None` until the peer is configured or seen
    pub endpoint: Option<String>,
    /// Allowed IP ranges in `addr/cidr` notation
    pub allowed_ips: Vec<String>,
    /// Latest handshake in Unix epoch seconds, 0 if none ever happened
    pub latest_handshake: i64,
    /// Friendly name resolved from wg-gen-web client files
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl PeerSnapshot {
    /// Endpoint as logged: `address:port` or `(none)`
    pub fn endpoint_display(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| NO_ENDPOINT.to_string())
    }
}

/// Activity state of a peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerState {
    Active,   // Handshake within the timeout
    Inactive, // No handshake within the timeout (or never)
}

impl PeerState {
    /// Label used in log records
    pub fn as_str(&self) -> &'static str {
        match self {
            PeerState::Active => "active",
            PeerState::Inactive => "inactive",
        }
    }

    /// Whether the state is `Active`
    pub fn is_active(&self) -> bool {
        matches!(self, PeerState::Active)
    }
}

impl fmt::Display for PeerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Emitted when a peer's computed state differs from the recorded one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionEvent {
    /// Snapshot that triggered the transition
    pub peer: PeerSnapshot,
    /// State the peer moved into
    pub state: PeerState,
}

/// How peers are read from the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SourceBackend {
    /// Kernel module through netlink
    Kernel,
    /// Userspace implementations through their UAPI socket
    Userspace,
    /// Parse the output of `wg show all dump`
    WgDump,
}

impl SourceBackend {
    /// Name used in the configuration file and on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceBackend::Kernel => "kernel",
            SourceBackend::Userspace => "userspace",
            SourceBackend::WgDump => "wg-dump",
        }
    }
}

/// Serialization of log records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line
    Json,
    /// `key=value` pairs
    Text,
}

/// Main configuration structure
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub log: LogConfig,
    pub source: SourceConfig,
}

/// Polling options
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct GeneralConfig {
    pub debug: bool,
    /// Seconds between two polls
    pub refresh: u64,
    /// Seconds without handshake before a peer is inactive
    pub timeout: u64,
}

/// Log sink options
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct LogConfig {
    /// `stdout`, `syslog` or a file path
    pub destination: String,
    pub format: LogFormat,
}

/// Snapshot source options
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SourceConfig {
    pub backend: SourceBackend,
    /// Run `wg` through sudo (wg-dump backend only)
    pub sudo: bool,
    /// Attach wg-gen-web client names to peers
    pub wg_gen_web: bool,
    pub wg_gen_web_path: String,
}

// Default values for configuration
impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            debug: false,
            refresh: 5,
            timeout: 300, // 5 minutes
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            destination: "stdout".to_string(),
            format: LogFormat::Json,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            backend: SourceBackend::Kernel,
            sudo: false,
            wg_gen_web: false,
            wg_gen_web_path: "/etc/wireguard/".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(endpoint: Option<&str>) -> PeerSnapshot {
        PeerSnapshot {
            identity: PeerIdentity::new("wg0", "key"),
            endpoint: endpoint.map(str::to_string),
            allowed_ips: vec!["10.0.0.2/32".to_string()],
            latest_handshake: 0,
            name: None,
        }
    }

    #[test]
    fn test_endpoint_display() {
        assert_eq!(snapshot(None).endpoint_display(), "(none)");

        let v4 = snapshot(Some("192.0.2.1:51820"));
        assert_eq!(v4.endpoint_display(), "192.0.2.1:51820");

        let v6 = snapshot(Some("[2001:db8::1]:51820"));
        assert_eq!(v6.endpoint_display(), "[2001:db8::1]:51820");

        let scoped = snapshot(Some("[fe80::1%eth0]:51820"));
        assert_eq!(scoped.endpoint_display(), "[fe80::1%eth0]:51820");
    }

    #[test]
    fn test_identity_distinct_per_interface() {
        let a = PeerIdentity::new("wg0", "same");
        let b = PeerIdentity::new("wg1", "same");
        assert_ne!(a, b);
        assert_eq!(a.to_string(), "wg0/same");
    }

    #[test]
    fn test_peer_state_labels() {
        assert_eq!(PeerState::Active.as_str(), "active");
        assert_eq!(PeerState::Inactive.to_string(), "inactive");
        assert!(PeerState::Active.is_active());
        assert!(!PeerState::Inactive.is_active());
    }

    #[test]
    fn test_source_backend_names_match_config() {
        for backend in [
            SourceBackend::Kernel,
            SourceBackend::Userspace,
            SourceBackend::WgDump,
        ] {
            let value = serde_json::to_value(backend).unwrap();
            assert_eq!(value, backend.as_str());
        }
    }

    #[test]
    fn test_snapshot_serializes_flat() {
        let value = serde_json::to_value(snapshot(None)).unwrap();
        assert_eq!(value["interface"], "wg0");
        assert_eq!(value["public_key"], "key");
        assert_eq!(value["allowed_ips"][0], "10.0.0.2/32");
        assert!(value.get("name").is_none());
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert!(!config.general.debug);
        assert_eq!(config.general.refresh, 5);
        assert_eq!(config.general.timeout, 300);
        assert_eq!(config.log.destination, "stdout");
        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(config.source.backend, SourceBackend::Kernel);
        assert_eq!(config.source.wg_gen_web_path, "/etc/wireguard/");
    }
}
