// WireGuard peer snapshot sources

//! Reading peers from the local WireGuard interfaces
//!
//! Peers are read either through `wireguard-control` (kernel netlink or the
//! userspace UAPI socket) or by parsing `wg show all dump`. Both produce one
//! [`PeerSnapshot`] per peer across every interface on the host.

use crate::names::WgGenWebNames;
use crate::types::{PeerIdentity, PeerSnapshot, SourceBackend, SourceConfig, NO_ENDPOINT};
use anyhow::{Context, Result};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::process::Command;
use wireguard_control::{Backend, Device};

/// Columns of a peer line in `wg show all dump`
const DUMP_PEER_COLUMNS: usize = 9;

/// Something that can list the peers currently configured on the host
#[allow(async_fn_in_trait)]
pub trait SnapshotSource {
    /// Current peers of every local interface
    async fn current_snapshots(&self) -> Result<Vec<PeerSnapshot>>;
}

/// Snapshot source backed by the host's WireGuard interfaces
#[derive(Debug, Clone)]
pub struct WgSource {
    backend: SourceBackend,
    sudo: bool,
    names: Option<WgGenWebNames>,
}

impl WgSource {
    /// Create a source for the given backend
    pub fn new(backend: SourceBackend, sudo: bool, names: Option<WgGenWebNames>) -> Self {
        Self {
            backend,
            sudo,
            names,
        }
    }

    /// Create a source from the `[source]` configuration section
    pub fn from_config(config: &SourceConfig) -> Self {
        let names = config
            .wg_gen_web
            .then(|| WgGenWebNames::new(&config.wg_gen_web_path));
        Self::new(config.backend, config.sudo, names)
    }

    /// Get the configured backend
    pub fn backend(&self) -> SourceBackend {
        self.backend
    }

    /// Query every interface through `wireguard-control`
    ///
    /// The query is a blocking netlink/UAPI call, so it runs on the blocking pool.
    async fn query_devices(backend: Backend) -> Result<Vec<PeerSnapshot>> {
        tokio::task::spawn_blocking(move || {
            let interfaces =
                Device::list(backend).context("Failed to list WireGuard interfaces")?;

            let mut peers = Vec::new();
            for name in interfaces {
                let device = Device::get(&name, backend)
                    .with_context(|| format!("Failed to get WireGuard device info for {}", name))?;
                let interface = device.name.to_string();

                for peer in device.peers {
                    peers.push(PeerSnapshot {
                        identity: PeerIdentity::new(
                            interface.clone(),
                            peer.config.public_key.to_base64(),
                        ),
                        endpoint: peer.config.endpoint.map(|addr| addr.to_string()),
                        allowed_ips: peer
                            .config
                            .allowed_ips
                            .iter()
                            .map(|ip| format!("{}/{}", ip.address, ip.cidr))
                            .collect(),
                        latest_handshake: epoch_secs(peer.stats.last_handshake_time),
                        name: None,
                    });
                }
            }

            Ok::<Vec<PeerSnapshot>, anyhow::Error>(peers)
        })
        .await
        .context("Netlink task panicked")?
    }

    /// Run `wg show all dump`, through sudo if configured
    async fn run_wg_dump(&self) -> Result<String> {
        let mut command = if self.sudo {
            let mut command = Command::new("sudo");
            command.arg("wg");
            command
        } else {
            Command::new("wg")
        };
        command.args(["show", "all", "dump"]);

        let output = command
            .output()
            .await
            .context("Failed to execute wg show all dump (are wireguard-tools installed?)")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("wg show all dump failed: {}", stderr.trim());
        }

        String::from_utf8(output.stdout).context("wg show all dump output is not valid UTF-8")
    }
}

impl SnapshotSource for WgSource {
    async fn current_snapshots(&self) -> Result<Vec<PeerSnapshot>> {
        let mut peers = match self.backend {
            SourceBackend::Kernel => Self::query_devices(Backend::Kernel).await?,
            SourceBackend::Userspace => Self::query_devices(Backend::Userspace).await?,
            SourceBackend::WgDump => parse_wg_dump(&self.run_wg_dump().await?)?,
        };

        if let Some(names) = &self.names {
            names.annotate(&mut peers)?;
        }

        Ok(peers)
    }
}

/// Convert an optional handshake time to Unix seconds, 0 when absent
fn epoch_secs(time: Option<SystemTime>) -> i64 {
    time.and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .and_then(|d| i64::try_from(d.as_secs()).ok())
        .unwrap_or(0)
}

/// Parse `wg show all dump` output into peer snapshots
///
/// Format: tab-separated, one line per interface (5 columns) followed by one
/// line per peer: `interface public-key preshared-key endpoint allowed-ips
/// latest-handshake transfer-rx transfer-tx persistent-keepalive`.
/// Interface lines and blank lines are skipped.
pub fn parse_wg_dump(output: &str) -> Result<Vec<PeerSnapshot>> {
    let mut peers = Vec::new();

    for (index, line) in output.lines().enumerate() {
        let parts: Vec<&str> = line.split('\t').collect();
        if parts.len() != DUMP_PEER_COLUMNS {
            continue;
        }

        // Kept verbatim: link-local endpoints carry an interface scope
        // (`[fe80::1%eth0]:51820`) that `SocketAddr` cannot represent
        let endpoint = match parts[3] {
            NO_ENDPOINT | "" => None,
            addr => Some(addr.to_string()),
        };

        let allowed_ips = match parts[4] {
            NO_ENDPOINT | "" => Vec::new(),
            ips => ips.split(',').map(|ip| ip.trim().to_string()).collect(),
        };

        let latest_handshake = parts[5].parse::<i64>().with_context(|| {
            format!("Invalid latest handshake on line {}: {}", index + 1, parts[5])
        })?;

        peers.push(PeerSnapshot {
            identity: PeerIdentity::new(parts[0], parts[1]),
            endpoint,
            allowed_ips,
            latest_handshake,
            name: None,
        });
    }

    Ok(peers)
}

/// Current Unix time in seconds
pub fn unix_now() -> i64 {
    epoch_secs(Some(SystemTime::now()))
}
