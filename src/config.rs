//! Server configuration

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a [`Server`](crate::server::Server)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the listener binds to
    pub bind_addr: SocketAddr,
    /// How long a long poll blocks before returning an empty result
    pub poll_delay_ms: u64,
    /// How often a blocked poll re-checks connection liveness
    pub liveness_interval_ms: u64,
    /// Per-connection I/O timeout
    pub io_timeout_secs: u64,
    /// Whether `/files/*` serves anything at all
    pub file_sharing: bool,
    /// Root directory for `/files/*`
    pub file_root: Option<PathBuf>,
    /// Directory for `/image/*` (temp artwork files)
    pub image_dir: Option<PathBuf>,
    /// Evict sessions idle for longer than this; `None` keeps sessions for
    /// the life of the process.
    pub session_idle_secs: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080),
            poll_delay_ms: 5000,
            liveness_interval_ms: 250,
            io_timeout_secs: 10,
            file_sharing: false,
            file_root: None,
            image_dir: None,
            session_idle_secs: None,
        }
    }
}

impl ServerConfig {
    pub fn poll_delay(&self) -> Duration {
        Duration::from_millis(self.poll_delay_ms)
    }

    pub fn liveness_interval(&self) -> Duration {
        Duration::from_millis(self.liveness_interval_ms)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_secs)
    }

    pub fn session_idle(&self) -> Option<Duration> {
        self.session_idle_secs.map(Duration::from_secs)
    }
}
