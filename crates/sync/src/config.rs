use std::net::SocketAddr;

use crate::net::{DEFAULT_PORT, Role};

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub role: Role,
    pub bind_addr: SocketAddr,
    pub host_addr: SocketAddr,
    /// Seconds between barrier opening and the scheduled session start.
    pub start_delay_secs: f64,
    /// Cadence of the host's SyncRequest broadcast during playback.
    pub sync_interval_secs: f64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            role: Role::Host,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            host_addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
            start_delay_secs: 2.0,
            sync_interval_secs: 0.5,
        }
    }
}
