//! TCP Port Probe
//! Live connect probe over loopback, any-address and IPv6 any-address

use crate::constants::port::PROBE_HOSTS;
use crate::domain::ports::PortProbe;
use async_trait::async_trait;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::trace;

pub struct TcpPortProbe {
    hosts: Vec<IpAddr>,
}

impl TcpPortProbe {
    pub fn new() -> Self {
        Self {
            hosts: PROBE_HOSTS.iter().filter_map(|h| h.parse().ok()).collect(),
        }
    }
}

impl Default for TcpPortProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PortProbe for TcpPortProbe {
    async fn is_listening(&self, port: u16, probe_timeout: Duration) -> bool {
        for host in &self.hosts {
            let addr = SocketAddr::new(*host, port);
            if let Ok(Ok(_stream)) = timeout(probe_timeout, TcpStream::connect(addr)).await {
                trace!(%addr, "Listener accepted connection");
                return true;
            }
        }
        false
    }
}
