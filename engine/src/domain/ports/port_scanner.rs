//! Port observation ports
//! `PortScanner` lists every listener with its owner (expensive);
//! `PortProbe` answers whether one port accepts connections (cheap).

use crate::domain::value_objects::PortOwner;
use crate::domain::DomainError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

#[async_trait]
pub trait PortScanner: Send + Sync {
    /// Every TCP port in LISTEN state mapped to its owning process
    async fn scan(&self) -> Result<HashMap<u16, PortOwner>, DomainError>;
}

#[async_trait]
pub trait PortProbe: Send + Sync {
    /// True if a listener accepts connections on `port` within `timeout`
    async fn is_listening(&self, port: u16, timeout: Duration) -> bool;
}
