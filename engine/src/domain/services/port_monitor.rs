//! Port Monitor Service
//!
//! Answers "is this port taken" with a live probe, and "who owns which port"
//! from a snapshot cached for a short TTL. A stale snapshot is rebuilt by
//! exactly one caller: readers check under the read lock, then take the
//! write lock and check again before scanning.

use crate::domain::ports::{PortProbe, PortScanner};
use crate::domain::value_objects::{Port, PortOwner, PortSnapshot, RunState};
use crate::domain::DomainError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

pub struct PortMonitor {
    probe: Arc<dyn PortProbe>,
    scanner: Arc<dyn PortScanner>,
    ttl: Duration,
    probe_timeout: Duration,
    cache: RwLock<Option<Arc<PortSnapshot>>>,
    scans: AtomicU64,
}

impl PortMonitor {
    pub fn new(
        probe: Arc<dyn PortProbe>,
        scanner: Arc<dyn PortScanner>,
        ttl: Duration,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            probe,
            scanner,
            ttl,
            probe_timeout,
            cache: RwLock::new(None),
            scans: AtomicU64::new(0),
        }
    }

    /// Live check of a port given as text. Fails with `InvalidPort` for
    /// anything that is not a number in 1-65535.
    pub async fn is_port_in_use(&self, port: &str) -> Result<bool, DomainError> {
        let port = Port::parse(port)?;
        Ok(self.is_listening(port).await)
    }

    /// Live check of a validated port
    pub async fn is_listening(&self, port: Port) -> bool {
        self.probe.is_listening(port.value(), self.probe_timeout).await
    }

    pub async fn state_of(&self, port: Port) -> RunState {
        RunState::from_listening(self.is_listening(port).await)
    }

    /// Cached snapshot, rebuilt when older than the TTL
    pub async fn snapshot(&self) -> Result<Arc<PortSnapshot>, DomainError> {
        {
            let cache = self.cache.read().await;
            if let Some(snapshot) = cache.as_ref().filter(|s| s.age() < self.ttl) {
                return Ok(Arc::clone(snapshot));
            }
        }

        let mut cache = self.cache.write().await;
        // Another caller may have rebuilt while we waited for the write lock
        if let Some(snapshot) = cache.as_ref().filter(|s| s.age() < self.ttl) {
            return Ok(Arc::clone(snapshot));
        }

        self.scans.fetch_add(1, Ordering::Relaxed);
        let owners = self.scanner.scan().await.map_err(|e| {
            warn!(error = %e, "Port scan failed");
            e
        })?;
        let snapshot = Arc::new(PortSnapshot::new(owners));
        debug!(listeners = snapshot.len(), "Port snapshot rebuilt");
        *cache = Some(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    /// Drop the cached snapshot so the next read scans again
    pub async fn invalidate_cache(&self) {
        *self.cache.write().await = None;
    }

    /// Snapshot taken now, ignoring any cached one
    pub async fn fresh_snapshot(&self) -> Result<Arc<PortSnapshot>, DomainError> {
        self.invalidate_cache().await;
        self.snapshot().await
    }

    /// Current owner of `port` from a fresh scan
    pub async fn owner_of(&self, port: Port) -> Result<Option<PortOwner>, DomainError> {
        Ok(self.fresh_snapshot().await?.owner(port.value()).cloned())
    }

    /// Poll until `port` reaches `expected` or `window` elapses.
    /// Returns whether the state was observed.
    pub async fn wait_for_state(
        &self,
        port: Port,
        expected: RunState,
        window: Duration,
        interval: Duration,
    ) -> bool {
        let deadline = Instant::now() + window;
        loop {
            if self.state_of(port).await == expected {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            sleep(interval.min(deadline - now)).await;
        }
    }

    /// Number of underlying scans performed so far
    pub fn scan_count(&self) -> u64 {
        self.scans.load(Ordering::Relaxed)
    }
}
