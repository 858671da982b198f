//! PortSnapshot Value Object
//!
//! Point-in-time table of listening TCP ports and the process owning each.
//! Built by one scan, never mutated afterwards.

use serde::Serialize;
use std::collections::HashMap;
use std::time::Instant;

/// Process holding a listening socket
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortOwner {
    pub pid: u32,
    pub process_name: String,
}

impl PortOwner {
    pub fn new(pid: u32, process_name: impl Into<String>) -> Self {
        Self {
            pid,
            process_name: process_name.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PortSnapshot {
    owners: HashMap<u16, PortOwner>,
    taken_at: Instant,
}

impl PortSnapshot {
    pub fn new(owners: HashMap<u16, PortOwner>) -> Self {
        Self {
            owners,
            taken_at: Instant::now(),
        }
    }

    pub fn empty() -> Self {
        Self::new(HashMap::new())
    }

    pub fn owner(&self, port: u16) -> Option<&PortOwner> {
        self.owners.get(&port)
    }

    pub fn is_listening(&self, port: u16) -> bool {
        self.owners.contains_key(&port)
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// Entries ordered by port number
    pub fn entries(&self) -> Vec<(u16, &PortOwner)> {
        let mut entries: Vec<_> = self.owners.iter().map(|(p, o)| (*p, o)).collect();
        entries.sort_by_key(|(port, _)| *port);
        entries
    }

    pub fn taken_at(&self) -> Instant {
        self.taken_at
    }

    pub fn age(&self) -> std::time::Duration {
        self.taken_at.elapsed()
    }
}
