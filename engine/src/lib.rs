//! svcctl engine
//!
//! Controls local services identified by the TCP port they listen on:
//! start, stop, restart, force-restart and kill with wait-for-effect
//! polling, bounded-concurrency batches, and an asynchronous operation log.
//!
//! - `domain`: entities, value objects, ports and services
//! - `infrastructure`: adapters for the host (procfs, TCP, processes, files)
//! - `application`: the `ServiceManager` composition root

pub mod application;
pub mod constants;
pub mod domain;
pub mod infrastructure;

#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;

pub use application::{Adapters, ServiceManager};
pub use domain::{DomainError, Operation, ServiceId};
