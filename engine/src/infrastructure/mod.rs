//! Infrastructure Layer
//!
//! Adapters implementing the ports defined in the domain layer
//! (the "driven adapters").
//!
//! ## Adapters
//!
//! - `TcpPortProbe`: live TCP connect probe
//! - `ProcfsPortScanner`: listening sockets and their owners from `/proc`
//! - `TokioCommandRunner`: child process execution using tokio
//! - `LibcSignaller`: SIGTERM/SIGKILL delivery
//! - `InMemoryServiceRepository`: thread-safe storage for service definitions
//! - `InMemoryLogStore`, `JsonLinesLogStore`: operation record sinks
//!
//! ## Usage
//!
//! ```rust,no_run
//! use svcctl_engine::infrastructure::{ProcfsPortScanner, TcpPortProbe, TokioCommandRunner};
//! use std::sync::Arc;
//!
//! // Create real infrastructure
//! let probe = Arc::new(TcpPortProbe::new());
//! let scanner = Arc::new(ProcfsPortScanner::new());
//! let runner = Arc::new(TokioCommandRunner::new());
//!
//! // Wire into domain services...
//! ```

pub mod config;
pub mod in_memory_repository;
pub mod libc_signaller;
pub mod log_stores;
pub mod logging;
pub mod procfs_scanner;
pub mod tcp_probe;
pub mod tokio_executor;

pub use config::{Config, ConfigLocation, EngineConfig, LogPipelineConfig, ServiceConfig};
pub use in_memory_repository::InMemoryServiceRepository;
pub use libc_signaller::LibcSignaller;
pub use log_stores::{InMemoryLogStore, JsonLinesLogStore};
pub use logging::{init_tracing, resolve_log_level};
pub use procfs_scanner::ProcfsPortScanner;
pub use tcp_probe::TcpPortProbe;
pub use tokio_executor::TokioCommandRunner;
