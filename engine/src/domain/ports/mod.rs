pub mod command_runner;
pub mod log_store;
pub mod port_scanner;
pub mod process_signaller;
pub mod service_repository;

#[cfg(test)]
pub use command_runner::MockCommandRunner;
pub use command_runner::{CommandOutput, CommandRequest, CommandRunner, Invocation};
pub use log_store::{LogQuery, LogStore};
pub use port_scanner::{PortProbe, PortScanner};
pub use process_signaller::{ProcessSignaller, Signal};
pub use service_repository::{PageRequest, ServiceQuery, ServiceRepository};
