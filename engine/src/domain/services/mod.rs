pub mod batch_orchestrator;
pub mod command_executor;
pub mod command_policy;
pub mod operation_log_pipeline;
pub mod port_monitor;
pub mod port_owner_termination;
pub mod process_controller;
pub mod service_catalog;

pub use batch_orchestrator::BatchOrchestrator;
pub use command_executor::CommandExecutor;
pub use command_policy::CommandPolicy;
pub use operation_log_pipeline::{OperationLogPipeline, PipelineStats};
pub use port_monitor::PortMonitor;
pub use port_owner_termination::{PortOwnerTerminator, Termination};
pub use process_controller::{LifecycleOperator, ProcessController};
pub use service_catalog::{ServiceCatalog, ServiceFilter, ServiceList, ServiceSummary};
