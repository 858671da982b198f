pub mod entities;
pub mod error;
pub mod ports;
pub mod services;
pub mod value_objects;

pub use entities::{ServiceBuilder, ServiceDefinition};
pub use error::{DomainError, RejectionReason, Result};
pub use services::{
    BatchOrchestrator, CommandExecutor, CommandPolicy, LifecycleOperator, OperationLogPipeline,
    PipelineStats, PortMonitor, PortOwnerTerminator, ProcessController, ServiceCatalog,
    ServiceFilter, ServiceList, ServiceSummary, Termination,
};
pub use value_objects::{
    BatchReport, ControllerSettings, LifecyclePolicy, LogStats, Operation, OperationRecord,
    OperationResult, OperationStatus, PipelineSettings, Port, PortOwner, PortSnapshot,
    RestartStrategy, RunState, ServiceId, ServiceStatus, StopStrategy,
};
