pub mod lifecycle_policy;
pub mod operation;
pub mod operation_record;
pub mod operation_result;
pub mod port;
pub mod port_snapshot;
pub mod service_id;
pub mod service_status;
pub mod settings;

pub use lifecycle_policy::{LifecyclePolicy, RestartStrategy, StopStrategy};
pub use operation::Operation;
pub use operation_record::{truncate_field, LogStats, OperationRecord, OperationStatus};
pub use operation_result::{BatchReport, OperationResult};
pub use port::Port;
pub use port_snapshot::{PortOwner, PortSnapshot};
pub use service_id::ServiceId;
pub use service_status::{RunState, ServiceStatus};
pub use settings::{ControllerSettings, PipelineSettings};
