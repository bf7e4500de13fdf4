// Approval Flow Library - role-based task approval with audit trail
// This exposes the core components for testing and integration

pub mod cli;
pub mod clock;
pub mod config;
pub mod fs;
pub mod observability;
pub mod persistence;
pub mod precheck;
pub mod search;
pub mod session;
pub mod telemetry;
pub mod workflow;

// Re-export key types for easy access
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{config, ApprovalFlowConfig};
pub use observability::{workflow_metrics, OperationTimer, WorkflowMetrics, WorkflowStats};
pub use persistence::{
    FileSystemPersistence, PersistenceError, StatePersistence, WorkflowSnapshot,
};
pub use precheck::{HeuristicPrecheck, PrecheckReport, PrecheckRequest, PrecheckService};
pub use search::{keyword_search, SearchItem, SearchMatch};
pub use telemetry::{
    create_task_span, generate_correlation_id, init_telemetry, shutdown_telemetry,
};
pub use workflow::{
    ApprovalStateMachine, AuditEntry, Notification, Role, Task, TaskStatus, TransitionOutcome,
    User, WorkflowError, WorkflowPolicy, WorkflowResult,
};
