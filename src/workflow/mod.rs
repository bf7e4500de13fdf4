//! Task approval workflow
//!
//! Tasks move `draft -> under_review -> (revisions_required -> under_review)*
//! -> approved`. [`ApprovalStateMachine`] is the only entry point that
//! changes a task; every committed change is mirrored by one audit entry and
//! zero or more notifications.

pub mod audit;
pub mod error;
pub mod history;
pub mod notifications;
pub mod permissions;
pub mod reports;
pub mod state_machine;
pub mod store;
pub mod types;

pub use audit::{AuditLog, AuditQuery};
pub use error::{WorkflowError, WorkflowResult};
pub use history::{replay, verify_consistency, Inconsistency, LifecycleReplay};
pub use notifications::{is_anomalous, NotificationDispatcher, DEFAULT_ANOMALY_THRESHOLD_MINUTES};
pub use permissions::{can_perform, WorkflowAction};
pub use reports::{audit_csv, DashboardKpis};
pub use state_machine::{
    next_status, ApprovalStateMachine, NewAttachment, TaskEvent, TransitionOutcome, WorkflowPolicy,
};
pub use store::{InMemoryTaskStore, InMemoryUserDirectory, TaskRepository, UserDirectory};
pub use types::*;
