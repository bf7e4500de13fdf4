// Role capability table consulted before any mutation

use std::fmt;

use super::types::Role;

/// Actions a user can request against the workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkflowAction {
    CreateTask,
    EditDraft,
    SubmitDraft,
    AddAttachment,
    AssignReviewer,
    SubmitScore,
    ViewAllTasks,
    ViewAuditTrail,
    ExportAudit,
}

impl WorkflowAction {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowAction::CreateTask => "create a task",
            WorkflowAction::EditDraft => "edit the draft",
            WorkflowAction::SubmitDraft => "submit the draft",
            WorkflowAction::AddAttachment => "add an attachment",
            WorkflowAction::AssignReviewer => "assign a reviewer",
            WorkflowAction::SubmitScore => "submit a score",
            WorkflowAction::ViewAllTasks => "view all tasks",
            WorkflowAction::ViewAuditTrail => "view the audit trail",
            WorkflowAction::ExportAudit => "export the audit trail",
        }
    }
}

impl fmt::Display for WorkflowAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether `role` may ever perform `action`. Ownership rules (task creator,
/// assigned reviewer) are checked separately by the state machine.
pub fn can_perform(role: Role, action: WorkflowAction) -> bool {
    use WorkflowAction::*;

    match role {
        Role::Admin => matches!(
            action,
            AssignReviewer | ViewAllTasks | ViewAuditTrail | ExportAudit
        ),
        Role::Reviewer => matches!(action, SubmitScore | ViewAuditTrail),
        Role::Department => matches!(
            action,
            CreateTask | EditDraft | SubmitDraft | AddAttachment | AssignReviewer | ViewAuditTrail
        ),
    }
}
