// Approval state machine - the policy layer over TaskStore
//
// Every operation validates actor and state first, prepares its audit entry
// and notifications, then commits the task with a compare-and-swap. Side
// effects are written only after the commit succeeds, so a failed call
// leaves the store, the audit log and the notification queue untouched.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use super::audit::AuditLog;
use super::error::{WorkflowError, WorkflowResult};
use super::notifications::NotificationDispatcher;
use super::permissions::{can_perform, WorkflowAction};
use super::store::{InMemoryTaskStore, InMemoryUserDirectory, TaskRepository, UserDirectory};
use super::types::*;
use crate::clock::Clock;
use crate::observability::workflow_metrics;
use crate::precheck::PrecheckReport;

/// Events that move a task between lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskEvent {
    SubmitDraft,
    AssignReviewer,
    Score { score: u8 },
}

/// Status a task moves to when `event` is applied, or `None` if the event is
/// not legal from `status`
pub fn next_status(status: TaskStatus, event: TaskEvent) -> Option<TaskStatus> {
    match (status, event) {
        (TaskStatus::Draft | TaskStatus::RevisionsRequired, TaskEvent::SubmitDraft) => {
            Some(TaskStatus::UnderReview)
        }
        (TaskStatus::UnderReview, TaskEvent::AssignReviewer) => Some(TaskStatus::UnderReview),
        (TaskStatus::UnderReview, TaskEvent::Score { score }) if score == MAX_SCORE => {
            Some(TaskStatus::Approved)
        }
        (TaskStatus::UnderReview, TaskEvent::Score { .. }) => Some(TaskStatus::RevisionsRequired),
        _ => None,
    }
}

/// Tunables applied by the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowPolicy {
    pub max_attachment_bytes: u64,
    pub accepted_attachment_types: Vec<String>,
}

impl Default for WorkflowPolicy {
    fn default() -> Self {
        Self {
            max_attachment_bytes: 10 * 1024 * 1024,
            accepted_attachment_types: ["pdf", "doc", "docx", "md", "txt"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

/// Result of a committed operation
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub task: Task,
    pub entry: AuditEntry,
    /// Every notification sent, anomaly alerts included
    pub notifications: Vec<Notification>,
}

impl TransitionOutcome {
    pub fn anomalies(&self) -> impl Iterator<Item = &Notification> {
        self.notifications
            .iter()
            .filter(|n| n.kind == NotificationType::AnomalyDetected)
    }
}

/// Metadata for a file being attached to a task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAttachment {
    pub name: String,
    pub size: u64,
    pub content_type: String,
}

pub struct ApprovalStateMachine {
    tasks: Arc<dyn TaskRepository>,
    users: Arc<dyn UserDirectory>,
    audit: Arc<AuditLog>,
    notifications: Arc<NotificationDispatcher>,
    clock: Arc<dyn Clock>,
    policy: WorkflowPolicy,
}

impl std::fmt::Debug for ApprovalStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalStateMachine")
            .field("audit", &self.audit)
            .field("notifications", &self.notifications)
            .field("policy", &self.policy)
            .finish()
    }
}

impl ApprovalStateMachine {
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        users: Arc<dyn UserDirectory>,
        audit: Arc<AuditLog>,
        notifications: Arc<NotificationDispatcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            tasks,
            users,
            audit,
            notifications,
            clock,
            policy: WorkflowPolicy::default(),
        }
    }

    /// Fresh in-memory workflow over the given users
    pub fn in_memory(users: Vec<User>, clock: Arc<dyn Clock>) -> Self {
        let tasks: Arc<dyn TaskRepository> = Arc::new(InMemoryTaskStore::new());
        let users: Arc<dyn UserDirectory> = Arc::new(InMemoryUserDirectory::new(users));
        let audit = Arc::new(AuditLog::new(Arc::clone(&tasks)));
        let notifications = Arc::new(NotificationDispatcher::new(
            Arc::clone(&users),
            Arc::clone(&clock),
        ));
        Self::new(tasks, users, audit, notifications, clock)
    }

    pub fn with_policy(mut self, policy: WorkflowPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &WorkflowPolicy {
        &self.policy
    }

    pub fn tasks(&self) -> &Arc<dyn TaskRepository> {
        &self.tasks
    }

    pub fn users(&self) -> &Arc<dyn UserDirectory> {
        &self.users
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn notifications(&self) -> &NotificationDispatcher {
        &self.notifications
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn task(&self, task_id: &str) -> WorkflowResult<Task> {
        self.tasks
            .get(task_id)
            .ok_or_else(|| WorkflowError::UnknownTask(task_id.to_string()))
    }

    pub fn user(&self, user_id: &str) -> WorkflowResult<User> {
        self.users
            .get(user_id)
            .ok_or_else(|| WorkflowError::UnknownUser(user_id.to_string()))
    }

    /// Tasks the actor is allowed to see: everything for admins, assigned
    /// tasks for reviewers, own tasks for departments
    pub fn visible_tasks(&self, actor_id: &str) -> WorkflowResult<Vec<Task>> {
        let actor = self.user(actor_id)?;
        let tasks = self.tasks.list();
        let visible = match actor.role {
            Role::Admin => tasks,
            Role::Reviewer => tasks
                .into_iter()
                .filter(|t| t.reviewer_id.as_deref() == Some(actor.id.as_str()))
                .collect(),
            Role::Department => tasks
                .into_iter()
                .filter(|t| t.created_by == actor.id)
                .collect(),
        };
        Ok(visible)
    }

    /// Ordered audit history of one task
    pub fn audit_trail(&self, task_id: &str) -> WorkflowResult<Vec<AuditEntry>> {
        if !self.tasks.contains(task_id) {
            return Err(WorkflowError::UnknownTask(task_id.to_string()));
        }
        Ok(self.audit.query(task_id).collect())
    }

    pub fn create_task(
        &self,
        actor_id: &str,
        new_task: NewTask,
    ) -> WorkflowResult<TransitionOutcome> {
        self.observe("create_task", None, actor_id, || {
            let actor = self.user(actor_id)?;
            if !can_perform(actor.role, WorkflowAction::CreateTask) {
                return Err(WorkflowError::permission(
                    &actor.id,
                    WorkflowAction::CreateTask.as_str(),
                ));
            }

            let now = self.clock.now();
            let title = new_task.title.trim().to_string();
            let description = new_task.description.trim().to_string();
            if title.is_empty() {
                return Err(WorkflowError::Validation("Title is required".to_string()));
            }
            if description.is_empty() {
                return Err(WorkflowError::Validation("Description is required".to_string()));
            }
            if new_task.due_date <= now {
                return Err(WorkflowError::Validation("Due date must be in the future".to_string()));
            }
            let requirements = normalize_requirements(&new_task.requirements);
            if requirements.is_empty() {
                return Err(WorkflowError::Validation(
                    "At least one requirement must be selected".to_string(),
                ));
            }

            let task = Task {
                id: format!("task_{}", uuid::Uuid::new_v4().simple()),
                title,
                description,
                priority: new_task.priority,
                status: TaskStatus::Draft,
                created_by: actor.id.clone(),
                reviewer_id: None,
                created_at: now,
                due_date: new_task.due_date,
                score: 0,
                requirements,
                attachments: Vec::new(),
                draft_content: String::new(),
                dos_and_donts: new_task.dos_and_donts.unwrap_or_else(DosAndDonts::standard),
                review_feedback: None,
                review_started_at: None,
                version: 0,
                updated_at: now,
            };
            let entry = AuditEntry::new(
                &task.id,
                AuditAction::TaskCreated,
                &actor.id,
                &actor.name,
                now,
                format!("Task created with {} priority", task.priority),
            );

            let task = self.tasks.create(task)?;
            let entry = self.audit.record(entry)?;
            Ok(TransitionOutcome {
                task,
                entry,
                notifications: Vec::new(),
            })
        })
    }

    /// Save draft content without submitting it
    pub fn update_draft(
        &self,
        task_id: &str,
        actor_id: &str,
        content: &str,
    ) -> WorkflowResult<TransitionOutcome> {
        self.observe("update_draft", Some(task_id), actor_id, || {
            let actor = self.user(actor_id)?;
            let task = self.task(task_id)?;
            self.require_creator(&actor, &task, WorkflowAction::EditDraft)?;
            if !task.status.is_editable() {
                return Err(WorkflowError::invalid_state(
                    &task.id,
                    task.status,
                    WorkflowAction::EditDraft.as_str(),
                ));
            }

            let now = self.clock.now();
            let mut updated = task.clone();
            updated.draft_content = content.to_string();
            updated.updated_at = now;

            let entry = AuditEntry::new(
                &task.id,
                AuditAction::DraftUpdated,
                &actor.id,
                &actor.name,
                now,
                format!("Draft content saved ({} characters)", content.chars().count()),
            );
            self.commit(&task, updated, entry, Vec::new())
        })
    }

    pub fn add_attachment(
        &self,
        task_id: &str,
        actor_id: &str,
        attachment: NewAttachment,
    ) -> WorkflowResult<TransitionOutcome> {
        self.observe("add_attachment", Some(task_id), actor_id, || {
            let actor = self.user(actor_id)?;
            let task = self.task(task_id)?;
            self.require_creator(&actor, &task, WorkflowAction::AddAttachment)?;
            if !task.status.is_editable() {
                return Err(WorkflowError::invalid_state(
                    &task.id,
                    task.status,
                    WorkflowAction::AddAttachment.as_str(),
                ));
            }

            let now = self.clock.now();
            let attachment = Attachment {
                id: format!("att_{}", uuid::Uuid::new_v4().simple()),
                name: attachment.name.trim().to_string(),
                size: attachment.size,
                content_type: attachment.content_type,
                uploaded_at: now,
            };
            self.validate_attachment(&attachment)?;

            let details = format!(
                "{} uploaded ({:.1}MB)",
                attachment.name,
                attachment.size as f64 / 1024.0 / 1024.0
            );
            let mut updated = task.clone();
            updated.attachments.push(attachment);
            updated.updated_at = now;

            let entry = AuditEntry::new(
                &task.id,
                AuditAction::AttachmentAdded,
                &actor.id,
                &actor.name,
                now,
                details,
            );
            self.commit(&task, updated, entry, Vec::new())
        })
    }

    /// Submit (or resubmit after revisions) the draft for review. `content`,
    /// when given, replaces the stored draft first.
    pub fn submit_draft(
        &self,
        task_id: &str,
        actor_id: &str,
        content: Option<&str>,
    ) -> WorkflowResult<TransitionOutcome> {
        self.observe("submit_draft", Some(task_id), actor_id, || {
            let actor = self.user(actor_id)?;
            let task = self.task(task_id)?;
            self.require_creator(&actor, &task, WorkflowAction::SubmitDraft)?;
            let status = next_status(task.status, TaskEvent::SubmitDraft).ok_or_else(|| {
                WorkflowError::invalid_state(
                    &task.id,
                    task.status,
                    WorkflowAction::SubmitDraft.as_str(),
                )
            })?;

            let now = self.clock.now();
            let mut updated = task.clone();
            if let Some(content) = content {
                updated.draft_content = content.to_string();
            }
            if !updated.has_draft_content() {
                return Err(WorkflowError::Validation("Draft content is required".to_string()));
            }
            updated.status = status;
            updated.updated_at = now;

            let (details, notifications) = match &task.reviewer_id {
                Some(reviewer_id) => {
                    updated.review_started_at = Some(now);
                    let payload = NotificationPayload::new(
                        "Revised Draft Submitted",
                        format!("{} resubmitted \"{}\" for review", actor.name, task.title),
                    )
                    .for_task(&task.id);
                    let notification = self.notifications.prepare(
                        reviewer_id,
                        NotificationType::DraftSubmitted,
                        payload,
                    )?;
                    ("Revised draft resubmitted for review", vec![notification])
                }
                None => {
                    let mut batch = Vec::new();
                    for admin in self.users.with_role(Role::Admin) {
                        let payload = NotificationPayload::new(
                            "Task Awaiting Reviewer Assignment",
                            format!(
                                "\"{}\" was submitted by {} and needs a reviewer",
                                task.title, actor.name
                            ),
                        )
                        .for_task(&task.id);
                        batch.push(self.notifications.prepare(
                            &admin.id,
                            NotificationType::DraftSubmitted,
                            payload,
                        )?);
                    }
                    ("Draft submitted for review", batch)
                }
            };

            let entry = AuditEntry::new(
                &task.id,
                AuditAction::DraftSubmitted,
                &actor.id,
                &actor.name,
                now,
                details,
            );
            self.commit(&task, updated, entry, notifications)
        })
    }

    pub fn assign_reviewer(
        &self,
        task_id: &str,
        actor_id: &str,
        reviewer_id: &str,
    ) -> WorkflowResult<TransitionOutcome> {
        self.observe("assign_reviewer", Some(task_id), actor_id, || {
            let actor = self.user(actor_id)?;
            let task = self.task(task_id)?;

            let allowed = can_perform(actor.role, WorkflowAction::AssignReviewer)
                && (actor.role == Role::Admin || task.created_by == actor.id);
            if !allowed {
                return Err(WorkflowError::permission(
                    &actor.id,
                    WorkflowAction::AssignReviewer.as_str(),
                ));
            }
            let status = next_status(task.status, TaskEvent::AssignReviewer).ok_or_else(|| {
                WorkflowError::invalid_state(
                    &task.id,
                    task.status,
                    WorkflowAction::AssignReviewer.as_str(),
                )
            })?;
            if let Some(current) = &task.reviewer_id {
                return Err(WorkflowError::invalid_state(
                    &task.id,
                    task.status,
                    format!("reassign reviewer (already assigned to {current})"),
                ));
            }

            let reviewer = self.user(reviewer_id)?;
            if reviewer.role != Role::Reviewer {
                return Err(WorkflowError::Validation(format!(
                    "{} is not a reviewer",
                    reviewer.id
                )));
            }

            let now = self.clock.now();
            let mut updated = task.clone();
            updated.status = status;
            updated.reviewer_id = Some(reviewer.id.clone());
            updated.review_started_at = Some(now);
            updated.updated_at = now;

            let payload = NotificationPayload::new(
                "New Task Assignment",
                format!("You have been assigned to review: {}", task.title),
            )
            .for_task(&task.id);
            let notification = self.notifications.prepare(
                &reviewer.id,
                NotificationType::TaskAssigned,
                payload,
            )?;

            let entry = AuditEntry::new(
                &task.id,
                AuditAction::ReviewerAssigned,
                &actor.id,
                &actor.name,
                now,
                format!("Assigned to {}", reviewer.name),
            );
            self.commit(&task, updated, entry, vec![notification])
        })
    }

    /// Score the task under review. A perfect score approves it; anything
    /// lower sends it back for revisions.
    pub fn submit_score(
        &self,
        task_id: &str,
        actor_id: &str,
        score: i64,
        feedback: ScoreFeedback,
    ) -> WorkflowResult<TransitionOutcome> {
        self.observe("submit_score", Some(task_id), actor_id, || {
            let actor = self.user(actor_id)?;
            let task = self.task(task_id)?;

            let is_assigned = task.reviewer_id.as_deref() == Some(actor.id.as_str());
            if !can_perform(actor.role, WorkflowAction::SubmitScore) || !is_assigned {
                return Err(WorkflowError::permission(
                    &actor.id,
                    WorkflowAction::SubmitScore.as_str(),
                ));
            }
            if task.status != TaskStatus::UnderReview {
                return Err(WorkflowError::invalid_state(
                    &task.id,
                    task.status,
                    WorkflowAction::SubmitScore.as_str(),
                ));
            }
            let score = u8::try_from(score)
                .ok()
                .filter(|s| *s <= MAX_SCORE)
                .ok_or(WorkflowError::InvalidScore { score })?;
            let status = next_status(task.status, TaskEvent::Score { score }).ok_or_else(|| {
                WorkflowError::invalid_state(
                    &task.id,
                    task.status,
                    WorkflowAction::SubmitScore.as_str(),
                )
            })?;

            let now = self.clock.now();
            let review_time = task
                .review_started_at
                .map(|started| (now - started).num_minutes().max(0))
                .unwrap_or(0);

            let mut updated = task.clone();
            updated.status = status;
            updated.score = score;
            updated.updated_at = now;
            updated.review_feedback = Some(ReviewFeedback {
                reviewer_id: actor.id.clone(),
                strengths: feedback.strengths,
                issues: feedback.issues,
                required_changes: feedback.required_changes,
                reviewed_at: now,
            });

            let (action, details, kind, payload) = if status == TaskStatus::Approved {
                (
                    AuditAction::TaskApproved,
                    format!(
                        "Scored {score}/100, review time: {review_time} minutes. \
                         Task approved and completed"
                    ),
                    NotificationType::TaskApproved,
                    NotificationPayload::new(
                        format!("{} Approved", task.title),
                        "Your task has been approved and is now complete",
                    ),
                )
            } else {
                (
                    AuditAction::ReviewerScored,
                    format!("Scored {score}/100, review time: {review_time} minutes"),
                    NotificationType::TaskScored,
                    NotificationPayload::new(
                        format!("{} Review Complete", task.title),
                        format!("Your task has been scored {score}/100 by {}", actor.name),
                    ),
                )
            };
            let notification = self
                .notifications
                .prepare(&task.created_by, kind, payload.for_task(&task.id))?;

            let entry = AuditEntry::new(&task.id, action, &actor.id, &actor.name, now, details)
                .with_review(score, review_time);
            self.commit(&task, updated, entry, vec![notification])
        })
    }

    /// Record an advisory precheck result computed from the task at
    /// `checked_version`. The task score is never touched.
    pub fn record_precheck(
        &self,
        task_id: &str,
        checked_version: u64,
        report: &PrecheckReport,
    ) -> WorkflowResult<AuditEntry> {
        self.observe("record_precheck", Some(task_id), SYSTEM_ACTOR, || {
            let task = self.task(task_id)?;
            if task.version != checked_version {
                return Err(WorkflowError::Conflict {
                    task_id: task.id,
                    expected: checked_version,
                    found: task.version,
                });
            }
            let entry = AuditEntry::new(
                &task.id,
                AuditAction::AiPrecheckCompleted,
                SYSTEM_ACTOR,
                "AI System",
                self.clock.now(),
                format!(
                    "Pre-check completed with {}% baseline score",
                    report.baseline_percent()
                ),
            );
            self.audit.record(entry)
        })
    }

    fn require_creator(
        &self,
        actor: &User,
        task: &Task,
        action: WorkflowAction,
    ) -> WorkflowResult<()> {
        if can_perform(actor.role, action) && task.created_by == actor.id {
            Ok(())
        } else {
            Err(WorkflowError::permission(&actor.id, action.as_str()))
        }
    }

    fn validate_attachment(&self, attachment: &Attachment) -> WorkflowResult<()> {
        if attachment.name.is_empty() {
            return Err(WorkflowError::Validation("Attachment name is required".to_string()));
        }
        let accepted = attachment
            .extension()
            .map(|ext| {
                self.policy
                    .accepted_attachment_types
                    .iter()
                    .any(|t| t.eq_ignore_ascii_case(&ext))
            })
            .unwrap_or(false);
        if !accepted {
            return Err(WorkflowError::Validation(format!(
                "File type of {} is not accepted. Only {} files are allowed.",
                attachment.name,
                self.policy.accepted_attachment_types.join(", ")
            )));
        }
        if attachment.size == 0 || attachment.size > self.policy.max_attachment_bytes {
            return Err(WorkflowError::Validation(format!(
                "File size must be between 1 byte and {:.1}MB",
                self.policy.max_attachment_bytes as f64 / 1024.0 / 1024.0
            )));
        }
        Ok(())
    }

    /// Commit the task, then append the audit entry and deliver notifications
    fn commit(
        &self,
        previous: &Task,
        updated: Task,
        entry: AuditEntry,
        notifications: Vec<Notification>,
    ) -> WorkflowResult<TransitionOutcome> {
        let task = self.tasks.compare_and_swap(updated, previous.version)?;
        let entry = self.audit.record(entry)?;

        let mut sent = notifications;
        self.notifications.deliver(sent.clone());
        sent.extend(self.notifications.anomaly_check(&entry));

        workflow_metrics().record_transition();
        info!(
            task_id = %task.id,
            from = %previous.status,
            to = %task.status,
            action = %entry.action,
            actor = %entry.actor,
            version = task.version,
            "Task transition committed"
        );
        Ok(TransitionOutcome {
            task,
            entry,
            notifications: sent,
        })
    }

    fn observe<T>(
        &self,
        operation: &str,
        task_id: Option<&str>,
        actor_id: &str,
        f: impl FnOnce() -> WorkflowResult<T>,
    ) -> WorkflowResult<T> {
        let result = f();
        if let Err(error) = &result {
            let metrics = workflow_metrics();
            metrics.record_rejection();
            if matches!(error, WorkflowError::Conflict { .. }) {
                metrics.record_conflict();
            }
            warn!(
                operation,
                task_id = ?task_id,
                actor = actor_id,
                kind = error.kind(),
                %error,
                "Workflow operation rejected"
            );
        }
        result
    }
}

/// Trim, drop blanks and de-duplicate while keeping order
fn normalize_requirements(requirements: &[String]) -> Vec<String> {
    let mut seen = Vec::new();
    for requirement in requirements {
        let requirement = requirement.trim();
        if !requirement.is_empty() && !seen.iter().any(|r: &String| r == requirement) {
            seen.push(requirement.to_string());
        }
    }
    seen
}
