// Core types for the approval workflow

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Actor id used for entries written by the workflow itself
pub const SYSTEM_ACTOR: &str = "system";

/// Highest score a reviewer can give; only this score approves a task
pub const MAX_SCORE: u8 = 100;

/// Roles a user can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Reviewer,
    Department,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Role::Admin => "admin",
            Role::Reviewer => "reviewer",
            Role::Department => "department",
        };
        write!(f, "{label}")
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "reviewer" => Ok(Role::Reviewer),
            "department" => Ok(Role::Department),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
}

impl User {
    pub fn new(id: &str, name: &str, email: &str, role: Role) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            email: email.to_string(),
            role,
            department: None,
        }
    }

    pub fn with_department(mut self, department: &str) -> Self {
        self.department = Some(department.to_string());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        };
        write!(f, "{label}")
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            other => Err(format!("unknown priority '{other}'")),
        }
    }
}

/// Lifecycle status of a task. `Approved` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Draft,
    UnderReview,
    RevisionsRequired,
    Approved,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Approved)
    }

    /// States from which the creator may edit and (re)submit the draft
    pub fn is_editable(self) -> bool {
        matches!(self, TaskStatus::Draft | TaskStatus::RevisionsRequired)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Draft => "draft",
            TaskStatus::UnderReview => "under_review",
            TaskStatus::RevisionsRequired => "revisions_required",
            TaskStatus::Approved => "approved",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub content_type: String,
    pub uploaded_at: DateTime<Utc>,
}

impl Attachment {
    /// Lower-cased file extension, if the name has one
    pub fn extension(&self) -> Option<String> {
        std::path::Path::new(&self.name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DosAndDonts {
    pub dos: Vec<String>,
    pub donts: Vec<String>,
}

impl DosAndDonts {
    /// Guidance attached to every new task unless the creator supplies their own
    pub fn standard() -> Self {
        Self {
            dos: vec![
                "Provide clear and specific requirements".to_string(),
                "Set realistic deadlines".to_string(),
                "Specify required document formats".to_string(),
                "Include all necessary stakeholder reviews".to_string(),
            ],
            donts: vec![
                "Use vague or ambiguous language".to_string(),
                "Set unrealistic tight deadlines".to_string(),
                "Add requirements after task creation".to_string(),
                "Forget to specify compliance needs".to_string(),
                "Skip stakeholder consultation".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewFeedback {
    pub reviewer_id: String,
    pub strengths: String,
    pub issues: String,
    pub required_changes: String,
    pub reviewed_at: DateTime<Utc>,
}

/// Free-text feedback a reviewer supplies alongside a score
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScoreFeedback {
    pub strengths: String,
    pub issues: String,
    pub required_changes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub status: TaskStatus,
    pub created_by: String,
    pub reviewer_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub score: u8,
    pub requirements: Vec<String>,
    pub attachments: Vec<Attachment>,
    pub draft_content: String,
    #[serde(default)]
    pub dos_and_donts: DosAndDonts,
    #[serde(default)]
    pub review_feedback: Option<ReviewFeedback>,
    /// Start of the current review round; review time is measured from here
    #[serde(default)]
    pub review_started_at: Option<DateTime<Utc>>,
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn is_approved(&self) -> bool {
        self.status == TaskStatus::Approved
    }

    pub fn has_draft_content(&self) -> bool {
        !self.draft_content.trim().is_empty()
    }
}

/// Input for creating a task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub due_date: DateTime<Utc>,
    pub requirements: Vec<String>,
    pub dos_and_donts: Option<DosAndDonts>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    TaskCreated,
    DraftUpdated,
    DraftSubmitted,
    AttachmentAdded,
    AiPrecheckCompleted,
    ReviewerAssigned,
    ReviewerScored,
    TaskApproved,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::TaskCreated => "task_created",
            AuditAction::DraftUpdated => "draft_updated",
            AuditAction::DraftSubmitted => "draft_submitted",
            AuditAction::AttachmentAdded => "attachment_added",
            AuditAction::AiPrecheckCompleted => "ai_precheck_completed",
            AuditAction::ReviewerAssigned => "reviewer_assigned",
            AuditAction::ReviewerScored => "reviewer_scored",
            AuditAction::TaskApproved => "task_approved",
        }
    }

    /// Entries written when a reviewer submits a score
    pub fn is_scoring(self) -> bool {
        matches!(self, AuditAction::ReviewerScored | AuditAction::TaskApproved)
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    pub task_id: String,
    pub action: AuditAction,
    pub actor: String,
    pub actor_name: String,
    pub timestamp: DateTime<Utc>,
    pub details: String,
    /// Whole minutes the reviewer spent, for scoring entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u8>,
}

impl AuditEntry {
    pub fn new(
        task_id: &str,
        action: AuditAction,
        actor: &str,
        actor_name: &str,
        timestamp: DateTime<Utc>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            id: format!("audit_{}", uuid::Uuid::new_v4().simple()),
            task_id: task_id.to_string(),
            action,
            actor: actor.to_string(),
            actor_name: actor_name.to_string(),
            timestamp,
            details: details.into(),
            review_time: None,
            score: None,
        }
    }

    pub fn with_review(mut self, score: u8, review_time: i64) -> Self {
        self.score = Some(score);
        self.review_time = Some(review_time);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    TaskAssigned,
    DraftSubmitted,
    TaskScored,
    TaskApproved,
    AnomalyDetected,
}

impl NotificationType {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationType::TaskAssigned => "task_assigned",
            NotificationType::DraftSubmitted => "draft_submitted",
            NotificationType::TaskScored => "task_scored",
            NotificationType::TaskApproved => "task_approved",
            NotificationType::AnomalyDetected => "anomaly_detected",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Title, message and task reference for a notification about to be sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationPayload {
    pub title: String,
    pub message: String,
    pub task_id: Option<String>,
}

impl NotificationPayload {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            task_id: None,
        }
    }

    pub fn for_task(mut self, task_id: &str) -> Self {
        self.task_id = Some(task_id.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub task_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}
