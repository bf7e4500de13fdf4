// Lifecycle replay over a task's audit history
//
// The audit log is the durable record of every transition. Replaying it
// through a statig machine rebuilds the status the task should have, which
// lets `verify_consistency` spot stores and logs that disagree.

use parking_lot::Mutex;
use statig::prelude::*;
use std::sync::Arc;

use super::types::{AuditAction, AuditEntry, Task, TaskStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Submitted,
    ReviewerAssigned,
    Scored,
    Approved,
}

impl LifecycleEvent {
    /// Audit actions that move the lifecycle; the rest are informational
    pub fn from_action(action: AuditAction) -> Option<Self> {
        match action {
            AuditAction::DraftSubmitted => Some(LifecycleEvent::Submitted),
            AuditAction::ReviewerAssigned => Some(LifecycleEvent::ReviewerAssigned),
            AuditAction::ReviewerScored => Some(LifecycleEvent::Scored),
            AuditAction::TaskApproved => Some(LifecycleEvent::Approved),
            AuditAction::TaskCreated
            | AuditAction::DraftUpdated
            | AuditAction::AttachmentAdded
            | AuditAction::AiPrecheckCompleted => None,
        }
    }
}

#[derive(Debug, Clone)]
struct ReplayJournal {
    status: TaskStatus,
    /// The reviewer stays assigned across resubmissions
    reviewer_assigned: bool,
    violations: Vec<String>,
}

struct TaskLifecycle {
    journal: Arc<Mutex<ReplayJournal>>,
}

impl TaskLifecycle {
    fn enter(&mut self, status: TaskStatus) {
        self.journal.lock().status = status;
    }

    fn assign(&mut self, event: &LifecycleEvent) {
        let mut journal = self.journal.lock();
        if journal.reviewer_assigned {
            let violation = format!("{:?} while a reviewer is already assigned", event);
            journal.violations.push(violation);
        } else {
            journal.reviewer_assigned = true;
        }
    }

    fn has_reviewer(&self) -> bool {
        self.journal.lock().reviewer_assigned
    }

    fn reject(&mut self, event: &LifecycleEvent) {
        let mut journal = self.journal.lock();
        let violation = format!("{:?} is not valid while {}", event, journal.status);
        journal.violations.push(violation);
    }
}

#[state_machine(initial = "State::draft()")]
impl TaskLifecycle {
    #[state]
    fn draft(&mut self, event: &LifecycleEvent) -> Outcome<State> {
        match event {
            LifecycleEvent::Submitted => {
                self.enter(TaskStatus::UnderReview);
                Transition(State::under_review())
            }
            _ => {
                self.reject(event);
                Handled
            }
        }
    }

    #[state]
    fn under_review(&mut self, event: &LifecycleEvent) -> Outcome<State> {
        match event {
            LifecycleEvent::ReviewerAssigned => {
                self.assign(event);
                Handled
            }
            LifecycleEvent::Scored | LifecycleEvent::Approved if !self.has_reviewer() => {
                self.reject(event);
                Handled
            }
            LifecycleEvent::Scored => {
                self.enter(TaskStatus::RevisionsRequired);
                Transition(State::revisions_required())
            }
            LifecycleEvent::Approved => {
                self.enter(TaskStatus::Approved);
                Transition(State::approved())
            }
            LifecycleEvent::Submitted => {
                self.reject(event);
                Handled
            }
        }
    }

    #[state]
    fn revisions_required(&mut self, event: &LifecycleEvent) -> Outcome<State> {
        match event {
            LifecycleEvent::Submitted => {
                self.enter(TaskStatus::UnderReview);
                Transition(State::under_review())
            }
            _ => {
                self.reject(event);
                Handled
            }
        }
    }

    #[state]
    fn approved(&mut self, event: &LifecycleEvent) -> Outcome<State> {
        self.reject(event);
        Handled
    }
}

/// Outcome of replaying one task's history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleReplay {
    pub status: TaskStatus,
    pub events: usize,
    pub violations: Vec<String>,
}

impl LifecycleReplay {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Replay audit entries (already in timestamp order) through the lifecycle
pub fn replay<I>(entries: I) -> LifecycleReplay
where
    I: IntoIterator<Item = AuditEntry>,
{
    let journal = Arc::new(Mutex::new(ReplayJournal {
        status: TaskStatus::Draft,
        reviewer_assigned: false,
        violations: Vec::new(),
    }));
    let mut sm = TaskLifecycle {
        journal: Arc::clone(&journal),
    }
    .state_machine();

    let mut events = 0;
    for entry in entries {
        if let Some(event) = LifecycleEvent::from_action(entry.action) {
            sm.handle(&event);
            events += 1;
        }
    }

    let journal = journal.lock().clone();
    LifecycleReplay {
        status: journal.status,
        events,
        violations: journal.violations,
    }
}

/// A disagreement between a stored task and its audit history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inconsistency {
    pub task_id: String,
    pub stored: TaskStatus,
    pub replayed: TaskStatus,
    pub violations: Vec<String>,
}

/// Compare the stored status with the status its history implies
pub fn verify_consistency<I>(task: &Task, history: I) -> Option<Inconsistency>
where
    I: IntoIterator<Item = AuditEntry>,
{
    let replay = replay(history);
    if replay.status == task.status && replay.is_clean() {
        return None;
    }
    tracing::warn!(
        task_id = %task.id,
        stored = %task.status,
        replayed = %replay.status,
        violations = replay.violations.len(),
        "Task status disagrees with audit history"
    );
    Some(Inconsistency {
        task_id: task.id.clone(),
        stored: task.status,
        replayed: replay.status,
        violations: replay.violations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::types::{DosAndDonts, Priority};
    use chrono::Utc;

    fn sample_task() -> Task {
        let now = Utc::now();
        Task {
            id: "task_1".to_string(),
            title: "Annual Report".to_string(),
            description: "Yearly summary".to_string(),
            priority: Priority::Medium,
            status: TaskStatus::Draft,
            created_by: "u_marketing".to_string(),
            reviewer_id: None,
            created_at: now,
            due_date: now,
            score: 0,
            requirements: vec!["Budget".to_string()],
            attachments: Vec::new(),
            draft_content: String::new(),
            dos_and_donts: DosAndDonts::default(),
            review_feedback: None,
            review_started_at: None,
            version: 0,
            updated_at: now,
        }
    }

    fn entry(action: AuditAction) -> AuditEntry {
        AuditEntry::new("task_1", action, "u_marketing", "Selam Marketing", Utc::now(), "")
    }

    #[test]
    fn test_replay_full_cycle() {
        let history = vec![
            entry(AuditAction::TaskCreated),
            entry(AuditAction::DraftSubmitted),
            entry(AuditAction::ReviewerAssigned),
            entry(AuditAction::ReviewerScored),
            entry(AuditAction::DraftUpdated),
            entry(AuditAction::DraftSubmitted),
            entry(AuditAction::TaskApproved),
        ];
        let replay = replay(history);
        assert_eq!(replay.status, TaskStatus::Approved);
        assert_eq!(replay.events, 5);
        assert!(replay.is_clean());
    }

    #[test]
    fn test_replay_empty_history_is_draft() {
        let replay = replay(Vec::new());
        assert_eq!(replay.status, TaskStatus::Draft);
        assert_eq!(replay.events, 0);
    }

    #[test]
    fn test_replay_flags_events_after_approval() {
        let history = vec![
            entry(AuditAction::DraftSubmitted),
            entry(AuditAction::ReviewerAssigned),
            entry(AuditAction::TaskApproved),
            entry(AuditAction::DraftSubmitted),
        ];
        let replay = replay(history);
        assert_eq!(replay.status, TaskStatus::Approved);
        assert_eq!(replay.violations.len(), 1);
    }

    #[test]
    fn test_scoring_a_draft_is_a_violation() {
        let replay = replay(vec![entry(AuditAction::ReviewerScored)]);
        assert_eq!(replay.status, TaskStatus::Draft);
        assert!(!replay.is_clean());
    }

    #[test]
    fn test_scoring_without_reviewer_is_a_violation() {
        let replay = replay(vec![
            entry(AuditAction::DraftSubmitted),
            entry(AuditAction::TaskApproved),
        ]);
        assert_eq!(replay.status, TaskStatus::UnderReview);
        assert_eq!(replay.violations.len(), 1);

        let task = Task {
            status: TaskStatus::Approved,
            ..sample_task()
        };
        let history = vec![
            entry(AuditAction::DraftSubmitted),
            entry(AuditAction::ReviewerScored),
        ];
        assert!(verify_consistency(&task, history).is_some());
    }

    #[test]
    fn test_reviewer_survives_resubmission() {
        let replay = replay(vec![
            entry(AuditAction::DraftSubmitted),
            entry(AuditAction::ReviewerAssigned),
            entry(AuditAction::ReviewerScored),
            entry(AuditAction::DraftSubmitted),
            entry(AuditAction::ReviewerAssigned),
            entry(AuditAction::TaskApproved),
        ]);
        assert_eq!(replay.status, TaskStatus::Approved);
        assert_eq!(replay.violations.len(), 1);
    }
}
