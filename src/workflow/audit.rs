// Append-only audit log of workflow transitions and actor actions

use parking_lot::RwLock;
use std::sync::Arc;

use super::error::{WorkflowError, WorkflowResult};
use super::store::TaskRepository;
use super::types::AuditEntry;

/// Audit entries ordered by timestamp ascending; ties keep insertion order
pub struct AuditLog {
    tasks: Arc<dyn TaskRepository>,
    entries: RwLock<Arc<Vec<AuditEntry>>>,
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog")
            .field("entries", &self.entries.read().len())
            .finish()
    }
}

impl AuditLog {
    pub fn new(tasks: Arc<dyn TaskRepository>) -> Self {
        Self::with_entries(tasks, Vec::new())
    }

    /// Restore a log from persisted entries
    pub fn with_entries(tasks: Arc<dyn TaskRepository>, mut entries: Vec<AuditEntry>) -> Self {
        entries.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Self {
            tasks,
            entries: RwLock::new(Arc::new(entries)),
        }
    }

    /// Append an entry. Fails only when the task is unknown.
    pub fn record(&self, entry: AuditEntry) -> WorkflowResult<AuditEntry> {
        if !self.tasks.contains(&entry.task_id) {
            return Err(WorkflowError::UnknownTask(entry.task_id.clone()));
        }

        let mut guard = self.entries.write();
        let entries = Arc::make_mut(&mut guard);
        let position = entries.partition_point(|e| e.timestamp <= entry.timestamp);
        entries.insert(position, entry.clone());

        tracing::debug!(
            task_id = %entry.task_id,
            action = %entry.action,
            actor = %entry.actor,
            "Audit entry recorded"
        );
        Ok(entry)
    }

    /// Entries for one task, in order. The returned iterator works on a
    /// snapshot, so it can be cloned and replayed.
    pub fn query(&self, task_id: &str) -> AuditQuery {
        AuditQuery {
            entries: Arc::clone(&self.entries.read()),
            task_id: Some(task_id.to_string()),
            position: 0,
        }
    }

    /// Every entry across all tasks, in order
    pub fn all(&self) -> AuditQuery {
        AuditQuery {
            entries: Arc::clone(&self.entries.read()),
            task_id: None,
            position: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
pub struct AuditQuery {
    entries: Arc<Vec<AuditEntry>>,
    task_id: Option<String>,
    position: usize,
}

impl AuditQuery {
    /// Rewind to the first entry
    pub fn restart(&mut self) {
        self.position = 0;
    }
}

impl Iterator for AuditQuery {
    type Item = AuditEntry;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(entry) = self.entries.get(self.position) {
            self.position += 1;
            match &self.task_id {
                Some(task_id) if &entry.task_id != task_id => continue,
                _ => return Some(entry.clone()),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::store::MockTaskRepository;
    use crate::workflow::types::AuditAction;
    use chrono::{DateTime, Duration, Utc};

    fn entry(task_id: &str, action: AuditAction, at: DateTime<Utc>, details: &str) -> AuditEntry {
        AuditEntry::new(task_id, action, "u_marketing", "Selam Marketing", at, details)
    }

    fn known_tasks(ids: &'static [&'static str]) -> Arc<dyn TaskRepository> {
        let mut repo = MockTaskRepository::new();
        repo.expect_contains()
            .returning(move |id| ids.iter().any(|known| *known == id));
        Arc::new(repo)
    }

    #[test]
    fn test_record_rejects_unknown_task() {
        let mut repo = MockTaskRepository::new();
        repo.expect_contains()
            .withf(|id| id == "ghost")
            .times(1)
            .return_const(false);
        let log = AuditLog::new(Arc::new(repo));

        let entry = AuditEntry::new(
            "ghost",
            AuditAction::DraftSubmitted,
            "u_marketing",
            "Selam Marketing",
            Utc::now(),
            "Draft submitted",
        );
        assert_eq!(
            log.record(entry).unwrap_err(),
            WorkflowError::UnknownTask("ghost".to_string())
        );
        assert!(log.is_empty());
    }

    #[test]
    fn test_query_orders_by_timestamp() {
        let log = AuditLog::new(known_tasks(&["task_a", "task_b"]));
        let now = Utc::now();

        let later = entry(
            "task_a",
            AuditAction::ReviewerAssigned,
            now + Duration::minutes(5),
            "Assigned",
        );
        let earlier = entry("task_a", AuditAction::DraftSubmitted, now, "Submitted");
        let other = entry("task_b", AuditAction::TaskCreated, now, "Created");

        log.record(later).unwrap();
        log.record(earlier).unwrap();
        log.record(other).unwrap();

        let actions: Vec<AuditAction> = log.query("task_a").map(|e| e.action).collect();
        assert_eq!(
            actions,
            vec![AuditAction::DraftSubmitted, AuditAction::ReviewerAssigned]
        );
        assert_eq!(log.all().count(), 3);
    }

    #[test]
    fn test_query_is_restartable_snapshot() {
        let log = AuditLog::new(known_tasks(&["task_a"]));
        let now = Utc::now();
        log.record(entry("task_a", AuditAction::TaskCreated, now, "Created"))
            .unwrap();

        let mut query = log.query("task_a");
        assert_eq!(query.by_ref().count(), 1);
        assert!(query.next().is_none());

        // Entries appended after the query started are not visible to it
        log.record(entry("task_a", AuditAction::DraftUpdated, now, "Saved"))
            .unwrap();
        query.restart();
        assert_eq!(query.count(), 1);
        assert_eq!(log.query("task_a").count(), 2);
    }

    #[test]
    fn test_equal_timestamps_keep_insertion_order() {
        let log = AuditLog::new(known_tasks(&["task_a"]));
        let now = Utc::now();
        log.record(entry("task_a", AuditAction::ReviewerScored, now, "first"))
            .unwrap();
        log.record(entry("task_a", AuditAction::DraftSubmitted, now, "second"))
            .unwrap();

        let details: Vec<String> = log.query("task_a").map(|e| e.details).collect();
        assert_eq!(details, vec!["first", "second"]);
    }
}
