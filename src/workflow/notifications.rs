// Notification dispatch and review anomaly detection

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{info, warn};

use super::error::{WorkflowError, WorkflowResult};
use super::store::UserDirectory;
use super::types::{
    AuditEntry, Notification, NotificationPayload, NotificationType, Role, MAX_SCORE,
};
use crate::clock::Clock;

/// Reviews finished faster than this (in minutes) at a perfect score are flagged
pub const DEFAULT_ANOMALY_THRESHOLD_MINUTES: i64 = 10;

/// True for a scoring entry that gave a perfect score in under `threshold_minutes`
pub fn is_anomalous(entry: &AuditEntry, threshold_minutes: i64) -> bool {
    if !entry.action.is_scoring() {
        return false;
    }
    match (entry.score, entry.review_time) {
        (Some(score), Some(review_time)) => score == MAX_SCORE && review_time < threshold_minutes,
        _ => false,
    }
}

pub struct NotificationDispatcher {
    users: Arc<dyn UserDirectory>,
    clock: Arc<dyn Clock>,
    anomaly_threshold_minutes: i64,
    notifications: RwLock<Vec<Notification>>,
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("anomaly_threshold_minutes", &self.anomaly_threshold_minutes)
            .field("notifications", &self.notifications.read().len())
            .finish()
    }
}

impl NotificationDispatcher {
    pub fn new(users: Arc<dyn UserDirectory>, clock: Arc<dyn Clock>) -> Self {
        Self {
            users,
            clock,
            anomaly_threshold_minutes: DEFAULT_ANOMALY_THRESHOLD_MINUTES,
            notifications: RwLock::new(Vec::new()),
        }
    }

    pub fn with_threshold(mut self, minutes: i64) -> Self {
        self.anomaly_threshold_minutes = minutes;
        self
    }

    pub fn with_notifications(self, notifications: Vec<Notification>) -> Self {
        *self.notifications.write() = notifications;
        self
    }

    pub fn anomaly_threshold_minutes(&self) -> i64 {
        self.anomaly_threshold_minutes
    }

    /// Build a notification without delivering it. Fails if the recipient is unknown.
    pub fn prepare(
        &self,
        user_id: &str,
        kind: NotificationType,
        payload: NotificationPayload,
    ) -> WorkflowResult<Notification> {
        if self.users.get(user_id).is_none() {
            return Err(WorkflowError::UnknownUser(user_id.to_string()));
        }
        Ok(Notification {
            id: format!("notif_{}", uuid::Uuid::new_v4().simple()),
            user_id: user_id.to_string(),
            kind,
            title: payload.title,
            message: payload.message,
            task_id: payload.task_id,
            created_at: self.clock.now(),
            read: false,
        })
    }

    /// Enqueue already-prepared notifications
    pub fn deliver(&self, batch: Vec<Notification>) {
        if batch.is_empty() {
            return;
        }
        for notification in &batch {
            info!(
                user_id = %notification.user_id,
                kind = %notification.kind,
                task_id = ?notification.task_id,
                "Notification dispatched"
            );
        }
        crate::observability::workflow_metrics().record_notifications(batch.len() as u64);
        self.notifications.write().extend(batch);
    }

    pub fn notify(
        &self,
        user_id: &str,
        kind: NotificationType,
        payload: NotificationPayload,
    ) -> WorkflowResult<Notification> {
        let notification = self.prepare(user_id, kind, payload)?;
        self.deliver(vec![notification.clone()]);
        Ok(notification)
    }

    /// Flag perfect scores given too quickly: one `anomaly_detected`
    /// notification per admin user.
    pub fn anomaly_check(&self, entry: &AuditEntry) -> Vec<Notification> {
        if !is_anomalous(entry, self.anomaly_threshold_minutes) {
            return Vec::new();
        }

        let review_time = entry.review_time.unwrap_or_default();
        warn!(
            task_id = %entry.task_id,
            reviewer = %entry.actor,
            review_time_minutes = review_time,
            "Review anomaly detected"
        );
        crate::observability::workflow_metrics().record_anomaly();

        let batch: Vec<Notification> = self
            .users
            .with_role(Role::Admin)
            .iter()
            .filter_map(|admin| {
                let payload = NotificationPayload::new(
                    "Review Anomaly Detected",
                    format!(
                        "{} gave {}% score in {} minutes - flagged for review",
                        entry.actor_name, MAX_SCORE, review_time
                    ),
                )
                .for_task(&entry.task_id);
                match self.prepare(&admin.id, NotificationType::AnomalyDetected, payload) {
                    Ok(notification) => Some(notification),
                    Err(e) => {
                        warn!(
                            task_id = %entry.task_id,
                            admin_id = %admin.id,
                            error = %e,
                            "Anomaly notification could not be prepared"
                        );
                        None
                    }
                }
            })
            .collect();

        self.deliver(batch.clone());
        batch
    }

    /// Mark one notification read. Repeating the call is a no-op.
    pub fn mark_read(&self, notification_id: &str, actor_id: &str) -> WorkflowResult<Notification> {
        let mut notifications = self.notifications.write();
        let notification = notifications
            .iter_mut()
            .find(|n| n.id == notification_id)
            .ok_or_else(|| WorkflowError::UnknownNotification(notification_id.to_string()))?;

        if notification.user_id != actor_id {
            return Err(WorkflowError::permission(
                actor_id,
                "mark another user's notification read",
            ));
        }
        notification.read = true;
        Ok(notification.clone())
    }

    /// Mark every notification of the user read; returns how many changed
    pub fn mark_all_read(&self, user_id: &str) -> usize {
        let mut changed = 0;
        for notification in self
            .notifications
            .write()
            .iter_mut()
            .filter(|n| n.user_id == user_id && !n.read)
        {
            notification.read = true;
            changed += 1;
        }
        changed
    }

    /// Notifications for a user, newest first
    pub fn for_user(&self, user_id: &str) -> Vec<Notification> {
        let mut list: Vec<Notification> = self
            .notifications
            .read()
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        list
    }

    pub fn unread_count(&self, user_id: &str) -> usize {
        self.notifications
            .read()
            .iter()
            .filter(|n| n.user_id == user_id && !n.read)
            .count()
    }

    pub fn all(&self) -> Vec<Notification> {
        self.notifications.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::workflow::store::InMemoryUserDirectory;
    use crate::workflow::types::{AuditAction, User};
    use chrono::Utc;

    fn dispatcher() -> NotificationDispatcher {
        let mut users = InMemoryUserDirectory::demo_users();
        users.push(User::new("u_admin2", "Second Admin", "admin2@icog.test", Role::Admin));
        NotificationDispatcher::new(
            Arc::new(InMemoryUserDirectory::new(users)),
            Arc::new(ManualClock::new(Utc::now())),
        )
    }

    fn scoring_entry(action: AuditAction, score: u8, review_time: i64) -> AuditEntry {
        AuditEntry::new(
            "task_1",
            action,
            "u_reviewer1",
            "Miriam Reviewer",
            Utc::now(),
            format!("Scored {score}/100"),
        )
        .with_review(score, review_time)
    }

    #[test]
    fn test_is_anomalous_only_for_fast_perfect_scores() {
        assert!(is_anomalous(&scoring_entry(AuditAction::TaskApproved, 100, 5), 10));
        assert!(is_anomalous(&scoring_entry(AuditAction::ReviewerScored, 100, 9), 10));
        assert!(!is_anomalous(&scoring_entry(AuditAction::TaskApproved, 100, 10), 10));
        assert!(!is_anomalous(&scoring_entry(AuditAction::TaskApproved, 100, 15), 10));
        assert!(!is_anomalous(&scoring_entry(AuditAction::ReviewerScored, 99, 1), 10));

        let unscored = AuditEntry::new(
            "task_1",
            AuditAction::DraftSubmitted,
            "u_marketing",
            "Selam Marketing",
            Utc::now(),
            "Submitted",
        );
        assert!(!is_anomalous(&unscored, 10));
    }

    #[test]
    fn test_anomaly_check_notifies_each_admin_once() {
        let dispatcher = dispatcher();
        let sent = dispatcher.anomaly_check(&scoring_entry(AuditAction::TaskApproved, 100, 5));

        assert_eq!(sent.len(), 2);
        assert_eq!(dispatcher.for_user("u_admin").len(), 1);
        assert_eq!(dispatcher.for_user("u_admin2").len(), 1);
        assert!(sent.iter().all(|n| n.kind == NotificationType::AnomalyDetected));
        assert!(dispatcher.for_user("u_reviewer1").is_empty());
    }

    #[test]
    fn test_anomaly_check_quiet_for_slow_review() {
        let dispatcher = dispatcher();
        let sent = dispatcher.anomaly_check(&scoring_entry(AuditAction::TaskApproved, 100, 15));
        assert!(sent.is_empty());
        assert!(dispatcher.all().is_empty());
    }

    #[test]
    fn test_notify_unknown_user_fails() {
        let dispatcher = dispatcher();
        let err = dispatcher
            .notify("u_ghost", NotificationType::TaskScored, NotificationPayload::new("t", "m"))
            .unwrap_err();
        assert_eq!(err, WorkflowError::UnknownUser("u_ghost".to_string()));
    }

    #[test]
    fn test_mark_read_is_idempotent() {
        let dispatcher = dispatcher();
        let sent = dispatcher
            .notify(
                "u_marketing",
                NotificationType::TaskScored,
                NotificationPayload::new("Review Complete", "Scored 85/100").for_task("task_1"),
            )
            .unwrap();
        assert!(!sent.read);
        assert_eq!(dispatcher.unread_count("u_marketing"), 1);

        assert!(dispatcher.mark_read(&sent.id, "u_marketing").unwrap().read);
        assert!(dispatcher.mark_read(&sent.id, "u_marketing").unwrap().read);
        assert_eq!(dispatcher.unread_count("u_marketing"), 0);
    }

    #[test]
    fn test_mark_read_checks_recipient_and_id() {
        let dispatcher = dispatcher();
        let sent = dispatcher
            .notify(
                "u_marketing",
                NotificationType::TaskApproved,
                NotificationPayload::new("Approved", "Done"),
            )
            .unwrap();

        assert!(matches!(
            dispatcher.mark_read(&sent.id, "u_admin"),
            Err(WorkflowError::PermissionDenied { .. })
        ));
        assert_eq!(
            dispatcher.mark_read("notif_missing", "u_marketing").unwrap_err(),
            WorkflowError::UnknownNotification("notif_missing".to_string())
        );
    }

    #[test]
    fn test_mark_all_read_counts_changes() {
        let dispatcher = dispatcher();
        for _ in 0..3 {
            dispatcher
                .notify(
                    "u_marketing",
                    NotificationType::TaskScored,
                    NotificationPayload::new("t", "m"),
                )
                .unwrap();
        }
        assert_eq!(dispatcher.mark_all_read("u_marketing"), 3);
        assert_eq!(dispatcher.mark_all_read("u_marketing"), 0);
    }

    /// Lists an admin that `get` cannot resolve
    struct StaleDirectory(InMemoryUserDirectory);

    impl UserDirectory for StaleDirectory {
        fn get(&self, id: &str) -> Option<User> {
            self.0.get(id)
        }

        fn find_by_email(&self, email: &str) -> Option<User> {
            self.0.find_by_email(email)
        }

        fn with_role(&self, role: Role) -> Vec<User> {
            let mut users = self.0.with_role(role);
            if role == Role::Admin {
                users.push(User::new("u_gone", "Former Admin", "gone@icog.test", Role::Admin));
            }
            users
        }

        fn list(&self) -> Vec<User> {
            self.0.list()
        }
    }

    #[test]
    fn test_anomaly_check_skips_unresolvable_admin() {
        let directory = StaleDirectory(InMemoryUserDirectory::new(
            InMemoryUserDirectory::demo_users(),
        ));
        let dispatcher = NotificationDispatcher::new(
            Arc::new(directory),
            Arc::new(ManualClock::new(Utc::now())),
        );

        let sent = dispatcher.anomaly_check(&scoring_entry(AuditAction::TaskApproved, 100, 2));
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].user_id, "u_admin");
        assert!(dispatcher.for_user("u_gone").is_empty());
    }
}
