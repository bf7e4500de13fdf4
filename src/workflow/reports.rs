// Dashboard KPIs and audit exports

use serde::Serialize;
use std::collections::BTreeMap;

use super::notifications::is_anomalous;
use super::types::{AuditEntry, Task, TaskStatus};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardKpis {
    pub total_tasks: usize,
    /// Mean score over all tasks, rounded to a whole number
    pub average_score: u32,
    /// Mean days from creation to approval, one decimal place
    pub average_approval_days: Option<f64>,
    pub anomalies: usize,
    pub by_status: BTreeMap<String, usize>,
}

impl DashboardKpis {
    pub fn compute(tasks: &[Task], audit: &[AuditEntry], anomaly_threshold_minutes: i64) -> Self {
        let mut by_status: BTreeMap<String, usize> = [
            TaskStatus::Draft,
            TaskStatus::UnderReview,
            TaskStatus::RevisionsRequired,
            TaskStatus::Approved,
        ]
        .iter()
        .map(|status| (status.as_str().to_string(), 0))
        .collect();
        for task in tasks {
            *by_status.entry(task.status.as_str().to_string()).or_default() += 1;
        }

        let average_score = if tasks.is_empty() {
            0
        } else {
            let total: u32 = tasks.iter().map(|t| u32::from(t.score)).sum();
            (total as f64 / tasks.len() as f64).round() as u32
        };

        let approval_days: Vec<f64> = tasks
            .iter()
            .filter(|t| t.is_approved())
            .map(|t| (t.updated_at - t.created_at).num_minutes() as f64 / (60.0 * 24.0))
            .collect();
        let average_approval_days = if approval_days.is_empty() {
            None
        } else {
            let mean = approval_days.iter().sum::<f64>() / approval_days.len() as f64;
            Some((mean * 10.0).round() / 10.0)
        };

        let anomalies = audit
            .iter()
            .filter(|entry| is_anomalous(entry, anomaly_threshold_minutes))
            .count();

        Self {
            total_tasks: tasks.len(),
            average_score,
            average_approval_days,
            anomalies,
            by_status,
        }
    }
}

/// Render audit entries as CSV with a `Timestamp,Actor,Action,Details` header
pub fn audit_csv<'a>(entries: impl IntoIterator<Item = &'a AuditEntry>) -> String {
    let mut out = String::from("Timestamp,Actor,Action,Details\n");
    for entry in entries {
        let row = [
            entry.timestamp.to_rfc3339(),
            entry.actor_name.clone(),
            entry.action.as_str().to_string(),
            entry.details.clone(),
        ];
        let cells: Vec<String> = row.iter().map(|cell| csv_cell(cell)).collect();
        out.push_str(&cells.join(","));
        out.push('\n');
    }
    out
}

fn csv_cell(value: &str) -> String {
    if value.contains(|c| matches!(c, ',' | '"' | '\n' | '\r')) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::types::{AuditAction, DosAndDonts, Priority};
    use chrono::{Duration, Utc};

    fn task(id: &str, status: TaskStatus, score: u8, age_days: i64) -> Task {
        let now = Utc::now();
        Task {
            id: id.to_string(),
            title: id.to_string(),
            description: "d".to_string(),
            priority: Priority::Low,
            status,
            created_by: "u_marketing".to_string(),
            reviewer_id: None,
            created_at: now - Duration::days(age_days),
            due_date: now + Duration::days(1),
            score,
            requirements: vec![],
            attachments: vec![],
            draft_content: String::new(),
            dos_and_donts: DosAndDonts::default(),
            review_feedback: None,
            review_started_at: None,
            version: 1,
            updated_at: now,
        }
    }

    #[test]
    fn test_kpis() {
        let tasks = vec![
            task("a", TaskStatus::Approved, 100, 3),
            task("b", TaskStatus::RevisionsRequired, 85, 1),
            task("c", TaskStatus::Draft, 0, 0),
        ];
        let audit = vec![
            AuditEntry::new(
                "a",
                AuditAction::TaskApproved,
                "u_reviewer1",
                "Miriam Reviewer",
                Utc::now(),
                "",
            )
            .with_review(100, 4),
            AuditEntry::new(
                "b",
                AuditAction::ReviewerScored,
                "u_reviewer1",
                "Miriam Reviewer",
                Utc::now(),
                "",
            )
            .with_review(85, 4),
        ];

        let kpis = DashboardKpis::compute(&tasks, &audit, 10);
        assert_eq!(kpis.total_tasks, 3);
        assert_eq!(kpis.average_score, 62);
        assert_eq!(kpis.average_approval_days, Some(3.0));
        assert_eq!(kpis.anomalies, 1);
        assert_eq!(kpis.by_status["draft"], 1);
        assert_eq!(kpis.by_status["under_review"], 0);
    }

    #[test]
    fn test_kpis_empty() {
        let kpis = DashboardKpis::compute(&[], &[], 10);
        assert_eq!(kpis.total_tasks, 0);
        assert_eq!(kpis.average_score, 0);
        assert_eq!(kpis.average_approval_days, None);
    }

    #[test]
    fn test_audit_csv_quotes_fields() {
        let entry = AuditEntry::new(
            "a",
            AuditAction::ReviewerScored,
            "u_reviewer1",
            "Miriam Reviewer",
            Utc::now(),
            "Scored 85/100, review time: 45 minutes",
        );
        let csv = audit_csv([&entry]);
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("Timestamp,Actor,Action,Details"));
        let row = lines.next().unwrap();
        assert!(row.ends_with(
            ",Miriam Reviewer,reviewer_scored,\"Scored 85/100, review time: 45 minutes\""
        ));
        assert_eq!(csv_cell("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
