use anyhow::{anyhow, Result};
use std::path::PathBuf;

use super::{missing_permission, AppContext, Command};
use crate::workflow::{audit_csv, can_perform, verify_consistency, AuditEntry, WorkflowAction};

pub struct ShowAuditCommand {
    pub task_id: Option<String>,
}

impl Command for ShowAuditCommand {
    async fn execute(&self, ctx: &AppContext) -> Result<()> {
        ctx.read(|engine, user| {
            if !can_perform(user.role, WorkflowAction::ViewAuditTrail) {
                return Err(missing_permission(WorkflowAction::ViewAuditTrail.as_str()));
            }
            let entries: Vec<AuditEntry> = match &self.task_id {
                Some(task_id) => {
                    let visible = engine.visible_tasks(&user.id)?.iter().any(|t| &t.id == task_id);
                    if !visible {
                        return Err(anyhow!("Unknown task: {task_id}"));
                    }
                    engine.audit_trail(task_id)?
                }
                None if can_perform(user.role, WorkflowAction::ViewAllTasks) => {
                    engine.audit().all().collect()
                }
                None => return Err(anyhow!("Pass a task id to see its audit trail")),
            };

            if entries.is_empty() {
                println!("📜 No audit entries");
                return Ok(());
            }
            for entry in &entries {
                let review = match (entry.score, entry.review_time) {
                    (Some(score), Some(minutes)) => format!("  [score {score}, {minutes} min]"),
                    _ => String::new(),
                };
                println!(
                    "{}  {}  {:<22} {:<16} {}{}",
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    entry.task_id,
                    entry.action.as_str(),
                    entry.actor_name,
                    entry.details,
                    review
                );
            }
            Ok(())
        })
        .await
    }
}

pub struct ExportAuditCommand {
    pub output: Option<PathBuf>,
}

impl Command for ExportAuditCommand {
    async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let csv = ctx
            .read(|engine, user| {
                if !can_perform(user.role, WorkflowAction::ExportAudit) {
                    return Err(missing_permission(WorkflowAction::ExportAudit.as_str()));
                }
                let entries: Vec<AuditEntry> = engine.audit().all().collect();
                Ok(audit_csv(&entries))
            })
            .await?;

        match &self.output {
            Some(path) => {
                tokio::fs::write(path, &csv).await?;
                println!("📤 Audit trail exported to {}", path.display());
            }
            None => print!("{csv}"),
        }
        Ok(())
    }
}

pub struct VerifyAuditCommand;

impl Command for VerifyAuditCommand {
    async fn execute(&self, ctx: &AppContext) -> Result<()> {
        ctx.read(|engine, user| {
            if !can_perform(user.role, WorkflowAction::ViewAllTasks) {
                return Err(missing_permission("verify the audit trail"));
            }
            let tasks = engine.tasks().list();
            let mut problems = 0;
            for task in &tasks {
                if let Some(found) = verify_consistency(task, engine.audit().query(&task.id)) {
                    problems += 1;
                    println!(
                        "❌ {}: stored {} but history implies {}",
                        found.task_id, found.stored, found.replayed
                    );
                    for violation in &found.violations {
                        println!("   - {violation}");
                    }
                }
            }
            if problems > 0 {
                return Err(anyhow!("{problems} task(s) disagree with their audit history"));
            }
            println!("✅ {} task(s) consistent with their audit history", tasks.len());
            Ok(())
        })
        .await
    }
}
