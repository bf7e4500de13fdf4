use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::path::PathBuf;

use super::{read_content, AppContext, Command};
use crate::cli::{ContentArgs, CreateTaskArgs, TaskStatusArg};
use crate::precheck::{HeuristicPrecheck, PrecheckRequest, PrecheckService};
use crate::workflow::{
    AuditEntry, NewAttachment, NewTask, Task, TaskStatus, TransitionOutcome, WorkflowError,
};

pub struct CreateTaskCommand {
    pub args: CreateTaskArgs,
}

impl Command for CreateTaskCommand {
    async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let new_task = NewTask {
            title: self.args.title.clone(),
            description: self.args.description.clone(),
            priority: self.args.priority,
            due_date: parse_due_date(&self.args.due)?,
            requirements: self.args.requirements.clone(),
            dos_and_donts: None,
        };
        let outcome = ctx
            .mutate("task.create", |engine, user| Ok(engine.create_task(&user.id, new_task)?))
            .await?;

        println!("✅ Created task {}", outcome.task.id);
        print_task_summary(&outcome.task);
        Ok(())
    }
}

pub struct ListTasksCommand {
    pub status: Option<TaskStatusArg>,
}

impl Command for ListTasksCommand {
    async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let filter: Option<TaskStatus> = self.status.map(Into::into);
        ctx.read(|engine, user| {
            let tasks: Vec<Task> = engine
                .visible_tasks(&user.id)?
                .into_iter()
                .filter(|t| filter.map_or(true, |status| t.status == status))
                .collect();

            if tasks.is_empty() {
                println!("📋 No tasks");
                return Ok(());
            }
            println!("📋 {} task(s)", tasks.len());
            for task in &tasks {
                println!();
                print_task_summary(task);
            }
            Ok(())
        })
        .await
    }
}

pub struct ShowTaskCommand {
    pub task_id: String,
}

impl Command for ShowTaskCommand {
    async fn execute(&self, ctx: &AppContext) -> Result<()> {
        ctx.read(|engine, user| {
            let task = engine
                .visible_tasks(&user.id)?
                .into_iter()
                .find(|t| t.id == self.task_id)
                .ok_or_else(|| anyhow!("Unknown task: {}", self.task_id))?;
            let history = engine.audit_trail(&task.id)?;
            print_task_detail(&task, &history);
            Ok(())
        })
        .await
    }
}

pub struct SaveDraftCommand {
    pub task_id: String,
    pub content: ContentArgs,
}

impl Command for SaveDraftCommand {
    async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let content = read_content(&self.content)?
            .ok_or_else(|| anyhow!("Provide the draft with --content or --file"))?;
        let outcome = ctx
            .mutate("task.draft", |engine, user| {
                Ok(engine.update_draft(&self.task_id, &user.id, &content)?)
            })
            .await?;
        println!("💾 {}", outcome.entry.details);
        Ok(())
    }
}

pub struct SubmitDraftCommand {
    pub task_id: String,
    pub content: ContentArgs,
}

impl Command for SubmitDraftCommand {
    async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let content = read_content(&self.content)?;
        let outcome = ctx
            .mutate("task.submit", |engine, user| {
                Ok(engine.submit_draft(&self.task_id, &user.id, content.as_deref())?)
            })
            .await?;
        println!("📨 {} ({})", outcome.entry.details, outcome.task.id);
        print_notified(&outcome);
        Ok(())
    }
}

pub struct AttachFileCommand {
    pub task_id: String,
    pub file: PathBuf,
}

impl Command for AttachFileCommand {
    async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let metadata = tokio::fs::metadata(&self.file)
            .await
            .with_context(|| format!("Failed to read {}", self.file.display()))?;
        let name = self
            .file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| anyhow!("{} is not a file", self.file.display()))?;
        let attachment = NewAttachment {
            content_type: content_type_for(&name).to_string(),
            name,
            size: metadata.len(),
        };

        let outcome = ctx
            .mutate("task.attach", |engine, user| {
                Ok(engine.add_attachment(&self.task_id, &user.id, attachment)?)
            })
            .await?;
        println!("📎 {}", outcome.entry.details);
        Ok(())
    }
}

pub struct PrecheckCommand {
    pub task_id: String,
}

impl Command for PrecheckCommand {
    async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let (request, checked_version) = ctx
            .read(|engine, user| {
                let task = engine
                    .visible_tasks(&user.id)?
                    .into_iter()
                    .find(|t| t.id == self.task_id)
                    .ok_or_else(|| anyhow!("Unknown task: {}", self.task_id))?;
                let version = task.version;
                let request = PrecheckRequest {
                    task_id: task.id,
                    content: task.draft_content,
                    requirements: task.requirements,
                };
                Ok((request, version))
            })
            .await?;

        let service: Box<dyn PrecheckService> = Box::new(HeuristicPrecheck::new());
        let report = service.run(request).await?;
        ctx.mutate("task.precheck", |engine, _user| {
            engine
                .record_precheck(&report.task_id, checked_version, &report)
                .map_err(|e| match e {
                    WorkflowError::Conflict { .. } => anyhow::Error::new(e)
                        .context("The task changed while the pre-check ran; run it again"),
                    other => other.into(),
                })
        })
        .await?;

        println!(
            "🔍 Pre-check for {}: {}% baseline score",
            report.task_id,
            report.baseline_percent()
        );
        for passed in &report.passed_checks {
            println!("  ✅ {passed}");
        }
        for failed in &report.failed_checks {
            println!("  ❌ {failed}");
        }
        if !report.flagged_phrases.is_empty() {
            println!("  ⚠️  Vague wording: {}", report.flagged_phrases.join(", "));
        }
        println!("Suggestions:");
        for suggestion in &report.suggestions {
            println!("  - {suggestion}");
        }
        println!("(advisory only; the task score is set by the reviewer)");
        Ok(())
    }
}

/// Accepts `YYYY-MM-DD` (end of that day, UTC) or an RFC 3339 timestamp
pub fn parse_due_date(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Ok(timestamp.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("Invalid due date '{value}', expected YYYY-MM-DD"))?;
    let end_of_day = date
        .and_hms_opt(23, 59, 59)
        .ok_or_else(|| anyhow!("Invalid due date '{value}'"))?;
    Ok(Utc.from_utc_datetime(&end_of_day))
}

fn content_type_for(name: &str) -> &'static str {
    let extension = name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("pdf") => "application/pdf",
        Some("doc") => "application/msword",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("md") => "text/markdown",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

pub(crate) fn print_notified(outcome: &TransitionOutcome) {
    for notification in &outcome.notifications {
        println!(
            "  🔔 {} -> {}: {}",
            notification.kind, notification.user_id, notification.title
        );
    }
}

fn print_task_summary(task: &Task) {
    println!("{}  [{}]  {}", task.id, task.status, task.title);
    println!(
        "  priority: {}  due: {}  score: {}/100",
        task.priority,
        task.due_date.format("%Y-%m-%d"),
        task.score
    );
    if let Some(reviewer) = &task.reviewer_id {
        println!("  reviewer: {reviewer}");
    }
}

fn print_task_detail(task: &Task, history: &[AuditEntry]) {
    print_task_summary(task);
    println!("  created by {} on {}", task.created_by, task.created_at.format("%Y-%m-%d %H:%M"));
    println!("  {}", task.description);
    println!();
    println!("Requirements:");
    for requirement in &task.requirements {
        println!("  - {requirement}");
    }
    if !task.attachments.is_empty() {
        println!("Attachments:");
        for attachment in &task.attachments {
            println!("  📎 {} ({} bytes)", attachment.name, attachment.size);
        }
    }
    if let Some(feedback) = &task.review_feedback {
        println!("Review feedback ({}):", feedback.reviewer_id);
        for strength in feedback.strengths.lines() {
            println!("  + {strength}");
        }
        for issue in feedback.issues.lines() {
            println!("  - {issue}");
        }
        for change in feedback.required_changes.lines() {
            println!("  ! {change}");
        }
    }
    if task.has_draft_content() {
        println!("Draft:");
        for line in task.draft_content.lines() {
            println!("  | {line}");
        }
    }
    println!();
    println!("Timeline:");
    for entry in history {
        println!(
            "  {}  {:<22} {:<16} {}",
            entry.timestamp.format("%Y-%m-%d %H:%M"),
            entry.action.as_str(),
            entry.actor_name,
            entry.details
        );
    }
}
