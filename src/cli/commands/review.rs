use anyhow::Result;

use super::task::print_notified;
use super::{AppContext, Command};
use crate::workflow::{ScoreFeedback, TaskStatus};

pub struct AssignReviewerCommand {
    pub task_id: String,
    pub reviewer_id: String,
}

impl Command for AssignReviewerCommand {
    async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let outcome = ctx
            .mutate("review.assign", |engine, user| {
                Ok(engine.assign_reviewer(&self.task_id, &user.id, &self.reviewer_id)?)
            })
            .await?;
        println!("👤 {} ({})", outcome.entry.details, outcome.task.id);
        print_notified(&outcome);
        Ok(())
    }
}

pub struct ScoreTaskCommand {
    pub task_id: String,
    pub score: i64,
    pub feedback: ScoreFeedback,
}

impl Command for ScoreTaskCommand {
    async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let outcome = ctx
            .mutate("review.score", |engine, user| {
                Ok(engine.submit_score(&self.task_id, &user.id, self.score, self.feedback.clone())?)
            })
            .await?;

        match outcome.task.status {
            TaskStatus::Approved => println!("🎉 {} approved with 100/100", outcome.task.id),
            status => println!(
                "💯 {} scored {}/100, now {}",
                outcome.task.id, outcome.task.score, status
            ),
        }
        println!("  {}", outcome.entry.details);
        print_notified(&outcome);
        if outcome.anomalies().next().is_some() {
            println!("⚠️  This review was flagged for admin attention");
        }
        Ok(())
    }
}
