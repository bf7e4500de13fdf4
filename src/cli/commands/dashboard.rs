use anyhow::Result;

use super::{AppContext, Command};
use crate::search::{keyword_search, SearchItem};
use crate::workflow::{AuditEntry, DashboardKpis, Role};

pub struct DashboardCommand;

impl Command for DashboardCommand {
    async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let threshold = ctx.config.workflow.anomaly_threshold_minutes;
        ctx.read(|engine, user| {
            let tasks = engine.visible_tasks(&user.id)?;
            let audit: Vec<AuditEntry> = engine
                .audit()
                .all()
                .filter(|entry| tasks.iter().any(|t| t.id == entry.task_id))
                .collect();
            let kpis = DashboardKpis::compute(&tasks, &audit, threshold);

            println!("📊 Dashboard for {} ({})", user.name, user.role);
            println!("  Total tasks:        {}", kpis.total_tasks);
            println!("  Average score:      {}%", kpis.average_score);
            match kpis.average_approval_days {
                Some(days) => println!("  Avg time to approve: {days} days"),
                None => println!("  Avg time to approve: n/a"),
            }
            if user.role == Role::Admin {
                println!("  Review anomalies:   {}", kpis.anomalies);
            }
            println!("  By status:");
            for (status, count) in &kpis.by_status {
                println!("    {status:<20} {count}");
            }
            Ok(())
        })
        .await
    }
}

pub struct SearchCommand {
    pub query: String,
}

impl Command for SearchCommand {
    async fn execute(&self, ctx: &AppContext) -> Result<()> {
        ctx.read(|engine, user| {
            let items: Vec<SearchItem> = engine
                .visible_tasks(&user.id)?
                .iter()
                .map(SearchItem::from)
                .collect();
            let matches = keyword_search(&self.query, &items);
            if matches.is_empty() {
                println!("🔍 No tasks match '{}'", self.query.trim());
                return Ok(());
            }
            println!("🔍 {} match(es)", matches.len());
            for found in &matches {
                println!("  {}  {}", found.task_id, found.title);
                println!("      {}", found.description);
            }
            Ok(())
        })
        .await
    }
}
