/// Init command: creates the workflow state
///
/// - The state snapshot is seeded with the demo users and no tasks.
/// - Existing state is only replaced with `--force`.
/// - `approval-flow.toml` is written with defaults when it does not exist;
///   an existing configuration file is never touched.
use anyhow::{anyhow, Result};
use std::path::Path;

use super::{AppContext, Command};
use crate::persistence::{StatePersistence, WorkflowSnapshot};
use crate::workflow::InMemoryUserDirectory;

pub const CONFIG_FILE: &str = "approval-flow.toml";

pub struct InitCommand {
    pub force: bool,
}

impl InitCommand {
    pub fn new(force: bool) -> Self {
        Self { force }
    }
}

impl Command for InitCommand {
    async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let mut lock = ctx.persistence.lock()?;
        let _guard = lock.acquire()?;

        if ctx.persistence.exists() && !self.force {
            return Err(anyhow!(
                "Workflow state already exists at {}. Use --force to start over",
                ctx.persistence.state_file().display()
            ));
        }

        let snapshot = WorkflowSnapshot::seed(InMemoryUserDirectory::demo_users());
        ctx.persistence.save(&snapshot).await?;
        ctx.sessions.sign_out().await?;

        println!("✅ Workflow state created in {}", ctx.data_dir().display());
        if !Path::new(CONFIG_FILE).exists() {
            ctx.config.save_to_file(CONFIG_FILE)?;
            println!("⚙️  Wrote default configuration to {CONFIG_FILE}");
        }
        println!();
        println!("Demo users:");
        for user in &snapshot.users {
            println!(
                "  {:<12} {:<11} {:<17} {}",
                user.id,
                user.role.to_string(),
                user.name,
                user.email
            );
        }
        println!();
        println!("💡 Sign in with 'approval-flow login --role department'");
        Ok(())
    }
}
