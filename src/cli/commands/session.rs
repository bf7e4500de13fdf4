use anyhow::Result;

use super::{AppContext, Command};
use crate::session::{resolve_user, Credentials};

pub struct LoginCommand {
    pub credentials: Credentials,
}

impl Command for LoginCommand {
    async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let engine = ctx.load_engine().await?;
        let user = resolve_user(engine.users().as_ref(), &self.credentials)?;
        ctx.sessions.sign_in(&user).await?;

        let unread = engine.notifications().unread_count(&user.id);
        println!("✅ Signed in as {} ({}, {})", user.name, user.id, user.role);
        if unread > 0 {
            println!("🔔 {unread} unread notification(s)");
        }
        Ok(())
    }
}

pub struct LogoutCommand;

impl Command for LogoutCommand {
    async fn execute(&self, ctx: &AppContext) -> Result<()> {
        ctx.sessions.sign_out().await?;
        println!("👋 Signed out");
        Ok(())
    }
}

pub struct WhoamiCommand;

impl Command for WhoamiCommand {
    async fn execute(&self, ctx: &AppContext) -> Result<()> {
        ctx.read(|engine, user| {
            println!("{} <{}>", user.name, user.email);
            println!("  id:   {}", user.id);
            println!("  role: {}", user.role);
            if let Some(department) = &user.department {
                println!("  department: {department}");
            }
            println!("  unread notifications: {}", engine.notifications().unread_count(&user.id));
            Ok(())
        })
        .await
    }
}
