use anyhow::Result;

use super::{AppContext, Command};

pub struct ListNotificationsCommand {
    pub unread_only: bool,
}

impl Command for ListNotificationsCommand {
    async fn execute(&self, ctx: &AppContext) -> Result<()> {
        ctx.read(|engine, user| {
            let notifications: Vec<_> = engine
                .notifications()
                .for_user(&user.id)
                .into_iter()
                .filter(|n| !self.unread_only || !n.read)
                .collect();

            if notifications.is_empty() {
                println!("🔕 No notifications");
                return Ok(());
            }
            for n in &notifications {
                let marker = if n.read { " " } else { "●" };
                println!(
                    "{marker} {}  {}  [{}] {}",
                    n.id,
                    n.created_at.format("%Y-%m-%d %H:%M"),
                    n.kind,
                    n.title
                );
                println!("    {}", n.message);
            }
            Ok(())
        })
        .await
    }
}

pub struct MarkReadCommand {
    pub notification_id: String,
}

impl Command for MarkReadCommand {
    async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let notification = ctx
            .mutate("notifications.read", |engine, user| {
                Ok(engine.notifications().mark_read(&self.notification_id, &user.id)?)
            })
            .await?;
        println!("✅ Marked {} read", notification.id);
        Ok(())
    }
}

pub struct MarkAllReadCommand;

impl Command for MarkAllReadCommand {
    async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let changed = ctx
            .mutate("notifications.read_all", |engine, user| {
                Ok(engine.notifications().mark_all_read(&user.id))
            })
            .await?;
        println!("✅ Marked {changed} notification(s) read");
        Ok(())
    }
}
