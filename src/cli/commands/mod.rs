use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Instrument;

use crate::clock::{Clock, SystemClock};
use crate::config::ApprovalFlowConfig;
use crate::fs::StandardFileSystem;
use crate::observability::OperationTimer;
use crate::persistence::{FileSystemPersistence, StatePersistence, WorkflowSnapshot};
use crate::session::SessionStore;
use crate::telemetry::{create_task_span, generate_correlation_id};
use crate::workflow::{ApprovalStateMachine, User};

pub mod audit;
pub mod dashboard;
pub mod init;
pub mod notifications;
pub mod review;
pub mod session;
pub mod task;

#[allow(async_fn_in_trait)]
pub trait Command {
    async fn execute(&self, ctx: &AppContext) -> Result<()>;
}

/// Shared resources every command works with
pub struct AppContext {
    pub config: ApprovalFlowConfig,
    pub persistence: FileSystemPersistence,
    pub sessions: SessionStore,
    clock: Arc<dyn Clock>,
}

impl AppContext {
    pub fn new(config: ApprovalFlowConfig, data_dir: Option<PathBuf>) -> Self {
        let data_dir = data_dir.unwrap_or_else(|| config.storage.data_dir());
        Self {
            persistence: FileSystemPersistence::new(&data_dir),
            sessions: SessionStore::new(Arc::new(StandardFileSystem), &data_dir),
            clock: Arc::new(SystemClock),
            config,
        }
    }

    pub fn data_dir(&self) -> &Path {
        self.persistence.data_dir()
    }

    fn engine_from(&self, snapshot: WorkflowSnapshot) -> ApprovalStateMachine {
        snapshot.into_engine(
            Arc::clone(&self.clock),
            self.config.workflow.policy(),
            self.config.workflow.anomaly_threshold_minutes,
        )
    }

    /// Load the workflow for reading
    pub async fn load_engine(&self) -> Result<ApprovalStateMachine> {
        let snapshot = self.persistence.load_required().await?;
        Ok(self.engine_from(snapshot))
    }

    /// The signed-in user, checked against the user directory
    pub async fn current_user(&self, engine: &ApprovalStateMachine) -> Result<User> {
        let session = self.sessions.require().await?;
        engine
            .user(&session.user_id)
            .with_context(|| format!("Session refers to unknown user {}", session.user_id))
    }

    /// Load the workflow and signed-in user for a read-only command
    pub async fn read<T>(
        &self,
        f: impl FnOnce(&ApprovalStateMachine, &User) -> Result<T>,
    ) -> Result<T> {
        let engine = self.load_engine().await?;
        let user = self.current_user(&engine).await?;
        f(&engine, &user)
    }

    /// Run one mutating call under the state lock, saving only on success
    pub async fn mutate<T>(
        &self,
        operation: &str,
        f: impl FnOnce(&ApprovalStateMachine, &User) -> Result<T>,
    ) -> Result<T> {
        let correlation_id = generate_correlation_id();
        let span = create_task_span(operation, None, None, Some(&correlation_id));
        let timer = OperationTimer::new(operation);

        let result = async {
            let mut lock = self.persistence.lock()?;
            let _guard = lock.acquire()?;

            let engine = self.load_engine().await?;
            let user = self.current_user(&engine).await?;
            tracing::Span::current().record("actor.id", user.id.as_str());

            let value = f(&engine, &user)?;
            self.persistence
                .save(&WorkflowSnapshot::capture(&engine))
                .await?;
            Ok(value)
        }
        .instrument(span)
        .await;
        timer.finish();
        result
    }
}

/// Read draft content given inline or from a file
pub fn read_content(content: &crate::cli::ContentArgs) -> Result<Option<String>> {
    match (&content.content, &content.file) {
        (Some(text), _) => Ok(Some(text.clone())),
        (None, Some(path)) => std::fs::read_to_string(path)
            .map(Some)
            .with_context(|| format!("Failed to read {}", path.display())),
        (None, None) => Ok(None),
    }
}

pub async fn show_how_to_get_started() -> Result<()> {
    println!("📋 approval-flow - task approval workflow");
    println!();
    println!("To get started:");
    println!("  ⚙️  approval-flow init                         # Create workflow state");
    println!("  🔑 approval-flow login --role department      # Sign in as a demo user");
    println!("  📝 approval-flow task create --title ...      # Draft a task");
    println!("  📨 approval-flow task submit <task-id>        # Send it for review");
    println!();
    println!("Reviewers and admins:");
    println!("  👤 approval-flow review assign <task-id> <reviewer-id>");
    println!("  💯 approval-flow review score <task-id> <score>");
    println!("  📊 approval-flow dashboard");
    Ok(())
}

pub(crate) fn missing_permission(action: &str) -> anyhow::Error {
    anyhow!("Permission denied: your role may not {action}")
}
