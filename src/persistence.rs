// Snapshot persistence for the workflow state
//
// The CLI is a sequence of short-lived processes, so all workflow state is
// loaded from and saved to one JSON snapshot per command. Mutating commands
// hold an exclusive fd-lock on `state.lock` for the whole load-call-save
// cycle.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::workflow::{
    ApprovalStateMachine, AuditEntry, AuditLog, InMemoryTaskStore, InMemoryUserDirectory,
    Notification, NotificationDispatcher, Task, TaskRepository, User, UserDirectory, WorkflowPolicy,
};

pub const SNAPSHOT_VERSION: &str = "1";

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: String, found: String },

    #[error("Lock acquisition failed: {reason}")]
    LockError { reason: String },

    #[error("No workflow state at {path}. Run `approval-flow init` first")]
    NotInitialized { path: String },
}

/// Everything the workflow needs to resume
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSnapshot {
    pub version: String,
    pub users: Vec<User>,
    pub tasks: Vec<Task>,
    pub audit: Vec<AuditEntry>,
    pub notifications: Vec<Notification>,
    pub saved_at: DateTime<Utc>,
    pub host: String,
}

impl WorkflowSnapshot {
    /// Empty workflow with the given users
    pub fn seed(users: Vec<User>) -> Self {
        Self {
            version: SNAPSHOT_VERSION.to_string(),
            users,
            tasks: Vec::new(),
            audit: Vec::new(),
            notifications: Vec::new(),
            saved_at: Utc::now(),
            host: current_host(),
        }
    }

    pub fn capture(engine: &ApprovalStateMachine) -> Self {
        Self {
            version: SNAPSHOT_VERSION.to_string(),
            users: engine.users().list(),
            tasks: engine.tasks().list(),
            audit: engine.audit().all().collect(),
            notifications: engine.notifications().all(),
            saved_at: Utc::now(),
            host: current_host(),
        }
    }

    pub fn into_engine(
        self,
        clock: Arc<dyn Clock>,
        policy: WorkflowPolicy,
        anomaly_threshold_minutes: i64,
    ) -> ApprovalStateMachine {
        let tasks: Arc<dyn TaskRepository> = Arc::new(InMemoryTaskStore::from_tasks(self.tasks));
        let users: Arc<dyn UserDirectory> = Arc::new(InMemoryUserDirectory::new(self.users));
        let audit = Arc::new(AuditLog::with_entries(Arc::clone(&tasks), self.audit));
        let notifications = Arc::new(
            NotificationDispatcher::new(Arc::clone(&users), Arc::clone(&clock))
                .with_threshold(anomaly_threshold_minutes)
                .with_notifications(self.notifications),
        );
        ApprovalStateMachine::new(tasks, users, audit, notifications, clock).with_policy(policy)
    }
}

fn current_host() -> String {
    hostname::get()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string()
}

#[async_trait]
pub trait StatePersistence: Send + Sync {
    /// Load the snapshot, or `None` if nothing has been saved yet
    async fn load(&self) -> Result<Option<WorkflowSnapshot>, PersistenceError>;

    async fn save(&self, snapshot: &WorkflowSnapshot) -> Result<(), PersistenceError>;
}

/// Snapshot stored as `state.json` in the data directory
#[derive(Debug, Clone)]
pub struct FileSystemPersistence {
    data_dir: PathBuf,
}

impl FileSystemPersistence {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn state_file(&self) -> PathBuf {
        self.data_dir.join("state.json")
    }

    pub fn exists(&self) -> bool {
        self.state_file().exists()
    }

    /// Open the lock file; call [`StateLock::acquire`] to take the lock
    pub fn lock(&self) -> Result<StateLock, PersistenceError> {
        std::fs::create_dir_all(&self.data_dir)?;
        let file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.data_dir.join("state.lock"))?;
        Ok(StateLock {
            lock: fd_lock::RwLock::new(file),
        })
    }

    /// Load, failing when no state has been initialized
    pub async fn load_required(&self) -> Result<WorkflowSnapshot, PersistenceError> {
        self.load().await?.ok_or_else(|| PersistenceError::NotInitialized {
            path: self.state_file().display().to_string(),
        })
    }
}

#[async_trait]
impl StatePersistence for FileSystemPersistence {
    async fn load(&self) -> Result<Option<WorkflowSnapshot>, PersistenceError> {
        let state_file = self.state_file();
        if !state_file.exists() {
            debug!(file = ?state_file, "No workflow state file found");
            return Ok(None);
        }

        let contents = fs::read_to_string(&state_file).await?;
        let snapshot: WorkflowSnapshot = serde_json::from_str(&contents)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(PersistenceError::VersionMismatch {
                expected: SNAPSHOT_VERSION.to_string(),
                found: snapshot.version,
            });
        }
        debug!(
            tasks = snapshot.tasks.len(),
            audit_entries = snapshot.audit.len(),
            "Workflow state loaded"
        );
        Ok(Some(snapshot))
    }

    async fn save(&self, snapshot: &WorkflowSnapshot) -> Result<(), PersistenceError> {
        fs::create_dir_all(&self.data_dir).await?;

        let mut to_save = snapshot.clone();
        to_save.saved_at = Utc::now();
        to_save.host = current_host();
        let serialized = serde_json::to_string_pretty(&to_save)?;

        // Write then rename so readers never see a half-written file
        let state_file = self.state_file();
        let temp_file = self.data_dir.join("state.json.tmp");
        fs::write(&temp_file, serialized).await?;
        fs::rename(&temp_file, &state_file).await?;

        info!(
            file = ?state_file,
            tasks = to_save.tasks.len(),
            audit_entries = to_save.audit.len(),
            "Workflow state saved"
        );
        Ok(())
    }
}

/// Cross-process lock around a load-modify-save cycle
pub struct StateLock {
    lock: fd_lock::RwLock<File>,
}

impl StateLock {
    /// Block until the exclusive lock is held
    pub fn acquire(&mut self) -> Result<fd_lock::RwLockWriteGuard<'_, File>, PersistenceError> {
        self.lock.write().map_err(|e| PersistenceError::LockError {
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::workflow::{NewTask, Priority, DEFAULT_ANOMALY_THRESHOLD_MINUTES};
    use chrono::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_missing_state_is_none() {
        let dir = TempDir::new().unwrap();
        let persistence = FileSystemPersistence::new(dir.path());
        assert!(persistence.load().await.unwrap().is_none());
        assert!(matches!(
            persistence.load_required().await,
            Err(PersistenceError::NotInitialized { .. })
        ));
    }

    #[tokio::test]
    async fn test_engine_survives_save_and_load() {
        let dir = TempDir::new().unwrap();
        let persistence = FileSystemPersistence::new(dir.path().join("data"));
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(Utc::now()));

        let engine = WorkflowSnapshot::seed(InMemoryUserDirectory::demo_users()).into_engine(
            Arc::clone(&clock),
            WorkflowPolicy::default(),
            DEFAULT_ANOMALY_THRESHOLD_MINUTES,
        );
        let task = engine
            .create_task(
                "u_marketing",
                NewTask {
                    title: "Annual Report".to_string(),
                    description: "Yearly summary".to_string(),
                    priority: Priority::Low,
                    due_date: clock.now() + Duration::days(5),
                    requirements: vec!["Executive summary".to_string()],
                    dos_and_donts: None,
                },
            )
            .unwrap()
            .task;
        engine.submit_draft(&task.id, "u_marketing", Some("# Report")).unwrap();

        {
            let mut lock = persistence.lock().unwrap();
            let _guard = lock.acquire().unwrap();
            persistence.save(&WorkflowSnapshot::capture(&engine)).await.unwrap();
        }

        let restored = persistence.load_required().await.unwrap().into_engine(
            clock,
            WorkflowPolicy::default(),
            DEFAULT_ANOMALY_THRESHOLD_MINUTES,
        );
        let reloaded = restored.task(&task.id).unwrap();
        assert_eq!(reloaded.version, 1);
        assert_eq!(restored.audit_trail(&task.id).unwrap().len(), 2);
        assert_eq!(restored.notifications().unread_count("u_admin"), 1);
    }

    #[tokio::test]
    async fn test_version_mismatch() {
        let dir = TempDir::new().unwrap();
        let persistence = FileSystemPersistence::new(dir.path());
        let mut snapshot = WorkflowSnapshot::seed(vec![]);
        snapshot.version = "0".to_string();
        std::fs::write(
            persistence.state_file(),
            serde_json::to_string(&snapshot).unwrap(),
        )
        .unwrap();

        assert!(matches!(
            persistence.load().await,
            Err(PersistenceError::VersionMismatch { .. })
        ));
    }
}
