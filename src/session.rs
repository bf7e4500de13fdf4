// Signed-in user for the CLI, kept in `session.json` under the data directory

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::fs::FileSystemOperations;
use crate::workflow::{Role, User, UserDirectory};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub signed_in_at: DateTime<Utc>,
}

/// How a user identifies themselves at sign-in
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Email(String),
    /// Demo sign-in as the first user holding the role
    Role(Role),
}

/// Find the user the credentials refer to
pub fn resolve_user(users: &dyn UserDirectory, credentials: &Credentials) -> Result<User> {
    match credentials {
        Credentials::Email(email) => users
            .find_by_email(email)
            .ok_or_else(|| anyhow!("No user with email {email}")),
        Credentials::Role(role) => users
            .with_role(*role)
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No demo user with role {role}")),
    }
}

pub struct SessionStore {
    fs: Arc<dyn FileSystemOperations>,
    dir: String,
    path: String,
}

impl SessionStore {
    pub fn new(fs: Arc<dyn FileSystemOperations>, data_dir: &Path) -> Self {
        Self {
            fs,
            dir: data_dir.display().to_string(),
            path: data_dir.join("session.json").display().to_string(),
        }
    }

    pub async fn current(&self) -> Result<Option<Session>> {
        if !self.fs.exists(&self.path) {
            return Ok(None);
        }
        let contents = self.fs.read_to_string(&self.path).await?;
        let session = serde_json::from_str(&contents)
            .with_context(|| format!("Corrupt session file {}", self.path))?;
        Ok(Some(session))
    }

    /// Current session, or an error telling the user to log in
    pub async fn require(&self) -> Result<Session> {
        self.current()
            .await?
            .ok_or_else(|| anyhow!("Not logged in. Run `approval-flow login` first"))
    }

    pub async fn sign_in(&self, user: &User) -> Result<Session> {
        let session = Session {
            user_id: user.id.clone(),
            signed_in_at: Utc::now(),
        };
        self.fs.create_dir_all(&self.dir).await?;
        self.fs
            .write(&self.path, serde_json::to_string_pretty(&session)?.as_bytes())
            .await?;
        info!(user_id = %user.id, role = %user.role, "User signed in");
        Ok(session)
    }

    pub async fn sign_out(&self) -> Result<()> {
        self.fs.remove_file(&self.path).await?;
        info!("User signed out");
        Ok(())
    }
}
