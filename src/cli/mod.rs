use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::workflow::{Priority, Role, TaskStatus};

pub mod commands;

#[derive(Parser)]
#[command(name = "approval-flow")]
#[command(about = "Role-based task approval workflow with audit trail")]
#[command(
    long_about = "Departments draft tasks, reviewers score them and admins oversee the process. \
                  Every transition is audited and suspiciously fast perfect scores are flagged. \
                  Get started with 'approval-flow init' and \
                  'approval-flow login --role department'."
)]
pub struct Cli {
    /// Directory holding workflow state (overrides configuration)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the workflow state with the demo users
    Init {
        /// Overwrite existing workflow state
        #[arg(long)]
        force: bool,
    },
    /// Sign in by email, or as the demo user of a role
    Login {
        #[arg(long, conflicts_with = "role", required_unless_present = "role")]
        email: Option<String>,
        #[arg(long)]
        role: Option<Role>,
    },
    /// Sign out
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Create, draft and submit tasks
    #[command(subcommand)]
    Task(TaskCommands),
    /// Assign reviewers and score tasks
    #[command(subcommand)]
    Review(ReviewCommands),
    /// Inspect, export and verify the audit trail
    #[command(subcommand)]
    Audit(AuditCommands),
    /// Read your notifications
    #[command(subcommand)]
    Notifications(NotificationCommands),
    /// Show workflow KPIs for the tasks you can see
    Dashboard,
    /// Keyword search over task titles and descriptions
    Search {
        query: String,
    },
}

#[derive(Subcommand)]
pub enum TaskCommands {
    /// Create a new draft task
    Create(CreateTaskArgs),
    /// List tasks visible to you
    List {
        #[arg(long)]
        status: Option<TaskStatusArg>,
    },
    /// Show a task with its audit timeline
    Show { task_id: String },
    /// Save draft content without submitting
    Draft {
        task_id: String,
        #[command(flatten)]
        content: ContentArgs,
    },
    /// Submit the draft for review
    Submit {
        task_id: String,
        #[command(flatten)]
        content: ContentArgs,
    },
    /// Attach a file to a draft
    Attach { task_id: String, file: PathBuf },
    /// Run the advisory pre-check on the current draft
    Precheck { task_id: String },
}

#[derive(Args)]
pub struct CreateTaskArgs {
    #[arg(long)]
    pub title: String,
    #[arg(long)]
    pub description: String,
    #[arg(long, default_value = "medium")]
    pub priority: Priority,
    /// Due date as YYYY-MM-DD or RFC 3339
    #[arg(long)]
    pub due: String,
    /// Required section; repeat for several
    #[arg(long = "requirement", required = true)]
    pub requirements: Vec<String>,
}

#[derive(Args, Default)]
pub struct ContentArgs {
    /// Draft content inline
    #[arg(long, conflicts_with = "file")]
    pub content: Option<String>,
    /// Read draft content from a file
    #[arg(long)]
    pub file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum ReviewCommands {
    /// Assign a reviewer to a submitted task
    Assign { task_id: String, reviewer_id: String },
    /// Score a task; 100 approves it
    Score {
        task_id: String,
        #[arg(allow_hyphen_values = true)]
        score: i64,
        #[arg(long = "strength")]
        strengths: Vec<String>,
        #[arg(long = "issue")]
        issues: Vec<String>,
        #[arg(long = "change")]
        required_changes: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum AuditCommands {
    /// Show the audit trail of one task, or of everything (admin)
    Show { task_id: Option<String> },
    /// Export the audit trail as CSV (admin)
    Export {
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Replay each task's history and compare with its stored status (admin)
    Verify,
}

#[derive(Subcommand)]
pub enum NotificationCommands {
    /// List your notifications, newest first
    List {
        #[arg(long)]
        unread: bool,
    },
    /// Mark one notification read
    Read { notification_id: String },
    /// Mark all your notifications read
    ReadAll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TaskStatusArg {
    Draft,
    UnderReview,
    RevisionsRequired,
    Approved,
}

impl From<TaskStatusArg> for TaskStatus {
    fn from(arg: TaskStatusArg) -> Self {
        match arg {
            TaskStatusArg::Draft => TaskStatus::Draft,
            TaskStatusArg::UnderReview => TaskStatus::UnderReview,
            TaskStatusArg::RevisionsRequired => TaskStatus::RevisionsRequired,
            TaskStatusArg::Approved => TaskStatus::Approved,
        }
    }
}
