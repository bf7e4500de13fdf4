use anyhow::Result;
use clap::Parser;

use approval_flow::cli::commands::{
    audit::{ExportAuditCommand, ShowAuditCommand, VerifyAuditCommand},
    dashboard::{DashboardCommand, SearchCommand},
    init::InitCommand,
    notifications::{ListNotificationsCommand, MarkAllReadCommand, MarkReadCommand},
    review::{AssignReviewerCommand, ScoreTaskCommand},
    session::{LoginCommand, LogoutCommand, WhoamiCommand},
    show_how_to_get_started,
    task::{
        AttachFileCommand, CreateTaskCommand, ListTasksCommand, PrecheckCommand, SaveDraftCommand,
        ShowTaskCommand, SubmitDraftCommand,
    },
    AppContext, Command,
};
use approval_flow::cli::{
    AuditCommands, Cli, Commands, NotificationCommands, ReviewCommands, TaskCommands,
};
use approval_flow::session::Credentials;
use approval_flow::workflow::ScoreFeedback;
use approval_flow::{config, init_telemetry, shutdown_telemetry};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = config()?.clone();
    init_telemetry(&config.observability)?;
    let ctx = AppContext::new(config, cli.data_dir);

    let result = tokio::runtime::Runtime::new()?.block_on(async {
        match cli.command {
            None => show_how_to_get_started().await,
            Some(Commands::Init { force }) => InitCommand::new(force).execute(&ctx).await,
            Some(Commands::Login { email, role }) => {
                let credentials = match (email, role) {
                    (Some(email), _) => Credentials::Email(email),
                    (None, Some(role)) => Credentials::Role(role),
                    (None, None) => anyhow::bail!("Pass --email or --role"),
                };
                LoginCommand { credentials }.execute(&ctx).await
            }
            Some(Commands::Logout) => LogoutCommand.execute(&ctx).await,
            Some(Commands::Whoami) => WhoamiCommand.execute(&ctx).await,
            Some(Commands::Task(command)) => match command {
                TaskCommands::Create(args) => CreateTaskCommand { args }.execute(&ctx).await,
                TaskCommands::List { status } => ListTasksCommand { status }.execute(&ctx).await,
                TaskCommands::Show { task_id } => ShowTaskCommand { task_id }.execute(&ctx).await,
                TaskCommands::Draft { task_id, content } => {
                    SaveDraftCommand { task_id, content }.execute(&ctx).await
                }
                TaskCommands::Submit { task_id, content } => {
                    SubmitDraftCommand { task_id, content }.execute(&ctx).await
                }
                TaskCommands::Attach { task_id, file } => {
                    AttachFileCommand { task_id, file }.execute(&ctx).await
                }
                TaskCommands::Precheck { task_id } => {
                    PrecheckCommand { task_id }.execute(&ctx).await
                }
            },
            Some(Commands::Review(command)) => match command {
                ReviewCommands::Assign { task_id, reviewer_id } => {
                    AssignReviewerCommand { task_id, reviewer_id }.execute(&ctx).await
                }
                ReviewCommands::Score {
                    task_id,
                    score,
                    strengths,
                    issues,
                    required_changes,
                } => {
                    let feedback = ScoreFeedback {
                        strengths: strengths.join("\n"),
                        issues: issues.join("\n"),
                        required_changes: required_changes.join("\n"),
                    };
                    ScoreTaskCommand { task_id, score, feedback }.execute(&ctx).await
                }
            },
            Some(Commands::Audit(command)) => match command {
                AuditCommands::Show { task_id } => ShowAuditCommand { task_id }.execute(&ctx).await,
                AuditCommands::Export { output } => {
                    ExportAuditCommand { output }.execute(&ctx).await
                }
                AuditCommands::Verify => VerifyAuditCommand.execute(&ctx).await,
            },
            Some(Commands::Notifications(command)) => match command {
                NotificationCommands::List { unread } => {
                    ListNotificationsCommand { unread_only: unread }.execute(&ctx).await
                }
                NotificationCommands::Read { notification_id } => {
                    MarkReadCommand { notification_id }.execute(&ctx).await
                }
                NotificationCommands::ReadAll => MarkAllReadCommand.execute(&ctx).await,
            },
            Some(Commands::Dashboard) => DashboardCommand.execute(&ctx).await,
            Some(Commands::Search { query }) => SearchCommand { query }.execute(&ctx).await,
        }
    });

    shutdown_telemetry();
    result
}
