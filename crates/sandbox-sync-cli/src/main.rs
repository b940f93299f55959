use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::broadcast;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use sandbox_sync::config::{load_config_or_default, PollingConfig};
use sandbox_sync::poll::statuses_by_workspace;
use sandbox_sync::workspace::RenameOutcome;
use sandbox_sync::{
    AlertEvent, ConfigError, HttpStatusSource, OperationClass, OperationState, StatusPoller,
    SyncError, SyncOrchestrator, SyncReport, SyncServices, WorkspaceActions, WorkspaceStore,
};

#[derive(Parser)]
#[command(name = "sandbox-sync")]
#[command(author, version, about = "Sync sandbox workspaces with git, GitHub repositories and gists", long_about = None)]
struct Cli {
    /// Config file (default: <config dir>/sandbox-sync/config.json)
    #[arg(short, long, global = true, env = "SANDBOX_SYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List workspaces, most recently updated first
    List,
    /// Create an empty local workspace
    New { name: String },
    /// Clone a repository or gist into a new workspace
    Import {
        url: String,
        #[arg(short, long, default_value = "main")]
        branch: String,
        /// Workspace name (default: last segment of the URL)
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Commit all changes as a save point
    Save { workspace_id: String },
    /// Push to the git origin
    Push { workspace_id: String },
    /// Pull from the origin
    Pull { workspace_id: String },
    /// Push the workspace to a new branch on its origin
    PushBranch { workspace_id: String, branch: String },
    /// Gist operations
    Gist {
        #[command(subcommand)]
        command: GistCommands,
    },
    /// Repository operations
    Repo {
        #[command(subcommand)]
        command: RepoCommands,
    },
    /// Accept the recovery offered after a failed operation
    Recover {
        workspace_id: String,
        #[arg(value_enum)]
        class: ClassArg,
    },
    Rename { workspace_id: String, name: String },
    Delete { workspace_id: String },
    /// Show origin and available sync actions
    Status { workspace_id: String },
    /// Deployment status of workspaces
    Deployments {
        #[command(subcommand)]
        command: DeploymentCommands,
    },
}

#[derive(Subcommand)]
enum DeploymentCommands {
    /// Show the status of every linked deployment
    List {
        /// Keep polling until interrupted
        #[arg(long)]
        watch: bool,
    },
    /// Link a workspace to a deployment resource (empty name unlinks)
    Link {
        workspace_id: String,
        resource_name: String,
    },
}

#[derive(Subcommand)]
enum GistCommands {
    /// Create a gist from a local workspace
    Create { workspace_id: String },
    /// Push local changes to the workspace's gist
    Update {
        workspace_id: String,
        /// Overwrite the gist if the update is rejected
        #[arg(long)]
        force: bool,
    },
    /// Fork someone else's gist and open the fork
    Fork { workspace_id: String },
}

#[derive(Subcommand)]
enum RepoCommands {
    /// Create a GitHub repository from a local workspace
    Create {
        workspace_id: String,
        name: String,
        #[arg(long)]
        private: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ClassArg {
    Push,
    Pull,
    Gist,
    Repository,
}

impl From<ClassArg> for OperationClass {
    fn from(arg: ClassArg) -> Self {
        match arg {
            ClassArg::Push => OperationClass::Push,
            ClassArg::Pull => OperationClass::Pull,
            ClassArg::Gist => OperationClass::Gist,
            ClassArg::Repository => OperationClass::Repository,
        }
    }
}

fn init_logging(verbose: u8, json: bool) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let result = if json {
        tracing::subscriber::set_global_default(
            Registry::default()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr)),
        )
    } else {
        tracing::subscriber::set_global_default(
            Registry::default()
                .with(filter)
                .with(fmt::layer().with_target(false).with_writer(std::io::stderr)),
        )
    };
    if let Err(e) = result {
        eprintln!("Failed to install tracing subscriber: {}", e);
    }

    // Library modules log through the `log` facade.
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("Failed to bridge log records: {}", e);
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_logs);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), SyncError> {
    let config = load_config_or_default(cli.config.as_deref())?;
    let auth = config.auth_info()?;
    let polling = config.polling.clone();
    let services = SyncServices::from_config(config.clone())?;

    let actions = WorkspaceActions::new(
        Arc::clone(&services.workspaces),
        Arc::clone(&services.git),
        Arc::clone(&services.navigator),
        config,
    );
    let mut alerts = services.alerts.subscribe();
    let orchestrator = SyncOrchestrator::new(services, auth.clone());

    let result = dispatch(cli.command, &orchestrator, &actions, &polling, auth.as_ref()).await;
    print_alerts(&mut alerts);
    result
}

async fn dispatch(
    command: Commands,
    orchestrator: &SyncOrchestrator,
    actions: &WorkspaceActions,
    polling: &PollingConfig,
    auth: Option<&sandbox_sync::AuthInfo>,
) -> Result<(), SyncError> {
    match command {
        Commands::List => {
            for w in actions.store().list()? {
                println!(
                    "{}  {:<30}  {:<12}  {}",
                    w.workspace_id,
                    w.name,
                    w.origin.kind().to_string(),
                    w.origin.url().unwrap_or("-")
                );
            }
        }
        Commands::New { name } => {
            let w = actions.create_local(&name).await?;
            println!("{}", w.workspace_id);
        }
        Commands::Import { url, branch, name } => {
            let name = name.unwrap_or_else(|| default_name(&url));
            let w = actions.import(&name, &url, &branch, auth).await?;
            println!("{}", w.workspace_id);
        }
        Commands::Save { workspace_id } => {
            let result = orchestrator.create_save_point(&workspace_id).await?;
            match result.commit_hash {
                Some(hash) => println!("Saved {}", hash),
                None => println!("{}", result.message),
            }
        }
        Commands::Push { workspace_id } => {
            let outcome = orchestrator.push(&workspace_id).await;
            offer_recovery(orchestrator, &workspace_id, OperationClass::Push);
            report(outcome?);
        }
        Commands::Pull { workspace_id } => {
            let outcome = orchestrator.pull(&workspace_id, true).await;
            offer_recovery(orchestrator, &workspace_id, OperationClass::Pull);
            report(outcome?);
        }
        Commands::PushBranch {
            workspace_id,
            branch,
        } => {
            report(orchestrator.push_new_branch(&workspace_id, &branch).await?);
        }
        Commands::Gist { command } => match command {
            GistCommands::Create { workspace_id } => {
                let outcome = orchestrator.create_gist(&workspace_id).await;
                offer_recovery(orchestrator, &workspace_id, OperationClass::Gist);
                report(outcome?);
            }
            GistCommands::Update {
                workspace_id,
                force,
            } => match orchestrator.update_gist(&workspace_id).await {
                Ok(r) => report(r),
                Err(SyncError::PushRejected { .. }) if force => {
                    report(orchestrator.force_update_gist(&workspace_id).await?);
                }
                Err(e) => {
                    offer_recovery(orchestrator, &workspace_id, OperationClass::Gist);
                    return Err(e);
                }
            },
            GistCommands::Fork { workspace_id } => {
                report(orchestrator.fork_gist(&workspace_id).await?);
            }
        },
        Commands::Repo { command } => match command {
            RepoCommands::Create {
                workspace_id,
                name,
                private,
            } => {
                let outcome = orchestrator
                    .create_repository(&workspace_id, &name, private)
                    .await;
                offer_recovery(orchestrator, &workspace_id, OperationClass::Repository);
                report(outcome?);
            }
        },
        Commands::Recover {
            workspace_id,
            class,
        } => {
            let class = class.into();
            match orchestrator.apply_recovery(&workspace_id, class).await {
                Ok(Some(r)) => report(r),
                Ok(None) => println!("Nothing to do"),
                Err(e) => {
                    offer_recovery(orchestrator, &workspace_id, class);
                    return Err(e);
                }
            }
        }
        Commands::Rename { workspace_id, name } => {
            match actions.rename(&workspace_id, &name).await? {
                RenameOutcome::Renamed(name) => println!("Renamed to '{}'", name),
                RenameOutcome::Unchanged => println!("Name unchanged"),
                RenameOutcome::Reset(name) => println!("Name cannot be empty; keeping '{}'", name),
            }
        }
        Commands::Delete { workspace_id } => {
            let home = actions.delete(&workspace_id).await?;
            println!("Deleted {}; now at {}", workspace_id, home);
        }
        Commands::Status { workspace_id } => {
            let w = actions.store().get(&workspace_id)?;
            let caps = orchestrator.capabilities(&workspace_id).await?;
            println!("{} ({})", w.name, w.origin.kind());
            if let (Some(url), Some(branch)) = (w.origin.url(), w.origin.branch()) {
                println!("  {} [{}]", url, branch);
            }
            println!(
                "{}",
                serde_json::to_string_pretty(&caps).unwrap_or_else(|_| format!("{:?}", caps))
            );
        }
        Commands::Deployments { command } => {
            deployments(command, actions, polling).await?;
        }
    }
    Ok(())
}

async fn deployments(
    command: DeploymentCommands,
    actions: &WorkspaceActions,
    polling: &PollingConfig,
) -> Result<(), SyncError> {
    let watch = match command {
        DeploymentCommands::Link {
            workspace_id,
            resource_name,
        } => {
            let w = actions.link_deployment(&workspace_id, &resource_name)?;
            match w.deployment_resource_name {
                Some(name) => println!("{} linked to '{}'", w.workspace_id, name),
                None => println!("{} unlinked", w.workspace_id),
            }
            return Ok(());
        }
        DeploymentCommands::List { watch } => watch,
    };

    let url = polling
        .deployment_status_url
        .as_deref()
        .ok_or_else(|| ConfigError::Validation {
            message: "polling.deployment_status_url is not set".to_string(),
        })?;
    let source = HttpStatusSource::new(url)?;
    let mut poller = StatusPoller::start(Arc::new(source), polling.interval());
    let mut snapshots = poller.subscribe();
    poller.trigger();

    loop {
        let snapshot = tokio::select! {
            received = snapshots.recv() => match received {
                Ok(snapshot) => snapshot,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        };

        if let Some(error) = &snapshot.error {
            eprintln!("Status unavailable: {}", error);
        }
        let workspaces = actions.store().list()?;
        let statuses = statuses_by_workspace(&workspaces, &snapshot.statuses);
        println!("Deployments at {}", snapshot.fetched_at.format("%H:%M:%S"));
        for w in workspaces.iter().filter(|w| w.deployment_resource_name.is_some()) {
            match statuses.get(&w.workspace_id) {
                Some(status) => println!(
                    "  {}  {:<30}  {:<10}  {}",
                    w.workspace_id,
                    w.name,
                    format!("{:?}", status.state),
                    status.url.as_deref().unwrap_or("-")
                ),
                None => println!("  {}  {:<30}  not reported", w.workspace_id, w.name),
            }
        }

        if !watch {
            break;
        }
    }

    poller.stop();
    Ok(())
}

fn report(report: SyncReport) {
    println!("Done: {}", report.operation.describe());
    if let Some(hash) = report.save_point {
        println!("  save point {}", hash);
    }
    if let Some(location) = report.redirect {
        println!("  open {}", location);
    }
}

fn offer_recovery(orchestrator: &SyncOrchestrator, workspace_id: &str, class: OperationClass) {
    if let OperationState::Failed {
        recovery,
        fallback_branch,
        ..
    } = orchestrator.state(workspace_id, class)
    {
        eprintln!(
            "Suggested: {} (run `sandbox-sync recover {} {}`)",
            recovery.label(),
            workspace_id,
            class
        );
        if let Some(branch) = fallback_branch {
            eprintln!(
                "  or save to a new branch: `sandbox-sync push-branch {} {}`",
                workspace_id, branch
            );
        }
    }
}

fn print_alerts(rx: &mut broadcast::Receiver<AlertEvent>) {
    while let Ok(event) = rx.try_recv() {
        if let AlertEvent::Shown(alert) = event {
            match alert.body {
                Some(body) => eprintln!("[{}] {} {}", alert.class, alert.title, body),
                None => eprintln!("[{}] {}", alert.class, alert.title),
            }
        }
    }
}

fn default_name(url: &str) -> String {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .map(|s| s.trim_end_matches(".git").to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "Imported workspace".to_string())
}
