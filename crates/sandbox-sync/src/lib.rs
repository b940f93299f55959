pub mod alerts;
pub mod auth;
pub mod config;
pub mod error;
pub mod git;
pub mod hosting;
pub mod navigation;
pub mod poll;
pub mod sanitize;
pub mod secrets;
pub mod sync;
pub mod workspace;

pub use alerts::{Alert, AlertController, AlertEvent};
pub use auth::{AuthInfo, GitIdentity};
pub use config::{load_config, SyncConfig};
pub use error::{ConfigError, Result, SyncError};
pub use git::{CliGit, GitError, GitService};
pub use hosting::{GitHubClient, HostingApi, HostingError};
pub use navigation::{Location, Navigator};
pub use poll::{HttpStatusSource, PollError, StatusPoller, StatusSource};
pub use secrets::{resolve_secret, resolve_secret_optional, SecretError};
pub use sync::{
    FailureRecord, OperationClass, OperationState, RecoveryAction, SyncCapabilities, SyncOperation,
    SyncOrchestrator, SyncReport, SyncServices,
};
pub use workspace::{
    FileWorkspaceStore, WorkspaceActions, WorkspaceDescriptor, WorkspaceError, WorkspaceKind,
    WorkspaceOrigin, WorkspaceStore,
};
