use std::path::PathBuf;
use thiserror::Error;

use crate::git::GitError;
use crate::hosting::HostingError;
use crate::poll::PollError;
use crate::secrets::SecretError;
use crate::sync::OperationClass;
use crate::workspace::{WorkspaceError, WorkspaceKind};

/// Errors surfaced by sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("A GitHub token is required to {0}; configure one first")]
    AuthMissing(String),

    #[error("Push to '{remote}/{branch}' was rejected: {message}")]
    PushRejected {
        remote: String,
        branch: String,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Gist creation failed: {0}")]
    GistCreateFailed(String),

    #[error("Operation cancelled: workspace '{0}' went away while syncing")]
    Cancelled(String),

    #[error("{operation} is not available for {kind} workspaces")]
    OriginMismatch {
        operation: String,
        kind: WorkspaceKind,
    },

    #[error("A {0} operation is already in progress")]
    OperationInProgress(OperationClass),

    #[error("Force push was not offered for {0}; it is only available after a rejected push")]
    ForceNotOffered(OperationClass),

    #[error("Could not determine the gist id from '{0}'")]
    UnknownGist(String),

    #[error(transparent)]
    Git(GitError),

    #[error(transparent)]
    Hosting(#[from] HostingError),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Secret(#[from] SecretError),

    #[error(transparent)]
    Poll(#[from] PollError),
}

/// Coarse failure classification consumed by recovery decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    AuthMissing,
    PushRejected,
    Network,
    GistCreateFailed,
    Cancelled,
    Other,
}

impl SyncError {
    /// Maps a push failure onto the sync taxonomy, keeping the target for display.
    pub fn from_push(err: GitError, remote: &str, branch: &str) -> Self {
        match err {
            GitError::PushRejected(message) => SyncError::PushRejected {
                remote: remote.to_string(),
                branch: branch.to_string(),
                message,
            },
            other => SyncError::from(other),
        }
    }

    pub fn failure_kind(&self) -> FailureKind {
        match self {
            SyncError::AuthMissing(_) => FailureKind::AuthMissing,
            SyncError::PushRejected { .. } => FailureKind::PushRejected,
            SyncError::Network(_) => FailureKind::Network,
            SyncError::GistCreateFailed(_) => FailureKind::GistCreateFailed,
            SyncError::Cancelled(_) => FailureKind::Cancelled,
            SyncError::Hosting(HostingError::MissingPushUrl) => FailureKind::GistCreateFailed,
            SyncError::Hosting(HostingError::Http(_)) => FailureKind::Network,
            _ => FailureKind::Other,
        }
    }
}

impl From<GitError> for SyncError {
    fn from(err: GitError) -> Self {
        match err {
            GitError::Network(message) => SyncError::Network(message),
            GitError::PushRejected(message) => SyncError::PushRejected {
                remote: String::new(),
                branch: String::new(),
                message,
            },
            other => SyncError::Git(other),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_rejection_keeps_target() {
        let err = SyncError::from_push(
            GitError::PushRejected("! [rejected] main -> main (fetch first)".to_string()),
            "origin",
            "main",
        );
        assert_eq!(err.failure_kind(), FailureKind::PushRejected);
        assert!(err.to_string().contains("'origin/main'"));
    }

    #[test]
    fn test_network_error_classification() {
        let err = SyncError::from(GitError::Network("Could not resolve host".to_string()));
        assert_eq!(err.failure_kind(), FailureKind::Network);
    }

    #[test]
    fn test_missing_push_url_is_gist_create_failure() {
        let err = SyncError::from(HostingError::MissingPushUrl);
        assert_eq!(err.failure_kind(), FailureKind::GistCreateFailed);
    }

    #[test]
    fn test_other_git_errors_are_wrapped() {
        let err = SyncError::from(GitError::Operation("boom".to_string()));
        assert!(matches!(err, SyncError::Git(_)));
        assert_eq!(err.failure_kind(), FailureKind::Other);
    }
}
