//! What to offer the user after a failed sync operation.
//!
//! Decisions are pure: [`recovery_for`] maps a [`FailureContext`] to a
//! [`RecoveryAction`] and never touches git, the network or alerts. The
//! orchestrator turns the chosen action back into a [`SyncOperation`] when
//! the user accepts it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::operation::SyncOperation;
use crate::error::FailureKind;
use crate::workspace::WorkspaceOrigin;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecoveryAction {
    /// Run the same operation again.
    Retry,
    /// Integrate the remote changes that caused a rejection.
    Pull { remote: String, branch: String },
    /// Push to the origin a failed repository creation already attached.
    Push { remote: String, branch: String },
    /// Keep local work by pushing it to a fresh branch.
    PushNewBranch { branch: String },
    /// Overwrite the gist with local history.
    ForcePushGist,
    ConfigureCredential,
    Dismiss,
}

impl RecoveryAction {
    /// The operation that accepting this action starts, if any.
    pub fn next_operation(&self, failed: &SyncOperation) -> Option<SyncOperation> {
        match self {
            RecoveryAction::Retry => Some(failed.clone()),
            RecoveryAction::Pull { remote, branch } => Some(SyncOperation::Pull {
                remote: remote.clone(),
                branch: branch.clone(),
            }),
            RecoveryAction::Push { remote, branch } => Some(SyncOperation::Push {
                remote: remote.clone(),
                branch: branch.clone(),
                force: false,
            }),
            RecoveryAction::PushNewBranch { branch } => Some(SyncOperation::PushNewBranch {
                branch: branch.clone(),
            }),
            RecoveryAction::ForcePushGist => Some(SyncOperation::UpdateGist { force: true }),
            RecoveryAction::ConfigureCredential | RecoveryAction::Dismiss => None,
        }
    }

    pub fn label(&self) -> String {
        match self {
            RecoveryAction::Retry => "Retry".to_string(),
            RecoveryAction::Pull { .. } => "Pull".to_string(),
            RecoveryAction::Push { remote, branch } => format!("Push to '{}/{}'", remote, branch),
            RecoveryAction::PushNewBranch { branch } => format!("Switch to '{}'", branch),
            RecoveryAction::ForcePushGist => "Force push".to_string(),
            RecoveryAction::ConfigureCredential => "Configure GitHub token".to_string(),
            RecoveryAction::Dismiss => "Dismiss".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FailureContext<'a> {
    pub operation: &'a SyncOperation,
    pub kind: FailureKind,
    pub authenticated: bool,
    /// Origin as stored after the failure. Creating a gist or a repository
    /// rewrites it before the first push.
    pub origin: &'a WorkspaceOrigin,
    /// Remote the stored origin syncs through.
    pub remote: &'a str,
    /// Branch offered when a pull fails; see [`fallback_branch_name`].
    pub fallback_branch: Option<String>,
}

pub fn recovery_for(ctx: &FailureContext<'_>) -> RecoveryAction {
    if ctx.kind == FailureKind::AuthMissing {
        return RecoveryAction::ConfigureCredential;
    }

    match (ctx.operation, ctx.kind) {
        (SyncOperation::Push { remote, branch, .. }, FailureKind::PushRejected) => {
            RecoveryAction::Pull {
                remote: remote.clone(),
                branch: branch.clone(),
            }
        }
        (SyncOperation::Pull { .. }, _) if !ctx.authenticated => {
            RecoveryAction::ConfigureCredential
        }
        // Gists have a single branch.
        (SyncOperation::Pull { .. }, _) if matches!(ctx.origin, WorkspaceOrigin::GithubGist { .. }) => {
            RecoveryAction::ForcePushGist
        }
        (SyncOperation::Pull { branch, .. }, _) => RecoveryAction::PushNewBranch {
            branch: ctx
                .fallback_branch
                .clone()
                .unwrap_or_else(|| fallback_branch_name(branch)),
        },
        (SyncOperation::UpdateGist { force: false }, FailureKind::PushRejected) => {
            RecoveryAction::ForcePushGist
        }
        // Creation rewrites the origin before its first push. Past that point
        // only the push is left to do.
        (SyncOperation::CreateGist, FailureKind::Network) => match ctx.origin {
            WorkspaceOrigin::Local => RecoveryAction::Retry,
            WorkspaceOrigin::GithubGist { .. } => RecoveryAction::ForcePushGist,
            WorkspaceOrigin::Git { .. } => RecoveryAction::Dismiss,
        },
        (SyncOperation::CreateRepository { .. }, FailureKind::Network) => match ctx.origin {
            WorkspaceOrigin::Local => RecoveryAction::Retry,
            WorkspaceOrigin::Git { branch, .. } => RecoveryAction::Push {
                remote: ctx.remote.to_string(),
                branch: branch.clone(),
            },
            WorkspaceOrigin::GithubGist { .. } => RecoveryAction::Dismiss,
        },
        (_, FailureKind::Network) => RecoveryAction::Retry,
        _ => RecoveryAction::Dismiss,
    }
}

/// `<branch>-<7 lowercase hex chars>`; never equal to `branch`.
pub fn fallback_branch_name(branch: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", branch, &suffix[..7])
}
