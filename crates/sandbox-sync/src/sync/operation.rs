use serde::{Deserialize, Serialize};

use super::recovery::RecoveryAction;
use crate::navigation::Location;

/// Alert and state-table key. Operations of one class share a single alert slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationClass {
    Push,
    Pull,
    Gist,
    Repository,
    Navigation,
}

impl std::fmt::Display for OperationClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OperationClass::Push => "push",
            OperationClass::Pull => "pull",
            OperationClass::Gist => "gist",
            OperationClass::Repository => "repository",
            OperationClass::Navigation => "navigation",
        };
        f.write_str(name)
    }
}

/// A sync request, complete enough to be retried verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncOperation {
    Push {
        remote: String,
        branch: String,
        force: bool,
    },
    Pull {
        remote: String,
        branch: String,
    },
    PushNewBranch {
        branch: String,
    },
    CreateGist,
    UpdateGist {
        force: bool,
    },
    ForkGist {
        gist_id: String,
    },
    CreateRepository {
        name: String,
        private: bool,
    },
}

impl SyncOperation {
    pub fn class(&self) -> OperationClass {
        match self {
            SyncOperation::Push { .. } | SyncOperation::PushNewBranch { .. } => {
                OperationClass::Push
            }
            SyncOperation::Pull { .. } => OperationClass::Pull,
            SyncOperation::CreateGist
            | SyncOperation::UpdateGist { .. }
            | SyncOperation::ForkGist { .. } => OperationClass::Gist,
            SyncOperation::CreateRepository { .. } => OperationClass::Repository,
        }
    }

    /// Everything but pull needs credentials; public remotes can be pulled anonymously.
    pub fn requires_auth(&self) -> bool {
        !matches!(self, SyncOperation::Pull { .. })
    }

    pub fn is_forced(&self) -> bool {
        matches!(
            self,
            SyncOperation::Push { force: true, .. } | SyncOperation::UpdateGist { force: true }
        )
    }

    /// Short verb phrase for messages ("push", "update gist", ...).
    pub fn describe(&self) -> &'static str {
        match self {
            SyncOperation::Push { .. } => "push",
            SyncOperation::Pull { .. } => "pull",
            SyncOperation::PushNewBranch { .. } => "push to a new branch",
            SyncOperation::CreateGist => "create a gist",
            SyncOperation::UpdateGist { force: false } => "update the gist",
            SyncOperation::UpdateGist { force: true } => "force update the gist",
            SyncOperation::ForkGist { .. } => "fork the gist",
            SyncOperation::CreateRepository { .. } => "create a repository",
        }
    }
}

/// Per-class state: `Idle → InProgress → {Success, Failed}`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OperationState {
    #[default]
    Idle,
    InProgress(SyncOperation),
    Success(SyncOperation),
    /// `recovery` is what the user is offered next. Failed pulls also name
    /// the branch local work can move to, whether or not it is offered yet.
    Failed {
        operation: SyncOperation,
        message: String,
        recovery: RecoveryAction,
        fallback_branch: Option<String>,
    },
}

impl OperationState {
    pub fn is_in_progress(&self) -> bool {
        matches!(self, OperationState::InProgress(_))
    }

    pub fn failure(&self) -> Option<FailureRecord> {
        match self {
            OperationState::Failed {
                operation,
                message,
                recovery,
                fallback_branch,
            } => Some(FailureRecord {
                operation: operation.clone(),
                message: message.clone(),
                recovery: recovery.clone(),
                fallback_branch: fallback_branch.clone(),
            }),
            _ => None,
        }
    }
}

/// A failed operation and its pending recovery, kept with the workspace so
/// the recovery can be accepted from a later process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureRecord {
    pub operation: SyncOperation,
    pub message: String,
    pub recovery: RecoveryAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_branch: Option<String>,
}

impl FailureRecord {
    pub fn class(&self) -> OperationClass {
        self.operation.class()
    }
}

impl From<FailureRecord> for OperationState {
    fn from(record: FailureRecord) -> Self {
        OperationState::Failed {
            operation: record.operation,
            message: record.message,
            recovery: record.recovery,
            fallback_branch: record.fallback_branch,
        }
    }
}

/// Result of a successful operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub operation: SyncOperation,
    /// Hash of the save point, when one was committed.
    pub save_point: Option<String>,
    /// Where the caller should navigate next, e.g. the import route of a fork.
    pub redirect: Option<Location>,
}

impl SyncReport {
    pub fn new(operation: SyncOperation) -> Self {
        Self {
            operation,
            save_point: None,
            redirect: None,
        }
    }
}
