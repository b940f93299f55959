//! Argument and result types for git plumbing calls.

use serde::{Deserialize, Serialize};

use crate::auth::GitIdentity;

/// `git push <remote> <local_ref>:<remote_ref>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushArgs {
    pub remote: String,
    pub local_ref: String,
    pub remote_ref: String,
    pub force: bool,
}

impl PushArgs {
    /// Pushes `branch` to `refs/heads/<branch>` on `remote`.
    pub fn branch(remote: &str, branch: &str, force: bool) -> Self {
        Self {
            remote: remote.to_string(),
            local_ref: branch.to_string(),
            remote_ref: format!("refs/heads/{}", branch),
            force,
        }
    }

    pub fn refspec(&self) -> String {
        format!("{}:{}", self.local_ref, self.remote_ref)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullArgs {
    pub remote: String,
    pub branch: String,
    /// Author of a merge commit, if one is needed.
    pub author: GitIdentity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchArgs {
    pub name: String,
    pub checkout: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddRemoteArgs {
    pub name: String,
    pub url: String,
    /// Overwrite the URL of an existing remote with the same name.
    pub force: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullResult {
    pub message: String,
    pub files_changed: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitResult {
    pub message: String,
    /// `None` when there was nothing to commit.
    pub commit_hash: Option<String>,
}

impl CommitResult {
    pub fn nothing_to_commit() -> Self {
        Self {
            message: "Nothing to commit".to_string(),
            commit_hash: None,
        }
    }

    pub fn committed(&self) -> bool {
        self.commit_hash.is_some()
    }
}
