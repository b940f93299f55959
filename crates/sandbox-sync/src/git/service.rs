use std::path::Path;

use async_trait::async_trait;

use super::error::Result;
use super::types::{AddRemoteArgs, BranchArgs, CommitResult, PullArgs, PullResult, PushArgs};
use crate::auth::{AuthInfo, GitIdentity};

/// Git plumbing the sync workflow drives. `dir` is always a workspace's
/// working tree.
#[async_trait]
pub trait GitService: Send + Sync {
    /// Creates an empty repository whose unborn HEAD points at `branch`.
    async fn init(&self, dir: &Path, branch: &str) -> Result<()>;

    async fn clone_repository(
        &self,
        dir: &Path,
        url: &str,
        branch: &str,
        auth: Option<&AuthInfo>,
    ) -> Result<()>;

    /// Stages everything and commits. A clean tree is not an error.
    async fn commit(&self, dir: &Path, message: &str, author: &GitIdentity) -> Result<CommitResult>;

    async fn push(&self, dir: &Path, args: &PushArgs, auth: &AuthInfo) -> Result<()>;

    /// Fetch and merge. A failed merge leaves the tree as it was.
    async fn pull(&self, dir: &Path, args: &PullArgs, auth: Option<&AuthInfo>) -> Result<PullResult>;

    async fn branch(&self, dir: &Path, args: &BranchArgs) -> Result<()>;

    async fn add_remote(&self, dir: &Path, args: &AddRemoteArgs) -> Result<()>;

    async fn remote_url(&self, dir: &Path, name: &str) -> Result<Option<String>>;
}
