use serde::Serialize;

use crate::auth::AuthInfo;
use crate::hosting::Account;
use crate::workspace::WorkspaceOrigin;

pub const GIST_SCOPE: &str = "gist";
pub const REPO_SCOPE: &str = "repo";

/// Which sync actions a workspace/account combination may offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncCapabilities {
    pub can_push: bool,
    pub can_create_repository: bool,
    pub can_create_gist: bool,
    pub can_update_gist: bool,
    pub can_fork_gist: bool,
}

impl SyncCapabilities {
    /// `account` is the signed-in user as reported by the hosting API (its
    /// scopes gate gist and repository actions). `gist_owner` is the login
    /// owning the workspace's gist, when the origin is one.
    pub fn evaluate(
        origin: &WorkspaceOrigin,
        auth: Option<&AuthInfo>,
        account: Option<&Account>,
        gist_owner: Option<&str>,
        has_nested_directories: bool,
    ) -> Self {
        let signed_in = auth.is_some() && account.is_some();
        let scoped = |scope: &str| signed_in && account.is_some_and(|a| a.has_scope(scope));
        let is_owner = match (account, gist_owner) {
            (Some(account), Some(owner)) => account.login == owner,
            _ => false,
        };
        let flat = !has_nested_directories;

        let (local, gist) = match origin {
            WorkspaceOrigin::Local => (true, false),
            WorkspaceOrigin::Git { .. } => (false, false),
            WorkspaceOrigin::GithubGist { .. } => (false, true),
        };

        Self {
            can_push: auth.is_some(),
            can_create_repository: scoped(REPO_SCOPE) && local,
            can_create_gist: scoped(GIST_SCOPE) && local && flat,
            can_update_gist: scoped(GIST_SCOPE) && gist && is_owner && flat,
            can_fork_gist: scoped(GIST_SCOPE) && gist && !is_owner && flat,
        }
    }
}
