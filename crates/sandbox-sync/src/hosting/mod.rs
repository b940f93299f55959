//! Hosting provider API (gists and repositories).

pub mod error;
pub mod github;
pub mod types;

use async_trait::async_trait;

use crate::auth::AuthInfo;

pub use error::HostingError;
pub use github::GitHubClient;
pub use types::{
    Account, CreateGistRequest, CreateRepositoryRequest, Gist, Owner, Repository,
    PLACEHOLDER_README,
};

/// The hosting calls the sync workflow needs. Each result carries the URL the
/// git layer pushes to.
#[async_trait]
pub trait HostingApi: Send + Sync {
    async fn create_gist(&self, auth: &AuthInfo, request: &CreateGistRequest) -> error::Result<Gist>;

    async fn fork_gist(&self, auth: &AuthInfo, gist_id: &str) -> error::Result<Gist>;

    async fn get_gist(&self, auth: Option<&AuthInfo>, gist_id: &str) -> error::Result<Gist>;

    async fn create_repository(
        &self,
        auth: &AuthInfo,
        request: &CreateRepositoryRequest,
    ) -> error::Result<Repository>;

    async fn current_account(&self, auth: &AuthInfo) -> error::Result<Account>;
}
