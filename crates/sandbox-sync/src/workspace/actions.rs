//! User-level workspace actions: create, import, rename, delete and
//! deployment linking.

use std::sync::Arc;

use crate::auth::AuthInfo;
use crate::config::SyncConfig;
use crate::error::Result;
use crate::git::GitService;
use crate::navigation::{routes, Location, Navigator};

use super::descriptor::WorkspaceDescriptor;
use super::origin::WorkspaceOrigin;
use super::store::WorkspaceStore;

/// What a rename did, and what the edit field should show afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameOutcome {
    Renamed(String),
    Unchanged,
    /// Blank input: nothing stored, the field goes back to the stored name.
    Reset(String),
}

impl RenameOutcome {
    /// Text the name field should display.
    pub fn display_name<'a>(&'a self, stored: &'a str) -> &'a str {
        match self {
            RenameOutcome::Renamed(name) | RenameOutcome::Reset(name) => name,
            RenameOutcome::Unchanged => stored,
        }
    }
}

pub struct WorkspaceActions {
    store: Arc<dyn WorkspaceStore>,
    git: Arc<dyn GitService>,
    navigator: Arc<Navigator>,
    config: SyncConfig,
}

impl WorkspaceActions {
    pub fn new(
        store: Arc<dyn WorkspaceStore>,
        git: Arc<dyn GitService>,
        navigator: Arc<Navigator>,
        config: SyncConfig,
    ) -> Self {
        Self {
            store,
            git,
            navigator,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn WorkspaceStore> {
        &self.store
    }

    /// New LOCAL workspace with an empty repository on the default branch.
    pub async fn create_local(&self, name: &str) -> Result<WorkspaceDescriptor> {
        let descriptor = self.store.create(name.trim(), WorkspaceOrigin::Local)?;
        let dir = self.store.workspace_dir(&descriptor.workspace_id);

        if let Err(e) = self.git.init(&dir, &self.config.git.gist_default_branch).await {
            self.discard(&descriptor.workspace_id);
            return Err(e.into());
        }
        Ok(descriptor)
    }

    /// Clones `url` into a new workspace. Gist hosts produce a gist origin.
    pub async fn import(
        &self,
        name: &str,
        url: &str,
        branch: &str,
        auth: Option<&AuthInfo>,
    ) -> Result<WorkspaceDescriptor> {
        let origin = WorkspaceOrigin::for_import(url, branch)?;
        let descriptor = self.store.create(name.trim(), origin)?;
        let dir = self.store.workspace_dir(&descriptor.workspace_id);

        if let Err(e) = self.git.clone_repository(&dir, url, branch, auth).await {
            self.discard(&descriptor.workspace_id);
            return Err(e.into());
        }
        Ok(descriptor)
    }

    pub async fn rename(&self, workspace_id: &str, new_name: &str) -> Result<RenameOutcome> {
        let descriptor = self.store.get(workspace_id)?;
        let trimmed = new_name.trim();

        if trimmed.is_empty() {
            return Ok(RenameOutcome::Reset(descriptor.name));
        }
        if trimmed == descriptor.name {
            return Ok(RenameOutcome::Unchanged);
        }

        let renamed = self.store.rename(workspace_id, trimmed)?;
        log::info!("Renamed workspace {} to '{}'", workspace_id, renamed.name);
        Ok(RenameOutcome::Renamed(renamed.name))
    }

    /// Associates the workspace with a deployment resource whose status the
    /// poller reports. A blank name clears the association.
    pub fn link_deployment(&self, workspace_id: &str, resource_name: &str) -> Result<WorkspaceDescriptor> {
        let mut descriptor = self.store.get(workspace_id)?;
        let trimmed = resource_name.trim();
        descriptor.deployment_resource_name = (!trimmed.is_empty()).then(|| trimmed.to_string());
        descriptor.touch();
        self.store.save(&descriptor)?;
        Ok(descriptor)
    }

    /// Removes the workspace and navigates home, ignoring any unsaved-changes blocker.
    pub async fn delete(&self, workspace_id: &str) -> Result<Location> {
        self.store.delete(workspace_id)?;
        Ok(self.navigator.replace_bypassing(routes::home()))
    }

    fn discard(&self, workspace_id: &str) {
        if let Err(e) = self.store.delete(workspace_id) {
            log::warn!("Failed to discard workspace {}: {}", workspace_id, e);
        }
    }
}
