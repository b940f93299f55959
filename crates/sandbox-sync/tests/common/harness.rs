//! Isolated workspace store wired to recording fakes.

#![allow(dead_code)]

use std::sync::Arc;

use secrecy::SecretString;
use tempfile::TempDir;

use sandbox_sync::config::SyncConfig;
use sandbox_sync::navigation::Navigator;
use sandbox_sync::workspace::{FileWorkspaceStore, WorkspaceDescriptor, WorkspaceOrigin, WorkspaceStore};
use sandbox_sync::{AlertController, AuthInfo, SyncOrchestrator, SyncServices, WorkspaceActions};

use super::fakes::{FakeGit, FakeHosting};

pub const GIT_URL: &str = "https://github.com/octocat/sandbox.git";
pub const GIST_URL: &str = "https://gist.github.com/abc123.git";

pub struct TestHarness {
    temp_dir: TempDir,
    pub store: Arc<FileWorkspaceStore>,
    pub git: Arc<FakeGit>,
    pub hosting: Arc<FakeHosting>,
    pub alerts: AlertController,
    pub navigator: Arc<Navigator>,
    pub config: SyncConfig,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = Arc::new(FileWorkspaceStore::new(temp_dir.path()));
        let alerts = AlertController::default();
        let navigator = Arc::new(Navigator::default().with_alerts(alerts.clone()));
        let config = SyncConfig {
            workspaces_directory: Some(temp_dir.path().to_string_lossy().into_owned()),
            ..SyncConfig::default()
        };

        Self {
            temp_dir,
            store,
            git: FakeGit::new(),
            hosting: FakeHosting::new(),
            alerts,
            navigator,
            config,
        }
    }

    pub fn auth() -> AuthInfo {
        AuthInfo::new("octocat", SecretString::from("ghp_test".to_string()))
    }

    fn services(&self) -> SyncServices {
        SyncServices {
            git: self.git.clone(),
            hosting: self.hosting.clone(),
            workspaces: self.store.clone(),
            alerts: self.alerts.clone(),
            navigator: self.navigator.clone(),
            config: self.config.clone(),
        }
    }

    pub fn orchestrator(&self) -> SyncOrchestrator {
        SyncOrchestrator::new(self.services(), Some(Self::auth()))
    }

    pub fn anonymous_orchestrator(&self) -> SyncOrchestrator {
        SyncOrchestrator::new(self.services(), None)
    }

    pub fn actions(&self) -> WorkspaceActions {
        WorkspaceActions::new(
            self.store.clone(),
            self.git.clone(),
            self.navigator.clone(),
            self.config.clone(),
        )
    }

    pub fn local_workspace(&self, name: &str) -> WorkspaceDescriptor {
        self.store
            .create(name, WorkspaceOrigin::Local)
            .expect("Failed to create workspace")
    }

    pub fn git_workspace(&self, name: &str) -> WorkspaceDescriptor {
        self.store
            .create(name, WorkspaceOrigin::git(GIT_URL, "main").unwrap())
            .expect("Failed to create workspace")
    }

    pub fn gist_workspace(&self, name: &str) -> WorkspaceDescriptor {
        self.store
            .create(name, WorkspaceOrigin::gist(GIST_URL, "main").unwrap())
            .expect("Failed to create workspace")
    }

    pub fn reload(&self, workspace_id: &str) -> WorkspaceDescriptor {
        self.store.get(workspace_id).expect("Workspace should exist")
    }
}
