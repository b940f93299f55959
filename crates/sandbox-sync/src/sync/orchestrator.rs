//! Sequences save points, pushes, pulls and hosting calls per origin kind.
//!
//! Every operation goes through [`SyncOrchestrator::execute`], which
//! resolves the descriptor, rejects operations that do not fit the origin,
//! guards the per-class state table and turns failures into a recovery
//! offer. Each class moves `Idle → InProgress → {Success, Failed}`; a
//! `Failed` state carrying a recovery re-enters `InProgress` through
//! [`SyncOrchestrator::apply_recovery`]. Failures are also recorded in the
//! workspace store, so a later process can still accept the recovery.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{info_span, Instrument};

use super::capabilities::SyncCapabilities;
use super::operation::{FailureRecord, OperationClass, OperationState, SyncOperation, SyncReport};
use super::recovery::{fallback_branch_name, recovery_for, FailureContext, RecoveryAction};
use crate::alerts::{messages, AlertController};
use crate::auth::AuthInfo;
use crate::config::SyncConfig;
use crate::error::{FailureKind, Result, SyncError};
use crate::git::{AddRemoteArgs, BranchArgs, CliGit, CommitResult, GitService, PullArgs, PushArgs};
use crate::hosting::{CreateGistRequest, CreateRepositoryRequest, GitHubClient, HostingApi};
use crate::navigation::{routes, Navigator};
use crate::sanitize::{redact_repo_url, short_id};
use crate::workspace::{
    has_nested_directories, FileWorkspaceStore, WorkspaceDescriptor, WorkspaceError,
    WorkspaceOrigin, WorkspaceStore,
};

/// Collaborators of the orchestrator.
pub struct SyncServices {
    pub git: Arc<dyn GitService>,
    pub hosting: Arc<dyn HostingApi>,
    pub workspaces: Arc<dyn WorkspaceStore>,
    pub alerts: AlertController,
    pub navigator: Arc<Navigator>,
    pub config: SyncConfig,
}

impl SyncServices {
    /// The `git` executable, the configured GitHub API and on-disk workspaces.
    pub fn from_config(config: SyncConfig) -> Result<Self> {
        let alerts = AlertController::default();
        Ok(Self {
            git: Arc::new(CliGit::new()),
            hosting: Arc::new(GitHubClient::new(&config.github.api_url)?),
            workspaces: Arc::new(FileWorkspaceStore::new(config.workspaces_dir())),
            navigator: Arc::new(Navigator::default().with_alerts(alerts.clone())),
            alerts,
            config,
        })
    }
}

type StateKey = (String, OperationClass);

pub struct SyncOrchestrator {
    services: SyncServices,
    auth: Option<AuthInfo>,
    states: Mutex<HashMap<StateKey, OperationState>>,
}

/// Per-call switches that are not part of the operation itself.
#[derive(Debug, Clone, Copy)]
struct RunOptions {
    show_alerts: bool,
    /// Started by accepting an offered recovery, which may force.
    from_recovery: bool,
}

impl RunOptions {
    const INTERACTIVE: Self = Self {
        show_alerts: true,
        from_recovery: false,
    };
}

impl SyncOrchestrator {
    pub fn new(services: SyncServices, auth: Option<AuthInfo>) -> Self {
        Self {
            services,
            auth,
            states: Mutex::new(HashMap::new()),
        }
    }

    pub fn services(&self) -> &SyncServices {
        &self.services
    }

    pub fn alerts(&self) -> &AlertController {
        &self.services.alerts
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth.is_some()
    }

    fn lock_states(&self) -> MutexGuard<'_, HashMap<StateKey, OperationState>> {
        self.states
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Current state of `class`. Failures recorded by an earlier process are
    /// picked up from the workspace store.
    pub fn state(&self, workspace_id: &str, class: OperationClass) -> OperationState {
        let key = (workspace_id.to_string(), class);
        let mut states = self.lock_states();
        if let Some(state) = states.get(&key) {
            return state.clone();
        }

        let recorded = self
            .recorded_failures(workspace_id)
            .into_iter()
            .find(|record| record.class() == class);
        match recorded {
            Some(record) => {
                let state = OperationState::from(record);
                states.insert(key, state.clone());
                state
            }
            None => OperationState::Idle,
        }
    }

    fn set_state(&self, workspace_id: &str, class: OperationClass, state: OperationState) {
        let mut states = self.lock_states();
        if !state.is_in_progress() {
            self.record_failure(workspace_id, class, state.failure());
        }
        states.insert((workspace_id.to_string(), class), state);
    }

    fn recorded_failures(&self, workspace_id: &str) -> Vec<FailureRecord> {
        match self.services.workspaces.failures(workspace_id) {
            Ok(records) => records,
            Err(WorkspaceError::NotFound(_)) => Vec::new(),
            Err(e) => {
                log::warn!(
                    "Could not read recorded failures of workspace {}: {}",
                    short_id(workspace_id),
                    e
                );
                Vec::new()
            }
        }
    }

    /// Replaces the recorded failure of `class`; `None` clears it.
    fn record_failure(&self, workspace_id: &str, class: OperationClass, failure: Option<FailureRecord>) {
        let mut records = self.recorded_failures(workspace_id);
        let before = records.len();
        records.retain(|record| record.class() != class);
        if failure.is_none() && records.len() == before {
            return;
        }
        records.extend(failure);

        if let Err(e) = self.services.workspaces.save_failures(workspace_id, &records) {
            log::warn!(
                "Could not record {} failure of workspace {}: {}",
                class,
                short_id(workspace_id),
                e
            );
        }
    }

    // ---- Entry points -------------------------------------------------------

    /// Pushes the workspace branch to its git origin.
    pub async fn push(&self, workspace_id: &str) -> Result<SyncReport> {
        let descriptor = self.services.workspaces.get(workspace_id)?;
        let (remote, branch) = self.upstream(&descriptor);
        self.execute(
            workspace_id,
            SyncOperation::Push {
                remote,
                branch,
                force: false,
            },
        )
        .await
    }

    /// Pulls from the origin. With `show_alerts == false` nothing is shown,
    /// but the outcome and recovery are still recorded in the state table.
    pub async fn pull(&self, workspace_id: &str, show_alerts: bool) -> Result<SyncReport> {
        let descriptor = self.services.workspaces.get(workspace_id)?;
        let (remote, branch) = self.upstream(&descriptor);
        self.run_operation(
            workspace_id,
            SyncOperation::Pull { remote, branch },
            RunOptions {
                show_alerts,
                from_recovery: false,
            },
        )
        .await
    }

    pub async fn push_new_branch(&self, workspace_id: &str, branch: &str) -> Result<SyncReport> {
        self.execute(
            workspace_id,
            SyncOperation::PushNewBranch {
                branch: branch.to_string(),
            },
        )
        .await
    }

    pub async fn create_gist(&self, workspace_id: &str) -> Result<SyncReport> {
        self.execute(workspace_id, SyncOperation::CreateGist).await
    }

    pub async fn update_gist(&self, workspace_id: &str) -> Result<SyncReport> {
        self.execute(workspace_id, SyncOperation::UpdateGist { force: false })
            .await
    }

    /// Overwrites the gist with local history. Only accepted while a rejected
    /// update is offering it.
    pub async fn force_update_gist(&self, workspace_id: &str) -> Result<SyncReport> {
        self.execute(workspace_id, SyncOperation::UpdateGist { force: true })
            .await
    }

    /// Forks the workspace's gist; the gist id comes from the origin URL.
    pub async fn fork_gist(&self, workspace_id: &str) -> Result<SyncReport> {
        let descriptor = self.services.workspaces.get(workspace_id)?;
        let gist_id = match &descriptor.origin {
            WorkspaceOrigin::GithubGist { url, .. } => descriptor
                .origin
                .gist_id()
                .ok_or_else(|| SyncError::UnknownGist(redact_repo_url(url)))?,
            other => {
                return Err(SyncError::OriginMismatch {
                    operation: "fork the gist".to_string(),
                    kind: other.kind(),
                })
            }
        };
        self.execute(workspace_id, SyncOperation::ForkGist { gist_id })
            .await
    }

    pub async fn create_repository(
        &self,
        workspace_id: &str,
        name: &str,
        private: bool,
    ) -> Result<SyncReport> {
        self.execute(
            workspace_id,
            SyncOperation::CreateRepository {
                name: name.to_string(),
                private,
            },
        )
        .await
    }

    /// Commits all working-tree changes. A clean tree is a success.
    pub async fn create_save_point(&self, workspace_id: &str) -> Result<CommitResult> {
        self.services.workspaces.get(workspace_id)?;
        let dir = self.services.workspaces.workspace_dir(workspace_id);
        self.save_point(&dir).await
    }

    /// Runs `operation` with alerts.
    pub async fn execute(&self, workspace_id: &str, operation: SyncOperation) -> Result<SyncReport> {
        self.run_operation(workspace_id, operation, RunOptions::INTERACTIVE)
            .await
    }

    /// Accepts the recovery offered by the failed operation of `class`.
    ///
    /// Returns `Ok(None)` when the recovery starts nothing (dismiss,
    /// configure credential) or the class has not failed.
    pub async fn apply_recovery(
        &self,
        workspace_id: &str,
        class: OperationClass,
    ) -> Result<Option<SyncReport>> {
        let (failed, recovery) = match self.state(workspace_id, class) {
            OperationState::Failed {
                operation,
                recovery,
                ..
            } => (operation, recovery),
            _ => return Ok(None),
        };

        let Some(next) = recovery.next_operation(&failed) else {
            if recovery == RecoveryAction::Dismiss {
                self.dismiss(workspace_id, class);
            }
            return Ok(None);
        };

        log::info!(
            "Applying recovery '{}' after failed {}",
            recovery.label(),
            failed.describe()
        );
        if next.class() != class {
            self.dismiss(workspace_id, class);
        }
        let options = RunOptions {
            from_recovery: true,
            ..RunOptions::INTERACTIVE
        };
        self.run_operation(workspace_id, next, options).await.map(Some)
    }

    /// Closes the alert of `class` and forgets its outcome.
    pub fn dismiss(&self, workspace_id: &str, class: OperationClass) {
        self.services.alerts.close(class);
        self.set_state(workspace_id, class, OperationState::Idle);
    }

    /// What this workspace may offer, given the signed-in account.
    pub async fn capabilities(&self, workspace_id: &str) -> Result<SyncCapabilities> {
        let descriptor = self.services.workspaces.get(workspace_id)?;
        let files = self.services.workspaces.files(workspace_id)?;

        let account = match &self.auth {
            Some(auth) => match self.services.hosting.current_account(auth).await {
                Ok(account) => Some(account),
                Err(e) => {
                    log::warn!("Could not read the signed-in account: {}", e);
                    None
                }
            },
            None => None,
        };

        let gist_owner = match descriptor.origin.gist_id() {
            Some(gist_id) => match self.services.hosting.get_gist(self.auth.as_ref(), &gist_id).await {
                Ok(gist) => gist.owner_login().map(str::to_string),
                Err(e) => {
                    log::warn!("Could not read gist {}: {}", gist_id, e);
                    None
                }
            },
            None => None,
        };

        Ok(SyncCapabilities::evaluate(
            &descriptor.origin,
            self.auth.as_ref(),
            account.as_ref(),
            gist_owner.as_deref(),
            has_nested_directories(&files),
        ))
    }

    // ---- State machine ------------------------------------------------------

    async fn run_operation(
        &self,
        workspace_id: &str,
        operation: SyncOperation,
        options: RunOptions,
    ) -> Result<SyncReport> {
        let class = operation.class();
        let descriptor = self.services.workspaces.get(workspace_id)?;

        check_origin(&descriptor.origin, &operation)?;
        if operation.is_forced() && !options.from_recovery {
            self.check_force_offered(workspace_id, &operation)?;
        }
        self.begin(workspace_id, &operation)?;

        if options.show_alerts {
            self.services.alerts.close(class);
        }

        let span = info_span!(
            "sync_operation",
            workspace = %short_id(workspace_id),
            operation = operation.describe(),
            origin = %descriptor.origin.kind(),
            url = %descriptor.origin.url().map(redact_repo_url).unwrap_or_default(),
        );

        let result = async {
            let auth = match self.auth.as_ref() {
                None if operation.requires_auth() => {
                    return Err(SyncError::AuthMissing(operation.describe().to_string()))
                }
                auth => auth,
            };
            self.run_flow(&descriptor, &operation, auth, options).await
        }
        .instrument(span)
        .await;

        match result {
            Ok(report) => {
                log::info!(
                    "{} finished for workspace {}",
                    operation.describe(),
                    short_id(workspace_id)
                );
                self.set_state(workspace_id, class, OperationState::Success(operation));
                Ok(report)
            }
            Err(err) => Err(self.fail(&descriptor, operation, err, options)),
        }
    }

    fn begin(&self, workspace_id: &str, operation: &SyncOperation) -> Result<()> {
        let class = operation.class();
        let mut states = self.lock_states();
        let key = (workspace_id.to_string(), class);
        if states.get(&key).is_some_and(OperationState::is_in_progress) {
            return Err(SyncError::OperationInProgress(class));
        }
        states.insert(key, OperationState::InProgress(operation.clone()));
        Ok(())
    }

    /// Forced pushes are only reachable through an offered force-push recovery.
    fn check_force_offered(&self, workspace_id: &str, operation: &SyncOperation) -> Result<()> {
        let class = operation.class();
        let offered = match operation {
            SyncOperation::UpdateGist { force: true } => matches!(
                self.state(workspace_id, class),
                OperationState::Failed {
                    recovery: RecoveryAction::ForcePushGist,
                    ..
                }
            ),
            _ => false,
        };
        if offered {
            Ok(())
        } else {
            Err(SyncError::ForceNotOffered(class))
        }
    }

    /// Records the failure, picks a recovery and shows the matching alert.
    fn fail(
        &self,
        descriptor: &WorkspaceDescriptor,
        operation: SyncOperation,
        err: SyncError,
        options: RunOptions,
    ) -> SyncError {
        let workspace_id = descriptor.workspace_id.as_str();
        let class = operation.class();

        let current = self.services.workspaces.get(workspace_id);
        let err = match &current {
            Err(WorkspaceError::NotFound(_)) => SyncError::Cancelled(workspace_id.to_string()),
            _ => err,
        };
        let kind = err.failure_kind();

        if kind == FailureKind::Cancelled {
            log::info!("{} cancelled: {}", operation.describe(), err);
            self.services.alerts.close(class);
            self.lock_states().retain(|(id, _), _| id != workspace_id);
            return err;
        }

        log::error!("{} failed: {}", operation.describe(), err);

        // Recovery targets the origin as stored now, which creating a gist or
        // a repository may have rewritten.
        let current = current.unwrap_or_else(|_| descriptor.clone());
        let (remote, _) = self.upstream(&current);
        let fallback_branch = match &operation {
            SyncOperation::Pull { branch, .. } => Some(fallback_branch_name(branch)),
            _ => None,
        };
        let recovery = recovery_for(&FailureContext {
            operation: &operation,
            kind,
            authenticated: self.auth.is_some(),
            origin: &current.origin,
            remote: &remote,
            fallback_branch: fallback_branch.clone(),
        });
        let message = err.to_string();

        if options.show_alerts {
            let url = descriptor.origin.url().unwrap_or_default();
            let alert = match (&operation, kind) {
                (_, FailureKind::AuthMissing) => {
                    messages::configure_credential(class, operation.describe())
                }
                (SyncOperation::Push { .. } | SyncOperation::PushNewBranch { .. }, _) => {
                    messages::push_error(url, &message, recovery.clone())
                }
                (SyncOperation::Pull { .. }, _) => {
                    messages::pull_error(url, recovery.clone(), fallback_branch.as_deref())
                }
                (SyncOperation::UpdateGist { .. }, FailureKind::PushRejected)
                    if recovery == RecoveryAction::ForcePushGist =>
                {
                    messages::gist_push_error()
                }
                _ => messages::error(class, &message, recovery.clone()),
            };
            self.services.alerts.show(alert);
        }

        self.set_state(
            workspace_id,
            class,
            OperationState::Failed {
                operation,
                message,
                recovery,
                fallback_branch,
            },
        );
        err
    }

    // ---- Flows --------------------------------------------------------------

    async fn run_flow(
        &self,
        descriptor: &WorkspaceDescriptor,
        operation: &SyncOperation,
        auth: Option<&AuthInfo>,
        options: RunOptions,
    ) -> Result<SyncReport> {
        let credentials =
            || auth.ok_or_else(|| SyncError::AuthMissing(operation.describe().to_string()));
        match operation {
            SyncOperation::Pull { remote, branch } => {
                self.run_pull(descriptor, remote, branch, auth, options).await
            }
            SyncOperation::Push {
                remote,
                branch,
                force,
            } => {
                self.run_push(descriptor, remote, branch, *force, credentials()?)
                    .await
            }
            SyncOperation::PushNewBranch { branch } => {
                self.run_push_new_branch(descriptor, branch, credentials()?)
                    .await
            }
            SyncOperation::UpdateGist { force } => {
                self.run_update_gist(descriptor, *force, credentials()?)
                    .await
            }
            SyncOperation::CreateGist => self.run_create_gist(descriptor, credentials()?).await,
            SyncOperation::ForkGist { gist_id } => {
                self.run_fork_gist(descriptor, gist_id, credentials()?)
                    .await
            }
            SyncOperation::CreateRepository { name, private } => {
                self.run_create_repository(descriptor, name, *private, credentials()?)
                    .await
            }
        }
    }

    async fn run_push(
        &self,
        descriptor: &WorkspaceDescriptor,
        remote: &str,
        branch: &str,
        force: bool,
        auth: &AuthInfo,
    ) -> Result<SyncReport> {
        let url = origin_url(descriptor);
        let dir = self.dir(descriptor);
        self.services.alerts.show(messages::pushing(url));

        let save_point = self.save_point(&dir).await?;
        self.services
            .git
            .push(&dir, &PushArgs::branch(remote, branch, force), auth)
            .await
            .map_err(|e| SyncError::from_push(e, remote, branch))?;
        self.ensure_present(descriptor)?;

        self.reconcile(&dir, remote, branch, auth).await;
        self.services
            .alerts
            .show(messages::push_success(url, self.success_duration()));

        Ok(SyncReport {
            save_point: save_point.commit_hash,
            ..SyncReport::new(SyncOperation::Push {
                remote: remote.to_string(),
                branch: branch.to_string(),
                force,
            })
        })
    }

    async fn run_pull(
        &self,
        descriptor: &WorkspaceDescriptor,
        remote: &str,
        branch: &str,
        auth: Option<&AuthInfo>,
        options: RunOptions,
    ) -> Result<SyncReport> {
        let url = origin_url(descriptor);
        let dir = self.dir(descriptor);
        if options.show_alerts {
            self.services.alerts.show(messages::pulling(url));
        }

        let save_point = self.save_point(&dir).await?;
        let args = PullArgs {
            remote: remote.to_string(),
            branch: branch.to_string(),
            author: self.services.config.identity(auth),
        };
        let pulled = self.services.git.pull(&dir, &args, auth).await?;
        self.ensure_present(descriptor)?;
        log::debug!("{} ({} files changed)", pulled.message, pulled.files_changed);

        if options.show_alerts {
            self.services
                .alerts
                .show(messages::pull_success(url, self.success_duration()));
        }

        Ok(SyncReport {
            save_point: save_point.commit_hash,
            ..SyncReport::new(SyncOperation::Pull {
                remote: remote.to_string(),
                branch: branch.to_string(),
            })
        })
    }

    async fn run_push_new_branch(
        &self,
        descriptor: &WorkspaceDescriptor,
        new_branch: &str,
        auth: &AuthInfo,
    ) -> Result<SyncReport> {
        let url = origin_url(descriptor);
        let dir = self.dir(descriptor);
        let remote = self.services.config.git.origin_remote.as_str();
        self.services.alerts.show(messages::pushing(url));

        let save_point = self.save_point(&dir).await?;
        self.services
            .git
            .branch(
                &dir,
                &BranchArgs {
                    name: new_branch.to_string(),
                    checkout: false,
                },
            )
            .await?;
        self.services
            .git
            .push(&dir, &PushArgs::branch(remote, new_branch, false), auth)
            .await
            .map_err(|e| SyncError::from_push(e, remote, new_branch))?;
        self.ensure_present(descriptor)?;

        self.services
            .alerts
            .show(messages::push_success(url, self.success_duration()));
        let redirect = routes::import(url, Some(new_branch));
        self.services.navigator.replace(redirect.clone());

        Ok(SyncReport {
            save_point: save_point.commit_hash,
            redirect: Some(redirect),
            ..SyncReport::new(SyncOperation::PushNewBranch {
                branch: new_branch.to_string(),
            })
        })
    }

    async fn run_update_gist(
        &self,
        descriptor: &WorkspaceDescriptor,
        force: bool,
        auth: &AuthInfo,
    ) -> Result<SyncReport> {
        let url = origin_url(descriptor);
        let dir = self.dir(descriptor);
        let remote = self.services.config.git.gist_remote.as_str();
        let branch = self.branch_of(descriptor);
        self.services.alerts.show(messages::gist_loading());

        // Forced updates only run as a recovery, after a flow that already saved.
        let save_point = if force {
            None
        } else {
            self.save_point(&dir).await?.commit_hash
        };
        self.services
            .git
            .push(&dir, &PushArgs::branch(remote, branch, force), auth)
            .await
            .map_err(|e| SyncError::from_push(e, remote, branch))?;
        self.ensure_present(descriptor)?;

        self.reconcile(&dir, remote, branch, auth).await;
        self.services
            .alerts
            .show(messages::gist_updated(url, self.success_duration()));

        Ok(SyncReport {
            save_point,
            ..SyncReport::new(SyncOperation::UpdateGist { force })
        })
    }

    async fn run_create_gist(
        &self,
        descriptor: &WorkspaceDescriptor,
        auth: &AuthInfo,
    ) -> Result<SyncReport> {
        let workspace_id = descriptor.workspace_id.as_str();
        let git_config = &self.services.config.git;
        let dir = self.dir(descriptor);
        self.services.alerts.show(messages::gist_loading());

        let gist = self
            .services
            .hosting
            .create_gist(auth, &CreateGistRequest::placeholder(&descriptor.name))
            .await?;
        let push_url = gist
            .push_url()
            .map_err(|_| SyncError::GistCreateFailed(format!("gist {} has no push URL", gist.id)))?
            .to_string();
        log::info!("Created gist {} for workspace {}", gist.id, short_id(workspace_id));

        let branch = git_config.gist_default_branch.as_str();
        let descriptor = self
            .services
            .workspaces
            .turn_into_gist(workspace_id, &push_url, branch)?;

        self.services
            .git
            .add_remote(
                &dir,
                &AddRemoteArgs {
                    name: git_config.gist_remote.clone(),
                    url: push_url.clone(),
                    force: true,
                },
            )
            .await?;
        self.services
            .git
            .branch(
                &dir,
                &BranchArgs {
                    name: branch.to_string(),
                    checkout: true,
                },
            )
            .await?;
        let save_point = self.save_point(&dir).await?;
        // Overwrites the placeholder README.
        self.services
            .git
            .push(&dir, &PushArgs::branch(&git_config.gist_remote, branch, true), auth)
            .await
            .map_err(|e| SyncError::from_push(e, &git_config.gist_remote, branch))?;
        self.ensure_present(&descriptor)?;

        self.reconcile(&dir, &git_config.gist_remote, branch, auth)
            .await;
        let shown_url = gist.html_url.as_deref().unwrap_or(&push_url);
        self.services
            .alerts
            .show(messages::gist_created(shown_url, self.success_duration()));

        Ok(SyncReport {
            save_point: save_point.commit_hash,
            ..SyncReport::new(SyncOperation::CreateGist)
        })
    }

    async fn run_fork_gist(
        &self,
        descriptor: &WorkspaceDescriptor,
        gist_id: &str,
        auth: &AuthInfo,
    ) -> Result<SyncReport> {
        let dir = self.dir(descriptor);
        let gist_branch = self.services.config.git.gist_default_branch.as_str();
        self.services.alerts.show(messages::gist_loading());

        let fork = self.services.hosting.fork_gist(auth, gist_id).await?;
        let push_url = fork.push_url()?.to_string();
        log::info!("Forked gist {} into {}", gist_id, fork.id);

        self.services
            .git
            .add_remote(
                &dir,
                &AddRemoteArgs {
                    name: fork.id.clone(),
                    url: push_url.clone(),
                    force: true,
                },
            )
            .await?;
        let save_point = self.save_point(&dir).await?;
        let args = PushArgs {
            remote: fork.id.clone(),
            local_ref: self.branch_of(descriptor).to_string(),
            remote_ref: format!("refs/heads/{}", gist_branch),
            force: true,
        };
        self.services
            .git
            .push(&dir, &args, auth)
            .await
            .map_err(|e| SyncError::from_push(e, &fork.id, gist_branch))?;
        self.ensure_present(descriptor)?;

        self.services.alerts.close(OperationClass::Gist);
        let fork_url = fork.html_url.as_deref().unwrap_or(&push_url);
        self.services.alerts.show(messages::redirecting(fork_url));
        let redirect = self
            .services
            .navigator
            .replace_bypassing(routes::import(fork_url, None));

        Ok(SyncReport {
            save_point: save_point.commit_hash,
            redirect: Some(redirect),
            ..SyncReport::new(SyncOperation::ForkGist {
                gist_id: gist_id.to_string(),
            })
        })
    }

    async fn run_create_repository(
        &self,
        descriptor: &WorkspaceDescriptor,
        name: &str,
        private: bool,
        auth: &AuthInfo,
    ) -> Result<SyncReport> {
        let workspace_id = descriptor.workspace_id.as_str();
        let git_config = &self.services.config.git;
        let dir = self.dir(descriptor);
        let branch = git_config.gist_default_branch.as_str();

        let repository = self
            .services
            .hosting
            .create_repository(auth, &CreateRepositoryRequest::empty(name, private))
            .await?;
        log::info!(
            "Created repository {} for workspace {}",
            repository.name,
            short_id(workspace_id)
        );

        let descriptor =
            self.services
                .workspaces
                .turn_into_git(workspace_id, &repository.clone_url, branch)?;
        self.services
            .git
            .add_remote(
                &dir,
                &AddRemoteArgs {
                    name: git_config.origin_remote.clone(),
                    url: repository.clone_url.clone(),
                    force: true,
                },
            )
            .await?;
        self.services
            .git
            .branch(
                &dir,
                &BranchArgs {
                    name: branch.to_string(),
                    checkout: true,
                },
            )
            .await?;
        let save_point = self.save_point(&dir).await?;
        self.services
            .git
            .push(&dir, &PushArgs::branch(&git_config.origin_remote, branch, false), auth)
            .await
            .map_err(|e| SyncError::from_push(e, &git_config.origin_remote, branch))?;
        self.ensure_present(&descriptor)?;

        self.services.alerts.show(messages::repository_created(
            &repository.html_url,
            self.success_duration(),
        ));

        Ok(SyncReport {
            save_point: save_point.commit_hash,
            ..SyncReport::new(SyncOperation::CreateRepository {
                name: name.to_string(),
                private,
            })
        })
    }

    // ---- Helpers ------------------------------------------------------------

    async fn save_point(&self, dir: &std::path::Path) -> Result<CommitResult> {
        let identity = self.services.config.identity(self.auth.as_ref());
        let result = self
            .services
            .git
            .commit(dir, &self.services.config.git.save_point_message, &identity)
            .await?;
        match &result.commit_hash {
            Some(hash) => log::debug!("Save point {}", hash),
            None => log::debug!("Save point skipped: nothing to commit"),
        }
        Ok(result)
    }

    /// Silent pull after a push. Its failure does not fail the push.
    async fn reconcile(&self, dir: &std::path::Path, remote: &str, branch: &str, auth: &AuthInfo) {
        let args = PullArgs {
            remote: remote.to_string(),
            branch: branch.to_string(),
            author: auth.identity(),
        };
        if let Err(e) = self.services.git.pull(dir, &args, Some(auth)).await {
            log::warn!("Pull after push to {}/{} failed: {}", remote, branch, e);
        }
    }

    /// Remote name and branch of the descriptor's upstream.
    fn upstream(&self, descriptor: &WorkspaceDescriptor) -> (String, String) {
        let git = &self.services.config.git;
        let remote = match descriptor.origin {
            WorkspaceOrigin::GithubGist { .. } => git.gist_remote.clone(),
            WorkspaceOrigin::Local | WorkspaceOrigin::Git { .. } => git.origin_remote.clone(),
        };
        (remote, self.branch_of(descriptor).to_string())
    }

    fn branch_of<'a>(&'a self, descriptor: &'a WorkspaceDescriptor) -> &'a str {
        descriptor
            .origin
            .branch()
            .unwrap_or(&self.services.config.git.gist_default_branch)
    }

    fn dir(&self, descriptor: &WorkspaceDescriptor) -> PathBuf {
        self.services.workspaces.workspace_dir(&descriptor.workspace_id)
    }

    fn ensure_present(&self, descriptor: &WorkspaceDescriptor) -> Result<()> {
        match self.services.workspaces.get(&descriptor.workspace_id) {
            Ok(_) => Ok(()),
            Err(WorkspaceError::NotFound(_)) => {
                Err(SyncError::Cancelled(descriptor.workspace_id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn success_duration(&self) -> std::time::Duration {
        self.services.config.alerts.success_duration()
    }
}

fn origin_url(descriptor: &WorkspaceDescriptor) -> &str {
    descriptor.origin.url().unwrap_or_default()
}

/// Which operations each origin kind supports.
fn check_origin(origin: &WorkspaceOrigin, operation: &SyncOperation) -> Result<()> {
    use SyncOperation as Op;

    let supported = match origin {
        WorkspaceOrigin::Local => {
            matches!(operation, Op::CreateGist | Op::CreateRepository { .. })
        }
        WorkspaceOrigin::Git { .. } => matches!(
            operation,
            Op::Push { .. } | Op::Pull { .. } | Op::PushNewBranch { .. }
        ),
        WorkspaceOrigin::GithubGist { .. } => matches!(
            operation,
            Op::Pull { .. } | Op::UpdateGist { .. } | Op::ForkGist { .. }
        ),
    };

    if supported {
        Ok(())
    } else {
        Err(SyncError::OriginMismatch {
            operation: operation.describe().to_string(),
            kind: origin.kind(),
        })
    }
}
