//! Recording fakes for the git and hosting seams.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use sandbox_sync::auth::{AuthInfo, GitIdentity};
use sandbox_sync::git::{
    AddRemoteArgs, BranchArgs, CommitResult, GitError, GitService, PullArgs, PullResult, PushArgs,
};
use sandbox_sync::hosting::{
    Account, CreateGistRequest, CreateRepositoryRequest, Gist, HostingApi, HostingError, Owner,
    Repository,
};

/// One recorded git call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitCall {
    Init { branch: String },
    Clone { url: String, branch: String },
    Commit { message: String },
    Push(PushArgs),
    Pull { remote: String, branch: String },
    Branch(BranchArgs),
    AddRemote(AddRemoteArgs),
}

impl GitCall {
    pub fn name(&self) -> &'static str {
        match self {
            GitCall::Init { .. } => "init",
            GitCall::Clone { .. } => "clone",
            GitCall::Commit { .. } => "commit",
            GitCall::Push(_) => "push",
            GitCall::Pull { .. } => "pull",
            GitCall::Branch(_) => "branch",
            GitCall::AddRemote(_) => "add_remote",
        }
    }
}

#[derive(Default)]
pub struct FakeGit {
    calls: Mutex<Vec<GitCall>>,
    failures: Mutex<HashMap<&'static str, VecDeque<GitError>>>,
    commits: AtomicUsize,
    push_gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeGit {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The next call named `op` fails with `err`.
    pub fn fail_next(&self, op: &'static str, err: GitError) {
        self.failures
            .lock()
            .unwrap()
            .entry(op)
            .or_default()
            .push_back(err);
    }

    /// Pushes wait on the returned gate until it is notified.
    pub fn hold_pushes(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.push_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn calls(&self) -> Vec<GitCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_names(&self) -> Vec<&'static str> {
        self.calls().iter().map(GitCall::name).collect()
    }

    pub fn pushes(&self) -> Vec<PushArgs> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                GitCall::Push(args) => Some(args),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: GitCall) -> Result<(), GitError> {
        let name = call.name();
        self.calls.lock().unwrap().push(call);
        match self.failures.lock().unwrap().get_mut(name).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl GitService for FakeGit {
    async fn init(&self, _dir: &Path, branch: &str) -> Result<(), GitError> {
        self.record(GitCall::Init {
            branch: branch.to_string(),
        })
    }

    async fn clone_repository(
        &self,
        _dir: &Path,
        url: &str,
        branch: &str,
        _auth: Option<&AuthInfo>,
    ) -> Result<(), GitError> {
        self.record(GitCall::Clone {
            url: url.to_string(),
            branch: branch.to_string(),
        })
    }

    async fn commit(
        &self,
        _dir: &Path,
        message: &str,
        _author: &GitIdentity,
    ) -> Result<CommitResult, GitError> {
        self.record(GitCall::Commit {
            message: message.to_string(),
        })?;
        let n = self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(CommitResult {
            message: message.to_string(),
            commit_hash: Some(format!("{:07x}", 0xabc0000 + n)),
        })
    }

    async fn push(&self, _dir: &Path, args: &PushArgs, _auth: &AuthInfo) -> Result<(), GitError> {
        let gate = self.push_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.record(GitCall::Push(args.clone()))
    }

    async fn pull(
        &self,
        _dir: &Path,
        args: &PullArgs,
        _auth: Option<&AuthInfo>,
    ) -> Result<PullResult, GitError> {
        self.record(GitCall::Pull {
            remote: args.remote.clone(),
            branch: args.branch.clone(),
        })?;
        Ok(PullResult {
            message: "Already up to date.".to_string(),
            files_changed: 0,
        })
    }

    async fn branch(&self, _dir: &Path, args: &BranchArgs) -> Result<(), GitError> {
        self.record(GitCall::Branch(args.clone()))
    }

    async fn add_remote(&self, _dir: &Path, args: &AddRemoteArgs) -> Result<(), GitError> {
        self.record(GitCall::AddRemote(args.clone()))
    }

    async fn remote_url(&self, _dir: &Path, _name: &str) -> Result<Option<String>, GitError> {
        Ok(None)
    }
}

pub const GIST_PUSH_URL: &str = "https://gist.github.com/newgist1.git";
pub const FORK_PUSH_URL: &str = "https://gist.github.com/fork1.git";
pub const FORK_HTML_URL: &str = "https://gist.github.com/octocat/fork1";
pub const REPO_CLONE_URL: &str = "https://github.com/octocat/my-repo.git";

pub struct FakeHosting {
    pub calls: Mutex<Vec<String>>,
    pub created_gist: Mutex<Gist>,
    pub gist_owner: Mutex<String>,
    pub account: Mutex<Account>,
    fail_create_gist: Mutex<Option<u16>>,
}

impl FakeHosting {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            created_gist: Mutex::new(Gist {
                id: "newgist1".to_string(),
                git_push_url: Some(GIST_PUSH_URL.to_string()),
                html_url: Some("https://gist.github.com/octocat/newgist1".to_string()),
                owner: Some(Owner {
                    login: "octocat".to_string(),
                }),
            }),
            gist_owner: Mutex::new("octocat".to_string()),
            account: Mutex::new(Account {
                login: "octocat".to_string(),
                scopes: vec!["gist".to_string(), "repo".to_string()],
            }),
            fail_create_gist: Mutex::new(None),
        })
    }

    /// The created gist comes back without a push URL.
    pub fn without_push_url(&self) {
        self.created_gist.lock().unwrap().git_push_url = None;
    }

    pub fn fail_create_gist_with(&self, status: u16) {
        *self.fail_create_gist.lock().unwrap() = Some(status);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

#[async_trait]
impl HostingApi for FakeHosting {
    async fn create_gist(
        &self,
        _auth: &AuthInfo,
        request: &CreateGistRequest,
    ) -> Result<Gist, HostingError> {
        self.record(format!("create_gist:{}", request.description));
        if let Some(status) = *self.fail_create_gist.lock().unwrap() {
            return Err(HostingError::Status {
                status,
                body: "Validation Failed".to_string(),
            });
        }
        Ok(self.created_gist.lock().unwrap().clone())
    }

    async fn fork_gist(&self, auth: &AuthInfo, gist_id: &str) -> Result<Gist, HostingError> {
        self.record(format!("fork_gist:{}", gist_id));
        Ok(Gist {
            id: "fork1".to_string(),
            git_push_url: Some(FORK_PUSH_URL.to_string()),
            html_url: Some(FORK_HTML_URL.to_string()),
            owner: Some(Owner {
                login: auth.username.clone(),
            }),
        })
    }

    async fn get_gist(&self, _auth: Option<&AuthInfo>, gist_id: &str) -> Result<Gist, HostingError> {
        self.record(format!("get_gist:{}", gist_id));
        Ok(Gist {
            id: gist_id.to_string(),
            git_push_url: Some(format!("https://gist.github.com/{}.git", gist_id)),
            html_url: None,
            owner: Some(Owner {
                login: self.gist_owner.lock().unwrap().clone(),
            }),
        })
    }

    async fn create_repository(
        &self,
        _auth: &AuthInfo,
        request: &CreateRepositoryRequest,
    ) -> Result<Repository, HostingError> {
        self.record(format!("create_repository:{}", request.name));
        Ok(Repository {
            name: request.name.clone(),
            clone_url: REPO_CLONE_URL.to_string(),
            html_url: "https://github.com/octocat/my-repo".to_string(),
            default_branch: None,
        })
    }

    async fn current_account(&self, _auth: &AuthInfo) -> Result<Account, HostingError> {
        self.record("current_account");
        Ok(self.account.lock().unwrap().clone())
    }
}
