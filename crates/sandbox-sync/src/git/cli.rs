//! [`GitService`] backed by the `git` executable.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use super::auth::{build_auth_env, AuthEnv};
use super::error::{classify_git_error, GitError, Result};
use super::parse::{count_changed_files, format_git_error, has_changes};
use super::progress::{GitOperationPhase, GitOperationType, GitProgressBroadcaster, OperationProgress};
use super::service::GitService;
use super::types::{AddRemoteArgs, BranchArgs, CommitResult, PullArgs, PullResult, PushArgs};
use crate::auth::{AuthInfo, GitIdentity};
use crate::sanitize::redact_repo_url;

struct CommandOutput {
    success: bool,
    code: Option<i32>,
    stdout: String,
    stderr: String,
}

impl CommandOutput {
    fn error_message(&self) -> String {
        format_git_error(&self.stderr, &self.stdout, self.code)
    }

    fn into_error(self) -> GitError {
        classify_git_error(&self.error_message())
    }
}

pub struct CliGit {
    program: PathBuf,
    progress: GitProgressBroadcaster,
}

impl CliGit {
    pub fn new() -> Self {
        Self::with_progress(GitProgressBroadcaster::default())
    }

    pub fn with_progress(progress: GitProgressBroadcaster) -> Self {
        Self {
            program: PathBuf::from("git"),
            progress,
        }
    }

    /// Uses a specific git binary instead of the one on `PATH`.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn progress(&self) -> &GitProgressBroadcaster {
        &self.progress
    }

    fn ensure_repo(dir: &Path) -> Result<()> {
        if dir.join(".git").exists() {
            Ok(())
        } else {
            Err(GitError::NotARepository(dir.to_path_buf()))
        }
    }

    fn identity_args(author: &GitIdentity) -> [String; 4] {
        [
            "-c".to_string(),
            format!("user.name={}", author.name),
            "-c".to_string(),
            format!("user.email={}", author.email),
        ]
    }

    async fn run<S: AsRef<str>>(&self, dir: &Path, args: &[S]) -> Result<CommandOutput> {
        let output = Command::new(&self.program)
            .current_dir(dir)
            .args(args.iter().map(|a| a.as_ref()))
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .output()
            .await?;

        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn run_checked<S: AsRef<str>>(&self, dir: &Path, args: &[S]) -> Result<CommandOutput> {
        let output = self.run(dir, args).await?;
        if output.success {
            Ok(output)
        } else {
            Err(output.into_error())
        }
    }

    /// Runs a network command, forwarding stderr progress while collecting output.
    async fn run_streaming<S: AsRef<str>>(
        &self,
        dir: &Path,
        args: &[S],
        auth: &AuthEnv,
        progress: &OperationProgress,
    ) -> Result<CommandOutput> {
        let mut cmd = Command::new(&self.program);
        cmd.current_dir(dir)
            .args(args.iter().map(|a| a.as_ref()))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        for (key, value) in &auth.env_vars {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn()?;
        let stderr_pipe = child.stderr.take();
        let stdout_pipe = child.stdout.take();

        let stderr_task = async {
            let mut collected = Vec::new();
            if let Some(stderr) = stderr_pipe {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    progress.output_line(&line);
                    collected.push(line);
                }
            }
            collected
        };

        let stdout_task = async {
            let mut collected = Vec::new();
            if let Some(stdout) = stdout_pipe {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    collected.push(line);
                }
            }
            collected
        };

        let (stderr_lines, stdout_lines) = tokio::join!(stderr_task, stdout_task);
        let status = child.wait().await?;

        Ok(CommandOutput {
            success: status.success(),
            code: status.code(),
            stdout: stdout_lines.join("\n"),
            stderr: stderr_lines.join("\n"),
        })
    }

    /// Reports the outcome of a streamed command on `progress`.
    fn finish(progress: &OperationProgress, output: CommandOutput, done: &str) -> Result<CommandOutput> {
        if output.success {
            progress.completed(done);
            Ok(output)
        } else {
            let message = output.error_message();
            progress.failed(&message);
            Err(classify_git_error(&message))
        }
    }
}

impl Default for CliGit {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GitService for CliGit {
    async fn init(&self, dir: &Path, branch: &str) -> Result<()> {
        let progress = self.progress.start_operation(GitOperationType::Init);
        std::fs::create_dir_all(dir)?;

        self.run_checked(dir, &["init"]).await?;
        let head = format!("refs/heads/{}", branch);
        self.run_checked(dir, &["symbolic-ref", "HEAD", head.as_str()]).await?;

        progress.completed("Initialized repository");
        log::debug!("Initialized git repository in {:?}", dir);
        Ok(())
    }

    async fn clone_repository(
        &self,
        dir: &Path,
        url: &str,
        branch: &str,
        auth: Option<&AuthInfo>,
    ) -> Result<()> {
        let progress = self.progress.start_operation(GitOperationType::Clone);
        progress.phase(GitOperationPhase::Starting, "Cloning...");

        let parent = dir
            .parent()
            .ok_or_else(|| GitError::Operation(format!("Invalid clone target {:?}", dir)))?;
        std::fs::create_dir_all(parent)?;
        let target = dir.to_string_lossy().into_owned();

        let auth_env = build_auth_env(auth)?;
        let output = self
            .run_streaming(
                parent,
                &["clone", "--progress", "--branch", branch, "--", url, target.as_str()],
                &auth_env,
                &progress,
            )
            .await?;
        drop(auth_env);

        Self::finish(&progress, output, "Clone completed")?;
        log::info!("Cloned {} ({})", redact_repo_url(url), branch);
        Ok(())
    }

    async fn commit(&self, dir: &Path, message: &str, author: &GitIdentity) -> Result<CommitResult> {
        Self::ensure_repo(dir)?;
        let progress = self.progress.start_operation(GitOperationType::Commit);

        progress.phase(GitOperationPhase::StagingFiles, "Staging files...");
        self.run_checked(dir, &["add", "-A"]).await?;

        let status = self.run_checked(dir, &["status", "--porcelain"]).await?;
        if !has_changes(&status.stdout) {
            progress.completed("Nothing to commit");
            return Ok(CommitResult::nothing_to_commit());
        }

        progress.phase(GitOperationPhase::Committing, "Creating commit...");
        let mut args: Vec<String> = Self::identity_args(author).to_vec();
        args.extend(["commit".to_string(), "-m".to_string(), message.to_string()]);

        let output = self.run(dir, &args).await?;
        if !output.success {
            let error = output.error_message();
            progress.failed(&error);
            return Err(GitError::Operation(error));
        }

        let hash = self.run_checked(dir, &["rev-parse", "--short", "HEAD"]).await?;
        let commit_hash = hash.stdout.trim().to_string();
        progress.completed(&format!("Committed: {}", commit_hash));

        Ok(CommitResult {
            message: output.stdout.trim().to_string(),
            commit_hash: Some(commit_hash),
        })
    }

    async fn push(&self, dir: &Path, args: &PushArgs, auth: &AuthInfo) -> Result<()> {
        Self::ensure_repo(dir)?;
        let progress = self.progress.start_operation(GitOperationType::Push);
        progress.phase(GitOperationPhase::Starting, "Pushing to remote...");

        let refspec = args.refspec();
        let mut command = vec!["push", "--progress"];
        if args.force {
            command.push("--force");
        }
        command.push(args.remote.as_str());
        command.push(refspec.as_str());

        let auth_env = build_auth_env(Some(auth))?;
        let output = self.run_streaming(dir, &command, &auth_env, &progress).await?;
        drop(auth_env);

        Self::finish(&progress, output, "Push completed")?;
        log::info!(
            "Pushed {} to {}{}",
            refspec,
            args.remote,
            if args.force { " (forced)" } else { "" }
        );
        Ok(())
    }

    async fn pull(&self, dir: &Path, args: &PullArgs, auth: Option<&AuthInfo>) -> Result<PullResult> {
        Self::ensure_repo(dir)?;
        let progress = self.progress.start_operation(GitOperationType::Pull);
        progress.phase(GitOperationPhase::Starting, "Pulling...");

        let mut command: Vec<String> = Self::identity_args(&args.author).to_vec();
        command.extend(
            [
                "pull",
                "--progress",
                "--no-rebase",
                "--no-edit",
                args.remote.as_str(),
                args.branch.as_str(),
            ]
            .map(String::from),
        );

        let auth_env = build_auth_env(auth)?;
        let output = self.run_streaming(dir, &command, &auth_env, &progress).await?;
        drop(auth_env);

        match Self::finish(&progress, output, "Pull completed") {
            Ok(output) => {
                let files_changed = if output.stdout.contains("Already up to date") {
                    0
                } else {
                    count_changed_files(&output.stdout)
                };
                Ok(PullResult {
                    message: output.stdout.trim().to_string(),
                    files_changed,
                })
            }
            Err(err) => {
                if matches!(err, GitError::MergeConflict(_)) {
                    // Leave the working tree as it was before the pull.
                    match self.run(dir, &["merge", "--abort"]).await {
                        Ok(abort) if !abort.success => {
                            log::warn!("Failed to abort merge: {}", abort.error_message())
                        }
                        Err(e) => log::warn!("Failed to abort merge: {}", e),
                        Ok(_) => {}
                    }
                }
                Err(err)
            }
        }
    }

    async fn branch(&self, dir: &Path, args: &BranchArgs) -> Result<()> {
        Self::ensure_repo(dir)?;
        let progress = self.progress.start_operation(GitOperationType::Branch);

        let result = if args.checkout {
            self.run_checked(dir, &["checkout", "-B", args.name.as_str()]).await
        } else {
            self.run_checked(dir, &["branch", args.name.as_str()]).await
        };

        match result {
            Ok(_) => {
                progress.completed(&format!("Created branch {}", args.name));
                Ok(())
            }
            Err(e) => {
                progress.failed(&e.to_string());
                Err(e)
            }
        }
    }

    async fn add_remote(&self, dir: &Path, args: &AddRemoteArgs) -> Result<()> {
        Self::ensure_repo(dir)?;
        let progress = self.progress.start_operation(GitOperationType::AddRemote);

        let exists = self.remote_url(dir, &args.name).await?.is_some();
        let result = match (exists, args.force) {
            (true, true) => {
                self.run_checked(dir, &["remote", "set-url", args.name.as_str(), args.url.as_str()])
                    .await
            }
            (true, false) => Err(GitError::Operation(format!(
                "remote {} already exists",
                args.name
            ))),
            (false, _) => {
                self.run_checked(dir, &["remote", "add", args.name.as_str(), args.url.as_str()])
                    .await
            }
        };

        match result {
            Ok(_) => {
                progress.completed(&format!("Remote {} set", args.name));
                log::debug!("Remote {} -> {}", args.name, redact_repo_url(&args.url));
                Ok(())
            }
            Err(e) => {
                progress.failed(&e.to_string());
                Err(e)
            }
        }
    }

    async fn remote_url(&self, dir: &Path, name: &str) -> Result<Option<String>> {
        Self::ensure_repo(dir)?;
        let output = self.run(dir, &["remote", "get-url", name]).await?;
        if output.success {
            Ok(Some(output.stdout.trim().to_string()))
        } else {
            Ok(None)
        }
    }
}
