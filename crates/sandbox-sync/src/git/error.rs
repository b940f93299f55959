//! Git plumbing errors.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GitError {
    #[error("Git operation failed: {0}")]
    Operation(String),

    #[error("Push rejected by remote: {0}")]
    PushRejected(String),

    #[error("Git network error: {0}")]
    Network(String),

    #[error("Git merge conflict: {0}")]
    MergeConflict(String),

    #[error("Git authentication failed: {0}")]
    AuthFailed(String),

    #[error("Not a git repository: {0}")]
    NotARepository(PathBuf),

    #[error("Failed to run git: {0}")]
    Io(#[from] std::io::Error),
}

impl GitError {
    /// Transient failures the user may retry as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GitError::Network(_))
    }
}

/// Classifies git stderr into a specific error variant.
///
/// Rejections are checked first: git prints "failed to push some refs" next
/// to hints that would otherwise look like network trouble.
pub fn classify_git_error(stderr: &str) -> GitError {
    let lower = stderr.to_lowercase();
    let message = stderr.trim().to_string();

    if lower.contains("[rejected]")
        || lower.contains("non-fast-forward")
        || lower.contains("fetch first")
        || lower.contains("updates were rejected")
    {
        return GitError::PushRejected(message);
    }

    if lower.contains("authentication failed")
        || lower.contains("permission denied")
        || lower.contains("invalid credentials")
        || lower.contains("could not read username")
        || lower.contains("403")
    {
        return GitError::AuthFailed(message);
    }

    if lower.contains("could not resolve host")
        || lower.contains("connection refused")
        || lower.contains("connection timed out")
        || lower.contains("network is unreachable")
        || lower.contains("unable to access")
        || lower.contains("failed to connect")
        || lower.contains("couldn't connect to server")
        || lower.contains("the remote end hung up unexpectedly")
    {
        return GitError::Network(message);
    }

    if lower.contains("merge conflict")
        || lower.contains("automatic merge failed")
        || (lower.contains("conflict") && lower.contains("merge"))
    {
        return GitError::MergeConflict(message);
    }

    GitError::Operation(message)
}

pub type Result<T> = std::result::Result<T, GitError>;
