//! Git plumbing: the [`GitService`] seam and its `git`-executable implementation.

pub mod auth;
pub mod cli;
pub mod error;
pub mod parse;
pub mod progress;
pub mod service;
pub mod types;

pub use cli::CliGit;
pub use error::{classify_git_error, GitError};
pub use progress::{GitOperationType, GitProgressBroadcaster, GitProgressEvent};
pub use service::GitService;
pub use types::*;
