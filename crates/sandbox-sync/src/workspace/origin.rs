//! Remote identity of a workspace.

use reqwest::Url;
use serde::{Deserialize, Serialize};

use super::error::{Result, WorkspaceError};

/// Discriminant of [`WorkspaceOrigin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkspaceKind {
    Local,
    Git,
    GithubGist,
}

impl std::fmt::Display for WorkspaceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkspaceKind::Local => write!(f, "local"),
            WorkspaceKind::Git => write!(f, "git"),
            WorkspaceKind::GithubGist => write!(f, "GitHub Gist"),
        }
    }
}

/// Where a workspace syncs to.
///
/// Set when the workspace is created and only changed by the explicit
/// turn-into-gist / turn-into-repository transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkspaceOrigin {
    Local,
    Git { url: String, branch: String },
    GithubGist { url: String, branch: String },
}

impl WorkspaceOrigin {
    pub fn git(url: impl Into<String>, branch: impl Into<String>) -> Result<Self> {
        let (url, branch) = validated(url.into(), branch.into())?;
        Ok(WorkspaceOrigin::Git { url, branch })
    }

    pub fn gist(url: impl Into<String>, branch: impl Into<String>) -> Result<Self> {
        let (url, branch) = validated(url.into(), branch.into())?;
        Ok(WorkspaceOrigin::GithubGist { url, branch })
    }

    /// Origin for a workspace imported from `url`: gist hosts become gists.
    pub fn for_import(url: &str, branch: &str) -> Result<Self> {
        let parsed = Url::parse(url).map_err(|e| WorkspaceError::InvalidOrigin(e.to_string()))?;
        match parsed.host_str() {
            Some(host) if host.starts_with("gist.") => Self::gist(url, branch),
            _ => Self::git(url, branch),
        }
    }

    pub fn kind(&self) -> WorkspaceKind {
        match self {
            WorkspaceOrigin::Local => WorkspaceKind::Local,
            WorkspaceOrigin::Git { .. } => WorkspaceKind::Git,
            WorkspaceOrigin::GithubGist { .. } => WorkspaceKind::GithubGist,
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            WorkspaceOrigin::Local => None,
            WorkspaceOrigin::Git { url, .. } | WorkspaceOrigin::GithubGist { url, .. } => {
                Some(url)
            }
        }
    }

    pub fn branch(&self) -> Option<&str> {
        match self {
            WorkspaceOrigin::Local => None,
            WorkspaceOrigin::Git { branch, .. } | WorkspaceOrigin::GithubGist { branch, .. } => {
                Some(branch)
            }
        }
    }

    /// Gist id from the last path segment, e.g. `https://gist.github.com/abc123.git` → `abc123`.
    pub fn gist_id(&self) -> Option<String> {
        match self {
            WorkspaceOrigin::GithubGist { url, .. } => gist_id_from_url(url),
            WorkspaceOrigin::Local | WorkspaceOrigin::Git { .. } => None,
        }
    }

    /// Re-checks the invariants of a deserialized origin.
    pub fn validate(&self) -> Result<()> {
        match self {
            WorkspaceOrigin::Local => Ok(()),
            WorkspaceOrigin::Git { url, branch } | WorkspaceOrigin::GithubGist { url, branch } => {
                validated(url.clone(), branch.clone()).map(|_| ())
            }
        }
    }
}

pub fn gist_id_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let last = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
    let id = last.strip_suffix(".git").unwrap_or(last);
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

fn validated(url: String, branch: String) -> Result<(String, String)> {
    if branch.trim().is_empty() {
        return Err(WorkspaceError::InvalidOrigin(format!(
            "origin '{}' has no branch",
            url
        )));
    }
    Url::parse(&url).map_err(|e| WorkspaceError::InvalidOrigin(format!("'{}': {}", url, e)))?;
    Ok((url, branch))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_origin_requires_branch() {
        assert!(WorkspaceOrigin::git("https://github.com/o/r.git", "").is_err());
        assert!(WorkspaceOrigin::git("https://github.com/o/r.git", "main").is_ok());
    }

    #[test]
    fn test_origin_rejects_invalid_url() {
        assert!(WorkspaceOrigin::gist("not a url", "main").is_err());
    }

    #[test]
    fn test_kind_and_accessors() {
        let origin = WorkspaceOrigin::git("https://github.com/o/r.git", "dev").unwrap();
        assert_eq!(origin.kind(), WorkspaceKind::Git);
        assert_eq!(origin.branch(), Some("dev"));
        assert_eq!(WorkspaceOrigin::Local.url(), None);
    }

    #[test]
    fn test_gist_id_from_push_url() {
        let origin = WorkspaceOrigin::gist("https://gist.github.com/abc123.git", "main").unwrap();
        assert_eq!(origin.gist_id().as_deref(), Some("abc123"));
    }

    #[test]
    fn test_gist_id_from_html_url() {
        assert_eq!(
            gist_id_from_url("https://gist.github.com/octocat/abc123").as_deref(),
            Some("abc123")
        );
    }

    #[test]
    fn test_for_import_detects_gists() {
        let origin = WorkspaceOrigin::for_import("https://gist.github.com/abc.git", "main").unwrap();
        assert_eq!(origin.kind(), WorkspaceKind::GithubGist);

        let origin = WorkspaceOrigin::for_import("https://github.com/o/r.git", "main").unwrap();
        assert_eq!(origin.kind(), WorkspaceKind::Git);
    }

    #[test]
    fn test_serialized_shape() {
        let origin = WorkspaceOrigin::gist("https://gist.github.com/abc.git", "main").unwrap();
        let json = serde_json::to_string(&origin).unwrap();
        assert!(json.contains("\"kind\":\"GITHUB_GIST\""));

        let local = serde_json::to_string(&WorkspaceOrigin::Local).unwrap();
        assert_eq!(local, r#"{"kind":"LOCAL"}"#);
    }
}
