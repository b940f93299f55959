//! Wire types for the hosting REST API (GitHub field names).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::{HostingError, Result};

/// Body of the throwaway file a new gist is created with; the first force
/// push replaces it.
pub const PLACEHOLDER_README: &str = "
This Gist was created from a sandbox workspace.

This file is temporary and you should not be seeing it.
If you are, it means that creating this Gist failed and it can safely be deleted.
";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub login: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gist {
    pub id: String,
    #[serde(default)]
    pub git_push_url: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub owner: Option<Owner>,
}

impl Gist {
    pub fn push_url(&self) -> Result<&str> {
        self.git_push_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or(HostingError::MissingPushUrl)
    }

    pub fn owner_login(&self) -> Option<&str> {
        self.owner.as_ref().map(|o| o.login.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GistFileContent {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateGistRequest {
    pub description: String,
    pub public: bool,
    pub files: BTreeMap<String, GistFileContent>,
}

impl CreateGistRequest {
    /// Public gist holding only the placeholder README.
    pub fn placeholder(description: impl Into<String>) -> Self {
        let mut files = BTreeMap::new();
        files.insert(
            "README.md".to_string(),
            GistFileContent {
                content: PLACEHOLDER_README.to_string(),
            },
        );
        Self {
            description: description.into(),
            public: true,
            files,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRepositoryRequest {
    pub name: String,
    pub private: bool,
    /// Must stay `false`: the first push brings the history.
    pub auto_init: bool,
}

impl CreateRepositoryRequest {
    pub fn empty(name: impl Into<String>, private: bool) -> Self {
        Self {
            name: name.into(),
            private,
            auto_init: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub clone_url: String,
    pub html_url: String,
    #[serde(default)]
    pub default_branch: Option<String>,
}

/// The signed-in account and the OAuth scopes its token carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub login: String,
    pub scopes: Vec<String>,
}

impl Account {
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }
}
