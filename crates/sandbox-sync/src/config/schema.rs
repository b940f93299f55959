use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::auth::{AuthInfo, GitIdentity};
use crate::secrets::{resolve_secret_optional, SecretError};

pub const GIT_ORIGIN_REMOTE_NAME: &str = "origin";
pub const GIST_ORIGIN_REMOTE_NAME: &str = "origin";
pub const GIST_DEFAULT_BRANCH: &str = "main";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_version")]
    pub version: String,
    /// Where workspace descriptors and working trees live.
    #[serde(default)]
    pub workspaces_directory: Option<String>,
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub git: GitConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub polling: PollingConfig,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            workspaces_directory: None,
            github: GitHubConfig::default(),
            git: GitConfig::default(),
            alerts: AlertsConfig::default(),
            polling: PollingConfig::default(),
        }
    }
}

impl SyncConfig {
    /// Resolved workspaces directory, defaulting to the platform data dir.
    pub fn workspaces_dir(&self) -> PathBuf {
        match &self.workspaces_directory {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("sandbox-sync")
                .join("workspaces"),
        }
    }

    /// Builds credentials from the GitHub section. `Ok(None)` means no token
    /// is configured, which leaves only unauthenticated operations available.
    pub fn auth_info(&self) -> Result<Option<AuthInfo>, SecretError> {
        let token = resolve_secret_optional(
            self.github.token.as_deref(),
            self.github.token_file.as_deref(),
            Some(self.github.token_env_var.as_str()),
        )?;

        Ok(match (token, &self.github.username) {
            (Some(token), Some(username)) if !username.is_empty() => {
                Some(AuthInfo::new(username.clone(), token))
            }
            (Some(_), _) => {
                log::warn!("GitHub token configured without a username; ignoring it");
                None
            }
            (None, _) => None,
        })
    }

    /// Commit identity: the account when signed in, the configured user otherwise.
    pub fn identity(&self, auth: Option<&AuthInfo>) -> GitIdentity {
        match auth {
            Some(auth) => auth.identity(),
            None => GitIdentity {
                name: self.git.user_name.clone(),
                email: self.git.user_email.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub username: Option<String>,
    /// Inline token. Prefer `token_file` or `token_env_var`.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub token_file: Option<String>,
    #[serde(default = "default_token_env_var")]
    pub token_env_var: String,
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_token_env_var() -> String {
    "GITHUB_TOKEN".to_string()
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            username: None,
            token: None,
            token_file: None,
            token_env_var: default_token_env_var(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitConfig {
    #[serde(default = "default_origin_remote")]
    pub origin_remote: String,
    #[serde(default = "default_origin_remote")]
    pub gist_remote: String,
    #[serde(default = "default_gist_branch")]
    pub gist_default_branch: String,
    #[serde(default = "default_save_point_message")]
    pub save_point_message: String,
    #[serde(default = "default_user_name")]
    pub user_name: String,
    #[serde(default = "default_user_email")]
    pub user_email: String,
}

fn default_origin_remote() -> String {
    GIT_ORIGIN_REMOTE_NAME.to_string()
}

fn default_gist_branch() -> String {
    GIST_DEFAULT_BRANCH.to_string()
}

fn default_save_point_message() -> String {
    "Save point".to_string()
}

fn default_user_name() -> String {
    "Sandbox User".to_string()
}

fn default_user_email() -> String {
    "sandbox@localhost".to_string()
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            origin_remote: default_origin_remote(),
            gist_remote: GIST_ORIGIN_REMOTE_NAME.to_string(),
            gist_default_branch: default_gist_branch(),
            save_point_message: default_save_point_message(),
            user_name: default_user_name(),
            user_email: default_user_email(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    /// How long success alerts stay visible.
    #[serde(default = "default_success_duration_secs")]
    pub success_duration_secs: u64,
}

fn default_success_duration_secs() -> u64 {
    4
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            success_duration_secs: default_success_duration_secs(),
        }
    }
}

impl AlertsConfig {
    pub fn success_duration(&self) -> Duration {
        Duration::from_secs(self.success_duration_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub deployment_interval_ms: u64,
    /// Endpoint answering with a JSON array of deployment statuses.
    #[serde(default)]
    pub deployment_status_url: Option<String>,
}

fn default_poll_interval_ms() -> u64 {
    5000
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            deployment_interval_ms: default_poll_interval_ms(),
            deployment_status_url: None,
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.deployment_interval_ms)
    }
}
