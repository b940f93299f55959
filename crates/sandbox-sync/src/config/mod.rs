pub mod loader;
pub mod schema;

pub use loader::{default_config_path, load_config, load_config_from_str, load_config_or_default};
pub use schema::{
    AlertsConfig, GitConfig, GitHubConfig, PollingConfig, SyncConfig, GIST_DEFAULT_BRANCH,
    GIST_ORIGIN_REMOTE_NAME, GIT_ORIGIN_REMOTE_NAME,
};
