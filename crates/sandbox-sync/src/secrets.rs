//! Credential resolution for hosting tokens.
//!
//! A token can come from three places, checked in order:
//!
//! 1. a direct value in the config file (`token`)
//! 2. a file holding the token (`tokenFile`), e.g. a mounted secret
//! 3. an environment variable (`tokenEnvVar`, `GITHUB_TOKEN` by default)

use secrecy::SecretString;
use std::fs;

/// Error type for secret resolution failures.
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No secret source provided (need one of: direct value, file path, or env var name)")]
    NoSourceProvided,

    #[error("Failed to read secret from file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Secret file '{0}' is empty")]
    EmptyFile(String),

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },
}

pub type Result<T> = std::result::Result<T, SecretError>;

/// Resolves a secret from the first non-empty source.
///
/// ```ignore
/// use sandbox_sync::secrets::resolve_secret;
///
/// let token = resolve_secret(None, Some("~/.config/gh-token"), Some("GITHUB_TOKEN"))?;
/// ```
pub fn resolve_secret(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<SecretString> {
    if let Some(value) = direct.filter(|v| !v.is_empty()) {
        return Ok(SecretString::from(value.to_string()));
    }

    if let Some(path) = file_path.filter(|p| !p.is_empty()) {
        let expanded = expand_home(path);
        let content = fs::read_to_string(&expanded).map_err(|e| SecretError::FileReadError {
            path: expanded.clone(),
            source: e,
        })?;
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(SecretError::EmptyFile(expanded));
        }
        return Ok(SecretString::from(trimmed.to_string()));
    }

    if let Some(var_name) = env_var.filter(|v| !v.is_empty()) {
        return match std::env::var(var_name) {
            // Env vars may carry trailing newlines
            Ok(value) => Ok(SecretString::from(value.trim().to_string())),
            Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                name: var_name.to_string(),
            }),
            Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                name: var_name.to_string(),
            }),
        };
    }

    Err(SecretError::NoSourceProvided)
}

/// Like [`resolve_secret`], but a missing token is `None`.
///
/// An unset environment variable also counts as missing: running without a
/// token is a supported mode (pull-only), not a configuration error.
pub fn resolve_secret_optional(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<Option<SecretString>> {
    match resolve_secret(direct, file_path, env_var) {
        Ok(secret) => Ok(Some(secret)),
        Err(SecretError::NoSourceProvided) | Err(SecretError::EnvVarNotSet { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Expands a leading `~` to the home directory. `~user/` is not supported.
fn expand_home(path: &str) -> String {
    let Some(home) = dirs::home_dir() else {
        return path.to_string();
    };

    if path == "~" {
        home.to_string_lossy().into_owned()
    } else if let Some(rest) = path.strip_prefix("~/") {
        home.join(rest).to_string_lossy().into_owned()
    } else {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    #[serial]
    fn test_direct_value_takes_priority() {
        std::env::set_var("SANDBOX_SYNC_TEST_TOKEN_1", "env_value");
        let result =
            resolve_secret(Some("direct_value"), None, Some("SANDBOX_SYNC_TEST_TOKEN_1")).unwrap();
        assert_eq!(result.expose_secret(), "direct_value");
        std::env::remove_var("SANDBOX_SYNC_TEST_TOKEN_1");
    }

    #[test]
    #[serial]
    fn test_file_takes_priority_over_env() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "ghp_from_file").unwrap();

        std::env::set_var("SANDBOX_SYNC_TEST_TOKEN_2", "env_value");
        let result = resolve_secret(
            None,
            Some(temp_file.path().to_str().unwrap()),
            Some("SANDBOX_SYNC_TEST_TOKEN_2"),
        )
        .unwrap();
        assert_eq!(result.expose_secret(), "ghp_from_file");
        std::env::remove_var("SANDBOX_SYNC_TEST_TOKEN_2");
    }

    #[test]
    #[serial]
    fn test_env_var_fallback_is_trimmed() {
        std::env::set_var("SANDBOX_SYNC_TEST_TOKEN_3", "ghp_env\n");
        let result = resolve_secret(None, None, Some("SANDBOX_SYNC_TEST_TOKEN_3")).unwrap();
        assert_eq!(result.expose_secret(), "ghp_env");
        std::env::remove_var("SANDBOX_SYNC_TEST_TOKEN_3");
    }

    #[test]
    fn test_no_source_error() {
        let result = resolve_secret(None, None, None);
        assert!(matches!(result, Err(SecretError::NoSourceProvided)));
    }

    #[test]
    fn test_empty_file_is_an_error() {
        let temp_file = NamedTempFile::new().unwrap();
        let result = resolve_secret(None, Some(temp_file.path().to_str().unwrap()), None);
        assert!(matches!(result, Err(SecretError::EmptyFile(_))));
    }

    #[test]
    fn test_file_not_found_error() {
        let result = resolve_secret(None, Some("/nonexistent/path/to/token"), None);
        assert!(matches!(result, Err(SecretError::FileReadError { .. })));
    }

    #[test]
    #[serial]
    fn test_optional_treats_unset_env_as_missing() {
        std::env::remove_var("SANDBOX_SYNC_TEST_TOKEN_UNSET");
        let result = resolve_secret_optional(None, None, Some("SANDBOX_SYNC_TEST_TOKEN_UNSET"));
        assert!(result.unwrap().is_none());
    }

    #[test]
    fn test_optional_still_reports_unreadable_file() {
        let result = resolve_secret_optional(None, Some("/nonexistent/token"), None);
        assert!(result.is_err());
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/absolute/path"), "/absolute/path");
        assert_eq!(expand_home("relative/path"), "relative/path");

        if let Some(home) = dirs::home_dir() {
            assert_eq!(
                expand_home("~/token"),
                home.join("token").to_string_lossy()
            );
            assert_eq!(expand_home("~"), home.to_string_lossy());
        }
    }
}
