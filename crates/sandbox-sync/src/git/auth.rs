//! Credential plumbing for git subprocesses.

use std::path::PathBuf;

use secrecy::ExposeSecret;

use super::error::{GitError, Result};
use crate::auth::AuthInfo;

/// Escapes a value for a single-quoted shell string.
pub fn shell_escape(value: &str) -> String {
    value.replace('\'', "'\\''")
}

#[cfg(windows)]
fn escape_for_batch(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() * 2);
    for ch in value.chars() {
        match ch {
            '%' => escaped.push_str("%%"),
            '^' | '&' | '|' | '<' | '>' | '(' | ')' | '"' => {
                escaped.push('^');
                escaped.push(ch);
            }
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Deletes the askpass script on drop so the token never outlives the command.
#[derive(Debug)]
pub struct AskpassCleanup {
    path: Option<PathBuf>,
}

impl AskpassCleanup {
    fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    fn empty() -> Self {
        Self { path: None }
    }
}

impl Drop for AskpassCleanup {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            if let Err(e) = std::fs::remove_file(&path) {
                log::warn!("Failed to clean up askpass script: {}", e);
            }
        }
    }
}

/// Environment for one git invocation. Keep it alive until the child exits.
#[derive(Debug)]
pub struct AuthEnv {
    pub env_vars: Vec<(String, String)>,
    _cleanup: AskpassCleanup,
}

impl AuthEnv {
    /// No credentials; git must fail instead of prompting on a terminal.
    pub fn anonymous() -> Self {
        Self {
            env_vars: vec![("GIT_TERMINAL_PROMPT".to_string(), "0".to_string())],
            _cleanup: AskpassCleanup::empty(),
        }
    }
}

/// Builds a `GIT_ASKPASS` environment answering username and password prompts.
pub fn build_auth_env(auth: Option<&AuthInfo>) -> Result<AuthEnv> {
    let Some(auth) = auth else {
        return Ok(AuthEnv::anonymous());
    };

    let random_suffix = uuid::Uuid::new_v4().simple().to_string();
    let temp_dir = std::env::temp_dir();

    #[cfg(unix)]
    let (askpass_path, script) = {
        let path = temp_dir.join(format!(".sandbox-askpass-{}.sh", random_suffix));
        let script = format!(
            "#!/bin/sh\ncase \"$1\" in\n  Username*) echo '{}' ;;\n  *) echo '{}' ;;\nesac\n",
            shell_escape(&auth.username),
            shell_escape(auth.token.expose_secret())
        );
        (path, script)
    };

    #[cfg(windows)]
    let (askpass_path, script) = {
        let path = temp_dir.join(format!(".sandbox-askpass-{}.bat", random_suffix));
        let script = format!(
            "@echo off\r\nset prompt=%~1\r\nif /i \"%prompt:~0,8%\"==\"Username\" (echo {}) else (echo {})\r\n",
            escape_for_batch(&auth.username),
            escape_for_batch(auth.token.expose_secret())
        );
        (path, script)
    };

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o700)
            .open(&askpass_path)?;
        std::io::Write::write_all(&mut file, script.as_bytes())?;
    }

    #[cfg(not(unix))]
    {
        std::fs::write(&askpass_path, &script)?;
    }

    let cleanup = AskpassCleanup::new(askpass_path.clone());

    let askpass = askpass_path
        .to_str()
        .ok_or_else(|| {
            GitError::AuthFailed("Temp directory path contains non-UTF8 characters".to_string())
        })?
        .to_string();

    Ok(AuthEnv {
        env_vars: vec![
            ("GIT_ASKPASS".to_string(), askpass),
            ("GIT_TERMINAL_PROMPT".to_string(), "0".to_string()),
        ],
        _cleanup: cleanup,
    })
}
