//! Credentials and commit identity supplied to sync operations.

use secrecy::SecretString;

/// Username + credential for authenticated remote operations.
///
/// Absence of an `AuthInfo` disables push, gist create/update/fork and
/// repository creation.
#[derive(Clone)]
pub struct AuthInfo {
    pub username: String,
    pub token: SecretString,
}

impl AuthInfo {
    pub fn new(username: impl Into<String>, token: SecretString) -> Self {
        Self {
            username: username.into(),
            token,
        }
    }

    /// Commit identity derived from the account.
    pub fn identity(&self) -> GitIdentity {
        GitIdentity {
            name: self.username.clone(),
            email: format!("{}@users.noreply.github.com", self.username),
        }
    }
}

impl std::fmt::Debug for AuthInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthInfo")
            .field("username", &self.username)
            .field("token", &"****")
            .finish()
    }
}

/// Author used for save points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitIdentity {
    pub name: String,
    pub email: String,
}
