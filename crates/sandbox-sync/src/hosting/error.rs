use thiserror::Error;

#[derive(Error, Debug)]
pub enum HostingError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GitHub API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Hosting API returned no push URL")]
    MissingPushUrl,

    #[error("Invalid hosting API URL: {0}")]
    InvalidUrl(String),
}

impl HostingError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, HostingError::Status { status: 401 | 403, .. })
    }
}

pub type Result<T> = std::result::Result<T, HostingError>;
