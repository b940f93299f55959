use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::origin::WorkspaceOrigin;

/// Persisted metadata of a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceDescriptor {
    pub workspace_id: String,
    pub name: String,
    pub origin: WorkspaceOrigin,
    pub created_date_iso: DateTime<Utc>,
    pub last_updated_date_iso: DateTime<Utc>,
    /// Name of the deployed service backing this workspace, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_resource_name: Option<String>,
}

impl WorkspaceDescriptor {
    pub fn new(workspace_id: impl Into<String>, name: impl Into<String>, origin: WorkspaceOrigin) -> Self {
        let now = Utc::now();
        Self {
            workspace_id: workspace_id.into(),
            name: name.into(),
            origin,
            created_date_iso: now,
            last_updated_date_iso: now,
            deployment_resource_name: None,
        }
    }

    pub fn touch(&mut self) {
        self.last_updated_date_iso = Utc::now();
    }
}

/// A file inside a workspace's working tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceFile {
    /// Path relative to the working tree, `/`-separated.
    pub relative_path: String,
    pub name: String,
}

impl WorkspaceFile {
    pub fn is_nested(&self) -> bool {
        self.relative_path.contains('/')
    }
}

/// Gists are flat; any file below a subdirectory disqualifies a workspace.
pub fn has_nested_directories(files: &[WorkspaceFile]) -> bool {
    files.iter().any(WorkspaceFile::is_nested)
}
