use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::descriptor::{WorkspaceDescriptor, WorkspaceFile};
use super::error::{Result, WorkspaceError};
use super::origin::WorkspaceOrigin;
use crate::sync::FailureRecord;

/// Persistence of workspace descriptors and their working trees.
pub trait WorkspaceStore: Send + Sync {
    /// All workspaces, most recently updated first.
    fn list(&self) -> Result<Vec<WorkspaceDescriptor>>;

    fn get(&self, workspace_id: &str) -> Result<WorkspaceDescriptor>;

    /// Allocates an id, writes the descriptor and creates an empty working tree.
    fn create(&self, name: &str, origin: WorkspaceOrigin) -> Result<WorkspaceDescriptor>;

    fn save(&self, descriptor: &WorkspaceDescriptor) -> Result<()>;

    /// Removes the descriptor and the working tree.
    fn delete(&self, workspace_id: &str) -> Result<()>;

    fn workspace_dir(&self, workspace_id: &str) -> PathBuf;

    fn files(&self, workspace_id: &str) -> Result<Vec<WorkspaceFile>>;

    /// Failed sync operations still offering a recovery. Empty when none
    /// were recorded.
    fn failures(&self, workspace_id: &str) -> Result<Vec<FailureRecord>>;

    /// Replaces the recorded failures; an empty slice clears them.
    fn save_failures(&self, workspace_id: &str, failures: &[FailureRecord]) -> Result<()>;

    fn rename(&self, workspace_id: &str, name: &str) -> Result<WorkspaceDescriptor> {
        let mut descriptor = self.get(workspace_id)?;
        descriptor.name = name.to_string();
        descriptor.touch();
        self.save(&descriptor)?;
        Ok(descriptor)
    }

    fn set_origin(&self, workspace_id: &str, origin: WorkspaceOrigin) -> Result<WorkspaceDescriptor> {
        let mut descriptor = self.get(workspace_id)?;
        descriptor.origin = origin;
        descriptor.touch();
        self.save(&descriptor)?;
        Ok(descriptor)
    }

    fn turn_into_gist(&self, workspace_id: &str, url: &str, branch: &str) -> Result<WorkspaceDescriptor> {
        self.set_origin(workspace_id, WorkspaceOrigin::gist(url, branch)?)
    }

    fn turn_into_git(&self, workspace_id: &str, url: &str, branch: &str) -> Result<WorkspaceDescriptor> {
        self.set_origin(workspace_id, WorkspaceOrigin::git(url, branch)?)
    }
}

/// Stores descriptors as `<root>/descriptors/<id>.json`, pending sync
/// failures beside them as `<id>.failures`, and working trees under
/// `<root>/workspaces/<id>/`.
pub struct FileWorkspaceStore {
    root: PathBuf,
}

impl FileWorkspaceStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn descriptors_dir(&self) -> PathBuf {
        self.root.join("descriptors")
    }

    fn descriptor_path(&self, workspace_id: &str) -> PathBuf {
        self.descriptors_dir().join(format!("{}.json", workspace_id))
    }

    fn failures_path(&self, workspace_id: &str) -> PathBuf {
        self.descriptors_dir().join(format!("{}.failures", workspace_id))
    }

    fn read_descriptor(&self, path: &Path) -> Result<WorkspaceDescriptor> {
        let content = std::fs::read_to_string(path).map_err(|e| WorkspaceError::ReadDescriptor {
            path: path.to_path_buf(),
            source: e,
        })?;
        let descriptor: WorkspaceDescriptor =
            serde_json::from_str(&content).map_err(|e| WorkspaceError::ParseDescriptor {
                path: path.to_path_buf(),
                source: e,
            })?;
        descriptor.origin.validate()?;
        Ok(descriptor)
    }
}

/// Write-then-rename so readers never observe a half-written file.
fn write_replacing(path: &Path, content: String) -> Result<()> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    std::fs::write(&tmp_path, content).map_err(|e| WorkspaceError::WriteDescriptor {
        path: tmp_path.clone(),
        source: e,
    })?;
    std::fs::rename(&tmp_path, path).map_err(|e| WorkspaceError::WriteDescriptor {
        path: path.to_path_buf(),
        source: e,
    })
}

fn check_id(workspace_id: &str) -> Result<()> {
    let valid = !workspace_id.is_empty()
        && workspace_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(WorkspaceError::NotFound(workspace_id.to_string()))
    }
}

impl WorkspaceStore for FileWorkspaceStore {
    fn list(&self) -> Result<Vec<WorkspaceDescriptor>> {
        let dir = self.descriptors_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut descriptors = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match self.read_descriptor(&path) {
                Ok(descriptor) => descriptors.push(descriptor),
                Err(e) => log::warn!("Skipping unreadable workspace descriptor: {}", e),
            }
        }

        descriptors.sort_by(|a, b| b.last_updated_date_iso.cmp(&a.last_updated_date_iso));
        Ok(descriptors)
    }

    fn get(&self, workspace_id: &str) -> Result<WorkspaceDescriptor> {
        check_id(workspace_id)?;
        let path = self.descriptor_path(workspace_id);
        if !path.exists() {
            return Err(WorkspaceError::NotFound(workspace_id.to_string()));
        }
        self.read_descriptor(&path)
    }

    fn create(&self, name: &str, origin: WorkspaceOrigin) -> Result<WorkspaceDescriptor> {
        origin.validate()?;
        let workspace_id = uuid::Uuid::new_v4().simple().to_string();
        let descriptor = WorkspaceDescriptor::new(workspace_id, name, origin);

        std::fs::create_dir_all(self.workspace_dir(&descriptor.workspace_id))?;
        self.save(&descriptor)?;

        log::info!(
            "Created workspace {} ({})",
            descriptor.workspace_id,
            descriptor.origin.kind()
        );
        Ok(descriptor)
    }

    fn save(&self, descriptor: &WorkspaceDescriptor) -> Result<()> {
        check_id(&descriptor.workspace_id)?;
        std::fs::create_dir_all(self.descriptors_dir())?;

        let path = self.descriptor_path(&descriptor.workspace_id);
        let content = serde_json::to_string_pretty(descriptor).map_err(|e| {
            WorkspaceError::ParseDescriptor {
                path: path.clone(),
                source: e,
            }
        })?;
        write_replacing(&path, content)
    }

    fn delete(&self, workspace_id: &str) -> Result<()> {
        check_id(workspace_id)?;
        let path = self.descriptor_path(workspace_id);
        if !path.exists() {
            return Err(WorkspaceError::NotFound(workspace_id.to_string()));
        }

        std::fs::remove_file(&path)?;
        let failures = self.failures_path(workspace_id);
        if failures.exists() {
            std::fs::remove_file(&failures)?;
        }
        let dir = self.workspace_dir(workspace_id);
        if dir.exists() {
            std::fs::remove_dir_all(&dir)?;
        }

        log::info!("Deleted workspace {}", workspace_id);
        Ok(())
    }

    fn workspace_dir(&self, workspace_id: &str) -> PathBuf {
        self.root.join("workspaces").join(workspace_id)
    }

    fn files(&self, workspace_id: &str) -> Result<Vec<WorkspaceFile>> {
        check_id(workspace_id)?;
        let dir = self.workspace_dir(workspace_id);
        if !dir.exists() {
            return Err(WorkspaceError::NotFound(workspace_id.to_string()));
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(&dir)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.file_name() != ".git");

        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&dir) else {
                continue;
            };
            let relative_path = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            files.push(WorkspaceFile {
                relative_path,
                name: entry.file_name().to_string_lossy().into_owned(),
            });
        }

        Ok(files)
    }

    fn failures(&self, workspace_id: &str) -> Result<Vec<FailureRecord>> {
        check_id(workspace_id)?;
        let path = self.failures_path(workspace_id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&path).map_err(|e| WorkspaceError::ReadDescriptor {
            path: path.clone(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| WorkspaceError::ParseDescriptor { path, source: e })
    }

    fn save_failures(&self, workspace_id: &str, failures: &[FailureRecord]) -> Result<()> {
        check_id(workspace_id)?;
        let path = self.failures_path(workspace_id);
        if failures.is_empty() {
            if path.exists() {
                std::fs::remove_file(&path)?;
            }
            return Ok(());
        }

        std::fs::create_dir_all(self.descriptors_dir())?;
        let content = serde_json::to_string_pretty(failures).map_err(|e| {
            WorkspaceError::ParseDescriptor {
                path: path.clone(),
                source: e,
            }
        })?;
        write_replacing(&path, content)
    }
}
