//! Workspaces: descriptors, origins, on-disk storage and user actions.

pub mod actions;
pub mod descriptor;
pub mod error;
pub mod origin;
pub mod store;

pub use actions::{RenameOutcome, WorkspaceActions};
pub use descriptor::{has_nested_directories, WorkspaceDescriptor, WorkspaceFile};
pub use error::WorkspaceError;
pub use origin::{gist_id_from_url, WorkspaceKind, WorkspaceOrigin};
pub use store::{FileWorkspaceStore, WorkspaceStore};
