//! The sync workflow: operations, their state machine and recovery offers.

pub mod capabilities;
pub mod operation;
pub mod orchestrator;
pub mod recovery;

pub use capabilities::SyncCapabilities;
pub use operation::{FailureRecord, OperationClass, OperationState, SyncOperation, SyncReport};
pub use orchestrator::{SyncOrchestrator, SyncServices};
pub use recovery::{fallback_branch_name, recovery_for, FailureContext, RecoveryAction};
