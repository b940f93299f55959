//! Alert builders for each step of the sync workflow.

use std::time::Duration;

use super::{Alert, AlertVariant};
use crate::sanitize::redact_repo_url;
use crate::sync::{OperationClass, RecoveryAction};

pub fn pushing(url: &str) -> Alert {
    Alert::new(
        OperationClass::Push,
        AlertVariant::Info,
        format!("Pushing to '{}'...", redact_repo_url(url)),
    )
}

pub fn push_success(url: &str, duration: Duration) -> Alert {
    Alert::new(
        OperationClass::Push,
        AlertVariant::Success,
        format!("Pushed to '{}'", redact_repo_url(url)),
    )
    .auto_close(duration)
}

pub fn push_error(url: &str, message: &str, recovery: RecoveryAction) -> Alert {
    let alert = Alert::new(
        OperationClass::Push,
        AlertVariant::Danger,
        format!("Error pushing to '{}'", redact_repo_url(url)),
    )
    .with_body(message);
    with_recovery(alert, recovery)
}

pub fn pulling(url: &str) -> Alert {
    Alert::new(
        OperationClass::Pull,
        AlertVariant::Info,
        format!("Pulling from '{}'...", redact_repo_url(url)),
    )
}

pub fn pull_success(url: &str, duration: Duration) -> Alert {
    Alert::new(
        OperationClass::Pull,
        AlertVariant::Success,
        format!("Pulled from '{}'", redact_repo_url(url)),
    )
    .auto_close(duration)
}

/// `fallback_branch` is the branch local work can move to; it is named in
/// the body even when signing in has to come first.
pub fn pull_error(url: &str, recovery: RecoveryAction, fallback_branch: Option<&str>) -> Alert {
    let hint = match (&recovery, fallback_branch) {
        (RecoveryAction::PushNewBranch { branch }, _) => {
            format!("You can still save your work to the new branch '{}'.", branch)
        }
        (RecoveryAction::ForcePushGist, _) => {
            "Gists have a single branch. Force pushing overwrites the Gist with your local changes."
                .to_string()
        }
        (_, Some(branch)) => format!(
            "To be able to save your work on a new branch ('{}'), please authenticate with GitHub.",
            branch
        ),
        (_, None) => {
            "To be able to save your work on a new branch, please authenticate with GitHub."
                .to_string()
        }
    };
    let alert = Alert::new(
        OperationClass::Pull,
        AlertVariant::Danger,
        format!("Error pulling from '{}'", redact_repo_url(url)),
    )
    .with_body(format!(
        "This usually happens when your branch has conflicts with the upstream branch. {}",
        hint
    ));
    with_recovery(alert, recovery)
}

pub fn gist_loading() -> Alert {
    Alert::new(OperationClass::Gist, AlertVariant::Info, "Uploading to GitHub Gist...")
}

pub fn gist_created(url: &str, duration: Duration) -> Alert {
    Alert::new(
        OperationClass::Gist,
        AlertVariant::Success,
        "Your Gist was created.",
    )
    .with_body(url)
    .auto_close(duration)
}

pub fn gist_updated(url: &str, duration: Duration) -> Alert {
    Alert::new(
        OperationClass::Gist,
        AlertVariant::Success,
        "Your Gist was updated.",
    )
    .with_body(url)
    .auto_close(duration)
}

/// Offered after a rejected gist update; force pushing is never automatic.
pub fn gist_push_error() -> Alert {
    Alert::new(
        OperationClass::Gist,
        AlertVariant::Danger,
        "Error updating Gist. Your Gist history diverged from the local workspace.",
    )
    .with_body("Force pushing will overwrite the Gist with your local changes. This cannot be undone.")
    .with_action(RecoveryAction::ForcePushGist)
    .with_action(RecoveryAction::Dismiss)
}

pub fn repository_created(url: &str, duration: Duration) -> Alert {
    Alert::new(
        OperationClass::Repository,
        AlertVariant::Success,
        "GitHub repository created.",
    )
    .with_body(url)
    .auto_close(duration)
}

pub fn redirecting(url: &str) -> Alert {
    Alert::new(
        OperationClass::Navigation,
        AlertVariant::Info,
        format!("Opening '{}'...", redact_repo_url(url)),
    )
}

pub fn unsaved_changes() -> Alert {
    Alert::new(
        OperationClass::Navigation,
        AlertVariant::Warning,
        "There are unsaved changes.",
    )
    .with_body("Save them or discard them before leaving this file.")
}

/// Generic failure for `class`, carrying the chosen recovery.
pub fn error(class: OperationClass, message: &str, recovery: RecoveryAction) -> Alert {
    let alert = Alert::new(class, AlertVariant::Danger, "An error happened.").with_body(message);
    with_recovery(alert, recovery)
}

/// Persistent call to action shown instead of attempting an authenticated call.
pub fn configure_credential(class: OperationClass, action: &str) -> Alert {
    Alert::new(
        class,
        AlertVariant::Warning,
        format!("A GitHub token is required to {}.", action),
    )
    .with_action(RecoveryAction::ConfigureCredential)
}

fn with_recovery(alert: Alert, recovery: RecoveryAction) -> Alert {
    match recovery {
        RecoveryAction::Dismiss => alert.with_action(RecoveryAction::Dismiss),
        other => alert.with_action(other).with_action(RecoveryAction::Dismiss),
    }
}
