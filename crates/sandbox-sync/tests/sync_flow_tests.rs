//! Push, pull and recovery flows against recording fakes.

mod common;

use regex::Regex;

use common::{GitCall, TestHarness};
use sandbox_sync::alerts::AlertVariant;
use sandbox_sync::git::{BranchArgs, GitError, PushArgs};
use sandbox_sync::{OperationClass, OperationState, RecoveryAction, SyncError, SyncOperation};

fn rejected() -> GitError {
    GitError::PushRejected("! [rejected] main -> main (fetch first)".to_string())
}

#[tokio::test]
async fn test_push_saves_before_pushing() {
    let h = TestHarness::new();
    let w = h.git_workspace("Sandbox");
    let orchestrator = h.orchestrator();

    let report = orchestrator.push(&w.workspace_id).await.unwrap();

    assert_eq!(h.git.call_names(), vec!["commit", "push", "pull"]);
    assert_eq!(h.git.pushes(), vec![PushArgs::branch("origin", "main", false)]);
    assert!(report.save_point.is_some());
    assert_eq!(
        orchestrator.state(&w.workspace_id, OperationClass::Push),
        OperationState::Success(SyncOperation::Push {
            remote: "origin".to_string(),
            branch: "main".to_string(),
            force: false,
        })
    );

    let alert = h.alerts.current(OperationClass::Push).unwrap();
    assert_eq!(alert.variant, AlertVariant::Success);
    assert!(!alert.is_persistent());
}

#[tokio::test]
async fn test_first_push_is_never_forced() {
    let h = TestHarness::new();
    let w = h.git_workspace("Sandbox");
    let orchestrator = h.orchestrator();

    let err = orchestrator
        .execute(
            &w.workspace_id,
            SyncOperation::Push {
                remote: "origin".to_string(),
                branch: "main".to_string(),
                force: true,
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::ForceNotOffered(OperationClass::Push)));
    assert!(h.git.calls().is_empty());
}

#[tokio::test]
async fn test_rejected_push_offers_pull() {
    let h = TestHarness::new();
    let w = h.git_workspace("Sandbox");
    let orchestrator = h.orchestrator();
    h.git.fail_next("push", rejected());

    let err = orchestrator.push(&w.workspace_id).await.unwrap_err();
    assert!(matches!(err, SyncError::PushRejected { .. }));
    // No automatic merge after a rejection.
    assert_eq!(h.git.call_names(), vec!["commit", "push"]);

    let pull = RecoveryAction::Pull {
        remote: "origin".to_string(),
        branch: "main".to_string(),
    };
    match orchestrator.state(&w.workspace_id, OperationClass::Push) {
        OperationState::Failed { recovery, .. } => assert_eq!(recovery, pull),
        other => panic!("unexpected state {:?}", other),
    }
    let alert = h.alerts.current(OperationClass::Push).unwrap();
    assert_eq!(alert.variant, AlertVariant::Danger);
    assert_eq!(alert.actions, vec![pull, RecoveryAction::Dismiss]);

    h.git.clear();
    let report = orchestrator
        .apply_recovery(&w.workspace_id, OperationClass::Push)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(report.operation, SyncOperation::Pull { .. }));
    assert_eq!(h.git.call_names(), vec!["commit", "pull"]);
    assert!(h.alerts.current(OperationClass::Push).is_none());
}

#[tokio::test]
async fn test_recovery_can_be_accepted_by_a_later_orchestrator() {
    let h = TestHarness::new();
    let w = h.git_workspace("Sandbox");
    h.git.fail_next("push", rejected());
    h.orchestrator().push(&w.workspace_id).await.unwrap_err();

    let later = h.orchestrator();
    assert!(matches!(
        later.state(&w.workspace_id, OperationClass::Push),
        OperationState::Failed {
            recovery: RecoveryAction::Pull { .. },
            ..
        }
    ));

    h.git.clear();
    let report = later
        .apply_recovery(&w.workspace_id, OperationClass::Push)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(report.operation, SyncOperation::Pull { .. }));
    assert_eq!(h.git.call_names(), vec!["commit", "pull"]);

    assert_eq!(
        h.orchestrator().state(&w.workspace_id, OperationClass::Push),
        OperationState::Idle
    );
}

#[tokio::test]
async fn test_network_failure_offers_retry() {
    let h = TestHarness::new();
    let w = h.git_workspace("Sandbox");
    let orchestrator = h.orchestrator();
    h.git
        .fail_next("push", GitError::Network("Could not resolve host: github.com".to_string()));

    let err = orchestrator.push(&w.workspace_id).await.unwrap_err();
    assert!(matches!(err, SyncError::Network(_)));

    h.git.clear();
    orchestrator
        .apply_recovery(&w.workspace_id, OperationClass::Push)
        .await
        .unwrap();
    assert_eq!(h.git.call_names(), vec!["commit", "push", "pull"]);
}

#[tokio::test]
async fn test_missing_credential_fails_before_any_git_call() {
    let h = TestHarness::new();
    let w = h.git_workspace("Sandbox");
    let orchestrator = h.anonymous_orchestrator();

    let err = orchestrator.push(&w.workspace_id).await.unwrap_err();
    assert!(matches!(err, SyncError::AuthMissing(_)));
    assert!(h.git.calls().is_empty());

    let alert = h.alerts.current(OperationClass::Push).unwrap();
    assert!(alert.is_persistent());
    assert_eq!(alert.actions, vec![RecoveryAction::ConfigureCredential]);

    let err = orchestrator.create_gist(&h.local_workspace("Local").workspace_id).await.unwrap_err();
    assert!(matches!(err, SyncError::AuthMissing(_)));
    assert!(h.hosting.calls().is_empty());
}

#[tokio::test]
async fn test_origin_mismatch_has_no_side_effects() {
    let h = TestHarness::new();
    let w = h.local_workspace("Local");
    let orchestrator = h.orchestrator();

    let err = orchestrator.push(&w.workspace_id).await.unwrap_err();
    assert!(matches!(err, SyncError::OriginMismatch { .. }));
    assert!(h.git.calls().is_empty());
    assert!(h.alerts.visible().is_empty());
    assert_eq!(
        orchestrator.state(&w.workspace_id, OperationClass::Push),
        OperationState::Idle
    );
}

#[tokio::test]
async fn test_pull_failure_offers_new_branch() {
    let h = TestHarness::new();
    let w = h.git_workspace("Sandbox");
    let orchestrator = h.orchestrator();
    h.git
        .fail_next("pull", GitError::MergeConflict("CONFLICT (content)".to_string()));

    orchestrator.pull(&w.workspace_id, true).await.unwrap_err();

    let pattern = Regex::new(r"^main-[a-z0-9]+$").unwrap();
    let branch = match orchestrator.state(&w.workspace_id, OperationClass::Pull) {
        OperationState::Failed {
            recovery: RecoveryAction::PushNewBranch { branch },
            ..
        } => branch,
        other => panic!("unexpected state {:?}", other),
    };
    assert!(pattern.is_match(&branch), "{}", branch);
    assert_ne!(branch, "main");

    h.git.clear();
    let report = orchestrator
        .apply_recovery(&w.workspace_id, OperationClass::Pull)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        h.git.calls()[1],
        GitCall::Branch(BranchArgs {
            name: branch.clone(),
            checkout: false,
        })
    );
    assert_eq!(h.git.pushes(), vec![PushArgs::branch("origin", &branch, false)]);

    let redirect = report.redirect.unwrap();
    assert_eq!(redirect.pathname, "/import");
    assert_eq!(redirect.query_param("url").as_deref(), Some(common::harness::GIT_URL));
    assert_eq!(redirect.query_param("branch"), Some(branch));
    assert_eq!(
        orchestrator.state(&w.workspace_id, OperationClass::Pull),
        OperationState::Idle
    );
}

#[tokio::test]
async fn test_anonymous_pull_failure_asks_for_credential() {
    let h = TestHarness::new();
    let w = h.git_workspace("Sandbox");
    let orchestrator = h.anonymous_orchestrator();
    h.git
        .fail_next("pull", GitError::MergeConflict("CONFLICT (content)".to_string()));

    orchestrator.pull(&w.workspace_id, true).await.unwrap_err();

    let pattern = Regex::new(r"^main-[a-z0-9]+$").unwrap();
    let branch = match orchestrator.state(&w.workspace_id, OperationClass::Pull) {
        OperationState::Failed {
            recovery: RecoveryAction::ConfigureCredential,
            fallback_branch: Some(branch),
            ..
        } => branch,
        other => panic!("unexpected state {:?}", other),
    };
    assert!(pattern.is_match(&branch), "{}", branch);

    let alert = h.alerts.current(OperationClass::Pull).unwrap();
    assert_eq!(alert.actions[0], RecoveryAction::ConfigureCredential);
    let body = alert.body.unwrap();
    assert!(body.contains("authenticate"));
    assert!(body.contains(&branch));
}

#[tokio::test]
async fn test_silent_pull_shows_nothing() {
    let h = TestHarness::new();
    let w = h.git_workspace("Sandbox");
    let orchestrator = h.anonymous_orchestrator();

    orchestrator.pull(&w.workspace_id, false).await.unwrap();
    assert!(h.alerts.visible().is_empty());

    h.git
        .fail_next("pull", GitError::MergeConflict("CONFLICT (content)".to_string()));
    orchestrator.pull(&w.workspace_id, false).await.unwrap_err();
    assert!(h.alerts.visible().is_empty());
    assert!(matches!(
        orchestrator.state(&w.workspace_id, OperationClass::Pull),
        OperationState::Failed { .. }
    ));
}

#[tokio::test]
async fn test_reconciling_pull_failure_does_not_fail_push() {
    let h = TestHarness::new();
    let w = h.git_workspace("Sandbox");
    let orchestrator = h.orchestrator();
    h.git
        .fail_next("pull", GitError::MergeConflict("CONFLICT (content)".to_string()));

    orchestrator.push(&w.workspace_id).await.unwrap();
    assert_eq!(
        h.alerts.current(OperationClass::Push).unwrap().variant,
        AlertVariant::Success
    );
}

#[tokio::test]
async fn test_second_operation_of_a_class_is_refused() {
    let h = TestHarness::new();
    let w = h.git_workspace("Sandbox");
    let orchestrator = h.orchestrator();
    let gate = h.git.hold_pushes();

    let (first, second, _) = tokio::join!(
        orchestrator.push(&w.workspace_id),
        orchestrator.push(&w.workspace_id),
        async {
            tokio::task::yield_now().await;
            gate.notify_one();
        }
    );

    assert!(first.is_ok());
    assert!(matches!(
        second.unwrap_err(),
        SyncError::OperationInProgress(OperationClass::Push)
    ));
}

#[tokio::test]
async fn test_deleted_workspace_cancels_operation() {
    let h = TestHarness::new();
    let w = h.git_workspace("Sandbox");
    let orchestrator = h.orchestrator();
    let actions = h.actions();
    let gate = h.git.hold_pushes();

    let (pushed, deleted) = tokio::join!(orchestrator.push(&w.workspace_id), async {
        tokio::task::yield_now().await;
        let deleted = actions.delete(&w.workspace_id).await;
        gate.notify_one();
        deleted
    });

    deleted.unwrap();
    assert!(matches!(pushed.unwrap_err(), SyncError::Cancelled(_)));
    assert_eq!(
        orchestrator.state(&w.workspace_id, OperationClass::Push),
        OperationState::Idle
    );
}

#[tokio::test]
async fn test_one_alert_per_class_across_operations() {
    let h = TestHarness::new();
    let w = h.git_workspace("Sandbox");
    let orchestrator = h.orchestrator();

    orchestrator.push(&w.workspace_id).await.unwrap();
    h.git.fail_next("push", rejected());
    orchestrator.push(&w.workspace_id).await.unwrap_err();
    orchestrator.pull(&w.workspace_id, true).await.unwrap();

    let visible = h.alerts.visible();
    let classes: Vec<_> = visible.iter().map(|a| a.class).collect();
    assert_eq!(classes, vec![OperationClass::Push, OperationClass::Pull]);
}
