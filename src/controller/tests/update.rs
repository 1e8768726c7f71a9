use super::*;
use crate::error::ApplyStage;

#[test]
fn test_update_replaces_combined_policies() {
    let iam = seeded();
    let controller = controller(&iam);
    let prior = controller
        .create(&refs(&["ecs-read", "ReadOnlyAccess"]), "alice")
        .unwrap();

    let updated = controller
        .update(&refs(&["vpc-admin"]), "alice", &prior)
        .unwrap();

    assert_eq!(updated.source_references, Some(refs(&["vpc-admin"])));
    assert_eq!(iam.attached_names("alice"), vec!["alice-1"]);
    let document = iam.policy_document("alice-1", PolicyType::Custom).unwrap();
    assert!(document.contains("vpc:DeleteVpc"));
    assert!(!document.contains("ecs:"));
    assert_eq!(iam.call_count(Operation::DeletePolicy), 1);
}

#[test]
fn test_update_shrinks_from_two_policies_to_one() {
    let iam = seeded();
    seed_large(&iam, "big-a", PolicyType::Custom, 1, 4000);
    seed_large(&iam, "big-b", PolicyType::Custom, 1, 4000);
    let controller = controller(&iam);
    let prior = controller.create(&refs(&["big-a", "big-b"]), "alice").unwrap();
    assert_eq!(prior.combined_policies.len(), 2);

    controller
        .update(&refs(&["ecs-read"]), "alice", &prior)
        .unwrap();

    assert_eq!(iam.attached_names("alice"), vec!["alice-1"]);
    assert!(iam.policy_document("alice-2", PolicyType::Custom).is_none());
}

#[test]
fn test_update_with_missing_source_changes_nothing() {
    let iam = seeded();
    let controller = controller(&iam);
    let prior = controller.create(&refs(&["ecs-read"]), "alice").unwrap();
    iam.clear_calls();

    let err = controller
        .update(&refs(&["ecs-read", "ghost"]), "alice", &prior)
        .unwrap_err();

    assert!(matches!(err, PolicyError::UnresolvedSources(_)));
    assert_eq!(iam.call_count(Operation::DetachPolicy), 0);
    assert_eq!(iam.call_count(Operation::DeletePolicy), 0);
    assert_eq!(iam.attached_names("alice"), vec!["alice-1"]);
}

#[test]
fn test_update_repairs_detached_policy() {
    let iam = seeded();
    let controller = controller(&iam);
    let created = controller.create(&refs(&["ecs-read"]), "alice").unwrap();
    iam.detach_externally("alice", "alice-1");

    let report = controller.read(&created).unwrap();
    assert!(report.snapshot.is_drifted());

    let repaired = controller
        .update(&refs(&["ecs-read"]), "alice", &report.snapshot)
        .unwrap();
    assert_eq!(iam.attached_names("alice"), vec!["alice-1"]);
    assert!(!controller.read(&repaired).unwrap().drift_found());
}

#[test]
fn test_update_repairs_deleted_policy() {
    let iam = seeded();
    let controller = controller(&iam);
    let created = controller.create(&refs(&["ecs-read"]), "alice").unwrap();
    iam.detach_externally("alice", "alice-1");
    iam.remove_policy("alice-1", PolicyType::Custom);

    let report = controller.read(&created).unwrap();
    let repaired = controller
        .update(&refs(&["ecs-read"]), "alice", &report.snapshot)
        .unwrap();

    assert_eq!(repaired.combined_policies.len(), 1);
    assert_eq!(iam.attached_names("alice"), vec!["alice-1"]);
}

#[test]
fn test_update_moves_to_another_principal() {
    let iam = seeded();
    let controller = controller(&iam);
    let prior = controller.create(&refs(&["ecs-read"]), "alice").unwrap();

    let moved = controller.update(&refs(&["ecs-read"]), "bob", &prior).unwrap();

    assert_eq!(moved.principal, "bob");
    assert!(iam.attached("alice").is_empty());
    assert_eq!(iam.attached_names("bob"), vec!["bob-1"]);
    assert!(iam.policy_document("alice-1", PolicyType::Custom).is_none());
}

#[test]
fn test_update_stops_when_removal_fails() {
    let iam = seeded();
    let controller = controller(&iam);
    let prior = controller.create(&refs(&["ecs-read"]), "alice").unwrap();
    iam.inject(Fault::new(Operation::DeletePolicy, "InvalidCredential"));

    let err = controller
        .update(&refs(&["vpc-admin"]), "alice", &prior)
        .unwrap_err();

    assert!(matches!(
        err,
        PolicyError::PartialApply { stage: ApplyStage::Delete, .. }
    ));
    assert_eq!(err.applied(), &["DetachPolicy(alice, alice-1)".to_string()]);
    assert!(
        iam.policy_document("alice-1", PolicyType::Custom)
            .unwrap()
            .contains("ecs:")
    );
}

#[test]
fn test_update_create_failure_reports_prior_removal() {
    let iam = seeded();
    let controller = controller(&iam);
    let prior = controller.create(&refs(&["ecs-read"]), "alice").unwrap();
    iam.inject(Fault::new(Operation::CreatePolicy, "InvalidCredential"));

    let err = controller
        .update(&refs(&["vpc-admin"]), "alice", &prior)
        .unwrap_err();

    assert!(matches!(
        err,
        PolicyError::PartialApply { stage: ApplyStage::Create, .. }
    ));
    assert_eq!(
        err.applied(),
        &[
            "DetachPolicy(alice, alice-1)".to_string(),
            "DeletePolicy(alice-1)".to_string(),
        ]
    );
    assert!(iam.policy_document("alice-1", PolicyType::Custom).is_none());
    assert!(iam.attached("alice").is_empty());
}

#[test]
fn test_update_rejects_name_clash_before_removal() {
    let iam = seeded();
    seed_large(&iam, "alice-1", PolicyType::Custom, 10, 700);
    let controller = controller(&iam);
    let prior = controller.create(&refs(&["ecs-read"]), "bob").unwrap();
    iam.clear_calls();

    let err = controller
        .update(&refs(&["ecs-read", "alice-1"]), "alice", &prior)
        .unwrap_err();

    assert!(matches!(err, PolicyError::InvalidName(_)));
    assert_eq!(iam.call_count(Operation::DetachPolicy), 0);
    assert_eq!(iam.attached_names("bob"), vec!["bob-1"]);
}
