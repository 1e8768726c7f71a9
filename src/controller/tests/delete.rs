use super::*;
use crate::error::ApplyStage;

#[test]
fn test_delete_removes_owned_and_detaches_passthrough() {
    let iam = seeded();
    seed_large(&iam, "AdministratorAccess", PolicyType::System, 10, 700);
    let controller = controller(&iam);
    let snapshot = controller
        .create(&refs(&["ecs-read", "AdministratorAccess"]), "alice")
        .unwrap();

    controller.delete(&snapshot).unwrap();

    assert!(iam.attached("alice").is_empty());
    assert!(iam.policy_document("alice-1", PolicyType::Custom).is_none());
    assert!(
        iam.policy_document("AdministratorAccess", PolicyType::System)
            .is_some()
    );
}

#[test]
fn test_delete_after_external_cleanup() {
    let iam = seeded();
    let controller = controller(&iam);
    let snapshot = controller.create(&refs(&["ecs-read"]), "alice").unwrap();
    iam.detach_externally("alice", "alice-1");
    iam.remove_policy("alice-1", PolicyType::Custom);

    controller.delete(&snapshot).unwrap();
}

#[test]
fn test_delete_aborts_on_first_failure() {
    let iam = seeded();
    seed_large(&iam, "big-a", PolicyType::Custom, 1, 4000);
    seed_large(&iam, "big-b", PolicyType::Custom, 1, 4000);
    let controller = controller(&iam);
    let snapshot = controller.create(&refs(&["big-a", "big-b"]), "alice").unwrap();
    iam.inject(Fault::new(Operation::DetachPolicy, "AccessDenied.IAMUnauthorized").for_name("alice-1"));

    let err = controller.delete(&snapshot).unwrap_err();

    assert!(matches!(
        err,
        PolicyError::Remote { .. }
    ));
    assert_eq!(iam.attached_names("alice"), vec!["alice-1", "alice-2"]);

    iam.clear_faults();
    iam.inject(Fault::new(Operation::DetachPolicy, "AccessDenied.IAMUnauthorized").for_name("alice-2"));
    let err = controller.delete(&snapshot).unwrap_err();
    assert!(matches!(
        err,
        PolicyError::PartialApply { stage: ApplyStage::Detach, .. }
    ));
    assert_eq!(iam.attached_names("alice"), vec!["alice-2"]);
}

#[test]
fn test_delete_retries_throttled_calls() {
    let iam = seeded();
    let controller = controller(&iam);
    let snapshot = controller.create(&refs(&["ecs-read"]), "alice").unwrap();
    iam.inject(Fault::new(Operation::DeletePolicy, "Throttling.User").times(2));

    controller.delete(&snapshot).unwrap();

    assert_eq!(iam.call_count(Operation::DeletePolicy), 3);
    assert!(iam.policy_document("alice-1", PolicyType::Custom).is_none());
}

#[test]
fn test_delete_empty_snapshot_makes_no_calls() {
    let iam = InMemoryIam::new();
    let snapshot = ReconciliationSnapshot {
        principal: "alice".to_string(),
        source_references: Some(vec![]),
        combined_policies: vec![],
        source_detail: vec![],
    };
    controller(&iam).delete(&snapshot).unwrap();
    assert!(iam.calls().is_empty());
}
