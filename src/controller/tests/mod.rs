use super::*;
use crate::memory::{Fault, InMemoryIam, Operation};
use crate::packer::wrap_statements;
use crate::retry::BackoffSettings;
use crate::types::PolicyType;

mod delete;
mod update;

const ECS_READ: &str = r#"{"Version":"1","Statement":[{"Effect":"Allow","Action":["ecs:Describe*","ecs:List*"],"Resource":["*"]}]}"#;
const READ_ONLY: &str = r#"{"Version":"1","Statement":[{"Effect":"Allow","Action":["*:Get*","*:List*"],"Resource":["*"]}]}"#;
const VPC_ADMIN: &str = r#"{"Version":"1","Statement":[{"Effect":"Allow","Action":["vpc:*"],"Resource":["*"]},{"Effect":"Deny","Action":["vpc:DeleteVpc"],"Resource":["*"]}]}"#;

fn fast_config() -> EngineConfig {
    EngineConfig {
        backoff: BackoffSettings {
            initial_interval_ms: 1,
            multiplier: 2.0,
            max_interval_ms: 2,
            max_elapsed_ms: 30,
        },
        ..EngineConfig::default()
    }
}

fn controller(iam: &InMemoryIam) -> ReconciliationController<&InMemoryIam> {
    ReconciliationController::new(iam, fast_config()).unwrap()
}

/// A remote service holding `ecs-read` (Custom), `vpc-admin` (Custom) and
/// `ReadOnlyAccess` (System).
fn seeded() -> InMemoryIam {
    InMemoryIam::new()
        .with_policy("ecs-read", PolicyType::Custom, ECS_READ)
        .with_policy("vpc-admin", PolicyType::Custom, VPC_ADMIN)
        .with_policy("ReadOnlyAccess", PolicyType::System, READ_ONLY)
}

/// Store a policy with `count` statements padded to about `pad` bytes each.
fn seed_large(iam: &InMemoryIam, name: &str, policy_type: PolicyType, count: usize, pad: usize) {
    let statements: Vec<String> = (0..count)
        .map(|i| {
            format!(
                r#"{{"Sid":"{name}{i}","Effect":"Allow","Action":"{}"}}"#,
                "a".repeat(pad)
            )
        })
        .collect();
    iam.put_policy(name, policy_type, &wrap_statements(&statements.join(",")));
}

fn refs(names: &[&str]) -> Vec<PolicyReference> {
    names.iter().map(|name| name.parse().unwrap()).collect()
}

#[test]
fn test_new_rejects_invalid_config() {
    let iam = InMemoryIam::new();
    let config = EngineConfig {
        types_to_try: vec![],
        ..EngineConfig::default()
    };
    assert!(matches!(
        ReconciliationController::new(&iam, config),
        Err(PolicyError::InvalidConfig(_))
    ));
}

#[test]
fn test_full_lifecycle() {
    let iam = seeded();
    let controller = controller(&iam);

    let created = controller
        .create(&refs(&["ecs-read", "ReadOnlyAccess"]), "alice")
        .unwrap();
    assert_eq!(iam.attached_names("alice"), vec!["alice-1"]);

    let read = controller.read(&created).unwrap();
    assert!(!read.drift_found());

    let updated = controller
        .update(&refs(&["vpc-admin"]), "alice", &read.snapshot)
        .unwrap();
    assert_eq!(updated.source_detail.len(), 1);
    assert!(
        iam.policy_document("alice-1", PolicyType::Custom)
            .unwrap()
            .contains("vpc:DeleteVpc")
    );

    controller.delete(&updated).unwrap();
    assert!(iam.attached("alice").is_empty());
    assert_eq!(iam.custom_policy_names(), vec!["ecs-read", "vpc-admin"]);
}
