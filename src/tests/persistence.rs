//! The snapshot survives a trip through the host's storage.

use insta::assert_json_snapshot;
use utoipa::PartialSchema;

use crate::memory::InMemoryIam;
use crate::retry::BackoffSettings;
use crate::{
    EngineConfig, PolicyReference, PolicyType, ReconciliationController, ReconciliationSnapshot,
};

const ECS_READ: &str = r#"{"Version": "1", "Statement": [{"Effect": "Allow", "Action": ["ecs:Describe*"], "Resource": ["*"]}]}"#;

fn controller(iam: &InMemoryIam) -> ReconciliationController<&InMemoryIam> {
    let config = EngineConfig {
        backoff: BackoffSettings {
            initial_interval_ms: 1,
            multiplier: 2.0,
            max_interval_ms: 2,
            max_elapsed_ms: 30,
        },
        ..EngineConfig::default()
    };
    ReconciliationController::new(iam, config).unwrap()
}

#[test]
fn test_stored_snapshot_reads_back_clean() {
    let iam = InMemoryIam::new().with_policy("ecs-read", PolicyType::Custom, ECS_READ);
    let controller = controller(&iam);
    let created = controller
        .create(&[PolicyReference::new("ecs-read")], "alice")
        .unwrap();

    let stored = serde_json::to_string(&created).unwrap();
    let restored: ReconciliationSnapshot = serde_json::from_str(&stored).unwrap();

    assert_eq!(restored, created);
    assert_eq!(
        restored.source_detail[0].statements_json(),
        r#"{"Effect":"Allow","Action":["ecs:Describe*"],"Resource":["*"]}"#
    );
    assert!(!controller.read(&restored).unwrap().drift_found());
}

#[test]
fn test_drifted_snapshot_shape() {
    let iam = InMemoryIam::new().with_policy("ecs-read", PolicyType::Custom, ECS_READ);
    let controller = controller(&iam);
    let created = controller
        .create(&[PolicyReference::new("ecs-read")], "alice")
        .unwrap();
    iam.remove_policy("ecs-read", PolicyType::Custom);

    let report = controller.read(&created).unwrap();

    assert_json_snapshot!(report.snapshot, @r#"
    {
      "principal": "alice",
      "source_references": null,
      "combined_policies": [
        {
          "name": "alice-1",
          "document": "{\"Version\":\"1\",\"Statement\":[{\"Effect\":\"Allow\",\"Action\":[\"ecs:Describe*\"],\"Resource\":[\"*\"]}]}",
          "origin": "packed",
          "policy_type": "Custom"
        }
      ],
      "source_detail": []
    }
    "#);
    assert_json_snapshot!(report.findings, @r#"
    [
      {
        "kind": "source-policy-removed",
        "policy": "ecs-read"
      }
    ]
    "#);
}

#[test]
fn test_snapshot_schema_names_persisted_fields() {
    let schema = serde_json::to_value(ReconciliationSnapshot::schema()).unwrap();
    let properties = schema["properties"].as_object().unwrap();
    let mut names: Vec<&str> = properties.keys().map(String::as_str).collect();
    names.sort();
    assert_eq!(
        names,
        vec!["combined_policies", "principal", "source_detail", "source_references"]
    );
}
