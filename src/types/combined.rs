//! Policies the engine attaches to a principal.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};
use utoipa::ToSchema;

use super::document::PolicyDocument;
use super::names::combined_policy_name;
use super::policy_type::PolicyType;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, Display, AsRefStr,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum PolicyOrigin {
    /// Created by the engine from packed statements. The engine owns it.
    Packed,
    /// A source policy too large to pack, attached as-is under its own name.
    PassthroughOversized,
}

/// A policy attached to the principal on the engine's behalf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CombinedPolicy {
    pub name: String,
    pub document: String,
    pub origin: PolicyOrigin,
    pub policy_type: PolicyType,
}

impl CombinedPolicy {
    /// The `ordinal`-th (1-based) packed policy for `principal`.
    pub fn packed(principal: &str, ordinal: usize, document: String) -> Self {
        CombinedPolicy {
            name: combined_policy_name(principal, ordinal),
            document,
            origin: PolicyOrigin::Packed,
            policy_type: PolicyType::Custom,
        }
    }

    pub fn passthrough(source: &PolicyDocument) -> Self {
        CombinedPolicy {
            name: source.name().to_string(),
            document: source.raw_document().to_string(),
            origin: PolicyOrigin::PassthroughOversized,
            policy_type: source.policy_type(),
        }
    }

    /// Whether the engine created this policy and may delete it.
    pub fn is_owned(&self) -> bool {
        self.origin == PolicyOrigin::Packed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_is_owned_custom() {
        let policy = CombinedPolicy::packed("alice", 2, "{}".to_string());
        assert_eq!(policy.name, "alice-2");
        assert_eq!(policy.policy_type, PolicyType::Custom);
        assert!(policy.is_owned());
    }

    #[test]
    fn test_passthrough_keeps_source_identity() {
        let raw = r#"{"Version":"1","Statement":[{"Effect":"Allow","Action":"*"}]}"#;
        let source = PolicyDocument::parse("AdministratorAccess", PolicyType::System, raw).unwrap();
        let policy = CombinedPolicy::passthrough(&source);
        assert_eq!(policy.name, "AdministratorAccess");
        assert_eq!(policy.document, raw);
        assert_eq!(policy.policy_type, PolicyType::System);
        assert_eq!(policy.origin.to_string(), "passthrough-oversized");
        assert!(!policy.is_owned());
    }
}
