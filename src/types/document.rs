//! Fetched policy documents and their statements.
//!
//! A document is decoded exactly once, when it arrives from the remote
//! service. Everything downstream works on the typed statement list and
//! never re-parses the raw text.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::error::PolicyError;

use super::policy_type::PolicyType;

/// One permission rule from a policy document.
///
/// Statements are opaque to the engine. They serialize compactly with their
/// keys in the order the remote service returned them.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement(Value);

impl Statement {
    pub fn new(value: Value) -> Self {
        Statement(value)
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn to_json(&self) -> String {
        self.0.to_string()
    }
}

/// A source policy as last fetched from the remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PolicyRecord", into = "PolicyRecord")]
pub struct PolicyDocument {
    name: String,
    policy_type: PolicyType,
    raw_document: String,
    statements: Vec<Statement>,
}

impl PolicyDocument {
    /// Decode `raw_document` and extract its statements.
    ///
    /// `Statement` may be an array of objects or a single object.
    pub fn parse(
        name: impl Into<String>,
        policy_type: PolicyType,
        raw_document: impl Into<String>,
    ) -> Result<Self, PolicyError> {
        let name = name.into();
        let raw_document = raw_document.into();
        let parse_error = |reason: String| PolicyError::ParseError {
            name: name.clone(),
            reason,
        };

        let body: Value =
            serde_json::from_str(&raw_document).map_err(|e| parse_error(e.to_string()))?;
        let statements = match body.get("Statement") {
            Some(Value::Array(items)) => items.clone(),
            Some(item @ Value::Object(_)) => vec![item.clone()],
            Some(other) => {
                return Err(parse_error(format!(
                    "\"Statement\" must be an array or an object, found {other}"
                )));
            }
            None => return Err(parse_error("missing \"Statement\"".to_string())),
        };
        if let Some(bad) = statements.iter().find(|s| !s.is_object()) {
            return Err(parse_error(format!("statement {bad} is not an object")));
        }

        Ok(PolicyDocument {
            statements: statements.into_iter().map(Statement).collect(),
            name,
            policy_type,
            raw_document,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy_type(&self) -> PolicyType {
        self.policy_type
    }

    /// The document exactly as the remote service returned it.
    pub fn raw_document(&self) -> &str {
        &self.raw_document
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// The statements serialized and comma-joined, without brackets.
    pub fn statements_json(&self) -> String {
        self.statements.iter().map(Statement::to_json).join(",")
    }

    /// Byte length of the raw document, as the remote service measures it.
    pub fn len(&self) -> usize {
        self.raw_document.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw_document.is_empty()
    }
}

/// Persisted form of a [`PolicyDocument`]; statements are re-derived on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PolicyRecord {
    pub policy_name: String,
    pub policy_type: PolicyType,
    pub policy_document: String,
}

impl TryFrom<PolicyRecord> for PolicyDocument {
    type Error = PolicyError;

    fn try_from(record: PolicyRecord) -> Result<Self, Self::Error> {
        PolicyDocument::parse(
            record.policy_name,
            record.policy_type,
            record.policy_document,
        )
    }
}

impl From<PolicyDocument> for PolicyRecord {
    fn from(document: PolicyDocument) -> Self {
        PolicyRecord {
            policy_name: document.name,
            policy_type: document.policy_type,
            policy_document: document.raw_document,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;
    use yare::parameterized;

    const TWO_STATEMENTS: &str = r#"{
    "Version": "1",
    "Statement": [
        {"Effect": "Allow", "Action": ["ecs:Describe*"], "Resource": ["*"]},
        {"Effect": "Deny", "Action": ["iam:*"], "Resource": ["*"], "Condition": {"Bool": {"mfa": "false"}}}
    ]
}"#;

    #[test]
    fn test_parse_extracts_statements_in_order() {
        let doc = PolicyDocument::parse("ops", PolicyType::Custom, TWO_STATEMENTS).unwrap();
        assert_eq!(doc.name(), "ops");
        assert_eq!(doc.policy_type(), PolicyType::Custom);
        assert_eq!(doc.statements().len(), 2);
        assert_eq!(doc.raw_document(), TWO_STATEMENTS);
        assert_snapshot!(doc.statements_json(), @r#"{"Effect":"Allow","Action":["ecs:Describe*"],"Resource":["*"]},{"Effect":"Deny","Action":["iam:*"],"Resource":["*"],"Condition":{"Bool":{"mfa":"false"}}}"#);
    }

    #[test]
    fn test_nested_braces_survive() {
        let raw = r#"{"Version":"1","Statement":[{"Effect":"Allow","Action":["a:*"],"Condition":{"StringLike":{"k":"},{"}}},{"Effect":"Allow","Action":["b:*"]}]}"#;
        let doc = PolicyDocument::parse("tricky", PolicyType::Custom, raw).unwrap();
        assert_eq!(doc.statements().len(), 2);
        assert_eq!(
            doc.statements()[0].value()["Condition"]["StringLike"]["k"],
            "},{"
        );
    }

    #[test]
    fn test_single_statement_object() {
        let raw = r#"{"Version":"1","Statement":{"Effect":"Allow","Action":"*"}}"#;
        let doc = PolicyDocument::parse("one", PolicyType::System, raw).unwrap();
        assert_eq!(doc.statements().len(), 1);
        assert_eq!(doc.statements_json(), r#"{"Effect":"Allow","Action":"*"}"#);
    }

    #[test]
    fn test_empty_statement_array() {
        let doc = PolicyDocument::parse("none", PolicyType::Custom, r#"{"Statement":[]}"#).unwrap();
        assert!(doc.statements().is_empty());
        assert_eq!(doc.statements_json(), "");
    }

    #[parameterized(
        not_json = { "Statement: []" },
        missing_statement = { r#"{"Version":"1"}"# },
        string_statement = { r#"{"Statement":"Allow"}"# },
        scalar_in_array = { r#"{"Statement":[1]}"# },
    )]
    fn test_parse_rejects(raw: &str) {
        let err = PolicyDocument::parse("broken", PolicyType::Custom, raw).unwrap_err();
        assert!(matches!(err, PolicyError::ParseError { name, .. } if name == "broken"));
    }

    #[test]
    fn test_serializes_as_record() {
        let doc = PolicyDocument::parse("ops", PolicyType::Custom, TWO_STATEMENTS).unwrap();
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["policy_name"], "ops");
        assert_eq!(json["policy_type"], "Custom");
        assert_eq!(json["policy_document"], TWO_STATEMENTS);

        let back: PolicyDocument = serde_json::from_value(json).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_deserializing_invalid_record_fails() {
        let json = r#"{"policy_name":"x","policy_type":"Custom","policy_document":"nope"}"#;
        assert!(serde_json::from_str::<PolicyDocument>(json).is_err());
    }
}
