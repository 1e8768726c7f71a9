//! References to the source policies a caller wants attached.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::PolicyError;

use super::names::validate_name;
use super::policy_type::PolicyType;

/// A policy the caller wants attached, by name and optionally by type.
///
/// Without a type hint the type is resolved by trying each configured type
/// in order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct PolicyReference {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_hint: Option<PolicyType>,
}

impl PolicyReference {
    pub fn new(name: impl Into<String>) -> Self {
        PolicyReference {
            name: name.into(),
            type_hint: None,
        }
    }

    pub fn with_type(name: impl Into<String>, policy_type: PolicyType) -> Self {
        PolicyReference {
            name: name.into(),
            type_hint: Some(policy_type),
        }
    }

    /// The types to look this reference up under, in order.
    pub fn lookup_types(&self, types_to_try: &[PolicyType]) -> Vec<PolicyType> {
        match self.type_hint {
            Some(hint) => vec![hint],
            None => types_to_try.to_vec(),
        }
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        validate_name("policy", &self.name)
    }
}

impl Display for PolicyReference {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self.type_hint {
            Some(hint) => write!(f, "{hint}::{}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Accepts `Name` or `Type::Name`, e.g. `System::ReadOnlyAccess`.
impl FromStr for PolicyReference {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().trim_matches('"');
        let reference = match s.split_once("::") {
            Some((type_part, name)) => {
                let policy_type = PolicyType::from_str(type_part).map_err(|_| {
                    PolicyError::InvalidName(format!(
                        "unknown policy type '{type_part}' in '{s}' (expected Custom or System)"
                    ))
                })?;
                PolicyReference::with_type(name, policy_type)
            }
            None => PolicyReference::new(s),
        };
        reference.validate()?;
        Ok(reference)
    }
}

/// Validate references and drop repeats of the same name, keeping the first.
pub fn normalize_references(
    references: &[PolicyReference],
) -> Result<Vec<PolicyReference>, PolicyError> {
    references.iter().try_for_each(PolicyReference::validate)?;
    Ok(references
        .iter()
        .unique_by(|r| r.name.as_str())
        .cloned()
        .collect())
}
