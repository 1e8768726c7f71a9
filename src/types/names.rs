//! Remote naming rules for principals and policies.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::PolicyError;

/// Names accepted by the remote service for users and policies.
static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9+=,.@_-]{1,64}$").expect("name pattern is valid"));

/// Check a principal or policy name against the remote naming rule.
pub fn validate_name(kind: &str, name: &str) -> Result<(), PolicyError> {
    if NAME_PATTERN.is_match(name) {
        Ok(())
    } else {
        Err(PolicyError::InvalidName(format!(
            "{kind} name '{name}' must be 1-64 characters of [A-Za-z0-9+=,.@_-]"
        )))
    }
}

/// Name of the `ordinal`-th (1-based) combined policy owned by `principal`.
pub fn combined_policy_name(principal: &str, ordinal: usize) -> String {
    format!("{principal}-{ordinal}")
}
