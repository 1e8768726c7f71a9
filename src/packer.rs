//! Greedy packing of policy statements into combined documents.
//!
//! Documents are taken in order and never split: all statements of one
//! source policy land in the same combined document. A new combined
//! document is started whenever the next source's statements would push the
//! current one past the remote length limit. Sources that are already over
//! the limit on their own are handed back untouched as passthrough.

use std::mem;

use tracing::debug;

use crate::types::PolicyDocument;

/// Maximum length of a policy document accepted by the remote service.
pub const MAX_POLICY_DOCUMENT_LEN: usize = 6144;

/// Length of the wrapper around the statement list in a combined document.
pub const POLICY_WRAPPER_OVERHEAD: usize = 30;

const WRAPPER_PREFIX: &str = r#"{"Version":"1","Statement":["#;
const WRAPPER_SUFFIX: &str = "]}";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackOutcome {
    /// Combined documents, ready to be created remotely.
    pub packed: Vec<String>,
    /// Sources too large to pack, in input order.
    pub passthrough: Vec<PolicyDocument>,
}

/// Wrap a comma-joined statement list in a combined policy document.
pub fn wrap_statements(statements: &str) -> String {
    format!("{WRAPPER_PREFIX}{statements}{WRAPPER_SUFFIX}")
}

/// Pack `documents` into as few combined documents as the greedy pass allows.
///
/// A group is closed when appending the next source would exceed
/// `budget` once `overhead` is added. A source whose statements alone exceed
/// the budget still gets a group of its own.
pub fn pack(documents: &[PolicyDocument], budget: usize, overhead: usize) -> PackOutcome {
    let mut passthrough = Vec::new();
    let mut groups: Vec<String> = Vec::new();
    let mut current = String::new();

    for document in documents {
        if document.len() > budget {
            debug!(
                event = "Pack",
                phase = "Passthrough",
                policy = document.name(),
                length = document.len()
            );
            passthrough.push(document.clone());
            continue;
        }

        let statements = document.statements_json();
        if statements.is_empty() {
            debug!(event = "Pack", phase = "Empty", policy = document.name());
            continue;
        }

        if !current.is_empty() && current.len() + 1 + statements.len() + overhead > budget {
            debug!(
                event = "Pack",
                phase = "CloseGroup",
                group = groups.len() + 1,
                length = current.len() + overhead
            );
            groups.push(mem::take(&mut current));
        }

        if !current.is_empty() {
            current.push(',');
        }
        current.push_str(&statements);
    }

    if !current.is_empty() {
        groups.push(current);
    }

    PackOutcome {
        packed: groups.iter().map(|group| wrap_statements(group)).collect(),
        passthrough,
    }
}

/// [`pack`] with the remote service's limits.
pub fn pack_default(documents: &[PolicyDocument]) -> PackOutcome {
    pack(documents, MAX_POLICY_DOCUMENT_LEN, POLICY_WRAPPER_OVERHEAD)
}
