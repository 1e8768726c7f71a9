//! The durable record of one reconciliation cycle.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::combined::CombinedPolicy;
use super::document::{PolicyDocument, PolicyRecord};
use super::reference::PolicyReference;

/// State persisted by the host between lifecycle calls.
///
/// `source_references` is `None` when drift was detected: the recorded
/// desired state no longer matches the remote state and the host should run
/// an update on its next cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ReconciliationSnapshot {
    pub principal: String,
    pub source_references: Option<Vec<PolicyReference>>,
    pub combined_policies: Vec<CombinedPolicy>,
    #[schema(value_type = Vec<PolicyRecord>)]
    pub source_detail: Vec<PolicyDocument>,
}

impl ReconciliationSnapshot {
    pub fn is_drifted(&self) -> bool {
        self.source_references.is_none()
    }

    /// Replace the reference list with the unknown sentinel.
    pub fn mark_drifted(&mut self) {
        self.source_references = None;
    }

    /// The references to re-fetch on read.
    ///
    /// Falls back to the names and types recorded in `source_detail` once the
    /// reference list has been cleared by an earlier drift.
    pub fn tracked_references(&self) -> Vec<PolicyReference> {
        match &self.source_references {
            Some(references) => references.clone(),
            None => self
                .source_detail
                .iter()
                .map(|doc| PolicyReference::with_type(doc.name(), doc.policy_type()))
                .collect(),
        }
    }

    /// The recorded document for a source policy, by name.
    pub fn recorded_source(&self, name: &str) -> Option<&PolicyDocument> {
        self.source_detail.iter().find(|doc| doc.name() == name)
    }
}
