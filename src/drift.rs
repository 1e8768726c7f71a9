//! Detection of changes made to the remote state behind the engine's back.

use std::fmt::{self, Display};

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display as StrumDisplay};
use tracing::{debug, info, warn};

use crate::classify::Absence;
use crate::error::PolicyError;
use crate::fetcher::PolicyFetcher;
use crate::retry::{RetryExecutor, by_intent};
use crate::traits::IamClient;
use crate::types::{CombinedPolicy, Diagnostics, PolicyType, ReconciliationSnapshot};

const COMBINED_REMOVED_SUMMARY: &str = "Combined Policies could not be found.";
const COMBINED_DETACHED_SUMMARY: &str = "Combined Policy detached from user.";
const SOURCE_REMOVED_SUMMARY: &str = "One (or more) of the Attached Policy could not be found.";
const CONTENT_CHANGED_SUMMARY: &str = "Policy Drift Detected.";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, StrumDisplay, AsRefStr,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum DriftKind {
    CombinedPolicyRemoved,
    CombinedPolicyDetached,
    SourcePolicyRemoved,
    SourceContentChanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftFinding {
    pub kind: DriftKind,
    pub policy: String,
}

impl Display for DriftFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.policy)
    }
}

/// Outcome of one drift check.
#[derive(Debug, Clone, PartialEq)]
pub struct DriftReport {
    /// The snapshot as the remote state now stands. Its reference list is
    /// cleared when anything drifted.
    pub snapshot: ReconciliationSnapshot,
    pub findings: Vec<DriftFinding>,
    pub diagnostics: Diagnostics,
}

impl DriftReport {
    pub fn drift_found(&self) -> bool {
        !self.findings.is_empty()
    }

    /// All findings on one line, empty when nothing drifted.
    pub fn reason(&self) -> String {
        self.findings.iter().join("; ")
    }

    pub fn kinds(&self) -> Vec<DriftKind> {
        self.findings.iter().map(|f| f.kind).unique().collect()
    }
}

pub struct DriftDetector<'a, C> {
    client: &'a C,
    retry: &'a RetryExecutor,
}

impl<'a, C: IamClient> DriftDetector<'a, C> {
    pub fn new(client: &'a C, retry: &'a RetryExecutor) -> Self {
        DriftDetector { client, retry }
    }

    /// Compare `snapshot` against the remote service.
    ///
    /// Missing policies become findings, never errors. Any other remote
    /// failure aborts the check.
    pub fn detect(
        &self,
        snapshot: &ReconciliationSnapshot,
        types_to_try: &[PolicyType],
    ) -> Result<DriftReport, PolicyError> {
        let principal = snapshot.principal.as_str();
        let fetcher = PolicyFetcher::new(self.client, self.retry);
        let mut findings = Vec::new();
        let mut diagnostics = Diagnostics::new();

        // Combined policies first: anything gone is dropped from the snapshot.
        let mut surviving = Vec::with_capacity(snapshot.combined_policies.len());
        let mut removed = Vec::new();
        for policy in &snapshot.combined_policies {
            match fetcher.lookup(&policy.name, policy.policy_type, Absence::Tolerated)? {
                Some(remote) => surviving.push(CombinedPolicy {
                    document: remote.document,
                    ..policy.clone()
                }),
                None => {
                    warn!(event = "Drift", phase = "CombinedRemoved", principal, policy = policy.name.as_str());
                    removed.push(policy.name.clone());
                }
            }
        }
        if !removed.is_empty() {
            diagnostics.warn(
                COMBINED_REMOVED_SUMMARY,
                format!("missing combined policies: {}", removed.join(", ")),
            );
            findings.extend(removed.into_iter().map(|policy| DriftFinding {
                kind: DriftKind::CombinedPolicyRemoved,
                policy,
            }));
        }

        let detached = self.probe_attachments(principal, &surviving);
        if !detached.is_empty() {
            diagnostics.warn(
                COMBINED_DETACHED_SUMMARY,
                format!("no longer attached to '{principal}': {}", detached.join(", ")),
            );
            findings.extend(detached.into_iter().map(|policy| DriftFinding {
                kind: DriftKind::CombinedPolicyDetached,
                policy,
            }));
        }

        // Then the sources, by reference or by the names last recorded.
        let outcome = fetcher.fetch(&snapshot.tracked_references(), types_to_try);
        if let Some(err) = outcome.unexpected.into_iter().next() {
            return Err(err);
        }

        if !outcome.not_found.is_empty() {
            let missing: Vec<String> = outcome
                .not_found
                .iter()
                .map(|err| match err {
                    PolicyError::NotFound { name } => name.clone(),
                    other => other.to_string(),
                })
                .collect();
            warn!(event = "Drift", phase = "SourceRemoved", principal, missing = missing.join(", "));
            diagnostics.warn(SOURCE_REMOVED_SUMMARY, missing.join(", "));
            findings.extend(missing.into_iter().map(|policy| DriftFinding {
                kind: DriftKind::SourcePolicyRemoved,
                policy,
            }));
        } else {
            // Content is only compared when every source is still there, and
            // byte for byte: a reformatted document counts as changed.
            let changed: Vec<String> = outcome
                .documents
                .iter()
                .filter(|fresh| {
                    snapshot
                        .recorded_source(fresh.name())
                        .is_none_or(|recorded| recorded.raw_document() != fresh.raw_document())
                })
                .map(|fresh| fresh.name().to_string())
                .collect();
            if !changed.is_empty() {
                warn!(event = "Drift", phase = "ContentChanged", principal, changed = changed.join(", "));
                diagnostics.warn(
                    CONTENT_CHANGED_SUMMARY,
                    format!("source policies changed remotely: {}", changed.join(", ")),
                );
                findings.extend(changed.into_iter().map(|policy| DriftFinding {
                    kind: DriftKind::SourceContentChanged,
                    policy,
                }));
            }
        }

        let mut refreshed = ReconciliationSnapshot {
            principal: snapshot.principal.clone(),
            source_references: snapshot.source_references.clone(),
            combined_policies: surviving,
            source_detail: outcome.documents,
        };
        if findings.is_empty() {
            debug!(event = "Drift", phase = "Clean", principal);
        } else {
            refreshed.mark_drifted();
            info!(
                event = "Drift",
                phase = "Detected",
                principal,
                findings = findings.len()
            );
        }

        Ok(DriftReport {
            snapshot: refreshed,
            findings,
            diagnostics,
        })
    }

    /// Names of `policies` that are no longer attached to `principal`.
    ///
    /// Best effort: a failed listing is logged and reports nothing.
    fn probe_attachments(&self, principal: &str, policies: &[CombinedPolicy]) -> Vec<String> {
        if policies.is_empty() {
            return Vec::new();
        }
        let operation = format!("ListAttachedPolicies({principal})");
        let attached = match self.retry.execute(&operation, by_intent(Absence::Tolerated), || {
            self.client.list_attached_user_policies(principal)
        }) {
            Ok(attached) => attached,
            Err(failure) => {
                warn!(
                    event = "Drift",
                    phase = "ProbeFailed",
                    principal,
                    code = failure.error.code.as_str(),
                    error = %failure.error
                );
                return Vec::new();
            }
        };

        policies
            .iter()
            .filter(|policy| {
                !attached
                    .iter()
                    .any(|a| a.name == policy.name && a.policy_type == policy.policy_type)
            })
            .map(|policy| {
                warn!(event = "Drift", phase = "CombinedDetached", principal, policy = policy.name.as_str());
                policy.name.clone()
            })
            .collect()
    }
}
