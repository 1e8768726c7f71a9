//! Read-only lookups of policies at the remote service.

use tracing::{debug, warn};

use crate::classify::Absence;
use crate::error::PolicyError;
use crate::retry::{RetryExecutor, by_intent};
use crate::traits::{IamClient, RemotePolicy};
use crate::types::{PolicyDocument, PolicyReference, PolicyType};

/// Result of fetching a batch of references.
///
/// A reference ends up in exactly one of the three lists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchOutcome {
    pub documents: Vec<PolicyDocument>,
    /// One entry per reference that no type could resolve.
    pub not_found: Vec<PolicyError>,
    /// Permanent failures, exhausted retries and undecodable documents.
    pub unexpected: Vec<PolicyError>,
}

impl FetchOutcome {
    /// True if every reference resolved to a document.
    pub fn is_complete(&self) -> bool {
        self.not_found.is_empty() && self.unexpected.is_empty()
    }

    /// All failures, not-found first, as messages.
    pub fn failure_messages(&self) -> Vec<String> {
        self.not_found
            .iter()
            .chain(&self.unexpected)
            .map(ToString::to_string)
            .collect()
    }
}

enum LookupFailure {
    NotFound(PolicyError),
    Unexpected(PolicyError),
}

pub struct PolicyFetcher<'a, C> {
    client: &'a C,
    retry: &'a RetryExecutor,
}

impl<'a, C: IamClient> PolicyFetcher<'a, C> {
    pub fn new(client: &'a C, retry: &'a RetryExecutor) -> Self {
        PolicyFetcher { client, retry }
    }

    /// Resolve each reference to at most one document.
    ///
    /// Types are tried in order until one lookup succeeds. A reference that
    /// every type reports missing is recorded once in `not_found`; any other
    /// failure stops the search for that reference and goes to `unexpected`.
    pub fn fetch(&self, references: &[PolicyReference], types_to_try: &[PolicyType]) -> FetchOutcome {
        let mut outcome = FetchOutcome::default();

        for reference in references {
            match self.fetch_one(reference, types_to_try) {
                Ok(document) => outcome.documents.push(document),
                Err(LookupFailure::NotFound(err)) => {
                    warn!(event = "Fetch", phase = "NotFound", policy = reference.name.as_str());
                    outcome.not_found.push(err);
                }
                Err(LookupFailure::Unexpected(err)) => {
                    warn!(
                        event = "Fetch",
                        phase = "Failed",
                        policy = reference.name.as_str(),
                        error = %err
                    );
                    outcome.unexpected.push(err);
                }
            }
        }

        debug!(
            event = "Fetch",
            phase = "Done",
            requested = references.len(),
            found = outcome.documents.len(),
            not_found = outcome.not_found.len(),
            unexpected = outcome.unexpected.len()
        );
        outcome
    }

    fn fetch_one(
        &self,
        reference: &PolicyReference,
        types_to_try: &[PolicyType],
    ) -> Result<PolicyDocument, LookupFailure> {
        for policy_type in reference.lookup_types(types_to_try) {
            let found = self
                .lookup(&reference.name, policy_type, Absence::Tolerated)
                .map_err(LookupFailure::Unexpected)?;

            match found {
                Some(remote) => {
                    return PolicyDocument::parse(remote.name, remote.policy_type, remote.document)
                        .map_err(LookupFailure::Unexpected);
                }
                None => debug!(
                    event = "Fetch",
                    phase = "TryNextType",
                    policy = reference.name.as_str(),
                    policy_type = policy_type.as_ref()
                ),
            }
        }

        Err(LookupFailure::NotFound(PolicyError::NotFound {
            name: reference.name.clone(),
        }))
    }

    /// Fetch one policy by name and type through the retry executor.
    ///
    /// Returns `Ok(None)` for a missing policy when absence is tolerated;
    /// with [`Absence::Fatal`] a missing policy is an error.
    pub fn lookup(
        &self,
        name: &str,
        policy_type: PolicyType,
        absence: Absence,
    ) -> Result<Option<RemotePolicy>, PolicyError> {
        let operation = format!("GetPolicy({name}, {policy_type})");
        match self
            .retry
            .execute(&operation, by_intent(absence), || {
                self.client.get_policy(name, policy_type)
            }) {
            Ok(remote) => Ok(Some(remote)),
            Err(failure) if failure.is_not_found() => Ok(None),
            Err(failure) => Err(failure.into()),
        }
    }
}
