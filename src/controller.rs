//! The four lifecycle operations a host drives.
//!
//! The host persists the [`ReconciliationSnapshot`] returned by `create`,
//! `read` and `update` and hands it back on the next call. A snapshot whose
//! reference list is cleared tells the host to run `update` next.

use tracing::info;

use crate::applier::{Applied, PolicyApplier};
use crate::config::EngineConfig;
use crate::drift::{DriftDetector, DriftReport};
use crate::error::PolicyError;
use crate::fetcher::PolicyFetcher;
use crate::retry::RetryExecutor;
use crate::traits::IamClient;
use crate::types::{
    PolicyDocument, PolicyReference, ReconciliationSnapshot, normalize_references, validate_name,
};

/// Reconciles the policies attached to one principal at a time.
///
/// Holds no state between calls besides the client and configuration.
pub struct ReconciliationController<C> {
    client: C,
    config: EngineConfig,
    retry: RetryExecutor,
}

impl<C: IamClient> ReconciliationController<C> {
    pub fn new(client: C, config: EngineConfig) -> Result<Self, PolicyError> {
        config.validate()?;
        let retry = RetryExecutor::new(config.backoff);
        Ok(ReconciliationController {
            client,
            config,
            retry,
        })
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Resolve `desired`, pack it and attach the result to `principal`.
    ///
    /// Nothing is mutated unless every reference resolves.
    pub fn create(
        &self,
        desired: &[PolicyReference],
        principal: &str,
    ) -> Result<ReconciliationSnapshot, PolicyError> {
        info!(event = "Lifecycle", phase = "Create", principal, sources = desired.len());
        validate_name("user", principal)?;
        let references = normalize_references(desired)?;
        let sources = self.resolve(&references)?;
        let applied = PolicyApplier::new(&self.client, &self.retry).apply(principal, &sources)?;
        Ok(Self::snapshot(principal, references, sources, applied))
    }

    /// Check the remote state against `snapshot`.
    ///
    /// Tolerated absences and content changes come back as findings and
    /// diagnostics, with the returned snapshot marked drifted.
    pub fn read(&self, snapshot: &ReconciliationSnapshot) -> Result<DriftReport, PolicyError> {
        info!(
            event = "Lifecycle",
            phase = "Read",
            principal = snapshot.principal.as_str(),
            combined = snapshot.combined_policies.len()
        );
        DriftDetector::new(&self.client, &self.retry).detect(snapshot, &self.config.types_to_try)
    }

    /// Replace the policies recorded in `prior` with a fresh apply of `desired`.
    ///
    /// The new references are resolved before anything is removed, so an
    /// invalid input leaves the remote state alone. A failure after the
    /// removal started lists the removals among the applied mutations.
    pub fn update(
        &self,
        desired: &[PolicyReference],
        principal: &str,
        prior: &ReconciliationSnapshot,
    ) -> Result<ReconciliationSnapshot, PolicyError> {
        info!(
            event = "Lifecycle",
            phase = "Update",
            principal,
            sources = desired.len(),
            prior_combined = prior.combined_policies.len()
        );
        validate_name("user", principal)?;
        let references = normalize_references(desired)?;
        let sources = self.resolve(&references)?;

        let applied = PolicyApplier::new(&self.client, &self.retry).replace(
            &prior.principal,
            &prior.combined_policies,
            principal,
            &sources,
        )?;
        Ok(Self::snapshot(principal, references, sources, applied))
    }

    /// Detach and delete everything recorded in `snapshot`.
    pub fn delete(&self, snapshot: &ReconciliationSnapshot) -> Result<(), PolicyError> {
        info!(
            event = "Lifecycle",
            phase = "Delete",
            principal = snapshot.principal.as_str(),
            combined = snapshot.combined_policies.len()
        );
        PolicyApplier::new(&self.client, &self.retry)
            .remove(&snapshot.principal, &snapshot.combined_policies)?;
        Ok(())
    }

    /// Fetch every reference or fail with all the ones that did not resolve.
    fn resolve(&self, references: &[PolicyReference]) -> Result<Vec<PolicyDocument>, PolicyError> {
        let outcome = PolicyFetcher::new(&self.client, &self.retry)
            .fetch(references, &self.config.types_to_try);
        if !outcome.is_complete() {
            return Err(PolicyError::UnresolvedSources(outcome.failure_messages()));
        }
        Ok(outcome.documents)
    }

    fn snapshot(
        principal: &str,
        references: Vec<PolicyReference>,
        sources: Vec<PolicyDocument>,
        applied: Applied,
    ) -> ReconciliationSnapshot {
        ReconciliationSnapshot {
            principal: principal.to_string(),
            source_references: Some(references),
            combined_policies: applied.combined_policies,
            source_detail: sources,
        }
    }
}

#[cfg(test)]
mod tests;
