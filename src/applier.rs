//! Remote side effects for combined policies.
//!
//! An apply runs `Packing -> Creating -> Attaching -> Verifying`; a removal
//! detaches every combined policy and deletes the ones the engine owns.
//! Each remote call is retried on its own. The first failure stops the run
//! and nothing that already landed is rolled back: the mutations that did
//! land are reported in [`PolicyError::PartialApply`].

use std::time::Duration;

use itertools::Itertools;
use tracing::{debug, info, warn};

use crate::classify::Absence;
use crate::error::{ApplyStage, PolicyError, RemoteError};
use crate::fetcher::PolicyFetcher;
use crate::packer::pack_default;
use crate::retry::{RetryExecutor, by_intent};
use crate::timers::{ApplyPhases, PhaseTimer};
use crate::traits::IamClient;
use crate::types::{CombinedPolicy, PolicyDocument, validate_name};

/// What an apply left attached to the principal.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    pub combined_policies: Vec<CombinedPolicy>,
    pub phases: ApplyPhases,
}

/// Remote mutations that landed during one run, in order.
#[derive(Debug, Default)]
struct Journal(Vec<String>);

impl Journal {
    fn record(&mut self, operation: String) {
        self.0.push(operation);
    }

    /// Wrap `cause` with the mutations applied so far, if there are any.
    fn abort(&self, stage: ApplyStage, cause: PolicyError) -> PolicyError {
        warn!(
            event = "Apply",
            phase = "Aborted",
            stage = stage.as_ref(),
            applied = self.0.len(),
            error = %cause
        );
        if self.0.is_empty() {
            cause
        } else {
            PolicyError::PartialApply {
                stage,
                applied: self.0.clone(),
                source: Box::new(cause),
            }
        }
    }
}

/// Pack `sources` and name the results for `principal`.
///
/// Packed documents become `principal-1`, `principal-2`, ... in packing
/// order and are followed by the passthrough sources, which keep their own
/// name and type.
pub fn plan(principal: &str, sources: &[PolicyDocument]) -> Result<Vec<CombinedPolicy>, PolicyError> {
    let outcome = pack_default(sources);
    let mut combined = Vec::with_capacity(outcome.packed.len() + outcome.passthrough.len());

    for (index, document) in outcome.packed.into_iter().enumerate() {
        let policy = CombinedPolicy::packed(principal, index + 1, document);
        validate_name("policy", &policy.name)?;
        combined.push(policy);
    }
    combined.extend(outcome.passthrough.iter().map(CombinedPolicy::passthrough));

    // A passthrough source may already be called `principal-N`.
    if let Some(clash) = combined.iter().map(|p| p.name.as_str()).duplicates().next() {
        return Err(PolicyError::InvalidName(format!(
            "policy name '{clash}' is both a source and a combined policy of '{principal}'"
        )));
    }
    Ok(combined)
}

pub struct PolicyApplier<'a, C> {
    client: &'a C,
    retry: &'a RetryExecutor,
}

impl<'a, C: IamClient> PolicyApplier<'a, C> {
    pub fn new(client: &'a C, retry: &'a RetryExecutor) -> Self {
        PolicyApplier { client, retry }
    }

    /// Pack `sources`, create the packed policies, attach everything to
    /// `principal` and verify the created policies can be read back.
    pub fn apply(&self, principal: &str, sources: &[PolicyDocument]) -> Result<Applied, PolicyError> {
        self.run(None, principal, sources)
    }

    /// Remove `prior` from `prior_principal`, then apply `sources` to
    /// `principal`.
    ///
    /// Both halves share one journal, so a failure during the apply still
    /// reports the removals that landed before it.
    pub fn replace(
        &self,
        prior_principal: &str,
        prior: &[CombinedPolicy],
        principal: &str,
        sources: &[PolicyDocument],
    ) -> Result<Applied, PolicyError> {
        self.run(Some((prior_principal, prior)), principal, sources)
    }

    fn run(
        &self,
        prior: Option<(&str, &[CombinedPolicy])>,
        principal: &str,
        sources: &[PolicyDocument],
    ) -> Result<Applied, PolicyError> {
        validate_name("user", principal)?;
        let mut phases = ApplyPhases::default();

        let combined = {
            let _timer = PhaseTimer::new(&mut phases.packing);
            plan(principal, sources)?
        };
        info!(
            event = "Apply",
            phase = "Packed",
            principal,
            sources = sources.len(),
            combined = combined.len(),
            passthrough = combined.iter().filter(|p| !p.is_owned()).count()
        );

        let mut journal = Journal::default();
        let result = match prior {
            Some((prior_principal, prior)) => {
                self.remove_all(prior_principal, prior, &mut journal, &mut phases.detaching)
            }
            None => Ok(()),
        }
        .and_then(|()| self.apply_planned(principal, &combined, &mut journal, &mut phases));
        phases.log(principal);
        result?;

        info!(event = "Apply", phase = "Done", principal, combined = combined.len());
        Ok(Applied {
            combined_policies: combined,
            phases,
        })
    }

    fn apply_planned(
        &self,
        principal: &str,
        combined: &[CombinedPolicy],
        journal: &mut Journal,
        phases: &mut ApplyPhases,
    ) -> Result<(), PolicyError> {
        // 1. Create the policies we own. Passthrough sources already exist.
        {
            let _timer = PhaseTimer::new(&mut phases.creating);
            for policy in combined.iter().filter(|p| p.is_owned()) {
                let operation = format!("CreatePolicy({})", policy.name);
                self.mutate(&operation, || {
                    self.client.create_policy(&policy.name, &policy.document)
                })
                .map_err(|err| journal.abort(ApplyStage::Create, err))?;
                debug!(event = "Apply", phase = "Created", policy = policy.name.as_str());
                journal.record(operation);
            }
        }

        // 2. Attach in order. Earlier attachments stay on failure.
        {
            let _timer = PhaseTimer::new(&mut phases.attaching);
            for policy in combined {
                let operation = format!("AttachPolicy({principal}, {})", policy.name);
                self.mutate(&operation, || {
                    self.client
                        .attach_user_policy(principal, &policy.name, policy.policy_type)
                })
                .map_err(|err| journal.abort(ApplyStage::Attach, err))?;
                debug!(
                    event = "Apply",
                    phase = "Attached",
                    principal,
                    policy = policy.name.as_str(),
                    policy_type = policy.policy_type.as_ref()
                );
                journal.record(operation);
            }
        }

        // 3. Read everything back. A policy we just attached must be there.
        let _timer = PhaseTimer::new(&mut phases.verifying);
        let fetcher = PolicyFetcher::new(self.client, self.retry);
        for policy in combined {
            match fetcher.lookup(&policy.name, policy.policy_type, Absence::Fatal) {
                Ok(Some(remote)) if !remote.document.trim().is_empty() => {}
                Ok(_) => {
                    return Err(journal.abort(
                        ApplyStage::Verify,
                        PolicyError::VerificationFailed(policy.name.clone()),
                    ));
                }
                Err(err) => return Err(journal.abort(ApplyStage::Verify, err)),
            }
        }
        Ok(())
    }

    /// Detach every policy in `combined` from `principal` and delete the
    /// ones the engine owns.
    ///
    /// A policy that is already detached or already deleted counts as done.
    /// Any other failure stops the removal.
    pub fn remove(
        &self,
        principal: &str,
        combined: &[CombinedPolicy],
    ) -> Result<ApplyPhases, PolicyError> {
        let mut phases = ApplyPhases::default();
        let mut journal = Journal::default();

        let result = self.remove_all(principal, combined, &mut journal, &mut phases.detaching);
        phases.log(principal);
        result?;

        info!(event = "Remove", phase = "Done", principal, removed = combined.len());
        Ok(phases)
    }

    fn remove_all(
        &self,
        principal: &str,
        combined: &[CombinedPolicy],
        journal: &mut Journal,
        slot: &mut Duration,
    ) -> Result<(), PolicyError> {
        let _timer = PhaseTimer::new(slot);
        combined
            .iter()
            .try_for_each(|policy| self.remove_one(principal, policy, journal))
    }

    fn remove_one(
        &self,
        principal: &str,
        policy: &CombinedPolicy,
        journal: &mut Journal,
    ) -> Result<(), PolicyError> {
        let operation = format!("DetachPolicy({principal}, {})", policy.name);
        let detached = self.retry.execute(&operation, by_intent(Absence::Tolerated), || {
            self.client
                .detach_user_policy(principal, &policy.name, policy.policy_type)
        });
        match detached {
            Ok(()) => journal.record(operation),
            Err(failure) if failure.is_not_found() => debug!(
                event = "Remove",
                phase = "AlreadyDetached",
                principal,
                policy = policy.name.as_str()
            ),
            Err(failure) => return Err(journal.abort(ApplyStage::Detach, failure.into())),
        }

        if !policy.is_owned() {
            return Ok(());
        }

        let operation = format!("DeletePolicy({})", policy.name);
        let deleted = self.retry.execute(&operation, by_intent(Absence::Tolerated), || {
            self.client.delete_policy(&policy.name)
        });
        match deleted {
            Ok(()) => journal.record(operation),
            Err(failure) if failure.is_not_found() => debug!(
                event = "Remove",
                phase = "AlreadyDeleted",
                policy = policy.name.as_str()
            ),
            Err(failure) => return Err(journal.abort(ApplyStage::Delete, failure.into())),
        }
        Ok(())
    }

    fn mutate<F>(&self, operation: &str, op: F) -> Result<(), PolicyError>
    where
        F: FnMut() -> Result<(), RemoteError>,
    {
        self.retry
            .execute(operation, by_intent(Absence::Fatal), op)
            .map_err(PolicyError::from)
    }
}
