//! An in-memory remote service for tests.
//!
//! [`InMemoryIam`] stores policies and attachments in a map, enforces the
//! remote service's basic rules (unique names, document length, no deleting
//! attached policies) and can be told to fail specific calls.
//!
//! ```rust
//! use policy_packer::memory::{Fault, InMemoryIam, Operation};
//! use policy_packer::{IamClient, PolicyType};
//!
//! let iam = InMemoryIam::new().with_policy(
//!     "ecs-read",
//!     PolicyType::Custom,
//!     r#"{"Version":"1","Statement":[{"Effect":"Allow","Action":"ecs:Describe*"}]}"#,
//! );
//! iam.inject(Fault::new(Operation::GetPolicy, "Throttling").times(1));
//!
//! assert!(iam.get_policy("ecs-read", PolicyType::Custom).is_err());
//! assert!(iam.get_policy("ecs-read", PolicyType::Custom).is_ok());
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use strum_macros::Display;

use crate::classify::POLICY_NOT_ATTACHED;
use crate::error::RemoteError;
use crate::packer::MAX_POLICY_DOCUMENT_LEN;
use crate::traits::{AttachedPolicy, IamClient, RemotePolicy};
use crate::types::PolicyType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Operation {
    GetPolicy,
    CreatePolicy,
    DeletePolicy,
    AttachPolicy,
    DetachPolicy,
    ListAttachedPolicies,
}

/// A recorded call against the in-memory service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub operation: Operation,
    pub name: String,
}

/// An injected failure. Matches every call of `operation` unless narrowed
/// to a policy name, and fires forever unless limited with [`Fault::times`].
#[derive(Debug, Clone)]
pub struct Fault {
    operation: Operation,
    name: Option<String>,
    error: RemoteError,
    remaining: Option<u32>,
}

impl Fault {
    pub fn new(operation: Operation, code: &str) -> Self {
        Fault {
            operation,
            name: None,
            error: RemoteError::new(code, format!("injected {code} on {operation}")),
            remaining: None,
        }
    }

    pub fn for_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn times(mut self, count: u32) -> Self {
        self.remaining = Some(count);
        self
    }

    fn matches(&self, operation: Operation, name: &str) -> bool {
        self.operation == operation && self.name.as_deref().is_none_or(|n| n == name)
    }
}

#[derive(Debug, Default)]
struct State {
    policies: BTreeMap<(PolicyType, String), String>,
    attachments: HashMap<String, Vec<AttachedPolicy>>,
    faults: Vec<Fault>,
    calls: Vec<Call>,
}

impl State {
    fn enter(&mut self, operation: Operation, name: &str) -> Result<(), RemoteError> {
        self.calls.push(Call {
            operation,
            name: name.to_string(),
        });

        let Some(index) = self.faults.iter().position(|f| f.matches(operation, name)) else {
            return Ok(());
        };
        let fault = &mut self.faults[index];
        let error = fault.error.clone();
        let exhausted = match fault.remaining.as_mut() {
            Some(remaining) => {
                *remaining = remaining.saturating_sub(1);
                *remaining == 0
            }
            None => false,
        };
        if exhausted {
            self.faults.remove(index);
        }
        Err(error)
    }

    fn is_attached_anywhere(&self, name: &str, policy_type: PolicyType) -> bool {
        self.attachments
            .values()
            .flatten()
            .any(|a| a.name == name && a.policy_type == policy_type)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryIam {
    state: Mutex<State>,
}

impl InMemoryIam {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(self, name: &str, policy_type: PolicyType, document: &str) -> Self {
        self.put_policy(name, policy_type, document);
        self
    }

    /// Create or overwrite a policy, bypassing fault injection and call logging.
    pub fn put_policy(&self, name: &str, policy_type: PolicyType, document: &str) {
        self.state()
            .policies
            .insert((policy_type, name.to_string()), document.to_string());
    }

    /// Delete a policy out-of-band, leaving any attachments dangling.
    pub fn remove_policy(&self, name: &str, policy_type: PolicyType) -> Option<String> {
        self.state()
            .policies
            .remove(&(policy_type, name.to_string()))
    }

    /// Detach a policy out-of-band.
    pub fn detach_externally(&self, principal: &str, name: &str) {
        if let Some(attached) = self.state().attachments.get_mut(principal) {
            attached.retain(|a| a.name != name);
        }
    }

    pub fn policy_document(&self, name: &str, policy_type: PolicyType) -> Option<String> {
        self.state()
            .policies
            .get(&(policy_type, name.to_string()))
            .cloned()
    }

    /// Names of all `Custom` policies, sorted.
    pub fn custom_policy_names(&self) -> Vec<String> {
        self.state()
            .policies
            .keys()
            .filter(|(policy_type, _)| *policy_type == PolicyType::Custom)
            .map(|(_, name)| name.clone())
            .collect()
    }

    pub fn attached(&self, principal: &str) -> Vec<AttachedPolicy> {
        self.state()
            .attachments
            .get(principal)
            .cloned()
            .unwrap_or_default()
    }

    pub fn attached_names(&self, principal: &str) -> Vec<String> {
        self.attached(principal).into_iter().map(|a| a.name).collect()
    }

    pub fn inject(&self, fault: Fault) {
        self.state().faults.push(fault);
    }

    pub fn clear_faults(&self) {
        self.state().faults.clear();
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn call_count(&self, operation: Operation) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl IamClient for InMemoryIam {
    fn get_policy(&self, name: &str, policy_type: PolicyType) -> Result<RemotePolicy, RemoteError> {
        let mut state = self.state();
        state.enter(Operation::GetPolicy, name)?;
        state
            .policies
            .get(&(policy_type, name.to_string()))
            .map(|document| RemotePolicy {
                name: name.to_string(),
                policy_type,
                document: document.clone(),
            })
            .ok_or_else(|| RemoteError::policy_not_exist(name))
    }

    fn create_policy(&self, name: &str, document: &str) -> Result<(), RemoteError> {
        let mut state = self.state();
        state.enter(Operation::CreatePolicy, name)?;
        let key = (PolicyType::Custom, name.to_string());
        if state.policies.contains_key(&key) {
            return Err(RemoteError::new(
                "PolicyAlreadyExists",
                format!("policy '{name}' already exists"),
            ));
        }
        if document.len() > MAX_POLICY_DOCUMENT_LEN {
            return Err(RemoteError::new(
                "InvalidParameter.PolicyDocument",
                format!(
                    "policy document is {} characters, limit is {MAX_POLICY_DOCUMENT_LEN}",
                    document.len()
                ),
            ));
        }
        state.policies.insert(key, document.to_string());
        Ok(())
    }

    fn delete_policy(&self, name: &str) -> Result<(), RemoteError> {
        let mut state = self.state();
        state.enter(Operation::DeletePolicy, name)?;
        if state.is_attached_anywhere(name, PolicyType::Custom) {
            return Err(RemoteError::new(
                "PolicyInUse",
                format!("policy '{name}' is still attached"),
            ));
        }
        state
            .policies
            .remove(&(PolicyType::Custom, name.to_string()))
            .map(|_| ())
            .ok_or_else(|| RemoteError::policy_not_exist(name))
    }

    fn attach_user_policy(
        &self,
        principal: &str,
        name: &str,
        policy_type: PolicyType,
    ) -> Result<(), RemoteError> {
        let mut state = self.state();
        state.enter(Operation::AttachPolicy, name)?;
        if !state.policies.contains_key(&(policy_type, name.to_string())) {
            return Err(RemoteError::policy_not_exist(name));
        }
        let attached = state.attachments.entry(principal.to_string()).or_default();
        let entry = AttachedPolicy {
            name: name.to_string(),
            policy_type,
        };
        if !attached.contains(&entry) {
            attached.push(entry);
        }
        Ok(())
    }

    fn detach_user_policy(
        &self,
        principal: &str,
        name: &str,
        policy_type: PolicyType,
    ) -> Result<(), RemoteError> {
        let mut state = self.state();
        state.enter(Operation::DetachPolicy, name)?;
        let attached = state.attachments.entry(principal.to_string()).or_default();
        let before = attached.len();
        attached.retain(|a| !(a.name == name && a.policy_type == policy_type));
        if attached.len() == before {
            return Err(RemoteError::new(
                POLICY_NOT_ATTACHED,
                format!("policy '{name}' is not attached to '{principal}'"),
            ));
        }
        Ok(())
    }

    fn list_attached_user_policies(
        &self,
        principal: &str,
    ) -> Result<Vec<AttachedPolicy>, RemoteError> {
        let mut state = self.state();
        state.enter(Operation::ListAttachedPolicies, principal)?;
        Ok(state.attachments.get(principal).cloned().unwrap_or_default())
    }
}
