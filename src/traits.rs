use serde::{Deserialize, Serialize};

use crate::error::RemoteError;
use crate::types::PolicyType;

/// A policy as returned by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePolicy {
    pub name: String,
    pub policy_type: PolicyType,
    pub document: String,
}

/// A policy attached to a principal, as listed by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttachedPolicy {
    pub name: String,
    pub policy_type: PolicyType,
}

/// The remote authorization service, as far as the engine needs it.
///
/// Calls are synchronous and may block. Implementations report failures as
/// [`RemoteError`] codes and never retry on their own; retries are the
/// engine's job.
pub trait IamClient {
    fn get_policy(&self, name: &str, policy_type: PolicyType) -> Result<RemotePolicy, RemoteError>;

    /// Create a `Custom` policy.
    fn create_policy(&self, name: &str, document: &str) -> Result<(), RemoteError>;

    fn delete_policy(&self, name: &str) -> Result<(), RemoteError>;

    fn attach_user_policy(
        &self,
        principal: &str,
        name: &str,
        policy_type: PolicyType,
    ) -> Result<(), RemoteError>;

    fn detach_user_policy(
        &self,
        principal: &str,
        name: &str,
        policy_type: PolicyType,
    ) -> Result<(), RemoteError>;

    fn list_attached_user_policies(&self, principal: &str)
    -> Result<Vec<AttachedPolicy>, RemoteError>;
}

impl<T: IamClient + ?Sized> IamClient for &T {
    fn get_policy(&self, name: &str, policy_type: PolicyType) -> Result<RemotePolicy, RemoteError> {
        (**self).get_policy(name, policy_type)
    }

    fn create_policy(&self, name: &str, document: &str) -> Result<(), RemoteError> {
        (**self).create_policy(name, document)
    }

    fn delete_policy(&self, name: &str) -> Result<(), RemoteError> {
        (**self).delete_policy(name)
    }

    fn attach_user_policy(
        &self,
        principal: &str,
        name: &str,
        policy_type: PolicyType,
    ) -> Result<(), RemoteError> {
        (**self).attach_user_policy(principal, name, policy_type)
    }

    fn detach_user_policy(
        &self,
        principal: &str,
        name: &str,
        policy_type: PolicyType,
    ) -> Result<(), RemoteError> {
        (**self).detach_user_policy(principal, name, policy_type)
    }

    fn list_attached_user_policies(
        &self,
        principal: &str,
    ) -> Result<Vec<AttachedPolicy>, RemoteError> {
        (**self).list_attached_user_policies(principal)
    }
}
