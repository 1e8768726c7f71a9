use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};
use thiserror::Error;

use crate::classify::{ErrorClass, POLICY_NOT_EXIST};
use crate::retry::RemoteFailure;

/// An error as reported by the remote authorization service.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct RemoteError {
    pub code: String,
    pub message: String,
}

impl RemoteError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        RemoteError {
            code: code.into(),
            message: message.into(),
        }
    }

    /// The error the remote service returns for a lookup of a missing policy.
    pub fn policy_not_exist(name: &str) -> Self {
        RemoteError::new(POLICY_NOT_EXIST, format!("policy '{name}' does not exist"))
    }
}

/// The remote mutation step an apply or removal was in when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum ApplyStage {
    Create,
    Attach,
    Verify,
    Detach,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum PolicyError {
    #[error("remote call {operation} failed ({class}) after {attempts} attempt(s): {error}")]
    Remote {
        operation: String,
        error: RemoteError,
        class: ErrorClass,
        attempts: u32,
    },

    #[error("policy '{name}' does not exist")]
    NotFound { name: String },

    #[error("failed to parse policy document '{name}': {reason}")]
    ParseError { name: String, reason: String },

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("source policies could not be resolved: {}", .0.join("; "))]
    UnresolvedSources(Vec<String>),

    #[error("combined policy '{0}' could not be verified after apply")]
    VerificationFailed(String),

    /// A remote mutation failed after earlier mutations of the same cycle
    /// already landed. Those are listed in `applied` and are not rolled back.
    #[error("{stage} failed after applying [{}]: {source}", .applied.join(", "))]
    PartialApply {
        stage: ApplyStage,
        applied: Vec<String>,
        source: Box<PolicyError>,
    },
}

impl PolicyError {
    /// The classification of the underlying remote failure, if any.
    pub fn class(&self) -> Option<ErrorClass> {
        match self {
            PolicyError::Remote { class, .. } => Some(*class),
            PolicyError::PartialApply { source, .. } => source.class(),
            _ => None,
        }
    }

    /// Names of remote mutations that were applied before the failure.
    pub fn applied(&self) -> &[String] {
        match self {
            PolicyError::PartialApply { applied, .. } => applied,
            _ => &[],
        }
    }
}

impl From<RemoteFailure> for PolicyError {
    fn from(failure: RemoteFailure) -> Self {
        PolicyError::Remote {
            operation: failure.operation,
            error: failure.error,
            class: failure.class,
            attempts: failure.attempts,
        }
    }
}

impl From<serde_json::Error> for PolicyError {
    fn from(err: serde_json::Error) -> Self {
        PolicyError::InvalidConfig(err.to_string())
    }
}
