// src/lib.rs
//! Packs many access policies into few, and keeps them attached.
//!
//! A principal can only carry a limited number of policies, each below a
//! fixed document length. The engine fetches the source policies a caller
//! names, packs their statements into as few combined policies as fit,
//! attaches those to the principal and later checks whether anything
//! changed at the remote service behind its back.
//!
//! The entry point is [`ReconciliationController`]. Its `create`, `read`,
//! `update` and `delete` operations take and return a
//! [`ReconciliationSnapshot`], the only state a host needs to persist.
//!
//! ```rust
//! use policy_packer::memory::InMemoryIam;
//! use policy_packer::{EngineConfig, PolicyReference, PolicyType, ReconciliationController};
//!
//! let iam = InMemoryIam::new().with_policy(
//!     "ecs-read",
//!     PolicyType::Custom,
//!     r#"{"Version":"1","Statement":[{"Effect":"Allow","Action":"ecs:Describe*"}]}"#,
//! );
//! let controller = ReconciliationController::new(&iam, EngineConfig::default())?;
//!
//! let snapshot = controller.create(&[PolicyReference::new("ecs-read")], "alice")?;
//! assert_eq!(snapshot.combined_policies[0].name, "alice-1");
//! assert!(!controller.read(&snapshot)?.drift_found());
//! # Ok::<(), policy_packer::PolicyError>(())
//! ```
pub use applier::{Applied, PolicyApplier};
pub use classify::{Absence, ErrorClass, classify, classify_for};
pub use config::EngineConfig;
pub use controller::ReconciliationController;
pub use drift::{DriftDetector, DriftFinding, DriftKind, DriftReport};
pub use error::{ApplyStage, PolicyError, RemoteError};
pub use fetcher::{FetchOutcome, PolicyFetcher};
pub use packer::{
    MAX_POLICY_DOCUMENT_LEN, POLICY_WRAPPER_OVERHEAD, PackOutcome, pack, pack_default,
};
pub use retry::{BackoffSettings, RemoteFailure, RetryExecutor};
pub use timers::ApplyPhases;
pub use traits::{AttachedPolicy, IamClient, RemotePolicy};
pub use types::{
    CombinedPolicy, Diagnostic, Diagnostics, PolicyDocument, PolicyOrigin, PolicyRecord,
    PolicyReference, PolicyType, ReconciliationSnapshot, Severity, Statement,
    combined_policy_name, normalize_references, validate_name,
};

pub mod classify;
pub mod memory;
pub mod packer;
pub mod retry;

mod applier;
mod config;
mod controller;
mod drift;
mod error;
mod fetcher;
mod timers;
mod traits;
mod types;

#[cfg(test)]
mod tests;
