//! Data model for policy packing and reconciliation.
//!
//! Source policies are named by [`PolicyReference`], fetched into
//! [`PolicyDocument`]s, packed into [`CombinedPolicy`]s and recorded in a
//! [`ReconciliationSnapshot`] that the host persists between cycles.

mod combined;
mod diagnostics;
mod document;
mod names;
mod policy_type;
mod reference;
mod snapshot;

pub use combined::{CombinedPolicy, PolicyOrigin};
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use document::{PolicyDocument, PolicyRecord, Statement};
pub use names::{combined_policy_name, validate_name};
pub use policy_type::PolicyType;
pub use reference::{PolicyReference, normalize_references};
pub use snapshot::ReconciliationSnapshot;
