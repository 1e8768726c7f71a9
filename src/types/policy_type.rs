//! Remote policy types.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

/// Which namespace a policy lives in at the remote service.
///
/// `Custom` policies are account-owned and mutable; `System` policies are
/// provided by the service and can only be attached.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum PolicyType {
    Custom,
    System,
}
