//! Classification of remote-service error codes.
//!
//! Every failure the remote service reports carries a string code. The
//! engine only cares about three outcomes: retry it, give up, or treat it
//! as "the policy is not there". The last one depends on the caller: a Read
//! cycle tolerates a missing policy, a Create pre-check does not.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// The remote code for a policy lookup that found nothing.
pub const POLICY_NOT_EXIST: &str = "PolicyNotExist";

/// The remote code for detaching a policy that is not attached.
pub const POLICY_NOT_ATTACHED: &str = "PolicyNotAttached";

/// Verdict for a single remote error.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ErrorClass {
    /// Never retried, surfaced immediately.
    Permanent,
    /// Retried with backoff until the elapsed-time ceiling.
    Retryable,
    /// The requested policy does not exist and the caller can live with that.
    NotFoundTolerable,
}

/// What the call site expects when a policy turns out to be missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Absence {
    /// Missing policies are reported, not fatal (Read, type probing).
    Tolerated,
    /// Missing policies are hard failures (pre-checks, post-create verification).
    Fatal,
}

static CODE_TABLE: Lazy<HashMap<&'static str, ErrorClass>> = Lazy::new(|| {
    let retryable = [
        "Throttling",
        "Throttling.User",
        "Throttling.API",
        "ServiceUnavailable",
        "ServiceUnavailableTemp",
        "InternalError",
        "InternalServiceError",
        "InternalServiceTimeout",
        "FailToConnect",
        "UnknownError",
        "DnsSystemBusyness",
        "CloseDnsSlbFailed",
        "DisableDNSSLB",
        "EnableDnsSlbFailed",
        "D504TO",
    ];
    let permanent = [
        "MissingParameter",
        "MissingAuthenticationToken",
        "MissingRequestInfo",
        "MissingSignature",
        "InvalidTimestamp",
        "ServiceNotFound",
        "InvalidActionOrVersion",
        "InvalidAccessKey",
        "SignatureDoesNotMatch",
        "MethodNotAllowed",
        "InvalidAuthorization",
        "InvalidCredential",
        "UndefinedError",
        "AccessDenied.IAMUnauthorized",
        "QuotaExceeded.UrlsToday",
        "OperationDenied.ServiceStopped",
        "NotFound.Domain",
    ];

    let mut table = HashMap::new();
    for code in retryable {
        table.insert(code, ErrorClass::Retryable);
    }
    for code in permanent {
        table.insert(code, ErrorClass::Permanent);
    }
    table.insert(POLICY_NOT_EXIST, ErrorClass::NotFoundTolerable);
    table.insert(POLICY_NOT_ATTACHED, ErrorClass::NotFoundTolerable);
    table
});

/// Classify a remote error code on its own, without call-site context.
///
/// `PolicyNotExist` and `PolicyNotAttached` map to
/// [`ErrorClass::NotFoundTolerable`]; codes the
/// table does not know about are [`ErrorClass::Permanent`].
pub fn classify(code: &str) -> ErrorClass {
    CODE_TABLE
        .get(code)
        .copied()
        .unwrap_or(ErrorClass::Permanent)
}

/// Classify a remote error code for a call site with the given intent.
///
/// Absence only stays tolerable when the caller says so; otherwise a
/// missing policy is as final as any other permanent failure.
pub fn classify_for(code: &str, absence: Absence) -> ErrorClass {
    match (classify(code), absence) {
        (ErrorClass::NotFoundTolerable, Absence::Fatal) => ErrorClass::Permanent,
        (class, _) => class,
    }
}
