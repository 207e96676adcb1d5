//! ---
//! tg_section: "01-core-functionality"
//! tg_subsection: "module"
//! tg_type: "source"
//! tg_scope: "code"
//! tg_description: "Access resolution and policy wiring."
//! tg_version: "v0.0.0-prealpha"
//! tg_owner: "tbd"
//! ---
use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    /// The tenant's active plans do not include the module.
    Entitlement,
    /// No held role grants anything covering the request.
    Grant,
    /// The resource lies outside the granted data scope.
    Scope,
    /// The path resolves but passes through an inactive node.
    Inactive,
    /// The path does not resolve to a catalog node.
    UnknownCapability,
    /// A backing store failed; the request is refused.
    StoreUnavailable,
}

impl DenialReason {
    /// Stable label used in logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            DenialReason::Entitlement => "entitlement",
            DenialReason::Grant => "grant",
            DenialReason::Scope => "scope",
            DenialReason::Inactive => "inactive",
            DenialReason::UnknownCapability => "lookup_failure",
            DenialReason::StoreUnavailable => "store_unavailable",
        }
    }

    /// Transient denials are never memoized.
    pub fn is_transient(&self) -> bool {
        matches!(self, DenialReason::StoreUnavailable)
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of one access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum Decision {
    /// Access granted.
    Allowed,
    /// Access refused.
    Denied(DenialReason),
}

impl Decision {
    /// True for [`Decision::Allowed`].
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }

    /// Denial reason, if any.
    pub fn reason(&self) -> Option<DenialReason> {
        match self {
            Decision::Allowed => None,
            Decision::Denied(reason) => Some(*reason),
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Allowed => f.write_str("allowed"),
            Decision::Denied(reason) => write!(f, "denied ({reason})"),
        }
    }
}
