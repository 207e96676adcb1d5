//! ---
//! tg_section: "02-capability-catalog"
//! tg_subsection: "module"
//! tg_type: "source"
//! tg_scope: "code"
//! tg_description: "Capability hierarchy and subscription plan catalogs."
//! tg_version: "v0.0.0-prealpha"
//! tg_owner: "tbd"
//! ---
use thiserror::Error;

/// Errors raised while building or mutating catalogs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    /// A node was declared without a code.
    #[error("{level} under '{parent}' has an empty code")]
    EmptyCode {
        /// Hierarchy level of the offending node.
        level: &'static str,
        /// Dotted path of the parent node (empty for modules).
        parent: String,
    },
    /// Two siblings share a code.
    #[error("duplicate {level} code '{code}' under '{parent}'")]
    DuplicateCode {
        /// Hierarchy level of the offending node.
        level: &'static str,
        /// Dotted path of the parent node (empty for modules).
        parent: String,
        /// Code declared twice.
        code: String,
    },
    /// A code contains a character reserved for paths or cache keys.
    #[error("{level} code '{code}' contains reserved character '{reserved}'")]
    ReservedCharacter {
        /// Hierarchy level of the offending node.
        level: &'static str,
        /// Offending code.
        code: String,
        /// Character that is not allowed.
        reserved: char,
    },
    /// A level holds more nodes than its index type can address.
    #[error("too many {level} nodes to index")]
    CapacityExceeded {
        /// Hierarchy level that overflowed.
        level: &'static str,
    },
    /// A capability path string did not have four non-empty segments.
    #[error("malformed capability path '{0}': expected module.submodule.component.action")]
    MalformedPath(String),
    /// A subscription referenced a plan that is not defined.
    #[error("unknown plan '{0}'")]
    UnknownPlan(String),
    /// A plan was declared without a code.
    #[error("plan code cannot be empty")]
    EmptyPlanCode,
    /// A subscription window ends before it starts.
    #[error("subscription to '{plan}' ends before it starts")]
    InvalidWindow {
        /// Plan the subscription refers to.
        plan: String,
    },
}
