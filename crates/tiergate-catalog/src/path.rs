//! ---
//! tg_section: "02-capability-catalog"
//! tg_subsection: "module"
//! tg_type: "source"
//! tg_scope: "code"
//! tg_description: "Capability hierarchy and subscription plan catalogs."
//! tg_version: "v0.0.0-prealpha"
//! tg_owner: "tbd"
//! ---
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// Fully-qualified address of an Action: `module.submodule.component.action`.
///
/// Paths are the stable way to refer to an Action across catalog rebuilds;
/// [`crate::ActionId`] values are only meaningful within one catalog snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CapabilityPath {
    /// Module code.
    pub module: String,
    /// SubModule code, unique within the module.
    pub submodule: String,
    /// Component code, unique within the submodule.
    pub component: String,
    /// Action code, unique within the component.
    pub action: String,
}

impl CapabilityPath {
    /// Build a path from its four codes.
    pub fn new(
        module: impl Into<String>,
        submodule: impl Into<String>,
        component: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            module: module.into(),
            submodule: submodule.into(),
            component: component.into(),
            action: action.into(),
        }
    }
}

impl fmt::Display for CapabilityPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.module, self.submodule, self.component, self.action
        )
    }
}

impl FromStr for CapabilityPath {
    type Err = CatalogError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let segments = raw.trim().split('.').collect::<Vec<_>>();
        match segments.as_slice() {
            [module, submodule, component, action]
                if segments.iter().all(|segment| !segment.is_empty()) =>
            {
                Ok(Self::new(*module, *submodule, *component, *action))
            }
            _ => Err(CatalogError::MalformedPath(raw.to_owned())),
        }
    }
}

impl TryFrom<String> for CapabilityPath {
    type Error = CatalogError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CapabilityPath> for String {
    fn from(path: CapabilityPath) -> Self {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_four_segments() {
        let path: CapabilityPath = "core.users.user_profile.edit".parse().unwrap();
        assert_eq!(path.module, "core");
        assert_eq!(path.action, "edit");
        assert_eq!(path.to_string(), "core.users.user_profile.edit");
    }

    #[test]
    fn rejects_short_or_empty_segments() {
        assert!("users.user_profile.edit".parse::<CapabilityPath>().is_err());
        assert!("core..user_profile.edit".parse::<CapabilityPath>().is_err());
        assert!("a.b.c.d.e".parse::<CapabilityPath>().is_err());
    }
}
