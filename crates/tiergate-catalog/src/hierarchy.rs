//! ---
//! tg_section: "02-capability-catalog"
//! tg_subsection: "module"
//! tg_type: "source"
//! tg_scope: "code"
//! tg_description: "Capability hierarchy and subscription plan catalogs."
//! tg_version: "v0.0.0-prealpha"
//! tg_owner: "tbd"
//! ---
//! Indexed, arena-allocated capability tree.
//!
//! Every level lives in its own vector and is addressed by a typed index.
//! Children are reached through a per-parent `code -> index` map, so
//! resolving a four-segment path costs four hash lookups. Nodes only link
//! downwards to indices allocated after them and upwards to their parent, so
//! the tree cannot contain cycles.

use std::collections::HashMap;

use tracing::debug;

use crate::definition::HierarchyDefinition;
use crate::error::CatalogError;
use crate::path::CapabilityPath;

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident, $level:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            /// Position of the node in its arena.
            pub fn index(self) -> usize {
                self.0 as usize
            }

            fn from_index(index: usize) -> Result<Self, CatalogError> {
                u32::try_from(index)
                    .map(Self)
                    .map_err(|_| CatalogError::CapacityExceeded { level: $level })
            }
        }
    };
}

arena_id!(
    /// Index of a module node.
    ModuleId,
    "module"
);
arena_id!(
    /// Index of a submodule node.
    SubModuleId,
    "submodule"
);
arena_id!(
    /// Index of a component node.
    ComponentId,
    "component"
);
arena_id!(
    /// Index of an action node, valid within one catalog snapshot.
    ActionId,
    "action"
);

/// Module node.
#[derive(Debug, Clone)]
pub struct ModuleNode {
    /// Stable module code.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Sort order.
    pub priority: i32,
    /// Activation flag.
    pub active: bool,
    /// Whether entitlement through a plan is required.
    pub requires_subscription: bool,
    /// Informational routing prefix.
    pub route_prefix: Option<String>,
    children: Vec<SubModuleId>,
    by_code: HashMap<String, SubModuleId>,
}

/// SubModule node.
#[derive(Debug, Clone)]
pub struct SubModuleNode {
    /// Owning module.
    pub module: ModuleId,
    /// Code unique within the module.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Sort order.
    pub priority: i32,
    /// Activation flag.
    pub active: bool,
    children: Vec<ComponentId>,
    by_code: HashMap<String, ComponentId>,
}

/// Component node.
#[derive(Debug, Clone)]
pub struct ComponentNode {
    /// Owning submodule.
    pub submodule: SubModuleId,
    /// Code unique within the submodule.
    pub code: String,
    /// Display name.
    pub name: String,
    /// View identifier rendered by callers.
    pub view: Option<String>,
    /// Sort order.
    pub priority: i32,
    /// Activation flag.
    pub active: bool,
    children: Vec<ActionId>,
    by_code: HashMap<String, ActionId>,
}

/// Action node.
#[derive(Debug, Clone)]
pub struct ActionNode {
    /// Owning component.
    pub component: ComponentId,
    /// Code unique within the component.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Activation flag.
    pub active: bool,
}

/// Read-only capability tree built from a [`HierarchyDefinition`].
#[derive(Debug, Clone, Default)]
pub struct HierarchyCatalog {
    modules: Vec<ModuleNode>,
    submodules: Vec<SubModuleNode>,
    components: Vec<ComponentNode>,
    actions: Vec<ActionNode>,
    root: Vec<ModuleId>,
    by_code: HashMap<String, ModuleId>,
}

/// `.` separates path segments and `:` separates cache key fields.
const RESERVED: [char; 2] = ['.', ':'];

fn check_code(level: &'static str, parent: &str, code: &str) -> Result<(), CatalogError> {
    if code.trim().is_empty() {
        return Err(CatalogError::EmptyCode {
            level,
            parent: parent.to_owned(),
        });
    }
    if let Some(reserved) = code.chars().find(|c| RESERVED.contains(c)) {
        return Err(CatalogError::ReservedCharacter {
            level,
            code: code.to_owned(),
            reserved,
        });
    }
    Ok(())
}

fn duplicate(level: &'static str, parent: &str, code: &str) -> CatalogError {
    CatalogError::DuplicateCode {
        level,
        parent: parent.to_owned(),
        code: code.to_owned(),
    }
}

impl HierarchyCatalog {
    /// Build the indexed tree, rejecting empty, duplicate and reserved codes.
    pub fn build(definition: &HierarchyDefinition) -> Result<Self, CatalogError> {
        let mut catalog = Self::default();

        for module_def in &definition.modules {
            check_code("module", "", &module_def.code)?;
            if catalog.by_code.contains_key(&module_def.code) {
                return Err(duplicate("module", "", &module_def.code));
            }
            let module_id = ModuleId::from_index(catalog.modules.len())?;
            catalog.modules.push(ModuleNode {
                code: module_def.code.clone(),
                name: module_def.name.clone(),
                priority: module_def.priority,
                active: module_def.active,
                requires_subscription: module_def.requires_subscription,
                route_prefix: module_def.route_prefix.clone(),
                children: Vec::new(),
                by_code: HashMap::new(),
            });
            catalog.by_code.insert(module_def.code.clone(), module_id);
            catalog.root.push(module_id);

            for sub_def in &module_def.submodules {
                let parent = module_def.code.as_str();
                check_code("submodule", parent, &sub_def.code)?;
                if catalog.modules[module_id.index()]
                    .by_code
                    .contains_key(&sub_def.code)
                {
                    return Err(duplicate("submodule", parent, &sub_def.code));
                }
                let sub_id = SubModuleId::from_index(catalog.submodules.len())?;
                catalog.submodules.push(SubModuleNode {
                    module: module_id,
                    code: sub_def.code.clone(),
                    name: sub_def.name.clone(),
                    priority: sub_def.priority,
                    active: sub_def.active,
                    children: Vec::new(),
                    by_code: HashMap::new(),
                });
                let module = &mut catalog.modules[module_id.index()];
                module.by_code.insert(sub_def.code.clone(), sub_id);
                module.children.push(sub_id);

                for comp_def in &sub_def.components {
                    let parent = format!("{}.{}", module_def.code, sub_def.code);
                    check_code("component", &parent, &comp_def.code)?;
                    if catalog.submodules[sub_id.index()]
                        .by_code
                        .contains_key(&comp_def.code)
                    {
                        return Err(duplicate("component", &parent, &comp_def.code));
                    }
                    let comp_id = ComponentId::from_index(catalog.components.len())?;
                    catalog.components.push(ComponentNode {
                        submodule: sub_id,
                        code: comp_def.code.clone(),
                        name: comp_def.name.clone(),
                        view: comp_def.view.clone(),
                        priority: comp_def.priority,
                        active: comp_def.active,
                        children: Vec::new(),
                        by_code: HashMap::new(),
                    });
                    let submodule = &mut catalog.submodules[sub_id.index()];
                    submodule.by_code.insert(comp_def.code.clone(), comp_id);
                    submodule.children.push(comp_id);

                    for action_def in &comp_def.actions {
                        let parent = format!("{parent}.{}", comp_def.code);
                        check_code("action", &parent, &action_def.code)?;
                        if catalog.components[comp_id.index()]
                            .by_code
                            .contains_key(&action_def.code)
                        {
                            return Err(duplicate("action", &parent, &action_def.code));
                        }
                        let action_id = ActionId::from_index(catalog.actions.len())?;
                        catalog.actions.push(ActionNode {
                            component: comp_id,
                            code: action_def.code.clone(),
                            name: action_def
                                .name
                                .clone()
                                .unwrap_or_else(|| action_def.code.clone()),
                            active: action_def.active,
                        });
                        let component = &mut catalog.components[comp_id.index()];
                        component.by_code.insert(action_def.code.clone(), action_id);
                        component.children.push(action_id);
                    }
                }
            }
        }

        catalog.sort_children();
        debug!(
            modules = catalog.modules.len(),
            submodules = catalog.submodules.len(),
            components = catalog.components.len(),
            actions = catalog.actions.len(),
            "capability hierarchy indexed"
        );
        Ok(catalog)
    }

    fn sort_children(&mut self) {
        let modules = &self.modules;
        self.root.sort_by(|a, b| {
            let (a, b) = (&modules[a.index()], &modules[b.index()]);
            (a.priority, &a.code).cmp(&(b.priority, &b.code))
        });
        let submodules = &self.submodules;
        for module in &mut self.modules {
            module.children.sort_by(|a, b| {
                let (a, b) = (&submodules[a.index()], &submodules[b.index()]);
                (a.priority, &a.code).cmp(&(b.priority, &b.code))
            });
        }
        let components = &self.components;
        for submodule in &mut self.submodules {
            submodule.children.sort_by(|a, b| {
                let (a, b) = (&components[a.index()], &components[b.index()]);
                (a.priority, &a.code).cmp(&(b.priority, &b.code))
            });
        }
    }

    /// Number of actions in the catalog.
    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    /// Modules in priority order.
    pub fn modules(&self) -> impl Iterator<Item = ModuleId> + '_ {
        self.root.iter().copied()
    }

    /// Submodules of a module in priority order.
    pub fn submodules_of(&self, module: ModuleId) -> impl Iterator<Item = SubModuleId> + '_ {
        self.modules[module.index()].children.iter().copied()
    }

    /// Components of a submodule in priority order.
    pub fn components_of(&self, submodule: SubModuleId) -> impl Iterator<Item = ComponentId> + '_ {
        self.submodules[submodule.index()].children.iter().copied()
    }

    /// Actions of a component in declaration order.
    pub fn actions_of(&self, component: ComponentId) -> impl Iterator<Item = ActionId> + '_ {
        self.components[component.index()].children.iter().copied()
    }

    /// Every action beneath a submodule.
    pub fn actions_in_submodule(
        &self,
        submodule: SubModuleId,
    ) -> impl Iterator<Item = ActionId> + '_ {
        self.components_of(submodule)
            .flat_map(move |component| self.actions_of(component))
    }

    /// Every action beneath a module.
    pub fn actions_in_module(&self, module: ModuleId) -> impl Iterator<Item = ActionId> + '_ {
        self.submodules_of(module)
            .flat_map(move |submodule| self.actions_in_submodule(submodule))
    }

    /// Module node by index.
    pub fn module(&self, id: ModuleId) -> &ModuleNode {
        &self.modules[id.index()]
    }

    /// SubModule node by index.
    pub fn submodule(&self, id: SubModuleId) -> &SubModuleNode {
        &self.submodules[id.index()]
    }

    /// Component node by index.
    pub fn component(&self, id: ComponentId) -> &ComponentNode {
        &self.components[id.index()]
    }

    /// Action node by index, if the index belongs to this snapshot.
    pub fn action(&self, id: ActionId) -> Option<&ActionNode> {
        self.actions.get(id.index())
    }

    /// Locate a module by code.
    pub fn find_module(&self, module: &str) -> Option<ModuleId> {
        self.by_code.get(module).copied()
    }

    /// Locate a submodule by its ancestor chain.
    pub fn find_submodule(&self, module: &str, submodule: &str) -> Option<SubModuleId> {
        let module = self.find_module(module)?;
        self.modules[module.index()].by_code.get(submodule).copied()
    }

    /// Locate a component by its ancestor chain.
    pub fn find_component(
        &self,
        module: &str,
        submodule: &str,
        component: &str,
    ) -> Option<ComponentId> {
        let submodule = self.find_submodule(module, submodule)?;
        self.submodules[submodule.index()]
            .by_code
            .get(component)
            .copied()
    }

    /// Resolve a full code path to its action.
    pub fn find_action(
        &self,
        module: &str,
        submodule: &str,
        component: &str,
        action: &str,
    ) -> Option<ActionId> {
        let component = self.find_component(module, submodule, component)?;
        self.components[component.index()]
            .by_code
            .get(action)
            .copied()
    }

    /// Resolve a [`CapabilityPath`] to its action.
    pub fn resolve(&self, path: &CapabilityPath) -> Option<ActionId> {
        self.find_action(&path.module, &path.submodule, &path.component, &path.action)
    }

    /// Ancestors of an action: (module, submodule, component).
    pub fn ancestors(&self, id: ActionId) -> Option<(ModuleId, SubModuleId, ComponentId)> {
        let action = self.action(id)?;
        let component = action.component;
        let submodule = self.components[component.index()].submodule;
        let module = self.submodules[submodule.index()].module;
        Some((module, submodule, component))
    }

    /// Reverse lookup of an action's code path.
    pub fn path_of(&self, id: ActionId) -> Option<CapabilityPath> {
        let (module, submodule, component) = self.ancestors(id)?;
        let action = self.action(id)?;
        Some(CapabilityPath::new(
            self.module(module).code.clone(),
            self.submodule(submodule).code.clone(),
            self.component(component).code.clone(),
            action.code.clone(),
        ))
    }

    /// True when the action and all of its ancestors are active.
    pub fn is_chain_active(&self, id: ActionId) -> bool {
        match (self.action(id), self.ancestors(id)) {
            (Some(action), Some((module, submodule, component))) => {
                action.active
                    && self.component(component).active
                    && self.submodule(submodule).active
                    && self.module(module).active
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{
        ActionDefinition, ComponentDefinition, ModuleDefinition, SubModuleDefinition,
    };

    fn action(code: &str) -> ActionDefinition {
        ActionDefinition {
            code: code.into(),
            name: None,
            active: true,
        }
    }

    fn definition() -> HierarchyDefinition {
        HierarchyDefinition {
            modules: vec![
                ModuleDefinition {
                    code: "hr".into(),
                    name: "HR".into(),
                    priority: 20,
                    active: true,
                    requires_subscription: true,
                    route_prefix: Some("/hr".into()),
                    submodules: vec![SubModuleDefinition {
                        code: "leave".into(),
                        name: "Leave".into(),
                        priority: 0,
                        active: false,
                        components: vec![ComponentDefinition {
                            code: "requests".into(),
                            name: "Requests".into(),
                            view: None,
                            priority: 0,
                            active: true,
                            actions: vec![action("approve")],
                        }],
                    }],
                },
                ModuleDefinition {
                    code: "core".into(),
                    name: "Core".into(),
                    priority: 10,
                    active: true,
                    requires_subscription: false,
                    route_prefix: None,
                    submodules: vec![SubModuleDefinition {
                        code: "users".into(),
                        name: "Users".into(),
                        priority: 0,
                        active: true,
                        components: vec![ComponentDefinition {
                            code: "user_profile".into(),
                            name: "Profile".into(),
                            view: Some("users.profile".into()),
                            priority: 0,
                            active: true,
                            actions: vec![action("view"), action("edit")],
                        }],
                    }],
                },
            ],
        }
    }

    #[test]
    fn resolves_paths_and_reverses_them() {
        let catalog = HierarchyCatalog::build(&definition()).unwrap();
        let id = catalog
            .find_action("core", "users", "user_profile", "edit")
            .unwrap();
        assert_eq!(
            catalog.path_of(id).unwrap().to_string(),
            "core.users.user_profile.edit"
        );
        assert_eq!(catalog.action(id).unwrap().name, "edit");
        assert!(catalog
            .find_action("core", "users", "user_profile", "delete")
            .is_none());
        assert!(catalog.find_action("hr", "users", "user_profile", "edit").is_none());
    }

    #[test]
    fn modules_follow_priority() {
        let catalog = HierarchyCatalog::build(&definition()).unwrap();
        let codes = catalog
            .modules()
            .map(|id| catalog.module(id).code.as_str())
            .collect::<Vec<_>>();
        assert_eq!(codes, vec!["core", "hr"]);
    }

    #[test]
    fn inactive_ancestor_deactivates_chain() {
        let catalog = HierarchyCatalog::build(&definition()).unwrap();
        let approve = catalog
            .find_action("hr", "leave", "requests", "approve")
            .unwrap();
        assert!(!catalog.is_chain_active(approve));
        let view = catalog
            .find_action("core", "users", "user_profile", "view")
            .unwrap();
        assert!(catalog.is_chain_active(view));
    }

    #[test]
    fn duplicate_codes_are_rejected_per_parent() {
        let mut def = definition();
        def.modules[1].submodules[0].components[0]
            .actions
            .push(action("edit"));
        let err = HierarchyCatalog::build(&def).unwrap_err();
        assert_eq!(
            err,
            CatalogError::DuplicateCode {
                level: "action",
                parent: "core.users.user_profile".into(),
                code: "edit".into(),
            }
        );
    }

    #[test]
    fn same_code_under_different_parents_is_fine() {
        let mut def = definition();
        def.modules[0].submodules[0].components[0]
            .actions
            .push(action("edit"));
        let catalog = HierarchyCatalog::build(&def).unwrap();
        assert!(catalog.find_action("hr", "leave", "requests", "edit").is_some());
        assert_eq!(catalog.action_count(), 4);
    }

    #[test]
    fn module_enumeration_covers_nested_actions() {
        let catalog = HierarchyCatalog::build(&definition()).unwrap();
        let core = catalog.find_module("core").unwrap();
        assert_eq!(catalog.actions_in_module(core).count(), 2);
    }

    #[test]
    fn separator_characters_are_rejected_in_codes() {
        let mut def = definition();
        def.modules[1].code = "core.users".into();
        assert_eq!(
            HierarchyCatalog::build(&def).unwrap_err(),
            CatalogError::ReservedCharacter {
                level: "module",
                code: "core.users".into(),
                reserved: '.',
            }
        );

        let mut def = definition();
        def.modules[1].submodules[0].components[0].actions[0].code = "view:all".into();
        assert!(matches!(
            HierarchyCatalog::build(&def),
            Err(CatalogError::ReservedCharacter { level: "action", reserved: ':', .. })
        ));
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn arena_index_overflow_is_an_error() {
        assert_eq!(ActionId::from_index(7).unwrap().index(), 7);
        assert_eq!(
            ActionId::from_index(u32::MAX as usize + 1),
            Err(CatalogError::CapacityExceeded { level: "action" })
        );
    }
}
