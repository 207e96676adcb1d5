//! ---
//! tg_section: "02-capability-catalog"
//! tg_subsection: "module"
//! tg_type: "source"
//! tg_scope: "code"
//! tg_description: "Capability hierarchy and subscription plan catalogs."
//! tg_version: "v0.0.0-prealpha"
//! tg_owner: "tbd"
//! ---
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::definition::HierarchyDefinition;
use crate::error::CatalogError;
use crate::hierarchy::HierarchyCatalog;

/// Hot-swappable handle to the current hierarchy snapshot.
///
/// Readers take an `Arc` snapshot and never observe a half-built tree.
/// Each replacement bumps a generation counter that callers fold into
/// cache keys.
#[derive(Debug, Clone)]
pub struct SharedCatalog {
    inner: Arc<RwLock<Arc<HierarchyCatalog>>>,
    generation: Arc<AtomicU64>,
}

impl SharedCatalog {
    /// Wrap an already-built catalog as generation 1.
    pub fn new(catalog: HierarchyCatalog) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(catalog))),
            generation: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Build and wrap a catalog from its definition.
    pub fn from_definition(definition: &HierarchyDefinition) -> Result<Self, CatalogError> {
        Ok(Self::new(HierarchyCatalog::build(definition)?))
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<HierarchyCatalog> {
        Arc::clone(&self.inner.read())
    }

    /// Current generation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Swap in a new catalog, returning the new generation.
    pub fn replace(&self, catalog: HierarchyCatalog) -> u64 {
        let actions = catalog.action_count();
        let mut guard = self.inner.write();
        *guard = Arc::new(catalog);
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        drop(guard);
        info!(generation, actions, "capability catalog replaced");
        generation
    }

    /// Rebuild from a definition; the current snapshot is kept on error.
    pub fn refresh(&self, definition: &HierarchyDefinition) -> Result<u64, CatalogError> {
        let catalog = HierarchyCatalog::build(definition)?;
        Ok(self.replace(catalog))
    }
}
