use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, error};

use super::sources::{LocalResources, UnitSource};
use super::unit::CodeUnit;
use crate::core::error::{LibraryError, LibraryResult};
use crate::core::libraries::SealedResources;

/// Resolves units by asking its tiers in order, local libraries first.
///
/// This inverts the usual parent-first order so downloaded or bundled
/// artifacts shadow whatever the host environment would supply. Each name
/// resolves to one canonical [`CodeUnit`] for the loader's lifetime.
pub struct LocalFirstLoader {
    tiers: Vec<Box<dyn UnitSource>>,
    loaded: Mutex<HashMap<String, Arc<CodeUnit>>>,
}

impl LocalFirstLoader {
    /// Local resources first, then `delegate`.
    pub fn new(resources: SealedResources, delegate: impl UnitSource + 'static) -> Self {
        let tiers: Vec<Box<dyn UnitSource>> = vec![
            Box::new(LocalResources::new(resources)),
            Box::new(delegate),
        ];
        Self::from_tiers(tiers)
    }

    pub fn from_tiers(tiers: Vec<Box<dyn UnitSource>>) -> Self {
        Self {
            tiers,
            loaded: Mutex::new(HashMap::new()),
        }
    }

    pub fn tier_labels(&self) -> Vec<&str> {
        self.tiers.iter().map(|tier| tier.label()).collect()
    }

    fn loaded(&self) -> MutexGuard<'_, HashMap<String, Arc<CodeUnit>>> {
        self.loaded.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn find_loaded(&self, name: &str) -> Option<Arc<CodeUnit>> {
        self.loaded().get(name).cloned()
    }

    /// Resolve `name`, linking it first when `resolve` is set.
    ///
    /// Fails with `NotFound` when no tier has the unit; the host is expected
    /// to treat that as a startup failure.
    pub fn resolve(&self, name: &str, resolve: bool) -> LibraryResult<Arc<CodeUnit>> {
        let unit = match self.find_loaded(name) {
            Some(unit) => unit,
            None => {
                let found = self.search(name)?;
                self.define(found)
            }
        };

        if resolve {
            unit.link()?;
        }
        Ok(unit)
    }

    fn search(&self, name: &str) -> LibraryResult<CodeUnit> {
        for tier in &self.tiers {
            if let Some(unit) = tier.find(name)? {
                debug!("Resolved {} from {}", name, tier.label());
                return Ok(unit);
            }
        }
        error!("{} not found in any of {:?}", name, self.tier_labels());
        Err(LibraryError::NotFound(name.to_string()))
    }

    /// First definition wins; a racing duplicate is discarded.
    fn define(&self, unit: CodeUnit) -> Arc<CodeUnit> {
        let mut loaded = self.loaded();
        loaded
            .entry(unit.name().to_string())
            .or_insert_with(|| Arc::new(unit))
            .clone()
    }
}
