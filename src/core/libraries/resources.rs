use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use reqwest::Url;

use crate::core::error::{LibraryError, LibraryResult};

#[derive(Default)]
struct ResourceState {
    entries: Vec<Url>,
    /// Labels of dependencies that never produced a location.
    failures: Vec<String>,
}

/// Locations collected during the download phase.
///
/// Insertion order is kept and duplicates are dropped. The lock only ever
/// covers the insert itself, never network I/O.
#[derive(Default)]
pub struct ResourceSet {
    state: Mutex<ResourceState>,
}

impl ResourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ResourceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns `false` when the location was already present.
    pub fn insert(&self, url: Url) -> bool {
        let mut state = self.state();
        if state.entries.contains(&url) {
            return false;
        }
        state.entries.push(url);
        true
    }

    pub fn record_failure(&self, label: impl Into<String>) {
        self.state().failures.push(label.into());
    }

    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<Url> {
        self.state().entries.clone()
    }

    pub fn failures(&self) -> Vec<String> {
        self.state().failures.clone()
    }

    /// Freeze the current entries for the loading phase.
    ///
    /// Refuses while any dependency is recorded as failed.
    pub fn seal(&self) -> LibraryResult<SealedResources> {
        let state = self.state();
        if !state.failures.is_empty() {
            return Err(LibraryError::BatchIncomplete {
                completed: state.entries.len(),
                failed: state.failures.len(),
                total: state.entries.len() + state.failures.len(),
                reason: format!("unresolved: {}", state.failures.join(", ")),
            });
        }
        Ok(SealedResources(state.entries.clone().into()))
    }
}

/// Read-only, cheaply cloneable view handed to the module loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedResources(Arc<[Url]>);

impl SealedResources {
    pub fn from_urls(urls: Vec<Url>) -> Self {
        let mut unique: Vec<Url> = Vec::with_capacity(urls.len());
        for url in urls {
            if !unique.contains(&url) {
                unique.push(url);
            }
        }
        Self(unique.into())
    }

    pub fn as_slice(&self) -> &[Url] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Url> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub fn path_to_url(path: &Path) -> LibraryResult<Url> {
    let absolute = std::path::absolute(path).map_err(LibraryError::io(path))?;
    Url::from_file_path(&absolute).map_err(|_| LibraryError::InvalidLocation(absolute))
}
