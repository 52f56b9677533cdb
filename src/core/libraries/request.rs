use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::maven::ArtifactCoordinate;

/// A direct dependency as declared by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRequest {
    pub coordinate: ArtifactCoordinate,
    /// Trusted digest of the declared version, if the caller knows one.
    #[serde(default)]
    pub expected_digest: Option<String>,
}

impl DependencyRequest {
    pub fn new(coordinate: ArtifactCoordinate) -> Self {
        Self {
            coordinate,
            expected_digest: None,
        }
    }

    pub fn with_digest(mut self, digest: &str) -> Self {
        self.expected_digest = Some(digest.to_string());
        self
    }
}

/// Where a resolved artifact's bytes came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactSource {
    Bundled,
    /// Already on disk and consistent with the known digest.
    Cached,
    Downloaded,
}

/// Outcome of resolving one [`DependencyRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    pub requested: ArtifactCoordinate,
    /// Coordinate chosen after the update policy; equals `requested` unless bumped.
    pub coordinate: ArtifactCoordinate,
    pub location: PathBuf,
    pub source: ArtifactSource,
}

impl ResolvedArtifact {
    pub fn was_updated(&self) -> bool {
        self.requested != self.coordinate
    }
}

/// Supplies local paths for artifacts shipped with the distribution.
pub trait BundleProvider: Send + Sync {
    fn bundled_path(&self, coordinate: &ArtifactCoordinate) -> PathBuf;
}

/// Bundled artifacts laid out Maven-style under a root directory.
pub struct LibraryDirBundle {
    root: PathBuf,
}

impl LibraryDirBundle {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl BundleProvider for LibraryDirBundle {
    fn bundled_path(&self, coordinate: &ArtifactCoordinate) -> PathBuf {
        self.root.join(coordinate.local_path())
    }
}
