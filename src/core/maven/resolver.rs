use std::sync::Arc;

use tracing::{debug, info, warn};

use super::artifact::ArtifactCoordinate;
use super::metadata::MetadataIndex;
use super::version::select_latest_minor_patch;
use crate::core::error::{LibraryError, LibraryResult};

/// Applies the auto-update policy: only allow-listed artifact lines may move,
/// and only to a newer minor/patch on the same major.
pub struct VersionResolver {
    index: Arc<dyn MetadataIndex>,
    auto_update: Vec<ArtifactCoordinate>,
}

impl VersionResolver {
    pub fn new(index: Arc<dyn MetadataIndex>, auto_update: Vec<ArtifactCoordinate>) -> Self {
        Self { index, auto_update }
    }

    pub fn is_auto_update(&self, coordinate: &ArtifactCoordinate) -> bool {
        self.auto_update
            .iter()
            .any(|allowed| coordinate.equals_ignoring_version(allowed))
    }

    /// Latest published coordinate on the same major line.
    ///
    /// Errors only when the index cannot be consulted at all.
    pub async fn try_latest_minor_patch(
        &self,
        coordinate: &ArtifactCoordinate,
    ) -> LibraryResult<ArtifactCoordinate> {
        let versions = self.index.versions(coordinate).await?;
        if versions.is_empty() {
            return Err(LibraryError::Resolution {
                coordinate: coordinate.to_string(),
                reason: "no published versions on this major line".to_string(),
            });
        }

        let picked = select_latest_minor_patch(
            &coordinate.version,
            versions.iter().map(String::as_str),
        );
        Ok(match picked {
            Some(version) => coordinate.with_version(&version),
            None => coordinate.clone(),
        })
    }

    /// Best-effort variant: lookup failures keep the requested coordinate.
    pub async fn latest_minor_patch(&self, coordinate: &ArtifactCoordinate) -> ArtifactCoordinate {
        match self.try_latest_minor_patch(coordinate).await {
            Ok(latest) => latest,
            Err(e) => {
                warn!("Keeping {} as requested: {}", coordinate, e);
                coordinate.clone()
            }
        }
    }

    /// Coordinate to download for `requested` under the auto-update policy.
    pub async fn resolve(&self, requested: &ArtifactCoordinate) -> ArtifactCoordinate {
        if !self.is_auto_update(requested) {
            return requested.clone();
        }

        let resolved = self.latest_minor_patch(requested).await;
        if resolved != *requested {
            info!("Using {} instead of {}", resolved, requested);
        } else {
            debug!("{} is already the latest on its line", requested);
        }
        resolved
    }
}
