use std::sync::Arc;

use async_trait::async_trait;
use quick_xml::de::from_str;
use serde::Deserialize;
use tracing::debug;

use super::artifact::ArtifactCoordinate;
use super::version::shares_major;
use crate::core::downloader::{DigestAlgorithm, Fetcher};
use crate::core::error::{LibraryError, LibraryResult};

/// Minimal `maven-metadata.xml` model – only the version listing.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MavenMetadata {
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub artifact_id: Option<String>,
    #[serde(default)]
    pub versioning: Option<Versioning>,
}

#[derive(Debug, Deserialize, Default)]
pub struct Versioning {
    #[serde(default)]
    pub latest: Option<String>,
    #[serde(default)]
    pub release: Option<String>,
    #[serde(default)]
    pub versions: Option<Versions>,
}

#[derive(Debug, Deserialize, Default)]
pub struct Versions {
    #[serde(default, rename = "version")]
    pub items: Vec<String>,
}

impl MavenMetadata {
    pub fn parse(xml: &str) -> LibraryResult<Self> {
        from_str(xml).map_err(|e| LibraryError::MetadataParse(e.to_string()))
    }

    pub fn versions(&self) -> &[String] {
        self.versioning
            .as_ref()
            .and_then(|v| v.versions.as_ref())
            .map(|v| v.items.as_slice())
            .unwrap_or_default()
    }
}

/// Source of published versions for an artifact line.
#[async_trait]
pub trait MetadataIndex: Send + Sync {
    /// Published versions sharing `coordinate`'s major version.
    async fn versions(&self, coordinate: &ArtifactCoordinate) -> LibraryResult<Vec<String>>;
}

/// Reads `maven-metadata.xml` from each repository and merges the listings.
pub struct MavenMetadataIndex {
    fetcher: Arc<Fetcher>,
    repositories: Vec<String>,
}

impl MavenMetadataIndex {
    pub fn new(fetcher: Arc<Fetcher>, repositories: Vec<String>) -> Self {
        Self {
            fetcher,
            repositories,
        }
    }
}

#[async_trait]
impl MetadataIndex for MavenMetadataIndex {
    async fn versions(&self, coordinate: &ArtifactCoordinate) -> LibraryResult<Vec<String>> {
        let mut found: Vec<String> = Vec::new();
        let mut last_err: Option<LibraryError> = None;
        let mut reached = false;

        for repo in &self.repositories {
            let url = coordinate.metadata_url(repo);
            let xml = match self
                .fetcher
                .fetch_to_memory(&url, None, DigestAlgorithm::default())
                .await
            {
                Ok(xml) => xml,
                Err(e) => {
                    debug!("Repository {} has no metadata for {}: {}", repo, coordinate, e);
                    last_err = Some(e);
                    continue;
                }
            };

            let metadata = match MavenMetadata::parse(&xml) {
                Ok(m) => m,
                Err(e) => {
                    debug!("Unreadable metadata at {}: {}", url, e);
                    last_err = Some(e);
                    continue;
                }
            };

            reached = true;
            for version in metadata.versions() {
                if shares_major(&coordinate.version, version) && !found.contains(version) {
                    found.push(version.clone());
                }
            }
        }

        if !reached {
            let reason = last_err
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no repositories configured".to_string());
            return Err(LibraryError::Resolution {
                coordinate: coordinate.to_string(),
                reason,
            });
        }
        Ok(found)
    }
}
