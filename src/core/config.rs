use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::downloader::DigestAlgorithm;
use crate::core::error::{LibraryError, LibraryResult};
use crate::core::maven::{ArtifactCoordinate, FORGE_MAVEN, MAVEN_CENTRAL, MOJANG_LIBRARIES};

const APP_DIR_NAME: &str = "launcher-libs";

/// Identification sent with every request. Some mirrors reject unknown agents.
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 6.1; WOW64; rv:31.0) Gecko/20100101 Firefox/31.0";

/// Settings for the library pipeline, usually read from `libraries.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Repository base URLs, tried in order.
    pub repositories: Vec<String>,
    pub libraries_dir: PathBuf,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    /// Hard limit for a single transfer, on top of the socket timeouts.
    pub transfer_deadline_secs: u64,
    pub worker_pool_size: usize,
    pub digest_algorithm: String,
    pub user_agent: String,
    /// Coordinates (version ignored) that may be bumped to the latest minor/patch.
    pub auto_update: Vec<String>,
    /// Group whose artifacts ship with the distribution.
    pub bundled_group: Option<String>,
    pub bundling_active: bool,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            repositories: vec![
                MAVEN_CENTRAL.to_string(),
                MOJANG_LIBRARIES.to_string(),
                FORGE_MAVEN.to_string(),
            ],
            libraries_dir: default_libraries_dir(),
            connect_timeout_secs: 20,
            read_timeout_secs: 20,
            transfer_deadline_secs: 20,
            worker_pool_size: 4,
            digest_algorithm: "SHA-512".to_string(),
            user_agent: BROWSER_USER_AGENT.to_string(),
            auto_update: Vec::new(),
            bundled_group: None,
            bundling_active: false,
        }
    }
}

impl LibraryConfig {
    /// Read settings from a JSON file. A missing file means defaults.
    pub fn load(path: &Path) -> LibraryResult<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No library config at {:?}, using defaults", path);
                return Ok(Self::default());
            }
            Err(e) => return Err(LibraryError::io(path)(e)),
        };
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn save(&self, path: &Path) -> LibraryResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(LibraryError::io(path))
    }

    pub fn algorithm(&self) -> LibraryResult<DigestAlgorithm> {
        self.digest_algorithm.parse()
    }

    pub fn auto_update_list(&self) -> LibraryResult<Vec<ArtifactCoordinate>> {
        self.auto_update
            .iter()
            .map(|coord| ArtifactCoordinate::parse(coord))
            .collect()
    }

    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            read_timeout: Duration::from_secs(self.read_timeout_secs),
            deadline: Duration::from_secs(self.transfer_deadline_secs),
            workers: self.worker_pool_size.max(1),
            user_agent: self.user_agent.clone(),
        }
    }
}

/// The part of the configuration the fetcher cares about.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub deadline: Duration,
    pub workers: usize,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        LibraryConfig::default().fetch_config()
    }
}

fn default_libraries_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
        .join("libraries")
}
