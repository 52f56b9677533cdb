pub mod core;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

pub use crate::core::config::{FetchConfig, LibraryConfig};
pub use crate::core::downloader::{DigestAlgorithm, DigestResult, Fetcher};
pub use crate::core::error::{ErrorKind, LibraryError, LibraryResult};
pub use crate::core::libraries::{
    DependencyRequest, LibraryRegistry, LogProgress, ResolvedArtifact, SealedResources,
};
pub use crate::core::loader::{CodeUnit, LocalFirstLoader, UnitSource};
pub use crate::core::maven::ArtifactCoordinate;

/// Install the fmt subscriber. Safe to call more than once.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,launcher_libs=debug")),
        )
        .try_init();
}

/// Download `requests` as configured and return the locations for the loader.
pub async fn load_libraries(
    config: &LibraryConfig,
    requests: &[DependencyRequest],
) -> LibraryResult<SealedResources> {
    let registry =
        LibraryRegistry::from_config(config)?.with_progress(Arc::new(LogProgress::default()));
    registry.download_all(requests).await?;
    registry.finalize()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::core::loader::StaticUnits;
    use crate::core::test_support::{class_bytes, jar_bytes, Route, TestServer};

    #[tokio::test]
    async fn downloaded_batch_backs_the_loader() {
        init_logging();

        let names = ["alpha", "beta", "gamma"];
        let mut routes = HashMap::new();
        for name in names {
            let coordinate = ArtifactCoordinate::new("com.example", name, "1.0");
            let class = format!("com/example/{name}/Entry.class");
            routes.insert(
                format!("/{}", coordinate.local_path().display()),
                Route::Body(jar_bytes(&[(class.as_str(), &class_bytes(name)[..])])),
            );
        }
        let server = TestServer::start(routes).await;
        let libs = tempfile::tempdir().unwrap();

        let config = LibraryConfig {
            repositories: vec![server.base()],
            libraries_dir: libs.path().to_path_buf(),
            ..LibraryConfig::default()
        };
        let requests: Vec<_> = names
            .iter()
            .map(|name| DependencyRequest::new(ArtifactCoordinate::new("com.example", name, "1.0")))
            .collect();

        let sealed = load_libraries(&config, &requests).await.unwrap();
        assert_eq!(sealed.len(), 3);

        let host = StaticUnits::new("host").with_unit("com.example.alpha.Entry", class_bytes("stale"));
        let loader = LocalFirstLoader::new(sealed, host);
        for name in names {
            let unit = loader
                .resolve(&format!("com.example.{name}.Entry"), true)
                .unwrap();
            assert_eq!(unit.bytes(), class_bytes(name));
            assert!(unit.is_linked());
        }
    }

    #[tokio::test]
    async fn bundled_group_from_config_needs_no_network() {
        let server = TestServer::start(HashMap::new()).await;
        let libs = tempfile::tempdir().unwrap();
        let config = LibraryConfig {
            repositories: vec![server.base()],
            libraries_dir: libs.path().to_path_buf(),
            bundled_group: Some("org.kettingpowered".into()),
            bundling_active: true,
            ..LibraryConfig::default()
        };
        let coordinate = ArtifactCoordinate::new("org.kettingpowered", "server", "1.0");
        let bundled = libs.path().join(coordinate.local_path());
        std::fs::create_dir_all(bundled.parent().unwrap()).unwrap();
        std::fs::write(&bundled, b"bundled server").unwrap();
        let requests = [DependencyRequest::new(coordinate)];

        let sealed = load_libraries(&config, &requests).await.unwrap();
        assert_eq!(sealed.len(), 1);
        assert!(server.requests().is_empty());
    }
}
