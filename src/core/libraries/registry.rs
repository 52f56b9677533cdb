use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use tracing::{debug, error, info, warn};

use super::request::{
    ArtifactSource, BundleProvider, DependencyRequest, LibraryDirBundle, ResolvedArtifact,
};
use super::resources::{path_to_url, ResourceSet, SealedResources};
use crate::core::config::LibraryConfig;
use crate::core::downloader::{digest_file, DigestAlgorithm, Fetcher};
use crate::core::error::{ErrorKind, LibraryError, LibraryResult};
use crate::core::maven::{ArtifactCoordinate, MavenMetadataIndex, VersionResolver};

/// Receives one step per settled dependency. Purely informational.
pub trait ProgressReporter: Send + Sync {
    fn start(&self, _total: usize) {}
    fn step(&self, artifact: &ResolvedArtifact);
    fn finish(&self) {}
}

/// Progress as `info!` lines.
#[derive(Default)]
pub struct LogProgress {
    total: AtomicUsize,
    done: AtomicUsize,
}

impl ProgressReporter for LogProgress {
    fn start(&self, total: usize) {
        self.total.store(total, Ordering::Relaxed);
        self.done.store(0, Ordering::Relaxed);
    }

    fn step(&self, artifact: &ResolvedArtifact) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            "[{}/{}] {}",
            done,
            self.total.load(Ordering::Relaxed),
            artifact.coordinate
        );
    }
}

struct BundleRule {
    group: String,
    provider: Arc<dyn BundleProvider>,
}

/// Resolves, downloads and collects a flat batch of direct dependencies.
///
/// The registry is the context shared by both phases: `download_all` fills
/// its resource set, `finalize` freezes it for the module loader.
pub struct LibraryRegistry {
    fetcher: Arc<Fetcher>,
    resolver: VersionResolver,
    repositories: Vec<String>,
    libraries_dir: PathBuf,
    algorithm: DigestAlgorithm,
    bundle: Option<BundleRule>,
    progress: Option<Arc<dyn ProgressReporter>>,
    resources: ResourceSet,
}

impl LibraryRegistry {
    pub fn new(
        fetcher: Arc<Fetcher>,
        resolver: VersionResolver,
        repositories: Vec<String>,
        libraries_dir: PathBuf,
    ) -> Self {
        Self {
            fetcher,
            resolver,
            repositories,
            libraries_dir,
            algorithm: DigestAlgorithm::default(),
            bundle: None,
            progress: None,
            resources: ResourceSet::new(),
        }
    }

    /// Wire the production pipeline: HTTP fetcher, Maven metadata index,
    /// the configured allow-list and, if active, the bundled group.
    pub fn from_config(config: &LibraryConfig) -> LibraryResult<Self> {
        let fetcher = Arc::new(Fetcher::new(&config.fetch_config())?);
        let index = Arc::new(MavenMetadataIndex::new(
            fetcher.clone(),
            config.repositories.clone(),
        ));
        let resolver = VersionResolver::new(index, config.auto_update_list()?);

        let mut registry = Self::new(
            fetcher,
            resolver,
            config.repositories.clone(),
            config.libraries_dir.clone(),
        )
        .with_algorithm(config.algorithm()?);

        if config.bundling_active {
            if let Some(group) = &config.bundled_group {
                let provider = Arc::new(LibraryDirBundle::new(config.libraries_dir.clone()));
                registry = registry.with_bundle(group, provider);
            }
        }
        Ok(registry)
    }

    pub fn with_algorithm(mut self, algorithm: DigestAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Artifacts of `group` resolve through `provider` without network access.
    pub fn with_bundle(mut self, group: &str, provider: Arc<dyn BundleProvider>) -> Self {
        self.bundle = Some(BundleRule {
            group: group.to_string(),
            provider,
        });
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn resources(&self) -> &ResourceSet {
        &self.resources
    }

    // ── Batch ───────────────────────────────────────────

    /// Acquire every request concurrently, adding each location to the set.
    ///
    /// Fail-fast: the first failure cancels the rest of the batch, is
    /// recorded in the set, and surfaces as `BatchIncomplete`.
    pub async fn download_all(&self, requests: &[DependencyRequest]) -> LibraryResult<()> {
        let total = requests.len();
        info!(
            "Loading {} libraries, {} transfer workers",
            total,
            self.fetcher.worker_count()
        );
        if let Some(progress) = &self.progress {
            progress.start(total);
        }

        let mut pending = stream::iter(requests)
            .map(|request| async move { (request, self.acquire(request).await) })
            .buffer_unordered(total.max(1));

        let mut completed = 0;
        while let Some((request, result)) = pending.next().await {
            let registered = result.and_then(|artifact| {
                let url = path_to_url(&artifact.location)?;
                Ok((artifact, url))
            });

            match registered {
                Ok((artifact, url)) => {
                    if !self.resources.insert(url) {
                        debug!("{:?} already registered", artifact.location);
                    }
                    completed += 1;
                    if let Some(progress) = &self.progress {
                        progress.step(&artifact);
                    }
                }
                Err(e) => {
                    error!("Failed to load {}: {}", request.coordinate, e);
                    self.resources.record_failure(request.coordinate.to_string());
                    return Err(LibraryError::BatchIncomplete {
                        completed,
                        failed: 1,
                        total,
                        reason: format!("{}: {}", request.coordinate, e),
                    });
                }
            }
        }

        if let Some(progress) = &self.progress {
            progress.finish();
        }
        info!("Loaded {} libraries", self.resources.len());
        Ok(())
    }

    /// Hand the collected locations to the loading phase.
    pub fn finalize(&self) -> LibraryResult<SealedResources> {
        self.resources.seal()
    }

    /// [`finalize`](Self::finalize), terminating the process when the set is incomplete.
    pub fn finalize_or_exit(&self) -> SealedResources {
        match self.finalize() {
            Ok(sealed) => sealed,
            Err(e) => {
                error!("Failed to load libraries, please try again: {}", e);
                std::process::exit(1);
            }
        }
    }

    // ── Single dependency ───────────────────────────────

    /// Decide the final coordinate for `request` and make it available on disk.
    ///
    /// Bundled artifacts win over the auto-update policy, and must already
    /// be on disk.
    pub async fn acquire(&self, request: &DependencyRequest) -> LibraryResult<ResolvedArtifact> {
        let requested = &request.coordinate;

        if let Some(location) = self.bundled_path(requested) {
            if !tokio::fs::try_exists(&location).await.unwrap_or(false) {
                return Err(LibraryError::BundleMissing {
                    coordinate: requested.to_string(),
                    path: location,
                });
            }
            debug!("Skipping download of {}, since it should be bundled.", requested);
            return Ok(ResolvedArtifact {
                requested: requested.clone(),
                coordinate: requested.clone(),
                location,
                source: ArtifactSource::Bundled,
            });
        }

        let coordinate = self.resolver.resolve(requested).await;
        let expected = if coordinate == *requested {
            request.expected_digest.clone()
        } else {
            self.sidecar_digest(&coordinate).await
        };

        let location = self.libraries_dir.join(coordinate.local_path());
        let source = if self.is_reusable(&location, expected.as_deref()).await {
            ArtifactSource::Cached
        } else {
            self.download(&coordinate, &location, expected.as_deref())
                .await?;
            ArtifactSource::Downloaded
        };

        Ok(ResolvedArtifact {
            requested: requested.clone(),
            coordinate,
            location,
            source,
        })
    }

    fn bundled_path(&self, coordinate: &ArtifactCoordinate) -> Option<PathBuf> {
        let rule = self.bundle.as_ref()?;
        (rule.group == coordinate.group).then(|| rule.provider.bundled_path(coordinate))
    }

    async fn is_reusable(&self, location: &Path, expected: Option<&str>) -> bool {
        if !tokio::fs::try_exists(location).await.unwrap_or(false) {
            return false;
        }
        let Some(expected) = expected else {
            return true;
        };
        match digest_file(location, self.algorithm).await {
            Ok(digest) if digest.matches(expected) => true,
            Ok(_) => {
                warn!("{:?} does not match its digest, downloading again", location);
                false
            }
            Err(e) => {
                warn!("Could not hash {:?}: {}", location, e);
                false
            }
        }
    }

    /// Digest published next to the artifact, if any repository has one.
    async fn sidecar_digest(&self, coordinate: &ArtifactCoordinate) -> Option<String> {
        for repo in &self.repositories {
            let url = format!(
                "{}.{}",
                coordinate.url(repo),
                self.algorithm.sidecar_extension()
            );
            match self
                .fetcher
                .fetch_to_memory(&url, None, self.algorithm)
                .await
            {
                Ok(body) => {
                    if let Some(token) = body.split_whitespace().next() {
                        if token.chars().all(|c| c.is_ascii_hexdigit()) {
                            return Some(token.to_string());
                        }
                    }
                    debug!("Ignoring malformed checksum at {}", url);
                }
                Err(e) => debug!("No checksum at {}: {}", url, e),
            }
        }
        warn!(
            "No {} checksum published for {}, downloading unverified",
            self.algorithm, coordinate
        );
        None
    }

    /// Try each repository until one delivers a verified copy.
    async fn download(
        &self,
        coordinate: &ArtifactCoordinate,
        dest: &Path,
        expected: Option<&str>,
    ) -> LibraryResult<()> {
        let mut last_err: Option<LibraryError> = None;

        for repo in &self.repositories {
            let url = coordinate.url(repo);
            match self.fetcher.fetch(&url, dest, expected, self.algorithm).await {
                Ok(_) => return Ok(()),
                // A tampered copy is never retried elsewhere.
                Err(e) if e.kind() == ErrorKind::Integrity => return Err(e),
                Err(e) => {
                    debug!("Repository {} failed for {}: {}", repo, coordinate, e);
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| LibraryError::Transport {
            url: coordinate.to_string(),
            reason: "no repositories configured".to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::core::config::FetchConfig;
    use crate::core::downloader::digest_bytes;
    use crate::core::maven::MetadataIndex;
    use crate::core::test_support::{Route, TestServer};

    struct StaticIndex(Vec<&'static str>);

    #[async_trait]
    impl MetadataIndex for StaticIndex {
        async fn versions(&self, _coordinate: &ArtifactCoordinate) -> LibraryResult<Vec<String>> {
            Ok(self.0.iter().map(|v| v.to_string()).collect())
        }
    }

    #[derive(Default)]
    struct CountingProgress {
        steps: AtomicUsize,
    }

    impl ProgressReporter for CountingProgress {
        fn step(&self, _artifact: &ResolvedArtifact) {
            self.steps.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn coord(raw: &str) -> ArtifactCoordinate {
        ArtifactCoordinate::parse(raw).unwrap()
    }

    fn route(routes: &mut HashMap<String, Route>, coordinate: &str, body: &[u8]) {
        routes.insert(
            format!("/{}", coord(coordinate).local_path().display()),
            Route::Body(body.to_vec()),
        );
    }

    fn registry(
        server: &TestServer,
        libs: &Path,
        index: Vec<&'static str>,
        auto_update: Vec<ArtifactCoordinate>,
    ) -> LibraryRegistry {
        let config = FetchConfig {
            deadline: Duration::from_secs(5),
            ..FetchConfig::default()
        };
        let fetcher = Arc::new(Fetcher::new(&config).unwrap());
        let resolver = VersionResolver::new(Arc::new(StaticIndex(index)), auto_update);
        LibraryRegistry::new(fetcher, resolver, vec![server.base()], libs.to_path_buf())
    }

    #[tokio::test]
    async fn batch_of_three_succeeds() {
        let mut routes = HashMap::new();
        route(&mut routes, "com.example:alpha:1.0", b"alpha");
        route(&mut routes, "com.example:beta:2.0", b"beta");
        route(&mut routes, "com.example:gamma:3.0", b"gamma");
        let server = TestServer::start(routes).await;
        let libs = tempfile::tempdir().unwrap();

        let progress = Arc::new(CountingProgress::default());
        let registry =
            registry(&server, libs.path(), vec![], vec![]).with_progress(progress.clone());
        let requests: Vec<_> = ["com.example:alpha:1.0", "com.example:beta:2.0", "com.example:gamma:3.0"]
            .iter()
            .map(|c| DependencyRequest::new(coord(c)))
            .collect();

        registry.download_all(&requests).await.unwrap();
        let sealed = registry.finalize().unwrap();

        assert_eq!(sealed.len(), 3);
        assert_eq!(progress.steps.load(Ordering::SeqCst), 3);
        for request in &requests {
            let expected = path_to_url(&libs.path().join(request.coordinate.local_path())).unwrap();
            assert!(sealed.iter().any(|u| *u == expected));
        }
    }

    #[tokio::test]
    async fn one_failure_aborts_the_batch() {
        let mut routes = HashMap::new();
        route(&mut routes, "com.example:alpha:1.0", b"alpha");
        route(&mut routes, "com.example:gamma:3.0", b"gamma");
        let server = TestServer::start(routes).await;
        let libs = tempfile::tempdir().unwrap();
        let registry = registry(&server, libs.path(), vec![], vec![]);

        let requests: Vec<_> = ["com.example:alpha:1.0", "com.example:missing:2.0", "com.example:gamma:3.0"]
            .iter()
            .map(|c| DependencyRequest::new(coord(c)))
            .collect();

        let err = registry.download_all(&requests).await.unwrap_err();
        assert!(matches!(err, LibraryError::BatchIncomplete { total: 3, .. }));
        assert!(registry.resources().len() < 3);
        assert_eq!(registry.resources().failures(), vec!["com.example:missing:2.0".to_string()]);
        assert!(registry.finalize().unwrap_err().is_process_fatal());
    }

    #[tokio::test]
    async fn failed_batch_leaves_no_partial_files() {
        let mut routes = HashMap::new();
        routes.insert(
            format!("/{}", coord("com.example:slow:1.0").local_path().display()),
            Route::Stall {
                head: b"partial".to_vec(),
                pause: Duration::from_secs(30),
            },
        );
        let server = TestServer::start(routes).await;
        let libs = tempfile::tempdir().unwrap();
        let registry = registry(&server, libs.path(), vec![], vec![]);
        let slow_dir = libs.path().join(coord("com.example:slow:1.0").local_path());
        let slow_dir = slow_dir.parent().unwrap().to_path_buf();

        let requests: Vec<_> = ["com.example:slow:1.0", "com.example:missing:1.0"]
            .iter()
            .map(|c| DependencyRequest::new(coord(c)))
            .collect();
        let err = registry.download_all(&requests).await.unwrap_err();
        assert!(matches!(err, LibraryError::BatchIncomplete { .. }));

        let parts = || -> Vec<PathBuf> {
            std::fs::read_dir(&slow_dir)
                .map(|entries| {
                    entries
                        .map(|entry| entry.unwrap().path())
                        .filter(|p| p.extension().is_some_and(|ext| ext == "part"))
                        .collect()
                })
                .unwrap_or_default()
        };
        let started = std::time::Instant::now();
        while !parts().is_empty() {
            assert!(started.elapsed() < Duration::from_secs(3), "left behind: {:?}", parts());
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    #[tokio::test]
    async fn tampered_artifact_fails_the_batch_and_is_removed() {
        let mut routes = HashMap::new();
        route(&mut routes, "com.example:alpha:1.0", b"alpha");
        let server = TestServer::start(routes).await;
        let libs = tempfile::tempdir().unwrap();
        let registry = registry(&server, libs.path(), vec![], vec![]);

        let request = DependencyRequest::new(coord("com.example:alpha:1.0")).with_digest("deadbeef");
        let err = registry.download_all(&[request.clone()]).await.unwrap_err();

        assert!(matches!(err, LibraryError::BatchIncomplete { completed: 0, .. }));
        assert!(!libs.path().join(request.coordinate.local_path()).exists());
    }

    #[tokio::test]
    async fn duplicate_requests_register_one_location() {
        let mut routes = HashMap::new();
        route(&mut routes, "com.example:alpha:1.0", b"alpha");
        let server = TestServer::start(routes).await;
        let libs = tempfile::tempdir().unwrap();
        let registry = registry(&server, libs.path(), vec![], vec![]);

        let request = DependencyRequest::new(coord("com.example:alpha:1.0"));
        registry
            .download_all(&[request.clone(), request])
            .await
            .unwrap();
        assert_eq!(registry.finalize().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn verified_local_copy_is_reused() {
        let server = TestServer::start(HashMap::new()).await;
        let libs = tempfile::tempdir().unwrap();
        let coordinate = coord("com.example:alpha:1.0");
        let path = libs.path().join(coordinate.local_path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"alpha").unwrap();

        let registry = registry(&server, libs.path(), vec![], vec![]);
        let digest = digest_bytes(b"alpha", DigestAlgorithm::Sha512).hex;
        let resolved = registry
            .acquire(&DependencyRequest::new(coordinate).with_digest(&digest))
            .await
            .unwrap();

        assert_eq!(resolved.source, ArtifactSource::Cached);
        assert!(server.requests().is_empty());
    }

    #[tokio::test]
    async fn allow_listed_dependency_is_bumped_and_verified_by_sidecar() {
        let mut routes = HashMap::new();
        route(&mut routes, "org.ow2.asm:asm:9.7.1", b"asm 9.7.1");
        routes.insert(
            format!("/{}.sha512", coord("org.ow2.asm:asm:9.7.1").local_path().display()),
            Route::Body(
                format!("{}  asm-9.7.1.jar\n", digest_bytes(b"asm 9.7.1", DigestAlgorithm::Sha512).hex)
                    .into_bytes(),
            ),
        );
        let server = TestServer::start(routes).await;
        let libs = tempfile::tempdir().unwrap();
        let registry = registry(
            &server,
            libs.path(),
            vec!["9.5", "9.7.1", "10.0"],
            vec![coord("org.ow2.asm:asm:1.0")],
        );

        let resolved = registry
            .acquire(&DependencyRequest::new(coord("org.ow2.asm:asm:9.5")).with_digest("not-for-9.7.1"))
            .await
            .unwrap();

        assert!(resolved.was_updated());
        assert_eq!(resolved.coordinate.version, "9.7.1");
        assert_eq!(resolved.source, ArtifactSource::Downloaded);
        assert_eq!(std::fs::read(&resolved.location).unwrap(), b"asm 9.7.1");
    }

    #[tokio::test]
    async fn bundled_group_skips_network_and_update_policy() {
        let server = TestServer::start(HashMap::new()).await;
        let libs = tempfile::tempdir().unwrap();
        let bundle_root = tempfile::tempdir().unwrap();
        let registry = registry(
            &server,
            libs.path(),
            vec!["1.9.9"],
            vec![coord("org.kettingpowered:server:1.0")],
        )
        .with_bundle(
            "org.kettingpowered",
            Arc::new(LibraryDirBundle::new(bundle_root.path())),
        );

        let requested = coord("org.kettingpowered:server:1.0");
        let bundled = bundle_root.path().join(requested.local_path());
        std::fs::create_dir_all(bundled.parent().unwrap()).unwrap();
        std::fs::write(&bundled, b"bundled server").unwrap();

        let resolved = registry
            .acquire(&DependencyRequest::new(requested.clone()))
            .await
            .unwrap();

        assert_eq!(resolved.source, ArtifactSource::Bundled);
        assert_eq!(resolved.coordinate, requested);
        assert_eq!(resolved.location, bundled);
        assert!(server.requests().is_empty());
    }

    #[tokio::test]
    async fn missing_bundled_artifact_fails_the_batch() {
        let server = TestServer::start(HashMap::new()).await;
        let libs = tempfile::tempdir().unwrap();
        let bundle_root = tempfile::tempdir().unwrap();
        let registry = registry(&server, libs.path(), vec![], vec![]).with_bundle(
            "org.kettingpowered",
            Arc::new(LibraryDirBundle::new(bundle_root.path())),
        );

        let request = DependencyRequest::new(coord("org.kettingpowered:server:1.0"));
        let err = registry.acquire(&request).await.unwrap_err();
        assert!(matches!(err, LibraryError::BundleMissing { .. }));

        let err = registry.download_all(&[request]).await.unwrap_err();
        assert!(matches!(err, LibraryError::BatchIncomplete { completed: 0, .. }));
        assert!(registry.resources().is_empty());
        assert!(registry.finalize().is_err());
        assert!(server.requests().is_empty());
    }

    #[tokio::test]
    async fn later_repository_serves_what_the_first_lacks() {
        let empty = TestServer::start(HashMap::new()).await;
        let mut routes = HashMap::new();
        route(&mut routes, "com.example:alpha:1.0", b"alpha");
        let full = TestServer::start(routes).await;
        let libs = tempfile::tempdir().unwrap();

        let fetcher = Arc::new(Fetcher::new(&FetchConfig::default()).unwrap());
        let resolver = VersionResolver::new(Arc::new(StaticIndex(vec![])), vec![]);
        let registry = LibraryRegistry::new(
            fetcher,
            resolver,
            vec![empty.base(), full.base()],
            libs.path().to_path_buf(),
        );

        let resolved = registry
            .acquire(&DependencyRequest::new(coord("com.example:alpha:1.0")))
            .await
            .unwrap();
        assert_eq!(std::fs::read(resolved.location).unwrap(), b"alpha");
        assert_eq!(empty.requests().len(), 1);
    }
}
