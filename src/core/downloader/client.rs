use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::digest::{DigestAlgorithm, DigestResult};
use crate::core::config::FetchConfig;
use crate::core::error::{LibraryError, LibraryResult};
use crate::core::http::build_http_client;

const MAX_PREALLOCATION: u64 = 1 << 20;

static PART_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Deadline-bounded, digest-verifying downloader.
///
/// Transfers run as tokio tasks gated by a fixed number of worker permits,
/// so a large batch never opens more than `workers` sockets at once. Runtime
/// tasks never keep the process alive on shutdown.
pub struct Fetcher {
    client: Client,
    workers: Arc<Semaphore>,
    worker_count: usize,
    deadline: Duration,
}

impl Fetcher {
    pub fn new(config: &FetchConfig) -> LibraryResult<Self> {
        let client = build_http_client(config)?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: &FetchConfig) -> Self {
        let worker_count = config.workers.max(1);
        Self {
            client,
            workers: Arc::new(Semaphore::new(worker_count)),
            worker_count,
            deadline: config.deadline,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    // ── File destination ────────────────────────────────

    /// Download `url` into `dest`, verifying against `expected` when given.
    ///
    /// Bytes land in a `.part` file next to `dest` and are hashed as they
    /// arrive; the file is renamed into place only after verification. On a
    /// mismatch both the partial file and any previous `dest` are removed.
    /// The partial file is also removed when the transfer is cancelled.
    pub async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        expected: Option<&str>,
        algorithm: DigestAlgorithm,
    ) -> LibraryResult<DigestResult> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(LibraryError::io(parent))?;
        }

        let transfer = store_verified(
            self.client.clone(),
            url.to_string(),
            dest.to_path_buf(),
            expected.map(str::to_string),
            algorithm,
        );
        let digest = self.run_bounded(url, transfer).await?;

        debug!("Downloaded: {} -> {:?}", url, dest);
        Ok(digest)
    }

    // ── Memory destination ──────────────────────────────

    /// Download `url` as UTF-8 text, verifying against `expected` when given.
    pub async fn fetch_to_memory(
        &self,
        url: &str,
        expected: Option<&str>,
        algorithm: DigestAlgorithm,
    ) -> LibraryResult<String> {
        let transfer = transfer_to_memory(self.client.clone(), url.to_string(), algorithm);
        let (bytes, digest) = self.run_bounded(url, transfer).await?;

        if let Some(expected) = expected {
            digest.check(url, expected)?;
        }

        String::from_utf8(bytes).map_err(|e| LibraryError::transport(url, e))
    }

    /// Run `transfer` on a worker permit under the hard deadline.
    ///
    /// The deadline starts once a worker is free. On expiry the task is
    /// aborted, which closes its socket and file handle, and awaited so
    /// nothing still writes once the error is returned.
    async fn run_bounded<T, F>(&self, url: &str, transfer: F) -> LibraryResult<T>
    where
        F: Future<Output = LibraryResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .workers
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| LibraryError::transport(url, e))?;

        let mut task = AbortOnDrop(tokio::spawn(async move {
            let _permit = permit;
            transfer.await
        }));

        match tokio::time::timeout(self.deadline, &mut task.0).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(LibraryError::transport(url, join)),
            Err(_) => {
                task.0.abort();
                let _ = (&mut task.0).await;
                warn!("Abandoned {} after {:?}", url, self.deadline);
                Err(LibraryError::Timeout {
                    url: url.to_string(),
                    deadline: self.deadline,
                })
            }
        }
    }
}

/// Aborts the transfer task if the awaiting future is dropped, e.g. when a
/// batch gives up on its remaining downloads.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn open(client: &Client, url: &str) -> LibraryResult<reqwest::Response> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| LibraryError::transport(url, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(LibraryError::DownloadFailed {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(response)
}

/// Runs inside the transfer task, so an aborted task still drops the
/// partial-file guard.
async fn store_verified(
    client: Client,
    url: String,
    dest: PathBuf,
    expected: Option<String>,
    algorithm: DigestAlgorithm,
) -> LibraryResult<DigestResult> {
    let part = PartialFile::new(&dest);
    let digest = transfer_to_file(&client, &url, part.path(), algorithm).await?;

    if let Some(expected) = expected.as_deref() {
        if let Err(e) = digest.check(&dest.display().to_string(), expected) {
            warn!("Discarding {:?}: {}", dest, e);
            remove_quietly(&dest).await;
            return Err(e);
        }
    }

    part.persist(&dest).await?;
    Ok(digest)
}

async fn transfer_to_file(
    client: &Client,
    url: &str,
    part: &Path,
    algorithm: DigestAlgorithm,
) -> LibraryResult<DigestResult> {
    let response = open(client, url).await?;
    let mut hasher = algorithm.hasher();

    // Scoped so the handle is closed before the caller renames the file.
    {
        let mut file = tokio::fs::File::create(part)
            .await
            .map_err(LibraryError::io(part))?;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| LibraryError::transport(url, e))?;
            hasher.update(&chunk);
            file.write_all(&chunk)
                .await
                .map_err(LibraryError::io(part))?;
        }
        file.flush().await.map_err(LibraryError::io(part))?;
    }

    Ok(hasher.finalize())
}

async fn transfer_to_memory(
    client: Client,
    url: String,
    algorithm: DigestAlgorithm,
) -> LibraryResult<(Vec<u8>, DigestResult)> {
    let response = open(&client, &url).await?;
    let mut hasher = algorithm.hasher();
    let capacity = response.content_length().unwrap_or(0).min(MAX_PREALLOCATION);
    let mut bytes = Vec::with_capacity(capacity as usize);

    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| LibraryError::transport(&url, e))?;
        hasher.update(&chunk);
        bytes.extend_from_slice(&chunk);
    }

    Ok((bytes, hasher.finalize()))
}

/// `<dest>.<pid>.<n>.part`, deleted on drop unless persisted.
///
/// Unique per transfer so concurrent fetches of the same artifact never
/// share a partial file.
struct PartialFile {
    path: PathBuf,
    persisted: bool,
}

impl PartialFile {
    fn new(dest: &Path) -> Self {
        let n = PART_COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut name = dest
            .file_name()
            .map(|f| f.to_os_string())
            .unwrap_or_default();
        name.push(format!(".{}.{}.part", std::process::id(), n));
        Self {
            path: dest.with_file_name(name),
            persisted: false,
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(mut self, dest: &Path) -> LibraryResult<()> {
        tokio::fs::rename(&self.path, dest)
            .await
            .map_err(LibraryError::io(dest))?;
        self.persisted = true;
        Ok(())
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if self.persisted {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed {:?}", self.path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not remove {:?}: {}", self.path, e),
        }
    }
}

async fn remove_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed {:?}", path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove {:?}: {}", path, e),
    }
}
