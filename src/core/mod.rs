// ─── Library acquisition core ───
// Resolve, download, verify and load the launcher's dependency jars.
//
// Architecture:
//   core/
//     maven/      - Coordinates, version policy, metadata index
//     downloader/ - Deadline-bounded fetcher with streaming digests
//     libraries/  - Batch registry + resource set
//     loader/     - Local-first code unit resolution
//     config      - JSON settings with defaults

pub mod config;
pub mod downloader;
pub mod error;
pub mod http;
pub mod libraries;
pub mod loader;
pub mod maven;

#[cfg(test)]
pub(crate) mod test_support;
