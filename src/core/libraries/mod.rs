mod registry;
mod request;
mod resources;

pub use registry::{LibraryRegistry, LogProgress, ProgressReporter};
pub use request::{
    ArtifactSource, BundleProvider, DependencyRequest, LibraryDirBundle, ResolvedArtifact,
};
pub use resources::{path_to_url, ResourceSet, SealedResources};
