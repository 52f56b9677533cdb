mod artifact;
mod metadata;
mod resolver;
mod version;

pub use artifact::{ArtifactCoordinate, DEFAULT_EXTENSION};
pub use metadata::{MavenMetadata, MavenMetadataIndex, MetadataIndex};
pub use resolver::VersionResolver;
pub use version::{select_latest_minor_patch, shares_major, ReleaseVersion};

/// Well-known Maven repositories used by the Minecraft ecosystem.
pub const MOJANG_LIBRARIES: &str = "https://libraries.minecraft.net";
pub const MAVEN_CENTRAL: &str = "https://repo1.maven.org/maven2";
pub const FORGE_MAVEN: &str = "https://maven.minecraftforge.net";
