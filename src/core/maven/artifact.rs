use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::core::error::{LibraryError, LibraryResult};

/// Packaging assumed when a coordinate carries no `@extension`.
pub const DEFAULT_EXTENSION: &str = "jar";

/// A logical artifact reference.
///
/// Accepted forms:
///   `group:name:version`
///   `group:name:version:classifier`
///   `group:name:version:classifier@extension`
///   `group:name:version@extension`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ArtifactCoordinate {
    pub group: String,
    pub name: String,
    pub version: String,
    pub classifier: Option<String>,
    pub extension: Option<String>,
}

impl ArtifactCoordinate {
    pub fn new(group: &str, name: &str, version: &str) -> Self {
        Self {
            group: group.to_string(),
            name: name.to_string(),
            version: version.to_string(),
            classifier: None,
            extension: None,
        }
    }

    /// Parse a coordinate string.
    ///
    /// # Examples
    /// ```
    /// use launcher_libs::ArtifactCoordinate;
    ///
    /// let a = ArtifactCoordinate::parse("net.sf.jopt-simple:jopt-simple:5.0.4").unwrap();
    /// assert_eq!(a.group, "net.sf.jopt-simple");
    /// ```
    pub fn parse(coord: &str) -> LibraryResult<Self> {
        let coord = coord.trim();
        let (coord_part, extension) = match coord.rfind('@') {
            Some(idx) => (&coord[..idx], Some(coord[idx + 1..].to_string())),
            None => (coord, None),
        };

        let parts: Vec<&str> = coord_part.split(':').collect();
        if parts.iter().any(|p| p.is_empty()) || extension.as_deref() == Some("") {
            return Err(LibraryError::InvalidCoordinate(coord.to_string()));
        }

        let classifier = match parts.len() {
            3 => None,
            4 => Some(parts[3].to_string()),
            _ => return Err(LibraryError::InvalidCoordinate(coord.to_string())),
        };

        Ok(Self {
            group: parts[0].to_string(),
            name: parts[1].to_string(),
            version: parts[2].to_string(),
            classifier,
            extension,
        })
    }

    /// Same artifact line: group, name, classifier and extension equal; version ignored.
    pub fn equals_ignoring_version(&self, other: &ArtifactCoordinate) -> bool {
        self.group == other.group
            && self.name == other.name
            && self.classifier == other.classifier
            && self.extension == other.extension
    }

    pub fn with_version(&self, version: &str) -> Self {
        let mut clone = self.clone();
        clone.version = version.to_string();
        clone
    }

    pub fn extension_or_default(&self) -> &str {
        self.extension.as_deref().unwrap_or(DEFAULT_EXTENSION)
    }

    /// `org.ow2.asm` -> `org/ow2/asm`
    pub fn group_path(&self) -> String {
        self.group.replace('.', "/")
    }

    /// `name-version[-classifier].extension`
    pub fn filename(&self) -> String {
        match &self.classifier {
            Some(c) => format!(
                "{}-{}-{}.{}",
                self.name,
                self.version,
                c,
                self.extension_or_default()
            ),
            None => format!("{}-{}.{}", self.name, self.version, self.extension_or_default()),
        }
    }

    /// `<repo>/<group_path>/<name>/<version>/<filename>`
    pub fn url(&self, repo_base: &str) -> String {
        let base = repo_base.trim_end_matches('/');
        format!(
            "{}/{}/{}/{}/{}",
            base,
            self.group_path(),
            self.name,
            self.version,
            self.filename()
        )
    }

    /// `<repo>/<group_path>/<name>/maven-metadata.xml`
    pub fn metadata_url(&self, repo_base: &str) -> String {
        let base = repo_base.trim_end_matches('/');
        format!("{}/{}/{}/maven-metadata.xml", base, self.group_path(), self.name)
    }

    /// Where the artifact lives under the libraries directory, in the same
    /// layout a repository serves it:
    /// `<group_path>/<name>/<version>/<filename>`
    pub fn local_path(&self) -> PathBuf {
        PathBuf::from(self.group_path())
            .join(&self.name)
            .join(&self.version)
            .join(self.filename())
    }
}

impl fmt::Display for ArtifactCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.name, self.version)?;
        if let Some(c) = &self.classifier {
            write!(f, ":{}", c)?;
        }
        if let Some(e) = &self.extension {
            write!(f, "@{}", e)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for ArtifactCoordinate {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_three_part_coordinate() {
        let a = ArtifactCoordinate::parse("net.sf.jopt-simple:jopt-simple:5.0.4").unwrap();
        assert_eq!(a.group, "net.sf.jopt-simple");
        assert_eq!(a.name, "jopt-simple");
        assert_eq!(a.version, "5.0.4");
        assert_eq!(a.classifier, None);
        assert_eq!(a.extension, None);
        assert_eq!(a.extension_or_default(), "jar");
    }

    #[test]
    fn parse_with_classifier_and_extension() {
        let a = ArtifactCoordinate::parse("de.oceanlabs.mcp:mcp_config:1.20.1:srg@zip").unwrap();
        assert_eq!(a.classifier.as_deref(), Some("srg"));
        assert_eq!(a.extension.as_deref(), Some("zip"));
        assert_eq!(a.to_string(), "de.oceanlabs.mcp:mcp_config:1.20.1:srg@zip");
    }

    #[test]
    fn rejects_malformed_coordinates() {
        for bad in ["a:b", "a:b:c:d:e", "a::1.0", "a:b:1.0@"] {
            assert!(
                matches!(ArtifactCoordinate::parse(bad), Err(LibraryError::InvalidCoordinate(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn equality_ignoring_version_only_ignores_version() {
        let a = ArtifactCoordinate::parse("org.ow2.asm:asm:9.5").unwrap();
        assert!(a.equals_ignoring_version(&a.with_version("9.7.1")));
        assert_ne!(a, a.with_version("9.7.1"));

        let other_fields = [
            "org.ow2:asm:9.5",
            "org.ow2.asm:asm-tree:9.5",
            "org.ow2.asm:asm:9.5:sources",
            "org.ow2.asm:asm:9.5@pom",
        ];
        for raw in other_fields {
            let b = ArtifactCoordinate::parse(raw).unwrap();
            assert!(!a.equals_ignoring_version(&b), "{raw}");
        }
    }

    #[test]
    fn url_joins_repository_base() {
        let a = ArtifactCoordinate::parse("net.sf.jopt-simple:jopt-simple:5.0.4").unwrap();
        assert_eq!(
            a.url("https://libraries.minecraft.net/"),
            "https://libraries.minecraft.net/net/sf/jopt-simple/jopt-simple/5.0.4/jopt-simple-5.0.4.jar"
        );
        assert_eq!(
            a.metadata_url("https://repo1.maven.org/maven2"),
            "https://repo1.maven.org/maven2/net/sf/jopt-simple/jopt-simple/maven-metadata.xml"
        );
    }

    #[test]
    fn local_path_includes_classifier() {
        let a = ArtifactCoordinate::parse("org.lwjgl:lwjgl:3.3.3:natives-windows").unwrap();
        assert_eq!(
            a.local_path(),
            PathBuf::from("org/lwjgl/lwjgl/3.3.3/lwjgl-3.3.3-natives-windows.jar")
        );
    }
}
