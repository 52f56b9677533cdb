use std::collections::HashMap;
use std::fs::File;
use std::io::Read;

use tracing::{debug, warn};
use zip::result::ZipError;
use zip::ZipArchive;

use super::unit::{unit_resource_path, CodeUnit};
use crate::core::error::{LibraryError, LibraryResult};
use crate::core::libraries::SealedResources;

/// One tier of the lookup chain.
pub trait UnitSource: Send + Sync {
    fn label(&self) -> &str;

    /// `Ok(None)` when this source simply does not have `name`.
    fn find(&self, name: &str) -> LibraryResult<Option<CodeUnit>>;
}

/// Units from the downloaded libraries: jar archives or exploded directories.
///
/// A resource that cannot be opened is skipped, so lookups fall through to
/// later tiers instead of failing outright.
pub struct LocalResources {
    resources: SealedResources,
}

impl LocalResources {
    pub fn new(resources: SealedResources) -> Self {
        Self { resources }
    }
}

impl UnitSource for LocalResources {
    fn label(&self) -> &str {
        "local"
    }

    fn find(&self, name: &str) -> LibraryResult<Option<CodeUnit>> {
        let entry = unit_resource_path(name);

        for url in self.resources.iter() {
            let Ok(path) = url.to_file_path() else {
                debug!("Skipping non-file resource {}", url);
                continue;
            };

            if path.is_dir() {
                let candidate = path.join(&entry);
                if candidate.is_file() {
                    let bytes = std::fs::read(&candidate).map_err(LibraryError::io(&candidate))?;
                    return Ok(Some(CodeUnit::new(name, url.as_str(), bytes)));
                }
                continue;
            }

            let mut archive = match File::open(&path) {
                Ok(file) => match ZipArchive::new(file) {
                    Ok(archive) => archive,
                    Err(e) => {
                        warn!("Skipping unreadable archive {:?}: {}", path, e);
                        continue;
                    }
                },
                Err(e) => {
                    warn!("Skipping missing resource {:?}: {}", path, e);
                    continue;
                }
            };
            let mut unit = match archive.by_name(&entry) {
                Ok(unit) => unit,
                Err(ZipError::FileNotFound) => continue,
                Err(e) => return Err(e.into()),
            };

            let mut bytes = Vec::with_capacity(unit.size() as usize);
            unit.read_to_end(&mut bytes)
                .map_err(LibraryError::io(&path))?;
            return Ok(Some(CodeUnit::new(name, url.as_str(), bytes)));
        }

        Ok(None)
    }
}

/// Units held in memory, e.g. what the host environment already provides.
pub struct StaticUnits {
    label: String,
    units: HashMap<String, Vec<u8>>,
}

impl StaticUnits {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            units: HashMap::new(),
        }
    }

    pub fn with_unit(mut self, name: &str, bytes: Vec<u8>) -> Self {
        self.units.insert(name.to_string(), bytes);
        self
    }
}

impl UnitSource for StaticUnits {
    fn label(&self) -> &str {
        &self.label
    }

    fn find(&self, name: &str) -> LibraryResult<Option<CodeUnit>> {
        Ok(self
            .units
            .get(name)
            .map(|bytes| CodeUnit::new(name, self.label.as_str(), bytes.clone())))
    }
}
