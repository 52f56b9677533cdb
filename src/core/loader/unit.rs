use std::fmt;
use std::sync::OnceLock;

use crate::core::error::{LibraryError, LibraryResult};

/// Leading bytes of every class file.
pub const CLASS_MAGIC: [u8; 4] = [0xCA, 0xFE, 0xBA, 0xBE];

/// `com.example.Main` -> `com/example/Main.class`
pub fn unit_resource_path(name: &str) -> String {
    format!("{}.class", name.replace('.', "/"))
}

/// Bytes of one named unit plus where they were found.
pub struct CodeUnit {
    name: String,
    origin: String,
    bytes: Vec<u8>,
    linked: OnceLock<Result<(), String>>,
}

impl CodeUnit {
    pub fn new(name: &str, origin: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            origin: origin.into(),
            bytes,
            linked: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Label of the source that supplied this unit (a jar URL, a host loader name, ...).
    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_linked(&self) -> bool {
        matches!(self.linked.get(), Some(Ok(())))
    }

    /// Validate the unit once; later calls return the memoized outcome.
    pub fn link(&self) -> LibraryResult<()> {
        self.linked
            .get_or_init(|| validate(&self.bytes))
            .clone()
            .map_err(|reason| LibraryError::Link {
                name: self.name.clone(),
                reason,
            })
    }
}

impl fmt::Debug for CodeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeUnit")
            .field("name", &self.name)
            .field("origin", &self.origin)
            .field("len", &self.bytes.len())
            .field("linked", &self.is_linked())
            .finish()
    }
}

fn validate(bytes: &[u8]) -> Result<(), String> {
    if bytes.len() < CLASS_MAGIC.len() {
        return Err(format!("truncated unit ({} bytes)", bytes.len()));
    }
    if bytes[..4] != CLASS_MAGIC {
        return Err(format!("bad magic {}", hex::encode(&bytes[..4])));
    }
    Ok(())
}
