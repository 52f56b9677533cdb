mod local_first;
mod sources;
mod unit;

pub use local_first::LocalFirstLoader;
pub use sources::{LocalResources, StaticUnits, UnitSource};
pub use unit::{unit_resource_path, CodeUnit, CLASS_MAGIC};
