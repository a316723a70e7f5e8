use crate::error::Result;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current marker schema version. A marker with a lower value classifies the
/// repository as an upgrade target.
pub const SCHEMA_VERSION: u32 = 2;

/// Persisted generator marker at `.stencil/generator.yaml`.
///
/// Deliberately timestamp-free: the marker is regenerated as a candidate file
/// on every run, and a volatile field would defeat hash-identity skipping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorMarker {
    pub schema_version: u32,
    pub generator_version: String,
    pub blueprint: String,
}

impl GeneratorMarker {
    pub fn new(blueprint: impl Into<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            generator_version: env!("CARGO_PKG_VERSION").to_string(),
            blueprint: blueprint.into(),
        }
    }

    pub fn is_stale(&self) -> bool {
        self.schema_version < SCHEMA_VERSION
    }

    /// Load the marker if present. Absence is not an error — it is the
    /// normal state of a repository the generator has never touched.
    pub fn load(root: &Path) -> Result<Option<Self>> {
        let path = paths::marker_path(root);
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&path)?;
        let marker: GeneratorMarker = serde_yaml::from_str(&data)?;
        Ok(Some(marker))
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}
