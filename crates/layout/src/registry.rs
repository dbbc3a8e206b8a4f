use crate::paths::registry_path;
use crate::{LayoutError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const REGISTRY_SCHEMA_VERSION: u32 = 1;

/// Contents of `mayor/rigs.json`, the declared list of rigs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RigsRegistry {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub rigs: BTreeMap<String, serde_json::Value>,
}

fn default_version() -> u32 {
    REGISTRY_SCHEMA_VERSION
}

impl RigsRegistry {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rigs.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rigs.contains_key(name)
    }
}

/// Load the registry. A missing file is not an error and yields `None`.
pub fn load_registry(town_root: &Path) -> Result<Option<RigsRegistry>> {
    let path = registry_path(town_root);
    let raw = match std::fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };

    let registry: RigsRegistry =
        serde_json::from_str(&raw).map_err(|source| LayoutError::JsonError {
            path: path.clone(),
            source,
        })?;
    if registry.version > REGISTRY_SCHEMA_VERSION {
        return Err(LayoutError::UnsupportedVersion {
            path,
            version: registry.version,
        });
    }
    Ok(Some(registry))
}
