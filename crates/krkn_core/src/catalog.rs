use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::{Error, Result, StdError};

/// One entry in the static scenario catalog. The HTTP surface's
/// `/scenarios*` endpoints (spec §6) have no corresponding data-model
/// entity in §3; this is a minimal, explicitly-scoped addition (see
/// DESIGN.md Open Question decisions) rather than a CR kind, since
/// scenario descriptors are build-time metadata, not operator state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub globals: BTreeMap<String, serde_json::Value>,
}

/// In-memory catalog seeded once at startup from a directory of YAML
/// descriptors named by `SCENARIO_CATALOG_DIR`.
#[derive(Debug, Clone, Default)]
pub struct ScenarioCatalog {
    by_name: BTreeMap<String, ScenarioDescriptor>,
}

impl ScenarioCatalog {
    /// Load every `*.yaml`/`*.yml` file in `dir` as a `ScenarioDescriptor`.
    /// A directory that doesn't exist yields an empty catalog rather
    /// than failing operator startup.
    pub fn load_from_dir(dir: &str) -> Self {
        let path = Path::new(dir);
        let mut by_name = BTreeMap::new();

        let entries = match std::fs::read_dir(path) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir, error = %e, "scenario catalog directory unreadable, starting with an empty catalog");
                return Self { by_name };
            }
        };

        for entry in entries.flatten() {
            let file_path = entry.path();
            let is_yaml = matches!(file_path.extension().and_then(|e| e.to_str()), Some("yaml") | Some("yml"));
            if !is_yaml {
                continue;
            }
            match std::fs::read_to_string(&file_path).ok().and_then(|text| serde_yaml::from_str::<ScenarioDescriptor>(&text).ok()) {
                Some(descriptor) => {
                    by_name.insert(descriptor.name.clone(), descriptor);
                }
                None => warn!(file = %file_path.display(), "skipping unparsable scenario descriptor"),
            }
        }

        Self { by_name }
    }

    pub fn list(&self) -> Vec<ScenarioDescriptor> {
        self.by_name.values().cloned().collect()
    }

    pub fn detail(&self, name: &str) -> Result<ScenarioDescriptor> {
        self.by_name
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("scenario `{name}` not found in catalog")))
    }

    pub fn globals(&self, name: &str) -> Result<BTreeMap<String, serde_json::Value>> {
        Ok(self.detail(name)?.globals)
    }
}

/// Parse a single descriptor from text, used by tests and by any
/// caller that already has the bytes in hand.
pub fn parse_descriptor(text: &str) -> Result<ScenarioDescriptor> {
    serde_yaml::from_str(text).map_err(|e| Error::internal(StdError::YamlSerializationError(e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_directory_yields_empty_catalog() {
        let catalog = ScenarioCatalog::load_from_dir("/nonexistent/path/for/tests");
        assert!(catalog.list().is_empty());
    }

    #[test]
    fn parses_a_descriptor() {
        let descriptor = parse_descriptor("name: pod-kill\ndescription: kills a pod\nimage: quay.io/krkn/pod-kill\n").unwrap();
        assert_eq!(descriptor.name, "pod-kill");
    }

    #[test]
    fn detail_on_unknown_name_is_not_found() {
        let catalog = ScenarioCatalog::default();
        assert!(matches!(catalog.detail("missing"), Err(Error::NotFound(_))));
    }
}
