//! Mod manifest (`everest.yaml`) decoding.

use serde::Deserialize;
use serde_yaml::Value;
use thiserror::Error;

use super::{ArchiveError, ArchiveHandle};

/// Accepted manifest file names, in lookup order. Only the archive root is searched.
pub const MANIFEST_FILE_NAMES: [&str; 2] = ["everest.yaml", "everest.yml"];

/// Version recorded for entries that declare none.
pub const NO_VERSION: &str = "NoVersion";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("malformed YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("entry {index} has no Name")]
    MissingName { index: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestDependency {
    pub name: String,
    pub version: String,
}

/// One mod declared by a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub name: String,
    pub version: String,
    pub dependencies: Vec<ManifestDependency>,
    pub optional_dependencies: Vec<ManifestDependency>,
}

#[derive(Deserialize)]
struct RawEntry {
    #[serde(rename = "Name", default)]
    name: Option<Value>,
    #[serde(rename = "Version", default)]
    version: Option<Value>,
    #[serde(rename = "Dependencies", default)]
    dependencies: Option<Vec<RawDependency>>,
    #[serde(rename = "OptionalDependencies", default)]
    optional_dependencies: Option<Vec<RawDependency>>,
}

#[derive(Deserialize)]
struct RawDependency {
    #[serde(rename = "Name", default)]
    name: Option<Value>,
    #[serde(rename = "Version", default)]
    version: Option<Value>,
}

/// Render a scalar the way it was most likely written: `1.0` stays `1.0`.
fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn convert_dependencies(raw: Option<Vec<RawDependency>>) -> Vec<ManifestDependency> {
    raw.unwrap_or_default()
        .into_iter()
        .filter_map(|dep| {
            let name = dep.name.as_ref().and_then(scalar_to_string)?;
            let version = dep
                .version
                .as_ref()
                .and_then(scalar_to_string)
                .unwrap_or_else(|| NO_VERSION.to_string());
            Some(ManifestDependency { name, version })
        })
        .collect()
}

/// Decode manifest text into its entries.
///
/// Missing versions default to [`NO_VERSION`]; dependencies without a name
/// are dropped. An entry without a name fails the whole manifest.
pub fn parse_manifest(text: &str) -> Result<Vec<ManifestEntry>, ManifestError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let raw: Vec<RawEntry> = serde_yaml::from_str(text)?;

    raw.into_iter()
        .enumerate()
        .map(|(index, entry)| {
            let name = entry
                .name
                .as_ref()
                .and_then(scalar_to_string)
                .ok_or(ManifestError::MissingName { index })?;
            let version = entry
                .version
                .as_ref()
                .and_then(scalar_to_string)
                .unwrap_or_else(|| NO_VERSION.to_string());
            Ok(ManifestEntry {
                name,
                version,
                dependencies: convert_dependencies(entry.dependencies),
                optional_dependencies: convert_dependencies(entry.optional_dependencies),
            })
        })
        .collect()
}

/// Find and decode the manifest of an opened archive.
///
/// `Ok(None)` means the archive has no manifest at its root.
pub fn read_manifest(handle: &mut ArchiveHandle) -> Result<Option<Vec<ManifestEntry>>, ArchiveError> {
    let Some(index) = MANIFEST_FILE_NAMES
        .iter()
        .find_map(|name| handle.index_of(name))
    else {
        return Ok(None);
    };

    let text = handle.read_text(index)?;
    Ok(Some(parse_manifest(&text)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_entry() {
        let yaml = r#"
- Name: SpringCollab2020
  Version: 1.7.3
  Dependencies:
    - Name: Everest
      Version: 1.2707.0
    - Name: MaxHelpingHand
      Version: 1.9.3
  OptionalDependencies:
    - Name: CollabUtils2
"#;
        let entries = parse_manifest(yaml).unwrap();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.name, "SpringCollab2020");
        assert_eq!(entry.version, "1.7.3");
        assert_eq!(entry.dependencies.len(), 2);
        assert_eq!(entry.dependencies[1].name, "MaxHelpingHand");
        assert_eq!(
            entry.optional_dependencies,
            vec![ManifestDependency {
                name: "CollabUtils2".to_string(),
                version: NO_VERSION.to_string(),
            }]
        );
    }

    #[test]
    fn test_missing_version_defaults() {
        let entries = parse_manifest("- Name: Foo\n").unwrap();
        assert_eq!(entries[0].version, NO_VERSION);
        assert!(entries[0].dependencies.is_empty());
    }

    #[test]
    fn test_numeric_version_kept_as_written() {
        let entries = parse_manifest("- Name: Foo\n  Version: 1.5\n").unwrap();
        assert_eq!(entries[0].version, "1.5");
    }

    #[test]
    fn test_bom_is_ignored() {
        let entries = parse_manifest("\u{feff}- Name: Foo\n").unwrap();
        assert_eq!(entries[0].name, "Foo");
    }

    #[test]
    fn test_entry_without_name_fails() {
        let err = parse_manifest("- Name: Foo\n- Version: 1.0.0\n").unwrap_err();
        assert!(matches!(err, ManifestError::MissingName { index: 1 }));
    }

    #[test]
    fn test_not_a_list_fails() {
        assert!(matches!(
            parse_manifest("Name: Foo\n"),
            Err(ManifestError::Yaml(_))
        ));
    }
}
