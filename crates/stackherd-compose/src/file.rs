//! Compose file model.
//!
//! Only the parts of the compose format stackherd reads are modelled:
//! service labels, which carry the reverse-proxy routing declarations.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

/// Suffix of a reverse-proxy router rule label key.
const RULE_SUFFIX: &str = ".rule";

/// Prefix of a reverse-proxy router label key.
const ROUTER_PREFIX: &str = "traefik.http.routers.";

/// A parsed compose file.
#[derive(Debug, Clone, Deserialize)]
pub struct ComposeFile {
    /// Services defined by the file.
    #[serde(default)]
    pub services: BTreeMap<String, ComposeService>,
}

/// A single service entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ComposeService {
    /// Service labels, in either compose shape.
    #[serde(default)]
    pub labels: Labels,
}

/// Compose labels appear either as an ordered list of `key=value` strings or
/// as a key-value mapping. Both shapes carry the same content.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Labels {
    /// `labels: ["a=b", ...]`
    List(Vec<String>),
    /// `labels: {a: b, ...}`
    Map(BTreeMap<String, String>),
}

impl Default for Labels {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

impl Labels {
    /// Iterate over `(key, value)` pairs regardless of shape. List entries
    /// without a `=` separator carry no value and are skipped.
    pub fn pairs(&self) -> Vec<(&str, &str)> {
        match self {
            Self::List(entries) => entries
                .iter()
                .filter_map(|entry| entry.split_once('='))
                .collect(),
            Self::Map(map) => map
                .iter()
                .map(|(key, value)| (key.as_str(), value.as_str()))
                .collect(),
        }
    }
}

impl ComposeFile {
    /// Parse from YAML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML does not describe a compose file.
    pub fn from_yaml(yaml: &str) -> Result<Self, ComposeFileError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Parse from a file on disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ComposeFileError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Collect every reverse-proxy router rule declared by the file's
    /// services, in service order.
    #[must_use]
    pub fn router_rules(&self) -> Vec<String> {
        let mut rules = Vec::new();
        for service in self.services.values() {
            for (key, value) in service.labels.pairs() {
                if key.starts_with(ROUTER_PREFIX) && key.ends_with(RULE_SUFFIX) {
                    rules.push(value.to_string());
                }
            }
        }
        rules
    }
}

/// Compose file parsing errors.
#[derive(Debug, thiserror::Error)]
pub enum ComposeFileError {
    /// I/O error.
    #[error("Failed to read compose file: {0}")]
    Io(#[from] std::io::Error),
    /// Parse error.
    #[error("Failed to parse compose file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIST_LABELS: &str = r#"
services:
  whoami:
    image: traefik/whoami
    labels:
      - "traefik.enable=true"
      - "traefik.http.routers.whoami.rule=Host(`whoami.example.sh`)"
      - "traefik.http.routers.whoami.entrypoints=websecure"
"#;

    const MAP_LABELS: &str = r#"
services:
  whoami:
    image: traefik/whoami
    labels:
      traefik.enable: "true"
      traefik.http.routers.whoami.rule: "Host(`whoami.example.sh`)"
      traefik.http.routers.whoami.entrypoints: websecure
"#;

    #[test]
    fn router_rules_from_list_labels() {
        let file = ComposeFile::from_yaml(LIST_LABELS).unwrap();
        assert_eq!(file.router_rules(), vec!["Host(`whoami.example.sh`)"]);
    }

    #[test]
    fn router_rules_from_map_labels() {
        let file = ComposeFile::from_yaml(MAP_LABELS).unwrap();
        assert_eq!(file.router_rules(), vec!["Host(`whoami.example.sh`)"]);
    }

    #[test]
    fn both_label_shapes_are_equivalent() {
        let list = ComposeFile::from_yaml(LIST_LABELS).unwrap();
        let map = ComposeFile::from_yaml(MAP_LABELS).unwrap();
        assert_eq!(list.router_rules(), map.router_rules());
    }

    #[test]
    fn services_without_labels() {
        let file = ComposeFile::from_yaml("services:\n  db:\n    image: postgres:16\n").unwrap();
        assert!(file.router_rules().is_empty());
    }

    #[test]
    fn list_entries_without_separator_are_skipped() {
        let file = ComposeFile::from_yaml(
            "services:\n  app:\n    labels:\n      - \"plainflag\"\n",
        )
        .unwrap();
        assert!(file.router_rules().is_empty());
    }

    #[test]
    fn from_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("compose.yml");
        std::fs::write(&path, LIST_LABELS).unwrap();
        let file = ComposeFile::from_file(&path).unwrap();
        assert_eq!(file.router_rules().len(), 1);
    }
}
