//! Merge-key schema
//!
//! A [`SchemaIndex`] answers one question for the patch engine: "does the
//! array at field path P of kind K have a merge key, and which fields make up
//! that key?". It is loaded once per run and only read afterwards.
//!
//! Two source formats are accepted.
//!
//! Compact, written by hand:
//!
//! ```yaml
//! PtpConfig:
//!   spec.profile[]: name
//!   spec.recommend[]: [profile, priority]
//! ```
//!
//! OpenAPI, as exported by `kubectl get --raw /openapi/v2` or kustomize: a
//! document with `definitions` (or `components.schemas`), where definitions
//! carrying `x-kubernetes-group-version-kind` contribute their kinds and array
//! properties carrying `x-kubernetes-patch-merge-key` or
//! `x-kubernetes-list-map-keys` contribute entries.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::error::{CoreError, Result, SchemaError};
use crate::path::FieldPath;
use crate::value::{Mapping, Value};

#[derive(Debug, Clone, Default)]
pub struct SchemaIndex {
    kinds: HashMap<String, HashMap<FieldPath, Vec<String>>>,
}

impl SchemaIndex {
    /// Empty index: every array falls back to replace semantics
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a schema file (YAML or JSON)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| CoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Parse a schema document; JSON is accepted since it is valid YAML
    pub fn from_yaml(content: &str) -> Result<Self> {
        let value = Value::from_yaml(content)?;
        Ok(Self::from_value(&value)?)
    }

    pub fn from_value(value: &Value) -> std::result::Result<Self, SchemaError> {
        let Some(root) = value.as_mapping() else {
            return Err(SchemaError::NotAMapping {
                found: value.shape(),
            });
        };

        if let Some(definitions) = root.get("definitions").and_then(Value::as_mapping) {
            return OpenApiWalker::new(definitions, "#/definitions/").index();
        }
        if let Some(schemas) = value
            .get_path("components.schemas")
            .and_then(Value::as_mapping)
        {
            return OpenApiWalker::new(schemas, "#/components/schemas/").index();
        }
        Self::from_compact(root)
    }

    fn from_compact(root: &Mapping) -> std::result::Result<Self, SchemaError> {
        let mut index = Self::new();
        for (kind, entries) in root {
            let Some(entries) = entries.as_mapping() else {
                return Err(SchemaError::InvalidKindEntry {
                    kind: kind.clone(),
                    found: entries.shape(),
                });
            };
            for (raw_path, keys) in entries {
                let path = FieldPath::parse(raw_path).map_err(|reason| SchemaError::InvalidPath {
                    kind: kind.clone(),
                    path: raw_path.clone(),
                    reason,
                })?;
                if !matches!(
                    path.segments().last(),
                    Some(crate::path::PathSegment::Element)
                ) {
                    return Err(SchemaError::InvalidPath {
                        kind: kind.clone(),
                        path: raw_path.clone(),
                        reason: "merge keys apply to arrays, the path must end with '[]'"
                            .to_string(),
                    });
                }
                let keys = merge_key_names(keys).ok_or_else(|| SchemaError::InvalidMergeKey {
                    kind: kind.clone(),
                    path: raw_path.clone(),
                })?;
                if !index.insert(kind, path, keys) {
                    return Err(SchemaError::EmptyMergeKey {
                        kind: kind.clone(),
                        path: raw_path.clone(),
                    });
                }
            }
        }
        Ok(index)
    }

    /// Register merge keys for an array path; the path is normalised to its schema form.
    ///
    /// Returns `false` and records nothing when `keys` is empty.
    pub fn insert(&mut self, kind: &str, path: FieldPath, keys: Vec<String>) -> bool {
        if keys.is_empty() {
            return false;
        }
        self.kinds
            .entry(kind.to_string())
            .or_default()
            .insert(path.schema_path(), keys);
        true
    }

    /// Merge-key fields for the array at `path` under `kind`, if any
    pub fn merge_keys(&self, kind: &str, path: &FieldPath) -> Option<&[String]> {
        self.kinds
            .get(kind)
            .and_then(|paths| paths.get(&path.schema_path()))
            .map(Vec::as_slice)
    }

    /// Number of (kind, path) entries
    pub fn len(&self) -> usize {
        self.kinds.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Kinds with at least one entry, sorted
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.kinds.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}

/// A merge key is either a single field name or a list of them
fn merge_key_names(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::String(key) => Some(vec![key.clone()]),
        Value::Sequence(items) => items
            .iter()
            .map(|item| item.as_str().map(String::from))
            .collect(),
        _ => None,
    }
}

/// Walks OpenAPI definitions collecting merge keys of array properties
struct OpenApiWalker<'a> {
    definitions: &'a Mapping,
    ref_prefix: &'static str,
}

impl<'a> OpenApiWalker<'a> {
    fn new(definitions: &'a Mapping, ref_prefix: &'static str) -> Self {
        Self {
            definitions,
            ref_prefix,
        }
    }

    fn index(&self) -> std::result::Result<SchemaIndex, SchemaError> {
        let mut index = SchemaIndex::new();
        for (name, definition) in self.definitions {
            let kinds = gvk_kinds(name, definition)?;
            if kinds.is_empty() {
                continue;
            }
            let mut found = Vec::new();
            let mut visiting = HashSet::from([name.as_str()]);
            self.walk(definition, FieldPath::root(), &mut visiting, &mut found)?;
            for kind in &kinds {
                for (path, keys) in &found {
                    // keys were checked non-empty while walking
                    index.insert(kind, path.clone(), keys.clone());
                }
            }
        }
        Ok(index)
    }

    fn walk(
        &self,
        node: &'a Value,
        path: FieldPath,
        visiting: &mut HashSet<&'a str>,
        found: &mut Vec<(FieldPath, Vec<String>)>,
    ) -> std::result::Result<(), SchemaError> {
        let Some(map) = node.as_mapping() else {
            return Ok(());
        };

        if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
            let Some(target) = reference.strip_prefix(self.ref_prefix) else {
                return Ok(());
            };
            let Some((name, definition)) = self.definitions.get_key_value(target) else {
                return Ok(());
            };
            // A definition already on the stack would recurse forever
            if visiting.insert(name.as_str()) {
                self.walk(definition, path.clone(), visiting, found)?;
                visiting.remove(name.as_str());
            }
        }

        if let Some(Value::Sequence(parts)) = map.get("allOf") {
            for part in parts {
                self.walk(part, path.clone(), visiting, found)?;
            }
        }

        if let Some(properties) = map.get("properties").and_then(Value::as_mapping) {
            for (field, property) in properties {
                self.walk(property, path.child(field), visiting, found)?;
            }
        }

        if let Some(items) = map.get("items") {
            let element = path.element();
            if let Some(keys) = list_merge_keys(map, &path)? {
                found.push((element.clone(), keys));
            }
            self.walk(items, element, visiting, found)?;
        }

        Ok(())
    }
}

/// Kinds declared by `x-kubernetes-group-version-kind`
fn gvk_kinds(name: &str, definition: &Value) -> std::result::Result<Vec<String>, SchemaError> {
    let Some(gvk) = definition.get("x-kubernetes-group-version-kind") else {
        return Ok(Vec::new());
    };
    let entries: Vec<&Value> = match gvk {
        Value::Sequence(items) => items.iter().collect(),
        Value::Mapping(_) => vec![gvk],
        _ => {
            return Err(SchemaError::InvalidDefinition {
                definition: name.to_string(),
                reason: "x-kubernetes-group-version-kind must be a list".to_string(),
            });
        }
    };

    let mut kinds = Vec::new();
    for entry in entries {
        let kind = entry.get("kind").and_then(Value::as_str).ok_or_else(|| {
            SchemaError::InvalidDefinition {
                definition: name.to_string(),
                reason: "group-version-kind entry without a string 'kind'".to_string(),
            }
        })?;
        if !kinds.iter().any(|k| k == kind) {
            kinds.push(kind.to_string());
        }
    }
    Ok(kinds)
}

fn list_merge_keys(
    node: &Mapping,
    path: &FieldPath,
) -> std::result::Result<Option<Vec<String>>, SchemaError> {
    let invalid = || SchemaError::InvalidMergeKey {
        kind: "<openapi>".to_string(),
        path: path.element().to_string(),
    };

    if let Some(key) = node.get("x-kubernetes-patch-merge-key") {
        return key.as_str().map(|k| Some(vec![k.to_string()])).ok_or_else(invalid);
    }

    let is_map_list = node.get("x-kubernetes-list-type").and_then(Value::as_str) == Some("map");
    match node.get("x-kubernetes-list-map-keys") {
        Some(keys) if is_map_list => {
            let Value::Sequence(_) = keys else {
                return Err(invalid());
            };
            match merge_key_names(keys) {
                Some(names) if !names.is_empty() => Ok(Some(names)),
                Some(_) => Err(SchemaError::EmptyMergeKey {
                    kind: "<openapi>".to_string(),
                    path: path.element().to_string(),
                }),
                None => Err(invalid()),
            }
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(text: &str) -> FieldPath {
        FieldPath::parse(text).unwrap()
    }

    #[test]
    fn test_compact_schema() {
        let index = SchemaIndex::from_yaml(
            r#"
PtpConfig:
  spec.profile[]: name
  spec.recommend[]: [profile, priority]
SriovNetworkNodePolicy:
  spec.nicSelector.pfNames[]: name
"#,
        )
        .unwrap();

        assert_eq!(index.len(), 3);
        assert_eq!(index.kinds(), vec!["PtpConfig", "SriovNetworkNodePolicy"]);
        assert_eq!(
            index.merge_keys("PtpConfig", &path("spec.profile[]")),
            Some(&["name".to_string()][..])
        );
        assert_eq!(
            index
                .merge_keys("PtpConfig", &path("spec.recommend[]"))
                .map(<[String]>::len),
            Some(2)
        );
        assert!(index.merge_keys("PtpConfig", &path("spec.other[]")).is_none());
        assert!(index.merge_keys("Unknown", &path("spec.profile[]")).is_none());
    }

    #[test]
    fn test_lookup_ignores_element_selectors() {
        let index = SchemaIndex::from_yaml("PtpConfig:\n  spec.profile[].ports[]: id\n").unwrap();
        let precise = FieldPath::root()
            .child("spec")
            .child("profile")
            .keyed("name=eth0")
            .child("ports")
            .element();
        assert!(index.merge_keys("PtpConfig", &precise).is_some());
    }

    #[test]
    fn test_compact_schema_errors() {
        let err = SchemaIndex::from_yaml("PtpConfig:\n  spec.profile[]: 3\n").unwrap_err();
        assert!(matches!(
            err,
            CoreError::Schema(SchemaError::InvalidMergeKey { .. })
        ));

        let err = SchemaIndex::from_yaml("PtpConfig:\n  spec.profile[]: [name, 1]\n").unwrap_err();
        assert!(matches!(
            err,
            CoreError::Schema(SchemaError::InvalidMergeKey { .. })
        ));

        let err = SchemaIndex::from_yaml("PtpConfig:\n  spec.profile[]: []\n").unwrap_err();
        assert!(matches!(err, CoreError::Schema(SchemaError::EmptyMergeKey { .. })));

        let err = SchemaIndex::from_yaml("PtpConfig: name\n").unwrap_err();
        assert!(matches!(
            err,
            CoreError::Schema(SchemaError::InvalidKindEntry { .. })
        ));

        let err = SchemaIndex::from_yaml("PtpConfig:\n  spec.profile: name\n").unwrap_err();
        assert!(matches!(err, CoreError::Schema(SchemaError::InvalidPath { .. })));

        let err = SchemaIndex::from_yaml("- a\n").unwrap_err();
        assert!(matches!(err, CoreError::Schema(SchemaError::NotAMapping { .. })));
    }

    const OPENAPI: &str = r##"
{
  "definitions": {
    "io.ptp.v1.PtpConfig": {
      "x-kubernetes-group-version-kind": [
        {"group": "ptp.openshift.io", "kind": "PtpConfig", "version": "v1"}
      ],
      "properties": {
        "spec": {"$ref": "#/definitions/io.ptp.v1.PtpConfigSpec"}
      }
    },
    "io.ptp.v1.PtpConfigSpec": {
      "properties": {
        "profile": {
          "type": "array",
          "x-kubernetes-patch-merge-key": "name",
          "items": {"$ref": "#/definitions/io.ptp.v1.Profile"}
        },
        "recommend": {
          "type": "array",
          "x-kubernetes-list-type": "map",
          "x-kubernetes-list-map-keys": ["profile", "priority"],
          "items": {"type": "object"}
        },
        "plain": {
          "type": "array",
          "items": {"type": "string"}
        }
      }
    },
    "io.ptp.v1.Profile": {
      "properties": {
        "name": {"type": "string"},
        "ports": {
          "type": "array",
          "x-kubernetes-patch-merge-key": "id",
          "items": {"$ref": "#/definitions/io.ptp.v1.Profile"}
        }
      }
    }
  }
}
"##;

    #[test]
    fn test_openapi_schema() {
        let index = SchemaIndex::from_yaml(OPENAPI).unwrap();
        assert_eq!(index.kinds(), vec!["PtpConfig"]);
        assert_eq!(
            index.merge_keys("PtpConfig", &path("spec.profile[]")),
            Some(&["name".to_string()][..])
        );
        assert_eq!(
            index.merge_keys("PtpConfig", &path("spec.recommend[]")),
            Some(&["profile".to_string(), "priority".to_string()][..])
        );
        assert_eq!(
            index.merge_keys("PtpConfig", &path("spec.profile[].ports[]")),
            Some(&["id".to_string()][..])
        );
        assert!(index.merge_keys("PtpConfig", &path("spec.plain[]")).is_none());
    }

    #[test]
    fn test_openapi_recursive_reference_terminates() {
        // Profile.ports refers back to Profile; the walk must stop at the cycle
        let index = SchemaIndex::from_yaml(OPENAPI).unwrap();
        assert!(
            index
                .merge_keys("PtpConfig", &path("spec.profile[].ports[].ports[]"))
                .is_none()
        );
    }

    #[test]
    fn test_openapi_v3_components() {
        let index = SchemaIndex::from_yaml(
            r#"
components:
  schemas:
    Widget:
      x-kubernetes-group-version-kind:
      - {group: example.com, kind: Widget, version: v1}
      properties:
        spec:
          properties:
            parts:
              type: array
              x-kubernetes-patch-merge-key: id
              items: {type: object}
"#,
        )
        .unwrap();
        assert!(index.merge_keys("Widget", &path("spec.parts[]")).is_some());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("schema.yaml");
        std::fs::write(&file, "PtpConfig:\n  spec.profile[]: name\n").unwrap();
        let index = SchemaIndex::from_file(&file).unwrap();
        assert!(!index.is_empty());

        let missing = SchemaIndex::from_file(dir.path().join("missing.yaml")).unwrap_err();
        assert!(matches!(missing, CoreError::Read { .. }));
    }
}
