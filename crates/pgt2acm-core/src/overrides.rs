//! Partial manifests supplied by the user
//!
//! An override only ever touches `metadata`, `spec` and `status`. Anything
//! else found next to them in a source entry (file name, policy name,
//! evaluation intervals) belongs to the surrounding pipeline.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::value::{Mapping, Value};

/// Sections an override may carry, in emission order
pub const SECTIONS: [&str; 3] = ["metadata", "spec", "status"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverrideSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Mapping>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<Mapping>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Mapping>,
}

impl OverrideSpec {
    /// Pick the override sections out of an arbitrary mapping value.
    ///
    /// Other top-level keys are ignored; a section that is present but not a
    /// mapping (or null) is an error.
    pub fn from_value(value: &Value) -> Result<Self> {
        let mut spec = OverrideSpec::default();
        let Some(map) = value.as_mapping() else {
            return Ok(spec);
        };

        for section in SECTIONS {
            let extracted = match map.get(section) {
                None | Some(Value::Null) => None,
                Some(Value::Mapping(inner)) => Some(inner.clone()),
                Some(other) => {
                    return Err(CoreError::InvalidOverride {
                        section: section.to_string(),
                        found: other.shape(),
                    });
                }
            };
            *spec.section_mut(section) = extracted;
        }
        Ok(spec)
    }

    fn section_mut(&mut self, section: &str) -> &mut Option<Mapping> {
        match section {
            "metadata" => &mut self.metadata,
            "spec" => &mut self.spec,
            _ => &mut self.status,
        }
    }

    /// Non-empty sections in `metadata`, `spec`, `status` order
    pub fn sections(&self) -> impl Iterator<Item = (&'static str, &Mapping)> {
        [
            ("metadata", self.metadata.as_ref()),
            ("spec", self.spec.as_ref()),
            ("status", self.status.as_ref()),
        ]
        .into_iter()
        .filter_map(|(name, map)| map.filter(|m| !m.is_empty()).map(|m| (name, m)))
    }

    /// True when no section carries any content
    pub fn is_empty(&self) -> bool {
        self.sections().next().is_none()
    }

    /// `metadata.<key>` as a string, used to pick a target document
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get(key))
            .and_then(Value::as_str)
    }

    /// The override as a single mapping holding only its non-empty sections
    pub fn to_mapping(&self) -> Mapping {
        self.sections()
            .map(|(name, map)| (name.to_string(), Value::Mapping(map.clone())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_value_ignores_other_keys() {
        let value = Value::from_yaml(
            r#"
fileName: PtpConfigSlave.yaml
policyName: config-policy
spec:
  profile: []
evaluationInterval:
  compliant: 10m
"#,
        )
        .unwrap();
        let spec = OverrideSpec::from_value(&value).unwrap();
        assert!(spec.metadata.is_none());
        assert!(spec.status.is_none());
        let keys: Vec<_> = spec.to_mapping().keys().cloned().collect();
        assert_eq!(keys, vec!["spec"]);
    }

    #[test]
    fn test_empty_sections_count_as_absent() {
        let value = Value::from_yaml("metadata: {}\nspec: null\n").unwrap();
        let spec = OverrideSpec::from_value(&value).unwrap();
        assert!(spec.is_empty());
        assert!(spec.to_mapping().is_empty());
    }

    #[test]
    fn test_scalar_section_is_rejected() {
        let value = Value::from_yaml("spec: oops\n").unwrap();
        let err = OverrideSpec::from_value(&value).unwrap_err();
        assert!(matches!(err, CoreError::InvalidOverride { ref section, .. } if section == "spec"));
    }

    #[test]
    fn test_sections_are_emitted_in_fixed_order() {
        let value = Value::from_yaml("status:\n  a: 1\nspec:\n  b: 2\nmetadata:\n  name: x\n").unwrap();
        let spec = OverrideSpec::from_value(&value).unwrap();
        let names: Vec<_> = spec.sections().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["metadata", "spec", "status"]);
        assert_eq!(spec.metadata_str("name"), Some("x"));
    }
}
