//! PolicyGenTemplate input format
//!
//! Only the fields the conversion reads are modelled; anything else in a
//! template is ignored.

use pgt2acm_core::{Mapping, OverrideSpec};
use pgt2acm_engine::{LabelRules, deserialize_rules};
use serde::Deserialize;

use crate::acm::EvaluationInterval;

pub const PGT_KIND: &str = "PolicyGenTemplate";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyGenTemplate {
    #[serde(default)]
    pub api_version: String,
    pub kind: String,
    pub metadata: TemplateMetadata,
    #[serde(default)]
    pub spec: TemplateSpec,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateMetadata {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSpec {
    /// Labels a cluster must carry
    #[serde(default, deserialize_with = "deserialize_rules")]
    pub binding_rules: LabelRules,

    /// Labels a cluster must not carry
    #[serde(default, deserialize_with = "deserialize_rules")]
    pub binding_excluded_rules: LabelRules,

    /// Machine config pool substituted for `$mcp`
    #[serde(default)]
    pub mcp: String,

    #[serde(default)]
    pub evaluation_interval: EvaluationInterval,

    #[serde(default)]
    pub source_files: Vec<SourceFile>,
}

/// One source CR of a template, with its override payload
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFile {
    pub file_name: String,

    #[serde(default)]
    pub policy_name: String,

    #[serde(default)]
    pub metadata: Option<Mapping>,

    #[serde(default)]
    pub spec: Option<Mapping>,

    #[serde(default)]
    pub status: Option<Mapping>,

    #[serde(default)]
    pub evaluation_interval: EvaluationInterval,

    #[serde(default)]
    pub compliance_type: Option<String>,
}

impl SourceFile {
    /// The `metadata`/`spec`/`status` override carried by this entry
    pub fn overrides(&self) -> OverrideSpec {
        OverrideSpec {
            metadata: self.metadata.clone(),
            spec: self.spec.clone(),
            status: self.status.clone(),
        }
    }
}

impl PolicyGenTemplate {
    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Distinct policy names in ascending order
    pub fn policy_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .spec
            .source_files
            .iter()
            .map(|source| source.policy_name.as_str())
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    /// Source files belonging to `policy`, in template order
    pub fn sources_of<'a>(&'a self, policy: &'a str) -> impl Iterator<Item = &'a SourceFile> {
        self.spec
            .source_files
            .iter()
            .filter(move |source| source.policy_name == policy)
    }
}
