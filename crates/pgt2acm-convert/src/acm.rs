//! ACM PolicyGenerator output format

use indexmap::IndexMap;
use pgt2acm_core::Mapping;
use pgt2acm_engine::CompiledSelector;
use serde::{Deserialize, Serialize};

pub const GENERATOR_API_VERSION: &str = "policy.open-cluster-management.io/v1";
pub const GENERATOR_KIND: &str = "PolicyGenerator";

/// Annotation carrying the ZTP deploy wave of a source CR and of its policy
pub const WAVE_ANNOTATION: &str = "ran.openshift.io/ztp-deploy-wave";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyGenerator {
    pub api_version: String,
    pub kind: String,
    pub metadata: GeneratorMetadata,
    pub placement_binding_defaults: PlacementBindingDefaults,
    pub policy_defaults: PolicyDefaults,
    #[serde(default)]
    pub policies: Vec<PolicyConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorMetadata {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementBindingDefaults {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDefaults {
    pub namespace: String,
    pub placement: Placement,
    pub remediation_action: String,
    pub severity: String,
    pub namespace_selector: NamespaceSelector,
    #[serde(default, skip_serializing_if = "EvaluationInterval::is_empty")]
    pub evaluation_interval: EvaluationInterval,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    pub label_selector: CompiledSelector,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamespaceSelector {
    pub exclude: Vec<String>,
    pub include: Vec<String>,
}

impl Default for NamespaceSelector {
    fn default() -> Self {
        Self {
            exclude: vec!["kube-*".to_string()],
            include: vec!["*".to_string()],
        }
    }
}

/// Re-evaluation periods; `None` leaves the ACM default in place
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationInterval {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noncompliant: Option<String>,
}

impl EvaluationInterval {
    pub fn is_empty(&self) -> bool {
        self.compliant.is_none() && self.noncompliant.is_none()
    }

    /// Take every period `other` sets
    pub fn override_with(&mut self, other: &EvaluationInterval) {
        if let Some(compliant) = &other.compliant {
            self.compliant = Some(compliant.clone());
        }
        if let Some(noncompliant) = &other.noncompliant {
            self.noncompliant = Some(noncompliant.clone());
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub policy_annotations: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "EvaluationInterval::is_empty")]
    pub evaluation_interval: EvaluationInterval,
    #[serde(default)]
    pub manifests: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    /// Path relative to the generator file
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliance_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patches: Vec<Mapping>,
}

impl PolicyGenerator {
    /// Generator skeleton for the template `name` deployed to `namespace`
    pub fn new(name: &str, namespace: &str, selector: CompiledSelector) -> Self {
        Self {
            api_version: GENERATOR_API_VERSION.to_string(),
            kind: GENERATOR_KIND.to_string(),
            metadata: GeneratorMetadata {
                name: name.to_string(),
            },
            placement_binding_defaults: PlacementBindingDefaults {
                name: format!("{name}-placement-binding"),
            },
            policy_defaults: PolicyDefaults {
                namespace: namespace.to_string(),
                placement: Placement {
                    label_selector: selector,
                },
                remediation_action: "inform".to_string(),
                severity: "low".to_string(),
                namespace_selector: NamespaceSelector::default(),
                evaluation_interval: EvaluationInterval::default(),
            },
            policies: Vec::new(),
        }
    }

    /// YAML document as written to disk: `---` header, `$mcp` replaced
    pub fn to_document(&self, mcp: &str) -> Result<String, serde_yaml::Error> {
        let yaml = serde_yaml::to_string(self)?;
        Ok(format!("---\n{yaml}").replace(crate::files::MCP_PLACEHOLDER, mcp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgt2acm_engine::{LabelRules, compile};

    #[test]
    fn test_generator_document() {
        let mut include = LabelRules::new();
        include.insert("common".to_string(), vec!["true".to_string()]);
        let selector = compile(&include, &LabelRules::new()).unwrap();

        let mut generator = PolicyGenerator::new("common", "ztp-common", selector);
        generator.policy_defaults.evaluation_interval.compliant = Some("10m".to_string());
        generator.policies.push(PolicyConfig {
            name: "common-config-policy".to_string(),
            manifests: vec![ManifestEntry {
                path: "source-crs/MachineConfig-$mcp.yaml".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        });

        insta::assert_snapshot!(generator.to_document("master").unwrap(), @r"
        ---
        apiVersion: policy.open-cluster-management.io/v1
        kind: PolicyGenerator
        metadata:
          name: common
        placementBindingDefaults:
          name: common-placement-binding
        policyDefaults:
          namespace: ztp-common
          placement:
            labelSelector:
              matchExpressions:
              - key: common
                operator: In
                values:
                - 'true'
          remediationAction: inform
          severity: low
          namespaceSelector:
            exclude:
            - kube-*
            include:
            - '*'
          evaluationInterval:
            compliant: 10m
        policies:
        - name: common-config-policy
          manifests:
          - path: source-crs/MachineConfig-master.yaml
        ");
    }

    #[test]
    fn test_evaluation_interval_override() {
        let mut interval = EvaluationInterval {
            compliant: Some("10m".to_string()),
            noncompliant: Some("10s".to_string()),
        };
        interval.override_with(&EvaluationInterval {
            compliant: Some("never".to_string()),
            noncompliant: None,
        });
        assert_eq!(interval.compliant.as_deref(), Some("never"));
        assert_eq!(interval.noncompliant.as_deref(), Some("10s"));
    }
}
