//! kustomization.yaml and ns.yaml post-processing
//!
//! The generated directory is deployed with kustomize, so its
//! kustomization has to point at the `acm-` files, ship the same resources
//! as the input directory, and bind the ZTP namespaces to the global
//! cluster set.

use std::path::{Path, PathBuf};

use pgt2acm_core::{Mapping, Result as CoreResult, parse_documents};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ConvertError, Result};
use crate::files::{
    ACM_PREFIX, KUSTOMIZATION_FILE, copy_file_if_absent, prefix_last_path_component,
    read_to_string, write_file,
};

pub const CLUSTER_SET_BINDING_API_VERSION: &str = "cluster.open-cluster-management.io/v1beta2";
pub const CLUSTER_SET: &str = "global";

/// Namespaces ZTP policies are created in
pub const ZTP_NAMESPACES: [&str; 3] = ["ztp-common", "ztp-group", "ztp-site"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Kustomization {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub generators: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<String>,
    #[serde(flatten)]
    pub other: Mapping,
}

impl Kustomization {
    /// Same kustomization with every generator renamed to its `acm-` file
    pub fn for_generators(&self) -> Self {
        Self {
            generators: self
                .generators
                .iter()
                .map(|g| {
                    prefix_last_path_component(Path::new(g), ACM_PREFIX)
                        .to_string_lossy()
                        .into_owned()
                })
                .collect(),
            resources: self.resources.clone(),
            other: self.other.clone(),
        }
    }
}

/// What the post-processing wrote
#[derive(Debug, Clone, Default)]
pub struct KustomizeOutcome {
    pub kustomization: PathBuf,
    pub copied_resources: Vec<PathBuf>,
    pub bindings_added: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManagedClusterSetBinding {
    api_version: String,
    kind: String,
    metadata: BindingMetadata,
    spec: BindingSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct BindingMetadata {
    name: String,
    namespace: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BindingSpec {
    cluster_set: String,
}

impl ManagedClusterSetBinding {
    fn global(namespace: &str) -> Self {
        Self {
            api_version: CLUSTER_SET_BINDING_API_VERSION.to_string(),
            kind: "ManagedClusterSetBinding".to_string(),
            metadata: BindingMetadata {
                name: CLUSTER_SET.to_string(),
                namespace: namespace.to_string(),
            },
            spec: BindingSpec {
                cluster_set: CLUSTER_SET.to_string(),
            },
        }
    }
}

/// Rewrite `<input>/kustomization.yaml` into `<output>`, copying its
/// resources, then add the cluster set bindings to `<output>/<ns_file>`.
pub fn process_kustomization(
    input_dir: &Path,
    output_dir: &Path,
    ns_file: &Path,
    dry_run: bool,
) -> Result<KustomizeOutcome> {
    let source = input_dir.join(KUSTOMIZATION_FILE);
    let content = read_to_string(&source)?;
    let kustomization: Kustomization =
        serde_yaml::from_str(&content).map_err(|err| ConvertError::Template {
            path: source.clone(),
            source: err,
        })?;
    let updated = kustomization.for_generators();

    let mut outcome = KustomizeOutcome {
        kustomization: output_dir.join(KUSTOMIZATION_FILE),
        ..Default::default()
    };

    for resource in &updated.resources {
        let from = input_dir.join(resource);
        let to = output_dir.join(resource);
        if dry_run {
            outcome.copied_resources.push(to);
        } else if copy_file_if_absent(&from, &to)? {
            info!(resource = %to.display(), "copied kustomization resource");
            outcome.copied_resources.push(to);
        }
    }

    if !dry_run {
        write_file(&outcome.kustomization, &serde_yaml::to_string(&updated)?)?;
        info!(file = %outcome.kustomization.display(), "wrote kustomization");
    }

    let ns_path = output_dir.join(ns_file);
    let ns_content = if ns_path.exists() {
        read_to_string(&ns_path)?
    } else if dry_run {
        // not copied yet; judge from the input copy
        read_to_string(&input_dir.join(ns_file))?
    } else {
        return Err(ConvertError::InputNotFound(ns_path));
    };

    let (appended, namespaces) =
        with_cluster_set_bindings(&ns_content).map_err(|source| ConvertError::Manifest {
            path: ns_path.clone(),
            source,
        })?;
    outcome.bindings_added = namespaces;
    if !dry_run && !outcome.bindings_added.is_empty() {
        write_file(&ns_path, &appended)?;
        info!(file = %ns_path.display(), "added default cluster set bindings");
    }
    Ok(outcome)
}

/// `content` followed by a global ManagedClusterSetBinding for each ZTP
/// namespace that does not have one yet, and the namespaces that got one
pub fn with_cluster_set_bindings(content: &str) -> CoreResult<(String, Vec<String>)> {
    let existing = parse_documents(content)?;

    let mut out = content.to_string();
    let mut added = Vec::new();
    for namespace in ZTP_NAMESPACES {
        let bound = existing.iter().any(|doc| {
            doc.kind() == "ManagedClusterSetBinding"
                && doc.namespace() == Some(namespace)
                && doc.name() == Some(CLUSTER_SET)
        });
        if bound {
            debug!(namespace, "cluster set binding already present");
            continue;
        }
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str("---\n");
        out.push_str(&serde_yaml::to_string(&ManagedClusterSetBinding::global(namespace))?);
        added.push(namespace.to_string());
    }
    Ok((out, added))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    const NS_YAML: &str = "---\napiVersion: v1\nkind: Namespace\nmetadata:\n  name: ztp-common\n";

    fn setup(dir: &Path) {
        fs::write(
            dir.join(KUSTOMIZATION_FILE),
            "generators:\n- common-ranGen.yaml\n- group/group-du-sno-ranGen.yaml\nresources:\n- ns.yaml\nnamespace: ztp\n",
        )
        .unwrap();
        fs::write(dir.join("ns.yaml"), NS_YAML).unwrap();
    }

    #[test]
    fn test_generators_get_acm_prefix() {
        let kustomization: Kustomization = serde_yaml::from_str(
            "generators:\n- common-ranGen.yaml\n- group/group-du-sno-ranGen.yaml\nnamespace: ztp\n",
        )
        .unwrap();
        let updated = kustomization.for_generators();
        assert_eq!(
            updated.generators,
            vec!["acm-common-ranGen.yaml", "group/acm-group-du-sno-ranGen.yaml"]
        );
        assert!(updated.other.contains_key("namespace"));
    }

    #[test]
    fn test_bindings_appended_once() {
        let (first, added) = with_cluster_set_bindings(NS_YAML).unwrap();
        assert_eq!(added, vec!["ztp-common", "ztp-group", "ztp-site"]);
        assert!(first.starts_with(NS_YAML));

        let docs = parse_documents(&first).unwrap();
        assert_eq!(docs.len(), 4);
        assert_eq!(docs[1].api_version(), CLUSTER_SET_BINDING_API_VERSION);
        assert_eq!(docs[3].namespace(), Some("ztp-site"));

        let (second, added) = with_cluster_set_bindings(&first).unwrap();
        assert!(added.is_empty());
        assert_eq!(second, first);
    }

    #[test]
    fn test_binding_document() {
        let (out, _) = with_cluster_set_bindings("").unwrap();
        let first = out.split("---\n").nth(1).unwrap();
        insta::assert_snapshot!(first, @r"
        apiVersion: cluster.open-cluster-management.io/v1beta2
        kind: ManagedClusterSetBinding
        metadata:
          name: global
          namespace: ztp-common
        spec:
          clusterSet: global
        ");
    }

    #[test]
    fn test_process_kustomization() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        setup(input.path());

        let outcome =
            process_kustomization(input.path(), output.path(), Path::new("ns.yaml"), false).unwrap();

        assert_eq!(outcome.copied_resources, vec![output.path().join("ns.yaml")]);
        assert_eq!(outcome.bindings_added.len(), 3);

        let written: Kustomization =
            serde_yaml::from_str(&fs::read_to_string(&outcome.kustomization).unwrap()).unwrap();
        assert_eq!(written.generators[0], "acm-common-ranGen.yaml");
        assert_eq!(written.resources, vec!["ns.yaml"]);

        let ns = fs::read_to_string(output.path().join("ns.yaml")).unwrap();
        assert_eq!(ns.matches("kind: ManagedClusterSetBinding").count(), 3);
        // the input copy is left alone
        assert_eq!(fs::read_to_string(input.path().join("ns.yaml")).unwrap(), NS_YAML);

        // running again does not duplicate bindings
        let again =
            process_kustomization(input.path(), output.path(), Path::new("ns.yaml"), false).unwrap();
        assert!(again.bindings_added.is_empty());
        assert!(again.copied_resources.is_empty());
    }

    #[test]
    fn test_process_kustomization_dry_run_writes_nothing() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        setup(input.path());

        let outcome =
            process_kustomization(input.path(), output.path(), Path::new("ns.yaml"), true).unwrap();
        assert_eq!(outcome.bindings_added.len(), 3);
        assert!(!outcome.kustomization.exists());
        assert!(!output.path().join("ns.yaml").exists());
    }

    #[test]
    fn test_missing_kustomization() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let err = process_kustomization(input.path(), output.path(), Path::new("ns.yaml"), false)
            .unwrap_err();
        assert!(matches!(err, ConvertError::Read { .. }));
    }
}
