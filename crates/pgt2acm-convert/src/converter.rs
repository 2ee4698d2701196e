//! Main converter logic
//!
//! Orchestrates the conversion of a tree of PolicyGenTemplates into ACM
//! PolicyGenerator files:
//! - copy reference source CRs (`-c`)
//! - convert every template found under the input path
//! - render `$mcp` in the source CRs the templates reference
//! - pre-render patches for selected kinds through the patch engine
//! - post-process kustomization.yaml and ns.yaml

use std::path::{Path, PathBuf};

use pgt2acm_core::{
    ManifestDocument, Mapping, OverrideSpec, SchemaIndex, Value, parse_documents_at,
};
use pgt2acm_engine::{PatchOptions, apply_patches_with, compile, select_target, validate};
use tracing::{debug, info, warn};

use crate::acm::{ManifestEntry, PolicyConfig, PolicyGenerator, WAVE_ANNOTATION};
use crate::error::{ConversionWarning, ConvertError, Result, WarningCategory};
use crate::files::{
    self, ACM_PREFIX, KUSTOMIZATION_FILE, SOURCE_CRS_DIR, discover_yaml_files,
    first_document_kind, prefix_last_path_component, read_to_string, render_mcp, write_file,
};
use crate::kustomize::process_kustomization;
use crate::pgt::{PGT_KIND, PolicyGenTemplate, SourceFile};

/// Options for the converter
#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    /// Merge keys for keyed arrays of custom resources
    pub schema: SchemaIndex,
    /// Source CR kinds whose patches are resolved against the CR
    pub pre_render_kinds: Vec<String>,
    /// Fail on keyed-array elements without a merge key
    pub strict_merge_keys: bool,
    /// Compute everything, write nothing
    pub dry_run: bool,
    /// Namespace file, relative to the output directory, that receives the
    /// cluster set bindings; `None` skips kustomization post-processing
    pub namespace_file: Option<PathBuf>,
    /// Reference source CR directories copied into both trees
    pub source_crs: Vec<PathBuf>,
}

/// One converted template
#[derive(Debug, Clone)]
pub struct ConvertedTemplate {
    pub source: PathBuf,
    pub output: PathBuf,
    pub generator: PolicyGenerator,
}

/// Result of a conversion
#[derive(Debug, Default)]
pub struct ConversionResult {
    pub converted: Vec<ConvertedTemplate>,
    /// `$mcp`-rendered copies of source CRs
    pub rendered_manifests: Vec<PathBuf>,
    /// Source CRs and kustomization resources copied
    pub copied_files: Vec<PathBuf>,
    /// YAML files that are not PolicyGenTemplates
    pub skipped_files: Vec<PathBuf>,
    pub warnings: Vec<ConversionWarning>,
}

impl ConversionResult {
    pub fn policy_count(&self) -> usize {
        self.converted
            .iter()
            .map(|t| t.generator.policies.len())
            .sum()
    }
}

/// Convert PolicyGenTemplates to ACM PolicyGenerators
pub struct Converter {
    options: ConvertOptions,
}

impl Converter {
    pub fn new(options: ConvertOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    /// Convert every template under `input` into `output`
    pub fn convert(&self, input: &Path, output: &Path) -> Result<ConversionResult> {
        let mut result = ConversionResult::default();

        if !input.exists() {
            return Err(ConvertError::InputNotFound(input.to_path_buf()));
        }
        let input_dir = if input.is_dir() {
            input
        } else {
            input.parent().unwrap_or(Path::new("."))
        };

        self.copy_source_crs(input_dir, output, &mut result)?;

        for file in discover_yaml_files(input)? {
            let content = read_to_string(&file)?;
            match first_document_kind(&content) {
                Some(kind) if kind == PGT_KIND => {}
                Some(_) => {
                    debug!(file = %file.display(), "not a PolicyGenTemplate, skipping");
                    result.skipped_files.push(file);
                    continue;
                }
                None => {
                    result.warnings.push(ConversionWarning::info(
                        WarningCategory::Discovery,
                        file.clone(),
                        "no kind in the first document, skipping",
                    ));
                    result.skipped_files.push(file);
                    continue;
                }
            }

            let template = first_template(&content).map_err(|source| ConvertError::Template {
                path: file.clone(),
                source,
            })?;

            let relative = match file.strip_prefix(input) {
                Ok(rel) if !rel.as_os_str().is_empty() => rel.to_path_buf(),
                _ => PathBuf::from(file.file_name().unwrap_or_default()),
            };
            let output_file = output.join(prefix_last_path_component(&relative, ACM_PREFIX));

            let generator = self.convert_template(&template, output, &mut result)?;
            let document = generator.to_document(&template.spec.mcp)?;
            if !self.options.dry_run {
                write_file(&output_file, &document)?;
            }
            info!(
                template = template.name(),
                output = %output_file.display(),
                policies = generator.policies.len(),
                "converted PolicyGenTemplate"
            );

            result.converted.push(ConvertedTemplate {
                source: file,
                output: output_file,
                generator,
            });
        }

        if let Some(ns_file) = &self.options.namespace_file {
            self.post_process(input_dir, output, ns_file, &mut result);
        }

        Ok(result)
    }

    /// Build the generator of one template.
    ///
    /// Source CRs are looked up relative to `output_dir`; rendered manifests
    /// are written there too.
    pub fn convert_template(
        &self,
        template: &PolicyGenTemplate,
        output_dir: &Path,
        result: &mut ConversionResult,
    ) -> Result<PolicyGenerator> {
        let selector = compile(
            &template.spec.binding_rules,
            &template.spec.binding_excluded_rules,
        )
        .map_err(|source| ConvertError::Placement {
            template: template.name().to_string(),
            source,
        })?;

        let mut generator =
            PolicyGenerator::new(template.name(), &template.metadata.namespace, selector);
        generator.policy_defaults.evaluation_interval = template.spec.evaluation_interval.clone();

        for policy_name in template.policy_names() {
            let mut policy = PolicyConfig {
                name: format!("{}-{policy_name}", template.name()),
                ..Default::default()
            };

            for source in template.sources_of(policy_name) {
                policy
                    .evaluation_interval
                    .override_with(&source.evaluation_interval);

                let mut manifest = ManifestEntry {
                    path: format!("{SOURCE_CRS_DIR}/{}", source.file_name),
                    compliance_type: source.compliance_type.clone(),
                    patches: Vec::new(),
                };
                let overrides = source.overrides();
                if !overrides.is_empty() {
                    manifest.patches.push(overrides.to_mapping());
                }

                if let Some((path, content)) = self.load_source_cr(output_dir, source, result) {
                    self.copy_wave(&mut policy, &path, &content, result);
                    let (rendered_path, rendered) = self.render_source_cr(
                        template,
                        &mut manifest,
                        &path,
                        &content,
                        output_dir,
                        result,
                    )?;
                    if !manifest.patches.is_empty() {
                        self.pre_render(&mut manifest, &path, &rendered_path, &rendered, result)?;
                    }
                }

                policy.manifests.push(manifest);
            }
            generator.policies.push(policy);
        }

        Ok(generator)
    }

    /// Locate and read the source CR of `source`.
    ///
    /// `<output>/source-crs` comes first, then the `-c` directories so a dry
    /// run sees the same files a real run would have copied.
    fn load_source_cr(
        &self,
        output_dir: &Path,
        source: &SourceFile,
        result: &mut ConversionResult,
    ) -> Option<(PathBuf, String)> {
        let primary = output_dir.join(SOURCE_CRS_DIR).join(&source.file_name);
        let found = std::iter::once(primary.clone())
            .chain(
                self.options
                    .source_crs
                    .iter()
                    .map(|dir| dir.join(&source.file_name)),
            )
            .find(|candidate| candidate.is_file());

        let Some(path) = found else {
            warn!(file = %primary.display(), "source CR not found");
            result.warnings.push(
                ConversionWarning::warning(
                    WarningCategory::SourceCr,
                    primary,
                    "source CR not found, no wave annotation or pre-rendering for it",
                )
                .with_suggestion("copy the reference source CRs with -c <dir>"),
            );
            return None;
        };

        match read_to_string(&path) {
            Ok(content) => Some((path, content)),
            Err(err) => {
                warn!(file = %path.display(), error = %err, "cannot read source CR");
                result.warnings.push(ConversionWarning::warning(
                    WarningCategory::SourceCr,
                    path,
                    err.to_string(),
                ));
                None
            }
        }
    }

    /// Copy the ZTP deploy wave of a source CR onto its policy
    fn copy_wave(
        &self,
        policy: &mut PolicyConfig,
        source_path: &Path,
        content: &str,
        result: &mut ConversionResult,
    ) {
        let documents = match parse_documents_at(content, source_path) {
            Ok(documents) => documents,
            Err(err) => {
                result.warnings.push(ConversionWarning::warning(
                    WarningCategory::SourceCr,
                    source_path.to_path_buf(),
                    format!("cannot read annotations: {err}"),
                ));
                return;
            }
        };

        let Some(wave) = documents
            .first()
            .and_then(|doc| doc.annotation(WAVE_ANNOTATION))
            .filter(|wave| wave.trim().parse::<i64>().is_ok())
        else {
            return;
        };

        if let Some(previous) = policy.policy_annotations.get(WAVE_ANNOTATION)
            && previous != wave
        {
            result.warnings.push(ConversionWarning::warning(
                WarningCategory::Wave,
                source_path.to_path_buf(),
                format!(
                    "policy {} mixes deploy waves {previous} and {wave}; keeping {wave}",
                    policy.name
                ),
            ));
        }
        policy
            .policy_annotations
            .insert(WAVE_ANNOTATION.to_string(), wave.to_string());
    }

    /// Substitute `$mcp` in the source CR of `manifest`.
    ///
    /// When the placeholder occurs the rendered copy is written under
    /// `<output>/source-crs` and `manifest` points at it. Returns the path and
    /// content the manifest now refers to.
    fn render_source_cr(
        &self,
        template: &PolicyGenTemplate,
        manifest: &mut ManifestEntry,
        source_path: &Path,
        content: &str,
        output_dir: &Path,
        result: &mut ConversionResult,
    ) -> Result<(PathBuf, String)> {
        let rendered = render_mcp(&manifest.path, content, &template.spec.mcp);
        if !rendered.rendered {
            return Ok((source_path.to_path_buf(), rendered.content));
        }

        let rendered_path = output_dir.join(&rendered.path);
        if !self.options.dry_run {
            write_file(&rendered_path, &rendered.content)?;
        }
        debug!(file = %rendered_path.display(), "rendered $mcp");
        result.rendered_manifests.push(rendered_path.clone());
        manifest.path = rendered.path;
        Ok((rendered_path, rendered.content))
    }

    /// Resolve the patch of `manifest` against its rendered source CR when
    /// the CR kind is selected for pre-rendering
    fn pre_render(
        &self,
        manifest: &mut ManifestEntry,
        source_path: &Path,
        rendered_path: &Path,
        content: &str,
        result: &mut ConversionResult,
    ) -> Result<()> {
        let Some(kind) = first_document_kind(content) else {
            return Ok(());
        };
        if !self.options.pre_render_kinds.iter().any(|k| *k == kind) {
            return Ok(());
        }

        let documents = parse_documents_at(content, rendered_path).map_err(|source| {
            ConvertError::SourceCr {
                path: source_path.to_path_buf(),
                source,
            }
        })?;

        let mut resolved: Vec<Mapping> = Vec::with_capacity(manifest.patches.len());
        for payload in &manifest.patches {
            let overrides = OverrideSpec::from_value(&Value::Mapping(payload.clone()))
                .map_err(|source| ConvertError::SourceCr {
                    path: source_path.to_path_buf(),
                    source,
                })?;
            let target = select_target(&documents, &overrides, &manifest.path)?;
            validate(target, &overrides).map_err(|source| ConvertError::Validation {
                path: rendered_path.to_path_buf(),
                source,
            })?;
            let patch = apply_patches_with(
                target,
                &overrides,
                &self.options.schema,
                PatchOptions {
                    strict_merge_keys: self.options.strict_merge_keys,
                },
            )?;
            self.record_fallbacks(target, &patch, result);
            resolved.push(patch.into_content());
        }

        manifest.patches = resolved;
        Ok(())
    }

    fn record_fallbacks(
        &self,
        target: &ManifestDocument,
        patch: &pgt2acm_engine::Patch,
        result: &mut ConversionResult,
    ) {
        for fallback in patch.fallbacks() {
            result.warnings.push(
                ConversionWarning::warning(
                    WarningCategory::MergeFallback,
                    target.source().map(Path::to_path_buf).unwrap_or_default(),
                    format!(
                        "{} element #{} of {} has no merge key {:?}; the list is replaced",
                        fallback.side, fallback.position, fallback.path, fallback.keys
                    ),
                )
                .with_suggestion("add the merge key to every element, or pass --strict-merge-keys to fail instead"),
            );
        }
    }

    fn copy_source_crs(
        &self,
        input_dir: &Path,
        output: &Path,
        result: &mut ConversionResult,
    ) -> Result<()> {
        for dir in &self.options.source_crs {
            if !dir.is_dir() {
                return Err(ConvertError::InputNotFound(dir.clone()));
            }
            if self.options.dry_run {
                continue;
            }
            for target in [output.join(SOURCE_CRS_DIR), input_dir.join(SOURCE_CRS_DIR)] {
                let copied = files::copy_dir(dir, &target)?;
                info!(
                    from = %dir.display(),
                    to = %target.display(),
                    files = copied.len(),
                    "copied source CRs"
                );
                result.copied_files.extend(copied);
            }
        }
        Ok(())
    }

    /// Kustomization post-processing; failures become warnings
    fn post_process(
        &self,
        input_dir: &Path,
        output: &Path,
        ns_file: &Path,
        result: &mut ConversionResult,
    ) {
        let kustomization = input_dir.join(KUSTOMIZATION_FILE);
        if !kustomization.is_file() {
            result.warnings.push(ConversionWarning::info(
                WarningCategory::Kustomize,
                kustomization,
                "no kustomization.yaml next to the templates, skipping post-processing",
            ));
            return;
        }

        match process_kustomization(input_dir, output, ns_file, self.options.dry_run) {
            Ok(outcome) => result.copied_files.extend(outcome.copied_resources),
            Err(err) => {
                warn!(error = %err, "kustomization post-processing failed");
                result.warnings.push(ConversionWarning::error(
                    WarningCategory::Kustomize,
                    kustomization,
                    format!("could not post-process {} and kustomization.yaml: {err}", ns_file.display()),
                ));
            }
        }
    }
}

fn first_template(content: &str) -> std::result::Result<PolicyGenTemplate, serde_yaml::Error> {
    use serde::Deserialize;

    match serde_yaml::Deserializer::from_str(content).next() {
        Some(document) => PolicyGenTemplate::deserialize(document),
        None => PolicyGenTemplate::from_yaml(content),
    }
}

// =============================================================================
// Public API
// =============================================================================

/// Quick convert function
pub fn convert(input: &Path, output: &Path) -> Result<ConversionResult> {
    Converter::new(ConvertOptions::default()).convert(input, output)
}

/// Convert with options
pub fn convert_with_options(
    input: &Path,
    output: &Path,
    options: ConvertOptions,
) -> Result<ConversionResult> {
    Converter::new(options).convert(input, output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const TEMPLATE: &str = r#"
apiVersion: ran.openshift.io/v1
kind: PolicyGenTemplate
metadata:
  name: group-du-sno
  namespace: ztp-group
spec:
  bindingRules:
    group-du-sno: ""
  bindingExcludedRules:
    du-profile: canary
  mcp: master
  evaluationInterval:
    compliant: 10m
    noncompliant: 10s
  sourceFiles:
    - fileName: PtpConfigSlave.yaml
      policyName: config-policy
      metadata:
        name: du-ptp-slave
      spec:
        profile:
          - name: slave
            interface: ens5f0
    - fileName: MachineConfigSctp.yaml
      policyName: config-policy
    - fileName: ClusterLogForwarder.yaml
      policyName: log-policy
      evaluationInterval:
        compliant: never
"#;

    const PTP_CONFIG: &str = r#"apiVersion: ptp.openshift.io/v1
kind: PtpConfig
metadata:
  name: du-ptp-slave
  namespace: openshift-ptp
  annotations:
    ran.openshift.io/ztp-deploy-wave: "10"
spec:
  profile:
    - name: slave
      interface: $interface
      ptp4lOpts: "-2 -s"
  recommend:
    - profile: slave
      priority: 4
      match:
        - nodeLabel: node-role.kubernetes.io/$mcp
"#;

    const MACHINE_CONFIG: &str = r#"apiVersion: machineconfiguration.openshift.io/v1
kind: MachineConfig
metadata:
  name: load-sctp-module
  labels:
    machineconfiguration.openshift.io/role: $mcp
  annotations:
    ran.openshift.io/ztp-deploy-wave: "10"
spec: {}
"#;

    fn create_tree(input: &Path, output: &Path) {
        fs::create_dir_all(input.join("group")).unwrap();
        fs::write(input.join("group/group-du-sno-ranGen.yaml"), TEMPLATE).unwrap();
        fs::write(input.join("README.yaml"), "notes: true\n").unwrap();
        fs::write(
            input.join("ns.yaml"),
            "apiVersion: v1\nkind: Namespace\nmetadata:\n  name: ztp-group\n",
        )
        .unwrap();

        let crs = output.join(SOURCE_CRS_DIR);
        fs::create_dir_all(&crs).unwrap();
        fs::write(crs.join("PtpConfigSlave.yaml"), PTP_CONFIG).unwrap();
        fs::write(crs.join("MachineConfigSctp.yaml"), MACHINE_CONFIG).unwrap();
    }

    fn schema() -> SchemaIndex {
        SchemaIndex::from_yaml("PtpConfig:\n  spec.profile[]: name\n  spec.recommend[]: profile\n")
            .unwrap()
    }

    #[test]
    fn test_convert_tree() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        create_tree(input.path(), output.path());

        let result = convert(input.path(), output.path()).unwrap();

        assert_eq!(result.converted.len(), 1);
        assert_eq!(
            result.skipped_files,
            vec![input.path().join("README.yaml"), input.path().join("ns.yaml")]
        );
        let converted = &result.converted[0];
        assert_eq!(
            converted.output,
            output.path().join("group/acm-group-du-sno-ranGen.yaml")
        );
        assert!(converted.output.exists());

        let generator = &converted.generator;
        assert_eq!(generator.metadata.name, "group-du-sno");
        assert_eq!(
            generator.placement_binding_defaults.name,
            "group-du-sno-placement-binding"
        );
        assert_eq!(generator.policy_defaults.namespace, "ztp-group");
        let names: Vec<_> = generator.policies.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["group-du-sno-config-policy", "group-du-sno-log-policy"]);

        let config = &generator.policies[0];
        assert_eq!(config.policy_annotations[WAVE_ANNOTATION], "10");
        assert_eq!(config.manifests[0].path, "source-crs/PtpConfigSlave-MCP-master.yaml");
        assert_eq!(config.manifests[0].patches.len(), 1);
        assert!(config.manifests[1].patches.is_empty());

        let log = &generator.policies[1];
        assert_eq!(log.evaluation_interval.compliant.as_deref(), Some("never"));
        assert!(log.policy_annotations.is_empty());

        // ClusterLogForwarder.yaml is not available
        assert!(
            result
                .warnings
                .iter()
                .any(|w| w.category == WarningCategory::SourceCr)
        );

        let written = fs::read_to_string(&converted.output).unwrap();
        assert!(written.starts_with("---\n"));
        assert!(!written.contains("$mcp"));
    }

    #[test]
    fn test_readme_yaml_without_kind_is_skipped() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        create_tree(input.path(), output.path());

        let result = convert(input.path(), output.path()).unwrap();
        assert!(result.skipped_files.contains(&input.path().join("README.yaml")));
        assert!(
            result
                .warnings
                .iter()
                .any(|w| w.category == WarningCategory::Discovery)
        );
    }

    #[test]
    fn test_pre_render_resolves_keyed_patches() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        create_tree(input.path(), output.path());

        let options = ConvertOptions {
            schema: schema(),
            pre_render_kinds: vec!["PtpConfig".to_string()],
            ..Default::default()
        };
        let result = convert_with_options(input.path(), output.path(), options).unwrap();

        let manifest = &result.converted[0].generator.policies[0].manifests[0];
        assert_eq!(manifest.path, "source-crs/PtpConfigSlave-MCP-master.yaml");
        assert!(output.path().join(&manifest.path).exists());
        assert_eq!(
            result.rendered_manifests,
            vec![
                output.path().join("source-crs/PtpConfigSlave-MCP-master.yaml"),
                output.path().join("source-crs/MachineConfigSctp-MCP-master.yaml"),
            ]
        );

        let patch = Value::Mapping(manifest.patches[0].clone());
        let profile = patch.get_path("spec.profile").unwrap().as_sequence().unwrap();
        assert_eq!(profile.len(), 1);
        assert_eq!(profile[0].get("interface"), Some(&Value::from("ens5f0")));
        // base fields of the matched element are carried over
        assert_eq!(profile[0].get("ptp4lOpts"), Some(&Value::from("-2 -s")));
        // apiVersion and kind never leak into the patch
        assert!(!manifest.patches[0].contains_key("apiVersion"));

        // MachineConfig is not selected for pre-rendering, only `$mcp` is resolved
        let sctp = &result.converted[0].generator.policies[0].manifests[1];
        assert_eq!(sctp.path, "source-crs/MachineConfigSctp-MCP-master.yaml");
        assert!(sctp.patches.is_empty());
    }

    #[test]
    fn test_mcp_is_rendered_for_every_source_cr() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        create_tree(input.path(), output.path());

        let result = convert(input.path(), output.path()).unwrap();

        let config = &result.converted[0].generator.policies[0];
        let sctp = &config.manifests[1];
        assert_eq!(sctp.path, "source-crs/MachineConfigSctp-MCP-master.yaml");
        let rendered = fs::read_to_string(output.path().join(&sctp.path)).unwrap();
        assert!(!rendered.contains("$mcp"));
        assert!(rendered.contains("machineconfiguration.openshift.io/role: master"));

        // without pre-rendering the raw payload is kept
        let ptp = &config.manifests[0];
        assert_eq!(ptp.path, "source-crs/PtpConfigSlave-MCP-master.yaml");
        let patch = Value::Mapping(ptp.patches[0].clone());
        let profile = patch.get_path("spec.profile").unwrap().as_sequence().unwrap();
        assert_eq!(profile[0].get("ptp4lOpts"), None);

        // the original CR is left alone
        let source =
            fs::read_to_string(output.path().join("source-crs/MachineConfigSctp.yaml")).unwrap();
        assert_eq!(source, MACHINE_CONFIG);
    }

    #[test]
    fn test_source_cr_without_placeholder_keeps_its_path() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        create_tree(input.path(), output.path());
        fs::write(
            output.path().join("source-crs/ClusterLogForwarder.yaml"),
            "apiVersion: logging.openshift.io/v1\nkind: ClusterLogForwarder\nmetadata:\n  name: instance\n",
        )
        .unwrap();

        let result = convert(input.path(), output.path()).unwrap();

        let log = &result.converted[0].generator.policies[1];
        assert_eq!(log.manifests[0].path, "source-crs/ClusterLogForwarder.yaml");
        assert!(
            !result
                .rendered_manifests
                .iter()
                .any(|path| path.ends_with("ClusterLogForwarder-MCP-master.yaml"))
        );
    }

    #[test]
    fn test_pre_render_rejects_type_mismatch() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        create_tree(input.path(), output.path());
        let broken = TEMPLATE.replace(
            "        profile:\n          - name: slave\n            interface: ens5f0\n",
            "        profile: slave\n",
        );
        fs::write(input.path().join("group/group-du-sno-ranGen.yaml"), broken).unwrap();

        let options = ConvertOptions {
            pre_render_kinds: vec!["PtpConfig".to_string()],
            ..Default::default()
        };
        let err = convert_with_options(input.path(), output.path(), options).unwrap_err();
        match err {
            ConvertError::Validation { path, source } => {
                assert!(path.ends_with("source-crs/PtpConfigSlave-MCP-master.yaml"));
                assert_eq!(source.path.to_string(), "spec.profile");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_dry_run() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        create_tree(input.path(), output.path());

        let options = ConvertOptions {
            dry_run: true,
            schema: schema(),
            pre_render_kinds: vec!["PtpConfig".to_string()],
            ..Default::default()
        };
        let result = convert_with_options(input.path(), output.path(), options).unwrap();

        // Should report files but not create them
        assert_eq!(result.converted.len(), 1);
        assert!(!result.converted[0].output.exists());
        assert!(!result.rendered_manifests[0].exists());
    }

    #[test]
    fn test_source_crs_are_copied_without_overwriting() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let reference = TempDir::new().unwrap();
        create_tree(input.path(), output.path());
        fs::write(reference.path().join("PtpConfigSlave.yaml"), "kind: Changed\n").unwrap();
        fs::write(
            reference.path().join("ClusterLogForwarder.yaml"),
            "apiVersion: logging.openshift.io/v1\nkind: ClusterLogForwarder\nmetadata:\n  name: instance\n  annotations:\n    ran.openshift.io/ztp-deploy-wave: \"10\"\n",
        )
        .unwrap();

        let options = ConvertOptions {
            source_crs: vec![reference.path().to_path_buf()],
            ..Default::default()
        };
        let result = convert_with_options(input.path(), output.path(), options).unwrap();

        assert_eq!(
            fs::read_to_string(output.path().join("source-crs/PtpConfigSlave.yaml")).unwrap(),
            PTP_CONFIG
        );
        assert!(output.path().join("source-crs/ClusterLogForwarder.yaml").exists());
        assert!(input.path().join("source-crs/ClusterLogForwarder.yaml").exists());
        assert_eq!(
            result.converted[0].generator.policies[1].policy_annotations[WAVE_ANNOTATION],
            "10"
        );
    }

    #[test]
    fn test_missing_input() {
        let output = TempDir::new().unwrap();
        let err = convert(&output.path().join("missing"), output.path()).unwrap_err();
        assert!(matches!(err, ConvertError::InputNotFound(_)));
    }

    #[test]
    fn test_kustomization_post_processing() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        create_tree(input.path(), output.path());
        fs::write(
            input.path().join(KUSTOMIZATION_FILE),
            "generators:\n- group/group-du-sno-ranGen.yaml\nresources:\n- ns.yaml\n",
        )
        .unwrap();

        let options = ConvertOptions {
            namespace_file: Some(PathBuf::from("ns.yaml")),
            ..Default::default()
        };
        convert_with_options(input.path(), output.path(), options).unwrap();

        let kustomization = fs::read_to_string(output.path().join(KUSTOMIZATION_FILE)).unwrap();
        assert!(kustomization.contains("group/acm-group-du-sno-ranGen.yaml"));
        let ns = fs::read_to_string(output.path().join("ns.yaml")).unwrap();
        assert_eq!(ns.matches("kind: ManagedClusterSetBinding").count(), 3);
    }

    #[test]
    fn test_kustomization_failure_is_a_warning() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        create_tree(input.path(), output.path());
        fs::write(
            input.path().join(KUSTOMIZATION_FILE),
            "generators:\n- group/group-du-sno-ranGen.yaml\n",
        )
        .unwrap();

        // ns.yaml is not a kustomization resource, so it never reaches the output
        let options = ConvertOptions {
            namespace_file: Some(PathBuf::from("ns.yaml")),
            ..Default::default()
        };
        let result = convert_with_options(input.path(), output.path(), options).unwrap();
        assert!(result.warnings.iter().any(|w| {
            w.category == WarningCategory::Kustomize
                && w.severity == crate::error::WarningSeverity::Error
        }));
    }

    #[test]
    fn test_placement_selector() {
        let template = PolicyGenTemplate::from_yaml(TEMPLATE).unwrap();
        let output = TempDir::new().unwrap();
        let mut result = ConversionResult::default();
        let generator = Converter::new(ConvertOptions::default())
            .convert_template(&template, output.path(), &mut result)
            .unwrap();

        insta::assert_yaml_snapshot!(generator.policy_defaults.placement, @r#"
        labelSelector:
          matchExpressions:
            - key: du-profile
              operator: NotIn
              values:
                - canary
            - key: group-du-sno
              operator: In
              values:
                - ""
        "#);
    }
}
