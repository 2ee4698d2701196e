//! Convert command - PolicyGenTemplates to ACM PolicyGenerators
//!
//! Loads the merge-key schema, runs the conversion pipeline and reports
//! what was generated, either as a styled summary or as JSON.

use console::style;
use pgt2acm_convert::{
    ConversionResult, ConversionWarning, ConvertOptions, WarningCategory, WarningSeverity,
    convert_with_options,
};
use pgt2acm_core::SchemaIndex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{CliError, Result};

/// Resolved command line
#[derive(Debug, Clone)]
pub struct Args {
    pub input: PathBuf,
    pub output: PathBuf,
    pub schema: Option<PathBuf>,
    pub pre_render_kinds: Vec<String>,
    pub ns_file: Option<PathBuf>,
    pub source_crs: Vec<PathBuf>,
    pub dry_run: bool,
    pub strict_merge_keys: bool,
    pub json: bool,
}

pub fn run(args: &Args) -> Result<()> {
    let schema = match &args.schema {
        Some(path) => {
            let schema = SchemaIndex::from_file(path).map_err(|source| CliError::Schema {
                path: path.clone(),
                source,
            })?;
            debug!(path = %path.display(), entries = schema.len(), kinds = ?schema.kinds(), "loaded schema");
            schema
        }
        None => SchemaIndex::new(),
    };

    let options = ConvertOptions {
        schema,
        pre_render_kinds: args.pre_render_kinds.clone(),
        strict_merge_keys: args.strict_merge_keys,
        dry_run: args.dry_run,
        namespace_file: args.ns_file.clone(),
        source_crs: args.source_crs.clone(),
    };

    if !args.json {
        print_header(&args.input, &args.output);
    }

    let result = convert_with_options(&args.input, &args.output, options)?;

    if args.json {
        let report = Report::new(&result, args.dry_run);
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| CliError::internal(e.to_string()))?;
        println!("{json}");
        return Ok(());
    }

    print_files(&result, &args.output, &args.input);
    print_warnings(&result, &args.output, &args.input);
    print_summary(&result);
    if args.dry_run {
        println!(
            "  {} {}",
            style("ℹ").cyan(),
            style("Dry run mode - no files were written").dim()
        );
        println!();
    }

    Ok(())
}

fn print_header(input: &Path, output: &Path) {
    println!();
    println!(
        "  {} {} {}",
        style("pgt2acm").bold().cyan(),
        style("─").dim(),
        style("PolicyGenTemplate → PolicyGenerator").dim()
    );
    println!();
    println!("  {} {}", style("Source:").dim(), style(input.display()).cyan());
    println!("  {} {}", style("Target:").dim(), style(output.display()).green());
    println!();
}

fn print_files(result: &ConversionResult, output: &Path, input: &Path) {
    println!("  {}", style("Generated Files").bold());
    println!("  {}", style("───────────────").dim());

    for template in &result.converted {
        let rel_path = template.output.strip_prefix(output).unwrap_or(&template.output);
        println!(
            "  {} {} {}",
            style("✓").green().bold(),
            rel_path.display(),
            style(format!(
                "({} polic{})",
                template.generator.policies.len(),
                if template.generator.policies.len() == 1 { "y" } else { "ies" }
            ))
            .dim()
        );
    }

    if !result.rendered_manifests.is_empty() {
        println!();
        println!("  {}", style("Rendered Manifests").bold());
        println!("  {}", style("──────────────────").dim());

        for file in &result.rendered_manifests {
            let rel_path = file.strip_prefix(output).unwrap_or(file);
            println!("  {} {}", style("✓").green(), rel_path.display());
        }
    }

    if !result.copied_files.is_empty() {
        println!();
        println!("  {}", style("Copied Files").bold());
        println!("  {}", style("────────────").dim());

        for file in &result.copied_files {
            let rel_path = file
                .strip_prefix(output)
                .or_else(|_| file.strip_prefix(input))
                .unwrap_or(file);
            println!("  {} {}", style("→").blue(), rel_path.display());
        }
    }

    println!();
}

fn print_warnings(result: &ConversionResult, output: &Path, input: &Path) {
    let significant: Vec<_> = result
        .warnings
        .iter()
        .filter(|w| w.severity != WarningSeverity::Info)
        .collect();
    if significant.is_empty() {
        return;
    }

    println!("  {}", style("Conversion Notes").bold());
    println!("  {}", style("────────────────").dim());
    println!();

    let groups = [
        (WarningCategory::Kustomize, "Kustomize", "─ post-processing"),
        (WarningCategory::MergeFallback, "Merge", "─ lists replaced wholesale"),
        (WarningCategory::SourceCr, "Source CRs", "─ missing or unreadable"),
        (WarningCategory::Wave, "Waves", "─ review policy ordering"),
        (WarningCategory::Discovery, "Discovery", "─ files not converted"),
    ];

    for (category, title, subtitle) in groups {
        let warnings: Vec<_> = significant
            .iter()
            .filter(|w| w.category == category)
            .collect();
        if warnings.is_empty() {
            continue;
        }
        println!("  {} {}", style(title).yellow().bold(), style(subtitle).dim());
        for warning in warnings {
            print_warning(warning, output, input);
        }
        println!();
    }
}

fn print_warning(warning: &ConversionWarning, output: &Path, input: &Path) {
    let icon = match warning.severity {
        WarningSeverity::Info => style("ℹ").cyan(),
        WarningSeverity::Warning => style("⚠").yellow(),
        WarningSeverity::Error => style("✗").red().bold(),
    };

    let rel_file = warning
        .file
        .strip_prefix(output)
        .or_else(|_| warning.file.strip_prefix(input))
        .unwrap_or(&warning.file);

    println!("    {} {}", icon, rel_file.display());
    println!("      {}", style(&warning.message).dim());
    if let Some(ref suggestion) = warning.suggestion {
        println!("      {} {}", style("→").green(), suggestion);
    }
}

fn print_summary(result: &ConversionResult) {
    let converted = result.converted.len();
    let policies = result.policy_count();
    let skipped = result.skipped_files.len();
    let count = |severity: WarningSeverity| {
        result
            .warnings
            .iter()
            .filter(|w| w.severity == severity)
            .count()
    };
    let error_count = count(WarningSeverity::Error);
    let warning_count = count(WarningSeverity::Warning);

    println!("  {}", style("Summary").bold());
    println!("  {}", style("───────").dim());

    println!(
        "  {} template{} converted into {} polic{}",
        style(format!("{:>3}", converted)).green().bold(),
        if converted == 1 { "" } else { "s" },
        policies,
        if policies == 1 { "y" } else { "ies" }
    );

    if skipped > 0 {
        println!(
            "  {} {} skipped",
            style(format!("{:>3}", skipped)).yellow().bold(),
            style("files").dim()
        );
    }

    if error_count > 0 {
        println!(
            "  {} step{} failed",
            style(format!("{:>3}", error_count)).red().bold(),
            if error_count == 1 { "" } else { "s" }
        );
    }

    if warning_count > 0 {
        println!(
            "  {} warning{} {}",
            style(format!("{:>3}", warning_count)).yellow().bold(),
            if warning_count == 1 { "" } else { "s" },
            style("(review recommended)").dim()
        );
    }

    println!();
}

/// Machine-readable form of a [`ConversionResult`]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Report<'a> {
    dry_run: bool,
    converted: Vec<ConvertedEntry<'a>>,
    rendered_manifests: &'a [PathBuf],
    copied_files: &'a [PathBuf],
    skipped_files: &'a [PathBuf],
    warnings: Vec<WarningEntry<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConvertedEntry<'a> {
    source: &'a Path,
    output: &'a Path,
    name: &'a str,
    policies: Vec<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WarningEntry<'a> {
    severity: &'static str,
    category: &'static str,
    file: &'a Path,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    suggestion: Option<&'a str>,
}

impl<'a> Report<'a> {
    fn new(result: &'a ConversionResult, dry_run: bool) -> Self {
        Self {
            dry_run,
            converted: result
                .converted
                .iter()
                .map(|t| ConvertedEntry {
                    source: &t.source,
                    output: &t.output,
                    name: &t.generator.metadata.name,
                    policies: t.generator.policies.iter().map(|p| p.name.as_str()).collect(),
                })
                .collect(),
            rendered_manifests: &result.rendered_manifests,
            copied_files: &result.copied_files,
            skipped_files: &result.skipped_files,
            warnings: result
                .warnings
                .iter()
                .map(|w| WarningEntry {
                    severity: w.severity.label(),
                    category: w.category.label(),
                    file: &w.file,
                    message: &w.message,
                    suggestion: w.suggestion.as_deref(),
                })
                .collect(),
        }
    }
}
