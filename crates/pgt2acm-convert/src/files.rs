//! Filesystem helpers of the pipeline
//!
//! Discovery, naming of generated files, source CR copies and `$mcp`
//! rendering. Copies never overwrite a file that already exists.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{ConvertError, Result};

pub const ACM_PREFIX: &str = "acm-";
pub const SOURCE_CRS_DIR: &str = "source-crs";
pub const KUSTOMIZATION_FILE: &str = "kustomization.yaml";
pub const NAMESPACE_FILE: &str = "ns.yaml";
pub const MCP_PLACEHOLDER: &str = "$mcp";

/// Every `.yaml`/`.yml` file under `path` (or `path` itself), sorted
pub fn discover_yaml_files(path: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(path).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|err| ConvertError::Read {
            path: err.path().unwrap_or(path).to_path_buf(),
            source: err.into(),
        })?;
        if entry.file_type().is_file() && is_yaml(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml" | "yml")
    )
}

/// `a/b/file.yaml` with prefix `acm-` becomes `a/b/acm-file.yaml`
pub fn prefix_last_path_component(path: &Path, prefix: &str) -> PathBuf {
    match path.file_name() {
        Some(name) => path.with_file_name(format!("{prefix}{}", name.to_string_lossy())),
        None => PathBuf::from(prefix),
    }
}

/// `source-crs/PtpConfig.yaml` rendered for `master` becomes
/// `source-crs/PtpConfig-MCP-master.yaml`
pub fn mcp_rendered_path(path: &str, mcp: &str) -> String {
    let stem = path.strip_suffix(".yaml").unwrap_or(path);
    format!("{stem}-MCP-{mcp}.yaml")
}

/// Manifest content with `$mcp` substituted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedManifest {
    /// Manifest path relative to the output directory
    pub path: String,
    pub content: String,
    /// Whether the placeholder occurred, so `path` names a new file
    pub rendered: bool,
}

/// Substitute `$mcp` in the content of manifest `path`
pub fn render_mcp(path: &str, content: &str, mcp: &str) -> RenderedManifest {
    if content.contains(MCP_PLACEHOLDER) {
        RenderedManifest {
            path: mcp_rendered_path(path, mcp),
            content: content.replace(MCP_PLACEHOLDER, mcp),
            rendered: true,
        }
    } else {
        RenderedManifest {
            path: path.to_string(),
            content: content.to_string(),
            rendered: false,
        }
    }
}

/// Value of `kind` in the first document of a YAML stream
pub fn first_document_kind(content: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct KindProbe {
        kind: Option<String>,
    }

    let document = serde_yaml::Deserializer::from_str(content).next()?;
    KindProbe::deserialize(document).ok()?.kind
}

pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| ConvertError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Write `content`, creating parent directories
pub fn write_file(path: &Path, content: &str) -> Result<()> {
    let io_err = |source| ConvertError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    fs::write(path, content).map_err(io_err)
}

/// Copy one file unless `dest` exists; true when a copy was made
pub fn copy_file_if_absent(src: &Path, dest: &Path) -> Result<bool> {
    let copy_err = |source| ConvertError::Copy {
        from: src.to_path_buf(),
        to: dest.to_path_buf(),
        source,
    };

    if dest.exists() {
        debug!(file = %dest.display(), "already exists, not copying");
        return Ok(false);
    }
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(copy_err)?;
    }
    fs::copy(src, dest).map_err(copy_err)?;
    Ok(true)
}

/// Recursively copy `src` into `dest`, keeping files already in `dest`.
/// Returns the files that were copied.
pub fn copy_dir(src: &Path, dest: &Path) -> Result<Vec<PathBuf>> {
    if !src.is_dir() {
        return Err(ConvertError::InputNotFound(src.to_path_buf()));
    }

    let mut copied = Vec::new();
    for entry in WalkDir::new(src).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|err| ConvertError::Read {
            path: err.path().unwrap_or(src).to_path_buf(),
            source: err.into(),
        })?;
        let Ok(relative) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|source| ConvertError::Write {
                path: target.clone(),
                source,
            })?;
        } else if copy_file_if_absent(entry.path(), &target)? {
            copied.push(target);
        }
    }
    Ok(copied)
}
