//! Kubernetes-shaped manifest documents

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{CoreError, Result};
use crate::value::{Mapping, Value};

/// Identity of a manifest: (apiVersion, kind, namespace, name)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ManifestId {
    pub api_version: String,
    pub kind: String,
    pub namespace: Option<String>,
    pub name: Option<String>,
}

impl fmt::Display for ManifestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(namespace) = &self.namespace {
            write!(f, "/{namespace}")?;
        }
        if let Some(name) = &self.name {
            write!(f, "/{name}")?;
        }
        write!(f, " ({})", self.api_version)
    }
}

/// A parsed manifest with a non-empty `apiVersion` and `kind`
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestDocument {
    root: Mapping,
    source: Option<PathBuf>,
    index: usize,
}

impl ManifestDocument {
    /// Wrap a parsed value, checking the identity fields
    pub fn new(value: Value) -> Result<Self> {
        Self::build(value, None, 0)
    }

    fn build(value: Value, source: Option<PathBuf>, index: usize) -> Result<Self> {
        let location = source
            .as_ref()
            .map(|path| format!("{}#{}", path.display(), index));

        let shape = value.shape();
        let Value::Mapping(root) = value else {
            return Err(CoreError::InvalidManifest {
                location,
                message: format!("document must be a mapping, found {shape}"),
            });
        };

        for field in ["apiVersion", "kind"] {
            let present = root
                .get(field)
                .and_then(Value::as_str)
                .is_some_and(|s| !s.trim().is_empty());
            if !present {
                return Err(CoreError::InvalidManifest {
                    location,
                    message: format!("missing or empty '{field}'"),
                });
            }
        }

        Ok(Self {
            root,
            source,
            index,
        })
    }

    fn str_field(&self, key: &str) -> &str {
        self.root.get(key).and_then(Value::as_str).unwrap_or_default()
    }

    fn metadata_str(&self, key: &str) -> Option<&str> {
        self.root
            .get("metadata")
            .and_then(|m| m.get(key))
            .and_then(Value::as_str)
    }

    pub fn api_version(&self) -> &str {
        self.str_field("apiVersion")
    }

    pub fn kind(&self) -> &str {
        self.str_field("kind")
    }

    pub fn name(&self) -> Option<&str> {
        self.metadata_str("name")
    }

    pub fn namespace(&self) -> Option<&str> {
        self.metadata_str("namespace")
    }

    pub fn id(&self) -> ManifestId {
        ManifestId {
            api_version: self.api_version().to_string(),
            kind: self.kind().to_string(),
            namespace: self.namespace().map(String::from),
            name: self.name().map(String::from),
        }
    }

    /// Value of `metadata.annotations.<key>` when it is a string
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.root
            .get("metadata")
            .and_then(|m| m.get("annotations"))
            .and_then(|a| a.get(key))
            .and_then(Value::as_str)
    }

    pub fn root(&self) -> &Mapping {
        &self.root
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Position of this document inside its source stream
    pub fn index(&self) -> usize {
        self.index
    }

    /// Human-readable location: the source file when known, the identity otherwise
    pub fn location(&self) -> String {
        match &self.source {
            Some(path) if self.index == 0 => path.display().to_string(),
            Some(path) => format!("{}#{}", path.display(), self.index),
            None => self.id().to_string(),
        }
    }
}

/// Parse every non-empty document of a multi-document YAML stream
pub fn parse_documents(content: &str) -> Result<Vec<ManifestDocument>> {
    parse_stream(content, None)
}

/// Parse a stream whose content belongs to `path`, without reading it
pub fn parse_documents_at(content: &str, path: &Path) -> Result<Vec<ManifestDocument>> {
    parse_stream(content, Some(path))
}

/// Read and parse a manifest file
pub fn load_documents(path: &Path) -> Result<Vec<ManifestDocument>> {
    let content = std::fs::read_to_string(path).map_err(|source| CoreError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_stream(&content, Some(path))
}

fn parse_stream(content: &str, source: Option<&Path>) -> Result<Vec<ManifestDocument>> {
    let mut documents = Vec::new();
    for (index, document) in serde_yaml::Deserializer::from_str(content).enumerate() {
        let raw = serde_yaml::Value::deserialize(document)?;
        if raw.is_null() {
            continue;
        }
        let value = Value::try_from(raw)?;
        documents.push(ManifestDocument::build(
            value,
            source.map(Path::to_path_buf),
            index,
        )?);
    }
    Ok(documents)
}
