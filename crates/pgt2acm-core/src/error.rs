//! Core error types

use std::path::PathBuf;

use thiserror::Error;

use crate::value::Shape;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid manifest{}: {message}", location_suffix(.location))]
    InvalidManifest {
        location: Option<String>,
        message: String,
    },

    #[error("Invalid override for section '{section}': expected a mapping, found {found}")]
    InvalidOverride { section: String, found: Shape },

    #[error("Unsupported mapping key {key}: only scalar keys are allowed")]
    UnsupportedKey { key: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid merge-key schema: {0}")]
    Schema(#[from] SchemaError),
}

fn location_suffix(location: &Option<String>) -> String {
    location
        .as_deref()
        .map(|l| format!(" at {l}"))
        .unwrap_or_default()
}

/// Malformed entry in a merge-key schema source
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("schema root must be a mapping, found {found}")]
    NotAMapping { found: Shape },

    #[error("entry for kind '{kind}' must be a mapping of field paths, found {found}")]
    InvalidKindEntry { kind: String, found: Shape },

    #[error("merge key for {kind} at '{path}' must be a string or a list of strings")]
    InvalidMergeKey { kind: String, path: String },

    #[error("merge key list for {kind} at '{path}' is empty")]
    EmptyMergeKey { kind: String, path: String },

    #[error("invalid field path '{path}' for {kind}: {reason}")]
    InvalidPath {
        kind: String,
        path: String,
        reason: String,
    },

    #[error("definition '{definition}' is malformed: {reason}")]
    InvalidDefinition { definition: String, reason: String },
}

pub type Result<T> = std::result::Result<T, CoreError>;
