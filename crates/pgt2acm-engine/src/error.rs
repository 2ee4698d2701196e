//! Engine error types
//!
//! Every error here is a data-shape problem with the inputs of a single
//! manifest or policy. None of them is transient, so callers surface them
//! with their path context instead of retrying.

use std::fmt;

use miette::Diagnostic;
use pgt2acm_core::{FieldPath, Shape};
use thiserror::Error;

use crate::selector::Operator;

/// Which input a problem was found in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Base,
    Override,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Base => "base",
            Self::Override => "override",
        })
    }
}

/// The override places a value of one shape where the base holds another
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("base holds a {base}, override supplies a {found}")]
pub struct ShapeMismatch {
    pub base: Shape,
    pub found: Shape,
}

/// Override rejected before any merge took place
#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
#[error("override does not fit the base manifest at '{path}': {reason}")]
#[diagnostic(
    code(pgt2acm::patch::validation),
    help("an override may add new fields or replace values of the same shape (mapping, sequence or scalar)")
)]
pub struct ValidationError {
    pub path: FieldPath,
    pub reason: ShapeMismatch,
}

/// Why a merge could not be carried out
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchErrorReason {
    #[error("{0}")]
    TypeMismatch(ShapeMismatch),

    #[error("{side} element #{position} has no value for merge key {keys:?}")]
    MissingMergeKey {
        side: Side,
        position: usize,
        keys: Vec<String>,
    },

    #[error("the source holds {candidates} documents and the override does not single one out")]
    AmbiguousTarget { candidates: usize },

    #[error("no document named '{name}' in the source")]
    TargetNotFound { name: String },

    #[error("the source contains no documents")]
    EmptySource,
}

/// Merge-time failure, with the manifest and field it happened at
#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
#[error("cannot patch {manifest_path} at '{field_path}': {reason}")]
#[diagnostic(code(pgt2acm::patch::apply))]
pub struct PatchError {
    pub manifest_path: String,
    pub field_path: FieldPath,
    pub reason: PatchErrorReason,
}

impl PatchError {
    pub fn new(
        manifest_path: impl Into<String>,
        field_path: FieldPath,
        reason: PatchErrorReason,
    ) -> Self {
        Self {
            manifest_path: manifest_path.into(),
            field_path,
            reason,
        }
    }
}

/// A selector rule that cannot be expressed as `In`/`NotIn`
#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
#[error("label selector rule for '{key}' has no values; {operator} needs at least one")]
#[diagnostic(
    code(pgt2acm::selector::empty_values),
    help("give the label at least one value, or remove the rule")
)]
pub struct SelectorError {
    pub key: String,
    pub operator: Operator,
}
