//! pgt2acm Engine - schema-aware merge patches and label selectors
//!
//! This crate provides the two pure transformations of the converter:
//! - `validate` / `apply_patches`: reconcile a user override with its base
//!   manifest, merging keyed arrays element by element
//! - `label_to_selector` / `output_generic`: compile binding rules into a
//!   `matchExpressions` label selector
//!
//! Nothing here touches the filesystem.

pub mod error;
pub mod patch;
pub mod selector;

pub use error::{
    PatchError, PatchErrorReason, SelectorError, ShapeMismatch, Side, ValidationError,
};
pub use patch::{
    Patch, PatchOptions, SequenceFallback, apply_patches, apply_patches_with, select_target,
    validate,
};
pub use selector::{
    CompiledSelector, LabelRules, LabelSelectorRule, Operator, SelectorExpression, compile,
    deserialize_rules, label_to_selector, output_generic,
};
