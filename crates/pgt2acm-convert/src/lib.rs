//! pgt2acm Convert - PolicyGenTemplate to ACM PolicyGenerator converter
//!
//! This crate walks a ZTP GitOps tree and writes, for every
//! PolicyGenTemplate it finds, the equivalent ACM PolicyGenerator next to
//! it in the output tree (`acm-<name>.yaml`).
//!
//! # Example
//!
//! ```no_run
//! use std::path::{Path, PathBuf};
//! use pgt2acm_convert::{ConvertOptions, convert_with_options};
//! use pgt2acm_core::SchemaIndex;
//!
//! let options = ConvertOptions {
//!     schema: SchemaIndex::from_file("schema.yaml").unwrap(),
//!     pre_render_kinds: vec!["PtpConfig".to_string()],
//!     namespace_file: Some(PathBuf::from("ns.yaml")),
//!     ..Default::default()
//! };
//!
//! let result = convert_with_options(Path::new("./policygentemplates"), Path::new("./acmgen"), options).unwrap();
//! println!("Converted {} templates", result.converted.len());
//!
//! for warning in &result.warnings {
//!     println!("{warning}");
//! }
//! ```
//!
//! # Pre-rendered patches
//!
//! ACM PolicyGenerator replaces lists wholesale when it applies a patch. For
//! the kinds passed in `pre_render_kinds`, the converter resolves each patch
//! against its source CR first, merging keyed lists element by element with
//! the merge keys of the schema, and emits the complete lists.

pub mod acm;
pub mod converter;
pub mod error;
pub mod files;
pub mod kustomize;
pub mod pgt;

// Re-exports
pub use acm::PolicyGenerator;
pub use converter::{
    ConversionResult, ConvertOptions, ConvertedTemplate, Converter, convert, convert_with_options,
};
pub use error::{
    ConversionWarning, ConvertError, ErrorKind, Result, WarningCategory, WarningSeverity,
};
pub use pgt::PolicyGenTemplate;
