//! pgt2acm Core - shared document model for the PolicyGenTemplate converter
//!
//! This crate provides the types every other crate works on:
//! - `Value`: ordered, tagged document tree for manifests and overrides
//! - `ManifestDocument`: a manifest with a checked identity
//! - `OverrideSpec`: the user-supplied `metadata`/`spec`/`status` subtrees
//! - `FieldPath`: locations inside a manifest
//! - `SchemaIndex`: merge keys of array fields, per kind

pub mod error;
pub mod manifest;
pub mod overrides;
pub mod path;
pub mod schema;
pub mod value;

pub use error::{CoreError, Result, SchemaError};
pub use manifest::{ManifestDocument, ManifestId, load_documents, parse_documents, parse_documents_at};
pub use overrides::OverrideSpec;
pub use path::{FieldPath, PathSegment};
pub use schema::SchemaIndex;
pub use value::{Mapping, Shape, Value};
