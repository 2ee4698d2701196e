//! CLI error types with exit code handling
//!
//! This module provides a unified error type for CLI operations that
//! maps errors to appropriate exit codes.

use std::path::PathBuf;

use miette::Diagnostic;
use pgt2acm_convert::{ConvertError, ErrorKind};
use pgt2acm_core::CoreError;
use thiserror::Error;

use crate::exit_codes;

#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// The merge-key schema could not be loaded
    #[error("could not load schema {path}")]
    #[diagnostic(
        code(pgt2acm::cli::schema),
        help("the schema is either a {{Kind: {{path[]: key}}}} map or an OpenAPI/Swagger document")
    )]
    Schema {
        path: PathBuf,
        #[source]
        source: CoreError,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Convert(#[from] ConvertError),

    /// Internal error (unexpected failure)
    #[error("Internal error: {message}")]
    #[diagnostic(code(pgt2acm::cli::internal))]
    Internal { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Schema { .. } => exit_codes::INPUT_ERROR,
            CliError::Convert(err) => match err.kind() {
                ErrorKind::Io => exit_codes::IO_ERROR,
                ErrorKind::Input => exit_codes::INPUT_ERROR,
                ErrorKind::Validation => exit_codes::VALIDATION_ERROR,
                ErrorKind::Patch => exit_codes::PATCH_ERROR,
            },
            CliError::Internal { .. } => exit_codes::ERROR,
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
