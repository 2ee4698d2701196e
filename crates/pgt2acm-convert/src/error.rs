//! Error and warning types for the conversion pipeline
//!
//! Errors abort the conversion of the template being processed. Warnings
//! record everything the pipeline could work around, so the caller can
//! report them next to the generated files.

use std::fmt;
use std::path::PathBuf;

use miette::Diagnostic;
use pgt2acm_core::CoreError;
use pgt2acm_engine::{PatchError, SelectorError, ValidationError};
use thiserror::Error;

/// Converter error
#[derive(Debug, Error, Diagnostic)]
pub enum ConvertError {
    #[error("input path not found: {0}")]
    #[diagnostic(code(pgt2acm::convert::input))]
    InputNotFound(PathBuf),

    #[error("failed to read {path}")]
    #[diagnostic(code(pgt2acm::convert::io))]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}")]
    #[diagnostic(code(pgt2acm::convert::io))]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to copy {from} to {to}")]
    #[diagnostic(code(pgt2acm::convert::io))]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse PolicyGenTemplate {path}")]
    #[diagnostic(
        code(pgt2acm::convert::template),
        help("check the template against the ran.openshift.io/v1 PolicyGenTemplate format")
    )]
    Template {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("could not load source CR {path}")]
    #[diagnostic(
        code(pgt2acm::convert::source_cr),
        help("source CRs are looked up under <output>/source-crs; use -c to copy them there")
    )]
    SourceCr {
        path: PathBuf,
        #[source]
        source: CoreError,
    },

    #[error("could not parse {path}")]
    #[diagnostic(code(pgt2acm::convert::manifest))]
    Manifest {
        path: PathBuf,
        #[source]
        source: CoreError,
    },

    #[error("failed to process the manifest at {path}")]
    #[diagnostic(code(pgt2acm::convert::validation))]
    Validation {
        path: PathBuf,
        #[source]
        #[diagnostic_source]
        source: ValidationError,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Patch(#[from] PatchError),

    #[error("cannot build the placement of {template}")]
    #[diagnostic(code(pgt2acm::convert::placement))]
    Placement {
        template: String,
        #[source]
        #[diagnostic_source]
        source: SelectorError,
    },

    #[error("YAML error: {0}")]
    #[diagnostic(code(pgt2acm::convert::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl ConvertError {
    /// Rough grouping used by the CLI to pick an exit code
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InputNotFound(_) | Self::Read { .. } | Self::Write { .. } | Self::Copy { .. } => {
                ErrorKind::Io
            }
            Self::Validation { .. } | Self::Placement { .. } => ErrorKind::Validation,
            Self::Patch(_) => ErrorKind::Patch,
            Self::Template { .. } | Self::SourceCr { .. } | Self::Manifest { .. } | Self::Yaml(_) => {
                ErrorKind::Input
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    Input,
    Validation,
    Patch,
}

// =============================================================================
// WARNING SYSTEM
// =============================================================================

/// Warning severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WarningSeverity {
    /// Informational, output is complete
    Info,
    /// Output is usable but should be reviewed
    Warning,
    /// A step of the pipeline did not run
    Error,
}

impl WarningSeverity {
    /// Get the display color for terminal output
    pub fn color(&self) -> &'static str {
        match self {
            Self::Info => "cyan",
            Self::Warning => "yellow",
            Self::Error => "red",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Self::Info => "ℹ",
            Self::Warning => "⚠",
            Self::Error => "✗",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// Warning category for grouping related warnings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarningCategory {
    /// Input file could not be inspected
    Discovery,
    /// Source CR missing or unreadable
    SourceCr,
    /// Keyed list merged with replace semantics
    MergeFallback,
    /// Policy wave annotation
    Wave,
    /// kustomization.yaml / ns.yaml post-processing
    Kustomize,
}

impl WarningCategory {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Discovery => "discovery",
            Self::SourceCr => "source-cr",
            Self::MergeFallback => "merge-fallback",
            Self::Wave => "wave",
            Self::Kustomize => "kustomize",
        }
    }
}

/// Non-fatal finding with the file it relates to
#[derive(Debug, Clone)]
pub struct ConversionWarning {
    pub severity: WarningSeverity,
    pub category: WarningCategory,
    pub file: PathBuf,
    pub message: String,
    /// Suggested fix
    pub suggestion: Option<String>,
}

impl ConversionWarning {
    pub fn new(
        severity: WarningSeverity,
        category: WarningCategory,
        file: PathBuf,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            file,
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn info(category: WarningCategory, file: PathBuf, message: impl Into<String>) -> Self {
        Self::new(WarningSeverity::Info, category, file, message)
    }

    pub fn warning(category: WarningCategory, file: PathBuf, message: impl Into<String>) -> Self {
        Self::new(WarningSeverity::Warning, category, file, message)
    }

    pub fn error(category: WarningCategory, file: PathBuf, message: impl Into<String>) -> Self {
        Self::new(WarningSeverity::Error, category, file, message)
    }

    /// Add suggestion to warning
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl fmt::Display for ConversionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // [severity] file - message
        write!(
            f,
            "[{}] {} - {}",
            self.severity.label(),
            self.file.display(),
            self.message
        )?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, "\n  {} {}", self.severity.icon(), suggestion)?;
        }
        Ok(())
    }
}

/// Result type for conversion operations
pub type Result<T> = std::result::Result<T, ConvertError>;
