//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions where applicable.

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Validation error - an override does not fit its source CR, or a binding
/// rule cannot become a selector
pub const VALIDATION_ERROR: i32 = 2;

/// Patch error - keyed merge or target selection failed
pub const PATCH_ERROR: i32 = 3;

/// Input error - unparseable template, source CR or schema
pub const INPUT_ERROR: i32 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;
