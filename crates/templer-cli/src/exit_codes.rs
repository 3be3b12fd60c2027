//! Standard exit codes for CLI operations

/// Success - every template rendered
pub const SUCCESS: i32 = 0;

/// General error - a render failed or the run could not start
pub const ERROR: i32 = 1;
