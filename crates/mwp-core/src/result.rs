//! Result type aliases

use crate::error::MwpError;

/// Standard Result type for planner operations
pub type MwpResult<T> = Result<T, MwpError>;
