//! Error types for StrataDB
//!
//! Provides a unified error type for all engine operations, plus the
//! closed status-code enumeration exposed to binding layers.

use thiserror::Error;

/// Result type alias using StrataError
pub type Result<T> = std::result::Result<T, StrataError>;

/// Unified error type for StrataDB operations
#[derive(Debug, Error)]
pub enum StrataError {
    // -------------------------------------------------------------------------
    // Expected Conditions
    // -------------------------------------------------------------------------
    /// Key, table, or index absent. Expected, not exceptional.
    #[error("not found: {0}")]
    NotFound(String),

    // -------------------------------------------------------------------------
    // Concurrency Errors
    // -------------------------------------------------------------------------
    /// Commit-time write/write race or version-order violation.
    #[error("conflict: {0}")]
    Conflict(String),

    // -------------------------------------------------------------------------
    // Caller Errors
    // -------------------------------------------------------------------------
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Duplicate index creation on the same (table, column).
    #[error("index already exists on {table}.{column}")]
    IndexAlreadyExists { table: String, column: String },

    /// Operation on a non-Active transaction or a closed engine handle.
    #[error("invalid state: {0}")]
    State(String),

    // -------------------------------------------------------------------------
    // SQL Errors
    // -------------------------------------------------------------------------
    #[error("SQL parse error: {0}")]
    SqlParse(String),

    #[error("unsupported SQL: {0}")]
    SqlUnsupported(String),

    // -------------------------------------------------------------------------
    // Persistence Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot corruption detected: {0}")]
    Corruption(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

// =============================================================================
// Boundary Status Codes
// =============================================================================

/// Discriminated status codes for the C-compatible boundary contract.
///
/// Zero means success; negative codes form a closed enumeration. Binding
/// layers convert these into host-language error signaling. Within the
/// crate, operations return [`Result`] and owned value types instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum StatusCode {
    Ok = 0,
    NotFound = -1,
    Conflict = -2,
    InvalidArgument = -3,
    IoError = -4,
    AlreadyExists = -5,
    InvalidState = -6,
    Corruption = -7,
}

impl StatusCode {
    /// Status code for a fallible call's outcome.
    pub fn from_result<T>(result: &Result<T>) -> Self {
        match result {
            Ok(_) => StatusCode::Ok,
            Err(e) => StatusCode::from(e),
        }
    }
}

impl From<&StrataError> for StatusCode {
    fn from(err: &StrataError) -> Self {
        match err {
            StrataError::NotFound(_) => StatusCode::NotFound,
            StrataError::Conflict(_) => StatusCode::Conflict,
            StrataError::InvalidArgument(_)
            | StrataError::SqlParse(_)
            | StrataError::SqlUnsupported(_) => StatusCode::InvalidArgument,
            StrataError::IndexAlreadyExists { .. } => StatusCode::AlreadyExists,
            StrataError::State(_) => StatusCode::InvalidState,
            StrataError::Io(_) | StrataError::Serialization(_) => StatusCode::IoError,
            StrataError::Corruption(_) => StatusCode::Corruption,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_values_are_stable() {
        assert_eq!(StatusCode::Ok as i32, 0);
        assert_eq!(StatusCode::NotFound as i32, -1);
        assert_eq!(StatusCode::Conflict as i32, -2);
        assert_eq!(StatusCode::InvalidArgument as i32, -3);
        assert_eq!(StatusCode::IoError as i32, -4);
        assert_eq!(StatusCode::AlreadyExists as i32, -5);
        assert_eq!(StatusCode::InvalidState as i32, -6);
        assert_eq!(StatusCode::Corruption as i32, -7);
    }

    #[test]
    fn test_error_to_status_mapping() {
        let err = StrataError::NotFound("key".into());
        assert_eq!(StatusCode::from(&err), StatusCode::NotFound);

        let err = StrataError::Conflict("stale".into());
        assert_eq!(StatusCode::from(&err), StatusCode::Conflict);

        let err = StrataError::IndexAlreadyExists {
            table: "users".into(),
            column: "email".into(),
        };
        assert_eq!(StatusCode::from(&err), StatusCode::AlreadyExists);

        let ok: Result<()> = Ok(());
        assert_eq!(StatusCode::from_result(&ok), StatusCode::Ok);
    }
}
