use thiserror::Error;

/// Main error type for braingraph
#[derive(Error, Debug)]
pub enum BrainError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(rusqlite::Error),

    /// The backing store could not be reached (locked, busy, unopenable).
    /// The orchestrator owns retry/backoff; the core never retries.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unknown node reference
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// Unknown edge reference
    #[error("Edge not found: {0} -> {1} ({2})")]
    EdgeNotFound(String, String, String),

    /// Malformed feedback event, rejected at ingress
    #[error("Invalid feedback event: {0}")]
    InvalidEvent(String),

    /// Parse errors (seed document, event payloads)
    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<rusqlite::Error> for BrainError {
    fn from(e: rusqlite::Error) -> Self {
        // Busy/locked/unopenable databases surface as a transient
        // StoreUnavailable so callers can distinguish them from bad queries.
        if let rusqlite::Error::SqliteFailure(ffi_err, ref msg) = e {
            match ffi_err.code {
                rusqlite::ErrorCode::DatabaseBusy
                | rusqlite::ErrorCode::DatabaseLocked
                | rusqlite::ErrorCode::CannotOpen => {
                    return BrainError::StoreUnavailable(
                        msg.clone().unwrap_or_else(|| ffi_err.to_string()),
                    );
                }
                _ => {}
            }
        }
        BrainError::Database(e)
    }
}

impl BrainError {
    /// Recoverable at the call site: the caller may retry with corrected input.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            BrainError::NodeNotFound(_)
                | BrainError::EdgeNotFound(..)
                | BrainError::InvalidEvent(_)
        )
    }
}

/// Convenient Result type using BrainError
pub type Result<T> = std::result::Result<T, BrainError>;
