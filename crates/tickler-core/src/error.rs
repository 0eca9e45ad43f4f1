//! Error types for tickler operations.
//!
//! Transient side-effect failures (notifier, hooks, maintenance) are not part
//! of this taxonomy: they are caught and logged where they occur and never
//! surface as a `TicklerError`.

use thiserror::Error;

/// Result type alias for tickler operations.
pub type TicklerResult<T> = Result<T, TicklerError>;

/// Main error type for all tickler operations.
#[derive(Error, Debug)]
pub enum TicklerError {
    /// Input validation failed (malformed priority or trigger configuration).
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        code: ErrorCode,
        suggestion: Option<String>,
    },

    /// Reminder not found.
    #[error("Reminder not found: {message}")]
    NotFound {
        message: String,
        code: ErrorCode,
        reminder_id: Option<String>,
    },

    /// Database operation failed. Store errors are fatal and always propagate.
    #[error("Database error: {message}")]
    Database {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Parse error.
    #[error("Parse error: {message}")]
    Parse { message: String, code: ErrorCode },

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Validation (VAL_xxx)
    ValInvalidInput,
    ValInvalidPriority,
    ValInvalidTrigger,

    // Reminder (REM_xxx)
    RemNotFound,
    DependencyNotFound,

    // Database (DB_xxx)
    DbConnectionFailed,
    DbOperationFailed,

    // Parse (PARSE_xxx)
    ParseInvalidJson,

    // Internal
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValInvalidInput => "VAL_001",
            ErrorCode::ValInvalidPriority => "VAL_002",
            ErrorCode::ValInvalidTrigger => "VAL_003",
            ErrorCode::RemNotFound => "REM_001",
            ErrorCode::DependencyNotFound => "REM_002",
            ErrorCode::DbConnectionFailed => "DB_001",
            ErrorCode::DbOperationFailed => "DB_002",
            ErrorCode::ParseInvalidJson => "PARSE_001",
            ErrorCode::Internal => "INT_001",
        }
    }
}

impl TicklerError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            code: ErrorCode::ValInvalidInput,
            suggestion: None,
        }
    }

    /// Create a validation error for a malformed trigger configuration.
    pub fn invalid_trigger(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            code: ErrorCode::ValInvalidTrigger,
            suggestion: None,
        }
    }

    /// Create a validation error for an out-of-range priority.
    pub fn invalid_priority(value: u8) -> Self {
        Self::Validation {
            message: format!("priority must be between 1 and 5, got {}", value),
            code: ErrorCode::ValInvalidPriority,
            suggestion: Some("use 1 for the most urgent reminders, 5 for the least".to_string()),
        }
    }

    /// Create a not found error.
    pub fn not_found(reminder_id: impl Into<String>) -> Self {
        let id = reminder_id.into();
        Self::NotFound {
            message: format!("reminder with id '{}' not found", id),
            code: ErrorCode::RemNotFound,
            reminder_id: Some(id),
        }
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            code: ErrorCode::DbOperationFailed,
            source: None,
        }
    }

    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            code: ErrorCode::ParseInvalidJson,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { code, .. } => *code,
            Self::NotFound { code, .. } => *code,
            Self::Database { code, .. } => *code,
            Self::Parse { code, .. } => *code,
            _ => ErrorCode::Internal,
        }
    }

    /// Get a user-friendly suggestion for resolving this error.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Validation { suggestion, .. } => suggestion.as_deref(),
            Self::NotFound { .. } => Some("check the reminder id and ensure it exists"),
            Self::Database { .. } => Some("check that the store path is writable"),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for TicklerError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database {
            message: err.to_string(),
            code: ErrorCode::DbOperationFailed,
            source: Some(Box::new(err)),
        }
    }
}
