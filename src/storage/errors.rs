//! Storage error types
//!
//! Error codes:
//! - SPARSE_STORAGE_IO_ERROR (ERROR severity)
//! - SPARSE_STORAGE_DRIVER_ERROR (ERROR severity)
//! - SPARSE_STORAGE_INVALID_VALUE (ERROR severity)
//! - SPARSE_STORAGE_UNSUPPORTED (ERROR severity)
//! - SPARSE_STORAGE_NOT_READY (ERROR severity)
//! - SPARSE_STORAGE_CONFIG_ERROR (FATAL severity)
//! - SPARSE_POOL_SCHEMA_FAILED (FATAL severity) - see [`ConnectionPoolError`]

use std::error::Error as StdError;
use std::fmt;
use std::io;

use thiserror::Error;

type BoxedCause = Box<dyn StdError + Send + Sync + 'static>;

/// Severity levels for storage errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation fails, the client stays usable
    Error,
    /// The client (or connection) cannot be used again
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Storage-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorCode {
    /// File or stream I/O failure
    IoError,
    /// Driver or protocol failure from a backend
    DriverError,
    /// A value the backend cannot store through this path
    InvalidValue,
    /// The backend lacks the requested capability
    Unsupported,
    /// Operation attempted before the schema check or after close
    NotReady,
    /// Construction-time configuration failure
    ConfigError,
}

impl StorageErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            StorageErrorCode::IoError => "SPARSE_STORAGE_IO_ERROR",
            StorageErrorCode::DriverError => "SPARSE_STORAGE_DRIVER_ERROR",
            StorageErrorCode::InvalidValue => "SPARSE_STORAGE_INVALID_VALUE",
            StorageErrorCode::Unsupported => "SPARSE_STORAGE_UNSUPPORTED",
            StorageErrorCode::NotReady => "SPARSE_STORAGE_NOT_READY",
            StorageErrorCode::ConfigError => "SPARSE_STORAGE_CONFIG_ERROR",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            StorageErrorCode::ConfigError => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for StorageErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Storage error carrying the lower-level cause when there is one
#[derive(Debug)]
pub struct StorageError {
    code: StorageErrorCode,
    message: String,
    details: Option<String>,
    source: Option<BoxedCause>,
}

impl StorageError {
    fn build(code: StorageErrorCode, message: impl Into<String>, source: Option<BoxedCause>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            source,
        }
    }

    pub fn io_error(message: impl Into<String>, source: io::Error) -> Self {
        Self::build(StorageErrorCode::IoError, message, Some(Box::new(source)))
    }

    /// Wrap a driver failure
    pub fn driver(message: impl Into<String>, source: impl StdError + Send + Sync + 'static) -> Self {
        Self::build(StorageErrorCode::DriverError, message, Some(Box::new(source)))
    }

    /// Driver-level failure that has no underlying error value
    pub fn driver_no_source(message: impl Into<String>) -> Self {
        Self::build(StorageErrorCode::DriverError, message, None)
    }

    pub fn invalid_value(message: impl Into<String>) -> Self {
        Self::build(StorageErrorCode::InvalidValue, message, None)
    }

    pub fn unsupported(operation: &str) -> Self {
        Self::build(
            StorageErrorCode::Unsupported,
            format!("operation not supported by this backend: {}", operation),
            None,
        )
    }

    pub fn not_ready(message: impl Into<String>) -> Self {
        Self::build(StorageErrorCode::NotReady, message, None)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::build(StorageErrorCode::ConfigError, message, None)
    }

    /// Attach the row the failure concerns, as `namespace:table:key`
    pub fn for_row(mut self, namespace: &str, table: &str, key: &str) -> Self {
        self.details = Some(format!("row: {}:{}:{}", namespace, table, key));
        self
    }

    pub fn code(&self) -> StorageErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    pub fn is_unsupported(&self) -> bool {
        self.code == StorageErrorCode::Unsupported
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code.severity(), self.code.code(), self.message)?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        if let Some(ref source) = self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl StdError for StorageError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<DriverError> for StorageError {
    fn from(err: DriverError) -> Self {
        StorageError::driver(err.to_string(), err)
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors reported by a relational driver
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("unknown statement handle {0}")]
    UnknownStatement(usize),

    #[error("{0}")]
    Other(String),
}

/// Result type for driver calls
pub type DriverResult<T> = Result<T, DriverError>;

/// Schema bootstrap failure. The connection it was raised for is unusable
/// and must be evicted by the pool.
#[derive(Debug)]
pub struct ConnectionPoolError {
    message: String,
    source: Option<BoxedCause>,
}

impl ConnectionPoolError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(message: impl Into<String>, source: impl StdError + Send + Sync + 'static) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn code(&self) -> &'static str {
        "SPARSE_POOL_SCHEMA_FAILED"
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Always fatal for the connection it concerns
    pub fn is_fatal(&self) -> bool {
        true
    }
}

impl fmt::Display for ConnectionPoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[FATAL] {}: {}", self.code(), self.message)?;
        if let Some(ref source) = self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl StdError for ConnectionPoolError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(StorageErrorCode::IoError.code(), "SPARSE_STORAGE_IO_ERROR");
        assert_eq!(StorageErrorCode::DriverError.code(), "SPARSE_STORAGE_DRIVER_ERROR");
        assert_eq!(StorageErrorCode::Unsupported.code(), "SPARSE_STORAGE_UNSUPPORTED");
        assert_eq!(StorageErrorCode::ConfigError.severity(), Severity::Fatal);
        assert_eq!(StorageErrorCode::InvalidValue.severity(), Severity::Error);
    }

    #[test]
    fn test_driver_error_keeps_cause() {
        let err: StorageError = DriverError::Other("socket closed".into()).into();
        assert_eq!(err.code(), StorageErrorCode::DriverError);
        let cause = err.source().expect("cause retained");
        assert_eq!(cause.to_string(), "socket closed");
    }

    #[test]
    fn test_display_contains_row_details() {
        let err = StorageError::invalid_value("binary column body").for_row("content", "data", "/a");
        let display = err.to_string();
        assert!(display.contains("SPARSE_STORAGE_INVALID_VALUE"));
        assert!(display.contains("row: content:data:/a"));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_pool_error_is_fatal() {
        let err = ConnectionPoolError::with_source(
            "no ddl",
            io::Error::new(io::ErrorKind::NotFound, "client.ddl"),
        );
        assert!(err.is_fatal());
        assert!(err.to_string().contains("SPARSE_POOL_SCHEMA_FAILED"));
        assert!(err.source().is_some());
    }
}
