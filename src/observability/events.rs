//! Observable events for sparsestore
//!
//! Events are explicit and typed. Every log line carries exactly one.

use std::fmt;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    // Dialect resolution
    /// A dialect resource was found for a candidate key
    DialectResolved,
    /// A candidate dialect key had no resource
    DialectMissing,
    /// No candidate resolved (construction fails)
    DialectUnavailable,

    // Schema bootstrap
    /// The check-schema query failed, bootstrap follows
    SchemaCheckFailed,
    /// Comment line skipped in a DDL script
    SchemaComment,
    /// DDL statement executed
    SchemaStatementOk,
    /// DDL statement failed (tolerated)
    SchemaStatementFailed,
    /// Schema is usable
    SchemaBootstrapComplete,
    /// No DDL could be applied (FATAL)
    SchemaBootstrapFailed,

    // Connection lifecycle
    /// Prepared statements opened
    ConnectionActivated,
    /// Prepared statements released
    ConnectionPassivated,
    /// Validation query failed
    ConnectionValidateFailed,
    /// Physical connection closed
    ConnectionClosed,

    // Row operations
    /// Row read
    RowRead,
    /// Empty row materialized on first access
    RowCreated,
    /// Column-level merge applied to a row
    RowUpdated,
    /// Whole row deleted
    RowRemoved,
    /// Column inserted
    ColumnInserted,
    /// Column overwritten
    ColumnUpdated,
    /// Column deleted
    ColumnRemoved,
    /// Column delete found nothing to remove
    ColumnAbsent,
    /// A storage operation failed and is being surfaced
    StorageOpFailed,
    /// Error while releasing a resource after the operation completed
    CleanupFailed,

    // Body streaming
    /// Body streamed into storage
    BodyWritten,
    /// Body streamed out of storage
    BodyRead,

    // Content
    /// Content object reset to a new baseline
    ContentReset,
    /// Child skipped during traversal
    ChildSkipped,
    /// Child traversal stopped on a storage failure
    ChildTraversalAborted,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::DialectResolved => "DIALECT_RESOLVED",
            Event::DialectMissing => "DIALECT_MISSING",
            Event::DialectUnavailable => "DIALECT_UNAVAILABLE",

            Event::SchemaCheckFailed => "SCHEMA_CHECK_FAILED",
            Event::SchemaComment => "SCHEMA_COMMENT",
            Event::SchemaStatementOk => "SCHEMA_STATEMENT_OK",
            Event::SchemaStatementFailed => "SCHEMA_STATEMENT_FAILED",
            Event::SchemaBootstrapComplete => "SCHEMA_BOOTSTRAP_COMPLETE",
            Event::SchemaBootstrapFailed => "SCHEMA_BOOTSTRAP_FAILED",

            Event::ConnectionActivated => "CONNECTION_ACTIVATED",
            Event::ConnectionPassivated => "CONNECTION_PASSIVATED",
            Event::ConnectionValidateFailed => "CONNECTION_VALIDATE_FAILED",
            Event::ConnectionClosed => "CONNECTION_CLOSED",

            Event::RowRead => "ROW_READ",
            Event::RowCreated => "ROW_CREATED",
            Event::RowUpdated => "ROW_UPDATED",
            Event::RowRemoved => "ROW_REMOVED",
            Event::ColumnInserted => "COLUMN_INSERTED",
            Event::ColumnUpdated => "COLUMN_UPDATED",
            Event::ColumnRemoved => "COLUMN_REMOVED",
            Event::ColumnAbsent => "COLUMN_ABSENT",
            Event::StorageOpFailed => "STORAGE_OP_FAILED",
            Event::CleanupFailed => "CLEANUP_FAILED",

            Event::BodyWritten => "BODY_WRITTEN",
            Event::BodyRead => "BODY_READ",

            Event::ContentReset => "CONTENT_RESET",
            Event::ChildSkipped => "CHILD_SKIPPED",
            Event::ChildTraversalAborted => "CHILD_TRAVERSAL_ABORTED",
        }
    }

    /// Returns true if this event indicates a fatal condition
    pub fn is_fatal(&self) -> bool {
        matches!(self, Event::DialectUnavailable | Event::SchemaBootstrapFailed)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
