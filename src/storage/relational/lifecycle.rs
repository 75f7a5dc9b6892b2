//! Connection lifecycle
//!
//! ```text
//! Created -> SchemaChecked -> Active <-> Passive -> Closed
//! ```
//!
//! Statements are only open in `Active`. Opening them goes through a
//! [`StatementGuard`] so a failure halfway through releases whatever was
//! already prepared.

use std::fmt;

use super::driver::{SqlConnection, StatementHandle};
use crate::observability::{Event, Logger};
use crate::storage::errors::DriverResult;

/// Observable lifecycle state of a relational client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Constructed, schema not yet checked
    Created,
    /// Schema usable, no statements open yet
    SchemaChecked,
    /// Prepared statements open
    Active,
    /// Statements released, schema still usable
    Passive,
    /// Connection closed
    Closed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::Created => "CREATED",
            LifecycleState::SchemaChecked => "SCHEMA_CHECKED",
            LifecycleState::Active => "ACTIVE",
            LifecycleState::Passive => "PASSIVE",
            LifecycleState::Closed => "CLOSED",
        };
        write!(f, "{}", s)
    }
}

/// The five statements every row operation runs through
#[derive(Debug, Clone, Copy)]
pub(crate) struct PreparedStatements {
    pub delete_row: StatementHandle,
    pub select_row: StatementHandle,
    pub insert_column: StatementHandle,
    pub update_column: StatementHandle,
    pub remove_column: StatementHandle,
}

/// Internal state; `Active` owns the statement handles
#[derive(Debug, Clone, Copy)]
pub(crate) enum ConnectionState {
    Created,
    SchemaChecked,
    Active(PreparedStatements),
    Passive,
    Closed,
}

impl ConnectionState {
    pub fn public(&self) -> LifecycleState {
        match self {
            ConnectionState::Created => LifecycleState::Created,
            ConnectionState::SchemaChecked => LifecycleState::SchemaChecked,
            ConnectionState::Active(_) => LifecycleState::Active,
            ConnectionState::Passive => LifecycleState::Passive,
            ConnectionState::Closed => LifecycleState::Closed,
        }
    }

    /// Schema has been checked and the connection is not closed
    pub fn is_alive(&self) -> bool {
        matches!(
            self,
            ConnectionState::SchemaChecked | ConnectionState::Active(_) | ConnectionState::Passive
        )
    }
}

/// Releases prepared statements on drop unless committed
pub(crate) struct StatementGuard<'a, C: SqlConnection> {
    connection: &'a mut C,
    logger: &'a Logger,
    committed: bool,
}

impl<'a, C: SqlConnection> StatementGuard<'a, C> {
    pub fn new(connection: &'a mut C, logger: &'a Logger) -> Self {
        Self {
            connection,
            logger,
            committed: false,
        }
    }

    pub fn prepare(&mut self, sql: &str) -> DriverResult<StatementHandle> {
        self.connection.prepare(sql)
    }

    /// Keep the statements open past the guard
    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl<C: SqlConnection> Drop for StatementGuard<'_, C> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if let Err(e) = self.connection.release_statements() {
            self.logger.trace(
                Event::CleanupFailed,
                &[("reason", &e.to_string()), ("resource", "prepared statements")],
            );
        }
    }
}
