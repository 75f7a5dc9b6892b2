//! # Relational backend
//!
//! Rows are stored in a single `(rid, cid, v)` table where `rid` is the row
//! hash of `(namespace, table, key)`. Only string columns are stored; binary
//! payloads must go through body streaming.
//!
//! A client owns exactly one connection and is not meant for concurrent
//! callers. Pools hand out one client per unit of work, call
//! [`RelationalStorageClient::check_schema`] once, and use
//! [`RelationalStorageClient::validate`] to evict dead connections.

mod dialect;
mod driver;
mod lifecycle;

use std::fmt;
use std::io::Read;
use std::path::Path;

pub use dialect::{
    candidate_locations, parse_ddl, parse_properties, DdlLine, Dialect, DialectRegistry,
    BASE_RESOURCE, PROP_HASH_ALG, SQL_CHECK_SCHEMA, SQL_DELETE_STRING_ROW,
    SQL_INSERT_STRING_COLUMN, SQL_REMOVE_STRING_COLUMN, SQL_SELECT_STRING_ROW,
    SQL_UPDATE_STRING_COLUMN, SQL_VALIDATE,
};
pub use driver::{DriverMetadata, SqlConnection, SqliteConnection, StatementHandle};
pub use lifecycle::LifecycleState;

use lifecycle::{ConnectionState, PreparedStatements, StatementGuard};

use super::body::{BodyHelper, FileBodyHelper};
use super::errors::{ConnectionPoolError, DriverError, StorageError, StorageResult};
use super::row_key::{HashAlgorithm, RowHasher, RowKey};
use super::value::{Changes, ColumnChange, Row, Value};
use super::{RowIter, StorageClient, StoreConfig};
use crate::observability::{Event, Logger};

/// Storage client over one relational connection
pub struct RelationalStorageClient<C: SqlConnection = SqliteConnection> {
    connection: C,
    registry: DialectRegistry,
    candidates: Vec<String>,
    dialect: Dialect,
    hasher: RowHasher,
    state: ConnectionState,
    body: FileBodyHelper,
    logger: Logger,
}

impl RelationalStorageClient<SqliteConnection> {
    /// Open a SQLite database file with the built-in dialects.
    ///
    /// The schema is not checked yet; call [`Self::check_schema`] next.
    pub fn open_sqlite(path: impl AsRef<Path>, config: &StoreConfig, logger: Logger) -> StorageResult<Self> {
        let connection = SqliteConnection::open(path.as_ref())
            .map_err(|e| StorageError::driver(format!("failed to open {}", path.as_ref().display()), e))?;
        Self::new(connection, DialectRegistry::builtin(), config, logger)
    }
}

impl<C: SqlConnection> RelationalStorageClient<C> {
    /// Probe the driver, resolve a dialect and pick the row hash digest.
    ///
    /// Fails if no dialect resource resolves for any candidate location.
    pub fn new(connection: C, registry: DialectRegistry, config: &StoreConfig, logger: Logger) -> StorageResult<Self> {
        config.validate()?;
        let metadata = connection.metadata()?;
        let candidates = candidate_locations(&metadata);
        let dialect = Dialect::resolve(&registry, &candidates, &logger)?;

        let algorithm = match (config.rowid_hash, dialect.property(PROP_HASH_ALG)) {
            (Some(configured), _) => configured,
            (None, Some(name)) if !name.is_empty() => name.parse()?,
            (None, _) => HashAlgorithm::default(),
        };

        let body = FileBodyHelper::from_config(config, logger.child("body"));
        Ok(Self {
            connection,
            registry,
            candidates,
            dialect,
            hasher: RowHasher::new(algorithm),
            state: ConnectionState::Created,
            body,
            logger,
        })
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    pub fn state(&self) -> LifecycleState {
        self.state.public()
    }

    /// Schema checked and not closed
    pub fn is_alive(&self) -> bool {
        self.state.is_alive()
    }

    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.hasher.algorithm()
    }

    /// Row hash used as the physical key for the triple
    pub fn row_hash(&self, namespace: &str, table: &str, key: &str) -> String {
        self.hasher.row_hash(namespace, table, key)
    }

    /// Make sure the schema exists, bootstrapping it from DDL if needed.
    ///
    /// Individual DDL statement failures are logged and skipped, so re-running
    /// against a partially created schema is fine. Fails only if no DDL
    /// resource exists for any candidate location.
    pub fn check_schema(&mut self) -> Result<(), ConnectionPoolError> {
        if let ConnectionState::Closed = self.state {
            return Err(ConnectionPoolError::new("connection is closed"));
        }

        let mut check_error = None;
        if let Some(sql) = self.dialect.property(SQL_CHECK_SCHEMA) {
            match self.connection.execute(sql) {
                Ok(true) => {
                    self.mark_alive();
                    return Ok(());
                }
                Ok(false) => {}
                Err(e) => {
                    self.logger
                        .trace(Event::SchemaCheckFailed, &[("reason", &e.to_string())]);
                    check_error = Some(e);
                }
            }
        }

        let Some((resource, script)) = self.registry.ddl_for(&self.candidates) else {
            let tried = self.candidates.join(", ");
            self.logger
                .fatal(Event::SchemaBootstrapFailed, &[("tried", &tried)]);
            let message = format!("failed to create schema, no DDL found in [{}]", tried);
            return Err(match check_error {
                Some(cause) => ConnectionPoolError::with_source(message, cause),
                None => ConnectionPoolError::new(message),
            });
        };

        for entry in parse_ddl(script) {
            match entry {
                DdlLine::Comment { line, text } => {
                    self.logger.trace(
                        Event::SchemaComment,
                        &[("line", &line.to_string()), ("resource", &resource), ("text", &text)],
                    );
                }
                DdlLine::Statement { line, sql } => match self.connection.execute(&sql) {
                    Ok(_) => self.logger.info(
                        Event::SchemaStatementOk,
                        &[("line", &line.to_string()), ("resource", &resource), ("sql", &sql)],
                    ),
                    Err(e) => self.logger.warn(
                        Event::SchemaStatementFailed,
                        &[
                            ("line", &line.to_string()),
                            ("reason", &e.to_string()),
                            ("resource", &resource),
                            ("sql", &sql),
                        ],
                    ),
                },
            }
        }

        self.logger
            .info(Event::SchemaBootstrapComplete, &[("resource", &resource)]);
        self.mark_alive();
        Ok(())
    }

    fn mark_alive(&mut self) {
        if let ConnectionState::Created = self.state {
            self.state = ConnectionState::SchemaChecked;
        }
    }

    /// Open the prepared statements if the schema is alive and they are not
    /// open yet.
    pub fn start_up_connection(&mut self) -> StorageResult<()> {
        match self.state {
            ConnectionState::Active(_) => return Ok(()),
            ConnectionState::SchemaChecked | ConnectionState::Passive => {}
            ConnectionState::Created => {
                return Err(StorageError::not_ready("schema has not been checked"));
            }
            ConnectionState::Closed => return Err(StorageError::not_ready("connection is closed")),
        }

        let mut guard = StatementGuard::new(&mut self.connection, &self.logger);
        let statements = PreparedStatements {
            delete_row: guard.prepare(self.dialect.sql(SQL_DELETE_STRING_ROW)?)?,
            select_row: guard.prepare(self.dialect.sql(SQL_SELECT_STRING_ROW)?)?,
            insert_column: guard.prepare(self.dialect.sql(SQL_INSERT_STRING_COLUMN)?)?,
            update_column: guard.prepare(self.dialect.sql(SQL_UPDATE_STRING_COLUMN)?)?,
            remove_column: guard.prepare(self.dialect.sql(SQL_REMOVE_STRING_COLUMN)?)?,
        };
        guard.commit();

        self.state = ConnectionState::Active(statements);
        self.logger
            .info(Event::ConnectionActivated, &[("dialect", self.dialect.location())]);
        Ok(())
    }

    /// Release the prepared statements. Release errors are logged and dropped.
    pub fn shutdown_connection(&mut self) {
        if let ConnectionState::Active(_) = self.state {
            if let Err(e) = self.connection.release_statements() {
                self.logger.trace(
                    Event::CleanupFailed,
                    &[("reason", &e.to_string()), ("resource", "prepared statements")],
                );
            }
            self.state = ConnectionState::Passive;
            self.logger
                .info(Event::ConnectionPassivated, &[("dialect", self.dialect.location())]);
        }
    }

    /// Run the dialect's validation query. Never errors; false means evict.
    pub fn validate(&mut self) -> bool {
        if let ConnectionState::Closed = self.state {
            return false;
        }
        let sql = match self.dialect.sql(SQL_VALIDATE) {
            Ok(sql) => sql,
            Err(e) => {
                self.logger
                    .warn(Event::ConnectionValidateFailed, &[("reason", e.message())]);
                return false;
            }
        };
        match self.connection.execute(sql) {
            Ok(_) => true,
            Err(e) => {
                self.logger
                    .warn(Event::ConnectionValidateFailed, &[("reason", &e.to_string())]);
                false
            }
        }
    }

    fn statements(&mut self) -> StorageResult<PreparedStatements> {
        self.start_up_connection()?;
        match self.state {
            ConnectionState::Active(statements) => Ok(statements),
            _ => Err(StorageError::not_ready("prepared statements are not open")),
        }
    }

    fn op_failed(&self, operation: &str, namespace: &str, table: &str, key: &str, err: DriverError) -> StorageError {
        let row = RowKey::new(namespace, table, key).to_string();
        self.logger.warn(
            Event::StorageOpFailed,
            &[("operation", operation), ("reason", &err.to_string()), ("row", &row)],
        );
        StorageError::driver(format!("failed to perform {} operation", operation), err)
            .for_row(namespace, table, key)
    }
}

impl<C: SqlConnection> StorageClient for RelationalStorageClient<C> {
    fn get(&mut self, namespace: &str, table: &str, key: &str) -> StorageResult<Row> {
        let rid = self.hasher.row_hash(namespace, table, key);
        let statements = self.statements()?;
        let pairs = self
            .connection
            .query_pairs(statements.select_row, &[&rid])
            .map_err(|e| self.op_failed("get", namespace, table, key, e))?;

        Ok(pairs
            .into_iter()
            .map(|(column, value)| (column, Value::String(value)))
            .collect())
    }

    /// Binary values are rejected before anything is written. Integers and
    /// booleans are stored by their text form and read back as strings.
    fn insert(
        &mut self,
        namespace: &str,
        table: &str,
        key: &str,
        changes: &Changes,
        _probably_new: bool,
    ) -> StorageResult<()> {
        if let Some((column, _)) = changes
            .iter()
            .find(|(_, change)| matches!(change, ColumnChange::Put(v) if v.is_binary()))
        {
            return Err(StorageError::invalid_value(format!(
                "binary value in column {}, stream it through the body path instead",
                column
            ))
            .for_row(namespace, table, key));
        }

        let statements = self.statements()?;
        let rid = self.hasher.row_hash(namespace, table, key);
        let row = RowKey::new(namespace, table, key).to_string();

        for (column, change) in changes {
            match change {
                ColumnChange::Put(value) => {
                    let text = value.to_text().ok_or_else(|| {
                        StorageError::invalid_value(format!("column {} has no text form", column))
                    })?;
                    let updated = self
                        .connection
                        .update(statements.update_column, &[&text, &rid, column])
                        .map_err(|e| self.op_failed("insert", namespace, table, key, e))?;
                    if updated > 0 {
                        self.logger
                            .trace(Event::ColumnUpdated, &[("column", column), ("row", &row)]);
                        continue;
                    }

                    let inserted = self
                        .connection
                        .update(statements.insert_column, &[&text, &rid, column])
                        .map_err(|e| self.op_failed("insert", namespace, table, key, e))?;
                    if inserted == 0 {
                        return Err(StorageError::driver_no_source(format!(
                            "failed to save column {}",
                            column
                        ))
                        .for_row(namespace, table, key));
                    }
                    self.logger
                        .trace(Event::ColumnInserted, &[("column", column), ("row", &row)]);
                }
                ColumnChange::Remove => {
                    let removed = self
                        .connection
                        .update(statements.remove_column, &[&rid, column])
                        .map_err(|e| self.op_failed("insert", namespace, table, key, e))?;
                    let event = if removed == 0 {
                        Event::ColumnAbsent
                    } else {
                        Event::ColumnRemoved
                    };
                    self.logger.trace(event, &[("column", column), ("row", &row)]);
                }
            }
        }
        Ok(())
    }

    fn remove(&mut self, namespace: &str, table: &str, key: &str) -> StorageResult<()> {
        let rid = self.hasher.row_hash(namespace, table, key);
        let statements = self.statements()?;
        self.connection
            .update(statements.delete_row, &[&rid])
            .map_err(|e| self.op_failed("remove", namespace, table, key, e))?;
        self.logger.trace(
            Event::RowRemoved,
            &[("row", &RowKey::new(namespace, table, key).to_string())],
        );
        Ok(())
    }

    fn stream_body_in(
        &mut self,
        namespace: &str,
        table: &str,
        content_id: &str,
        block_id: &str,
        body: &mut dyn Read,
    ) -> StorageResult<Row> {
        let helper = self.body.clone();
        helper.write_body(self, namespace, table, content_id, block_id, body)
    }

    fn stream_body_out(
        &mut self,
        namespace: &str,
        table: &str,
        _content_id: &str,
        block_id: &str,
        content: &Row,
    ) -> StorageResult<Box<dyn Read + Send>> {
        let helper = self.body.clone();
        helper.read_body(self, namespace, table, block_id, content)
    }

    /// Row hashes are one-way, so there is nothing to scan by property
    fn find(&mut self, _namespace: &str, _table: &str, _criteria: &Row) -> StorageResult<RowIter<'_>> {
        Err(StorageError::unsupported("find"))
    }

    fn activate(&mut self) -> StorageResult<()> {
        self.start_up_connection()
    }

    fn passivate(&mut self) {
        self.shutdown_connection();
    }

    fn close(&mut self) {
        if let ConnectionState::Closed = self.state {
            return;
        }
        self.shutdown_connection();
        if let Err(e) = self.connection.close() {
            self.logger.trace(
                Event::CleanupFailed,
                &[("reason", &e.to_string()), ("resource", "connection")],
            );
        }
        self.state = ConnectionState::Closed;
        self.logger
            .info(Event::ConnectionClosed, &[("dialect", self.dialect.location())]);
    }
}

impl<C: SqlConnection> fmt::Debug for RelationalStorageClient<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationalStorageClient")
            .field("dialect", &self.dialect.location())
            .field("state", &self.state.public())
            .field("hash", &self.hasher.algorithm())
            .finish()
    }
}

impl<C: SqlConnection> Drop for RelationalStorageClient<C> {
    fn drop(&mut self) {
        self.close();
    }
}
