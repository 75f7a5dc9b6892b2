//! Relational driver seam
//!
//! [`SqlConnection`] is the narrow surface the relational client needs from a
//! physical connection. [`SqliteConnection`] implements it over `rusqlite`,
//! keeping prepared statements in the connection's statement cache.

use std::path::Path;

use rusqlite::{params_from_iter, Connection};

use crate::storage::errors::{DriverError, DriverResult};

/// Product and version reported by the driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverMetadata {
    pub product_name: String,
    pub major_version: u32,
    pub minor_version: u32,
}

/// Handle to a statement opened with [`SqlConnection::prepare`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatementHandle(usize);

impl StatementHandle {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

/// One physical connection
pub trait SqlConnection: Send {
    fn metadata(&self) -> DriverResult<DriverMetadata>;

    /// Run an ad-hoc statement. Returns true if it produced a result set.
    fn execute(&mut self, sql: &str) -> DriverResult<bool>;

    /// Prepare a statement and keep it open until [`SqlConnection::release_statements`]
    fn prepare(&mut self, sql: &str) -> DriverResult<StatementHandle>;

    /// Run a prepared query returning `(column, value)` pairs
    fn query_pairs(&mut self, statement: StatementHandle, params: &[&str]) -> DriverResult<Vec<(String, String)>>;

    /// Run a prepared update; returns the number of affected rows
    fn update(&mut self, statement: StatementHandle, params: &[&str]) -> DriverResult<usize>;

    /// Close every prepared statement
    fn release_statements(&mut self) -> DriverResult<()>;

    fn close(&mut self) -> DriverResult<()>;
}

/// Statement cache capacity; comfortably above the five statements a client opens
const STATEMENT_CACHE_CAPACITY: usize = 16;

/// SQLite connection via rusqlite
#[derive(Debug)]
pub struct SqliteConnection {
    conn: Option<Connection>,
    statements: Vec<String>,
}

impl SqliteConnection {
    pub fn open(path: impl AsRef<Path>) -> DriverResult<Self> {
        Ok(Self::from_connection(Connection::open(path)?))
    }

    pub fn open_in_memory() -> DriverResult<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        conn.set_prepared_statement_cache_capacity(STATEMENT_CACHE_CAPACITY);
        Self {
            conn: Some(conn),
            statements: Vec::new(),
        }
    }

    fn conn(&self) -> DriverResult<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| DriverError::Other("connection closed".to_string()))
    }

    fn statement_sql(&self, statement: StatementHandle) -> DriverResult<&str> {
        self.statements
            .get(statement.0)
            .map(String::as_str)
            .ok_or(DriverError::UnknownStatement(statement.0))
    }
}

impl SqlConnection for SqliteConnection {
    fn metadata(&self) -> DriverResult<DriverMetadata> {
        self.conn()?;
        let version = rusqlite::version_number().max(0) as u32;
        Ok(DriverMetadata {
            product_name: "SQLite".to_string(),
            major_version: version / 1_000_000,
            minor_version: (version / 1_000) % 1_000,
        })
    }

    fn execute(&mut self, sql: &str) -> DriverResult<bool> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        if stmt.column_count() > 0 {
            let mut rows = stmt.query([])?;
            rows.next()?;
            Ok(true)
        } else {
            stmt.execute([])?;
            Ok(false)
        }
    }

    fn prepare(&mut self, sql: &str) -> DriverResult<StatementHandle> {
        // compiled now so bad templates fail at activation, then kept in the cache
        self.conn()?.prepare_cached(sql)?;
        self.statements.push(sql.to_string());
        Ok(StatementHandle(self.statements.len() - 1))
    }

    fn query_pairs(&mut self, statement: StatementHandle, params: &[&str]) -> DriverResult<Vec<(String, String)>> {
        let sql = self.statement_sql(statement)?;
        let mut stmt = self.conn()?.prepare_cached(sql)?;
        let rows = stmt.query_map(params_from_iter(params.iter().copied()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
        })?;

        let mut pairs = Vec::new();
        for row in rows {
            if let (column, Some(value)) = row? {
                pairs.push((column, value));
            }
        }
        Ok(pairs)
    }

    fn update(&mut self, statement: StatementHandle, params: &[&str]) -> DriverResult<usize> {
        let sql = self.statement_sql(statement)?;
        let mut stmt = self.conn()?.prepare_cached(sql)?;
        Ok(stmt.execute(params_from_iter(params.iter().copied()))?)
    }

    fn release_statements(&mut self) -> DriverResult<()> {
        if let Some(conn) = self.conn.as_ref() {
            conn.flush_prepared_statement_cache();
        }
        self.statements.clear();
        Ok(())
    }

    fn close(&mut self) -> DriverResult<()> {
        self.statements.clear();
        if let Some(conn) = self.conn.take() {
            conn.flush_prepared_statement_cache();
            conn.close().map_err(|(_, e)| DriverError::Sqlite(e))?;
        }
        Ok(())
    }
}
