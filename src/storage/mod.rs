//! Sparse row storage
//!
//! Every backend implements [`StorageClient`]: exact-key get/insert/remove of
//! sparse rows, plus body streaming for large binary payloads. Querying is
//! optional and backends without it say so through an unsupported error.
//!
//! # Backends
//!
//! - [`MemoryStorageClient`]: shared in-process table, triple-keyed
//! - [`RelationalStorageClient`]: one `(rowid, column, value)` SQL table,
//!   rows addressed by a fixed-length row hash
//!
//! # Failure policy
//!
//! - `get` of an absent row returns an empty row, never an error
//! - I/O and driver failures surface as [`StorageError`] with the cause kept
//! - errors while releasing statements or streams are logged and dropped

pub mod body;
mod config;
mod errors;
pub mod memory;
pub mod relational;
mod row_key;
mod value;

use std::fmt;
use std::io::Read;

pub use body::{BlockSetBodyHelper, BodyHelper, FileBodyHelper};
pub use config::StoreConfig;
pub use errors::{
    ConnectionPoolError, DriverError, DriverResult, Severity, StorageError, StorageErrorCode,
    StorageResult,
};
pub use memory::{MemoryStorageClient, MemoryStore};
pub use relational::{RelationalStorageClient, SqlConnection, SqliteConnection};
pub use row_key::{HashAlgorithm, RowHasher, RowKey};
pub use value::{Changes, ColumnChange, Row, Value};

/// Iterator returned by [`StorageClient::find`]
pub type RowIter<'a> = Box<dyn Iterator<Item = StorageResult<Row>> + 'a>;

/// Contract every storage backend satisfies.
///
/// A client is owned by one caller at a time; pools hand out one client per
/// unit of work.
pub trait StorageClient: Send + fmt::Debug {
    /// Current columns of the row; empty if the row does not exist
    fn get(&mut self, namespace: &str, table: &str, key: &str) -> StorageResult<Row>;

    /// Column-level upsert/delete. Columns not in `changes` are untouched.
    fn insert(
        &mut self,
        namespace: &str,
        table: &str,
        key: &str,
        changes: &Changes,
        probably_new: bool,
    ) -> StorageResult<()>;

    /// Delete the whole row; succeeds if it is already absent
    fn remove(&mut self, namespace: &str, table: &str, key: &str) -> StorageResult<()>;

    /// Store a body and return the metadata columns to record on the content row
    fn stream_body_in(
        &mut self,
        namespace: &str,
        table: &str,
        content_id: &str,
        block_id: &str,
        body: &mut dyn Read,
    ) -> StorageResult<Row>;

    /// Read back a body described by `content` (a content row carrying the
    /// metadata returned from [`StorageClient::stream_body_in`])
    fn stream_body_out(
        &mut self,
        namespace: &str,
        table: &str,
        content_id: &str,
        block_id: &str,
        content: &Row,
    ) -> StorageResult<Box<dyn Read + Send>>;

    /// Rows whose columns match every entry of `criteria`
    fn find(&mut self, namespace: &str, table: &str, criteria: &Row) -> StorageResult<RowIter<'_>>;

    /// Called by a pool when handing the client out
    fn activate(&mut self) -> StorageResult<()>;

    /// Called by a pool when the client is returned
    fn passivate(&mut self);

    /// Release every resource held by the client
    fn close(&mut self);
}
