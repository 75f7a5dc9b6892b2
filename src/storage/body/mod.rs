//! Body streaming helpers
//!
//! Large binary bodies do not travel through `insert`. A backend delegates
//! `stream_body_in`/`stream_body_out` to a helper, handing itself over as the
//! row read/write primitive. The helper owns the storage layout and returns
//! the metadata columns the content row should record.

mod block_set;
mod file;

use std::fmt;
use std::io::Read;

pub use block_set::BlockSetBodyHelper;
pub use file::FileBodyHelper;

use super::errors::StorageResult;
use super::value::Row;
use super::StorageClient;

/// Block id the body is stored under (content row)
pub const BLOCKID_FIELD: &str = "blockId";
/// Number of block sets in a body (content row)
pub const NBLOCKS_FIELD: &str = "nblocks";
/// Bytes per block, when the body is blocked (content row)
pub const BLOCKSIZE_FIELD: &str = "blocksize";
/// Total body length in bytes (content row)
pub const LENGTH_FIELD: &str = "length";
/// Epoch milliseconds of the last body write (content row)
pub const BODY_LAST_MODIFIED: &str = "bodyLastModified";
/// Relative location of a file-backed body (content row)
pub const BODY_LOCATION_FIELD: &str = "bodyLocation";

/// Chunking strategy used by a backend for bodies
pub trait BodyHelper: Send + fmt::Debug {
    /// Consume `body` and persist it under `block_id`
    fn write_body(
        &self,
        rows: &mut dyn StorageClient,
        namespace: &str,
        table: &str,
        content_id: &str,
        block_id: &str,
        body: &mut dyn Read,
    ) -> StorageResult<Row>;

    /// Open the body described by `content`
    fn read_body(
        &self,
        rows: &mut dyn StorageClient,
        namespace: &str,
        table: &str,
        block_id: &str,
        content: &Row,
    ) -> StorageResult<Box<dyn Read + Send>>;
}

/// Current time as epoch milliseconds
fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
