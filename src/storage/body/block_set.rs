//! Block-set body layout
//!
//! A body is cut into blocks of `block_size` bytes. Up to
//! `max_chunks_per_block_set` blocks share one row, keyed
//! `<blockId>:<setIndex>`, as binary columns `block-0`, `block-1`, ...
//! Each set row also records `numblocks`, `blocksize` and `blocklength`.
//! Only one block set is buffered at a time while writing.

use std::io::{self, Cursor, Read};

use super::{
    now_millis, BodyHelper, BLOCKID_FIELD, BLOCKSIZE_FIELD, BODY_LAST_MODIFIED, LENGTH_FIELD,
    NBLOCKS_FIELD,
};
use crate::observability::{Event, Logger};
use crate::storage::errors::{StorageError, StorageResult};
use crate::storage::value::{Changes, Row, Value};
use crate::storage::{StorageClient, StoreConfig};

const NUMBLOCKS_FIELD: &str = "numblocks";
const BLOCKLENGTH_FIELD: &str = "blocklength";

fn block_column(index: usize) -> String {
    format!("block-{}", index)
}

fn block_set_key(block_id: &str, set_index: usize) -> String {
    format!("{}:{}", block_id, set_index)
}

fn stored_block_count(set: &Row) -> usize {
    set.get(NUMBLOCKS_FIELD)
        .and_then(Value::as_i64)
        .unwrap_or(0)
        .max(0) as usize
}

/// Stores bodies as binary columns in block set rows
#[derive(Debug, Clone)]
pub struct BlockSetBodyHelper {
    block_size: usize,
    max_chunks_per_block_set: usize,
    logger: Logger,
}

impl BlockSetBodyHelper {
    pub fn new(block_size: usize, max_chunks_per_block_set: usize, logger: Logger) -> Self {
        Self {
            block_size: block_size.max(1),
            max_chunks_per_block_set: max_chunks_per_block_set.max(1),
            logger,
        }
    }

    pub fn from_config(config: &StoreConfig, logger: Logger) -> Self {
        Self::new(config.block_size, config.max_chunks_per_block_set, logger)
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn max_chunks_per_block_set(&self) -> usize {
        self.max_chunks_per_block_set
    }

    /// Largest number of bytes one block set can hold
    fn set_capacity(&self) -> usize {
        self.block_size.saturating_mul(self.max_chunks_per_block_set)
    }

    /// Remove block set rows from `first` on, stopping at the first absent one
    fn remove_sets_from(
        &self,
        rows: &mut dyn StorageClient,
        namespace: &str,
        table: &str,
        block_id: &str,
        first: usize,
    ) -> StorageResult<()> {
        let mut set_index = first;
        loop {
            let key = block_set_key(block_id, set_index);
            let present = !rows.get(namespace, table, &key)?.is_empty();
            // also drops the empty row a materializing get may have left
            rows.remove(namespace, table, &key)?;
            if !present {
                return Ok(());
            }
            set_index += 1;
        }
    }

    /// Fill `buf` from `body`; returns bytes read, short only at end of input
    fn read_block(body: &mut dyn Read, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match body.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

impl BodyHelper for BlockSetBodyHelper {
    fn write_body(
        &self,
        rows: &mut dyn StorageClient,
        namespace: &str,
        table: &str,
        content_id: &str,
        block_id: &str,
        body: &mut dyn Read,
    ) -> StorageResult<Row> {
        let mut buf = vec![0u8; self.block_size];
        let mut total: i64 = 0;
        let mut set_index = 0usize;
        let mut finished = false;

        while !finished {
            let mut set = Changes::new();
            let mut blocks = 0usize;
            let mut set_length: i64 = 0;

            while blocks < self.max_chunks_per_block_set {
                let n = Self::read_block(body, &mut buf)
                    .map_err(|e| StorageError::io_error("failed to read body", e))?;
                if n > 0 {
                    set.set(block_column(blocks), Value::Binary(buf[..n].to_vec()));
                    blocks += 1;
                    set_length += n as i64;
                }
                if n < self.block_size {
                    finished = true;
                    break;
                }
            }

            if blocks == 0 {
                break;
            }
            let key = block_set_key(block_id, set_index);
            let previous = stored_block_count(&rows.get(namespace, table, &key)?);
            for stale in blocks..previous {
                set.delete(block_column(stale));
            }
            set.set(NUMBLOCKS_FIELD, Value::Integer(blocks as i64));
            set.set(BLOCKSIZE_FIELD, Value::Integer(self.block_size as i64));
            set.set(BLOCKLENGTH_FIELD, Value::Integer(set_length));
            rows.insert(namespace, table, &key, &set, previous == 0)?;

            total += set_length;
            set_index += 1;
        }
        self.remove_sets_from(rows, namespace, table, block_id, set_index)?;

        self.logger.trace(
            Event::BodyWritten,
            &[
                ("block_id", block_id),
                ("content_id", content_id),
                ("length", &total.to_string()),
                ("nblocks", &set_index.to_string()),
            ],
        );

        let mut metadata = Row::new();
        metadata.insert(BLOCKID_FIELD.to_string(), Value::from(block_id));
        metadata.insert(NBLOCKS_FIELD.to_string(), Value::Integer(set_index as i64));
        metadata.insert(LENGTH_FIELD.to_string(), Value::Integer(total));
        metadata.insert(BLOCKSIZE_FIELD.to_string(), Value::Integer(self.block_size as i64));
        metadata.insert(BODY_LAST_MODIFIED.to_string(), Value::Integer(now_millis()));
        Ok(metadata)
    }

    fn read_body(
        &self,
        rows: &mut dyn StorageClient,
        namespace: &str,
        table: &str,
        block_id: &str,
        content: &Row,
    ) -> StorageResult<Box<dyn Read + Send>> {
        let nblocks = content
            .get(NBLOCKS_FIELD)
            .and_then(Value::as_i64)
            .unwrap_or(0)
            .max(0) as usize;
        // the length column is only a hint; never reserve more than one block set
        let capacity = content
            .get(LENGTH_FIELD)
            .and_then(Value::as_i64)
            .and_then(|length| usize::try_from(length).ok())
            .unwrap_or(0)
            .min(self.set_capacity());

        let mut out = Vec::with_capacity(capacity);
        for set_index in 0..nblocks {
            let key = block_set_key(block_id, set_index);
            let set = rows.get(namespace, table, &key)?;
            let blocks = stored_block_count(&set);
            if blocks == 0 || blocks > self.max_chunks_per_block_set {
                return Err(StorageError::io_error(
                    format!("block set {} of {} is missing or malformed", set_index, nblocks),
                    io::Error::new(io::ErrorKind::InvalidData, "bad block set"),
                )
                .for_row(namespace, table, &key));
            }
            for i in 0..blocks {
                match set.get(&block_column(i)).and_then(Value::as_bytes) {
                    Some(bytes) => out.extend_from_slice(bytes),
                    None => {
                        return Err(StorageError::io_error(
                            format!("missing block {} in block set {}", i, key),
                            io::Error::new(io::ErrorKind::UnexpectedEof, "truncated body"),
                        )
                        .for_row(namespace, table, &key))
                    }
                }
            }
        }

        self.logger.trace(
            Event::BodyRead,
            &[("block_id", block_id), ("length", &out.len().to_string())],
        );
        Ok(Box::new(Cursor::new(out)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::{MemoryStorageClient, MemoryStore};

    fn client() -> MemoryStorageClient {
        MemoryStorageClient::new(MemoryStore::new(), &StoreConfig::default(), Logger::discard())
    }

    fn body(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_body_spans_several_block_sets() {
        let helper = BlockSetBodyHelper::new(4, 2, Logger::discard());
        let mut rows = client();
        let data = body(19);

        let meta = helper
            .write_body(&mut rows, "n", "t", "cid", "blk", &mut data.as_slice())
            .unwrap();
        // 19 bytes / 4 per block = 5 blocks, 2 per set = 3 sets
        assert_eq!(meta.get(NBLOCKS_FIELD), Some(&Value::Integer(3)));
        assert_eq!(meta.get(LENGTH_FIELD), Some(&Value::Integer(19)));

        let last_set = rows.get("n", "t", "blk:2").unwrap();
        assert_eq!(last_set.get(NUMBLOCKS_FIELD), Some(&Value::Integer(1)));

        let mut out = Vec::new();
        helper
            .read_body(&mut rows, "n", "t", "blk", &meta)
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_exact_multiple_of_block_size() {
        let helper = BlockSetBodyHelper::new(4, 2, Logger::discard());
        let mut rows = client();
        let data = body(16);

        let meta = helper
            .write_body(&mut rows, "n", "t", "cid", "blk", &mut data.as_slice())
            .unwrap();
        assert_eq!(meta.get(NBLOCKS_FIELD), Some(&Value::Integer(2)));

        let mut out = Vec::new();
        helper
            .read_body(&mut rows, "n", "t", "blk", &meta)
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_empty_body() {
        let helper = BlockSetBodyHelper::new(4, 2, Logger::discard());
        let mut rows = client();

        let meta = helper
            .write_body(&mut rows, "n", "t", "cid", "blk", &mut io::empty())
            .unwrap();
        assert_eq!(meta.get(NBLOCKS_FIELD), Some(&Value::Integer(0)));
        assert_eq!(meta.get(LENGTH_FIELD), Some(&Value::Integer(0)));

        let mut out = Vec::new();
        helper
            .read_body(&mut rows, "n", "t", "blk", &meta)
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_missing_block_is_an_error() {
        let helper = BlockSetBodyHelper::new(4, 2, Logger::discard());
        let mut rows = client();
        let data = body(8);
        let meta = helper
            .write_body(&mut rows, "n", "t", "cid", "blk", &mut data.as_slice())
            .unwrap();

        rows.insert("n", "t", "blk:0", &Changes::new().remove("block-1"), false)
            .unwrap();
        assert!(helper.read_body(&mut rows, "n", "t", "blk", &meta).is_err());
    }

    #[test]
    fn test_oversized_length_column_is_only_a_hint() {
        let helper = BlockSetBodyHelper::new(4, 2, Logger::discard());
        let mut rows = client();
        let data = body(6);
        let mut meta = helper
            .write_body(&mut rows, "n", "t", "cid", "blk", &mut data.as_slice())
            .unwrap();
        meta.insert(LENGTH_FIELD.to_string(), Value::Integer(i64::MAX));

        let mut out = Vec::new();
        helper
            .read_body(&mut rows, "n", "t", "blk", &meta)
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out, data);

        let mut bogus = Row::new();
        bogus.insert(NBLOCKS_FIELD.to_string(), Value::Integer(0));
        bogus.insert(LENGTH_FIELD.to_string(), Value::Integer(i64::MAX));
        let mut out = Vec::new();
        helper
            .read_body(&mut rows, "n", "t", "other", &bogus)
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_inflated_set_count_is_an_error() {
        let helper = BlockSetBodyHelper::new(4, 2, Logger::discard());
        let mut rows = client();
        let data = body(6);
        let mut meta = helper
            .write_body(&mut rows, "n", "t", "cid", "blk", &mut data.as_slice())
            .unwrap();
        meta.insert(NBLOCKS_FIELD.to_string(), Value::Integer(i64::MAX));

        let err = helper.read_body(&mut rows, "n", "t", "blk", &meta).err().unwrap();
        assert_eq!(err.details(), Some("row: n:t:blk:1"));
    }

    #[test]
    fn test_shorter_rewrite_drops_stale_blocks() {
        let helper = BlockSetBodyHelper::new(4, 2, Logger::discard());
        let mut rows = client();
        let store = rows.store().clone();

        let long = body(20);
        helper
            .write_body(&mut rows, "n", "t", "cid", "blk", &mut long.as_slice())
            .unwrap();
        assert!(store.contains("n", "t", "blk:2"));

        // 5 bytes: one set holding two blocks
        let short = body(5);
        let meta = helper
            .write_body(&mut rows, "n", "t", "cid", "blk", &mut short.as_slice())
            .unwrap();
        assert_eq!(meta.get(NBLOCKS_FIELD), Some(&Value::Integer(1)));
        assert!(!store.contains("n", "t", "blk:1"));
        assert!(!store.contains("n", "t", "blk:2"));
        assert!(!store.contains("n", "t", "blk:3"));

        // 3 bytes: the first set shrinks to one block
        let tiny = body(3);
        let meta = helper
            .write_body(&mut rows, "n", "t", "cid", "blk", &mut tiny.as_slice())
            .unwrap();
        let set = rows.get("n", "t", "blk:0").unwrap();
        assert_eq!(set.get(NUMBLOCKS_FIELD), Some(&Value::Integer(1)));
        assert!(!set.contains_key("block-1"));

        let mut out = Vec::new();
        helper
            .read_body(&mut rows, "n", "t", "blk", &meta)
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out, tiny);
    }
}
