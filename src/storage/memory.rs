//! # In-memory backend
//!
//! One shared table from row key to row. The table lock makes map-level
//! operations atomic; each row has its own lock so writers to different rows
//! do not contend. `get` materializes an empty row on first access, so reads
//! are not side-effect free at this layer.

use std::collections::HashMap;
use std::io::Read;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::body::{BlockSetBodyHelper, BodyHelper};
use super::errors::{StorageError, StorageResult};
use super::row_key::RowKey;
use super::value::{Changes, Row};
use super::{RowIter, StorageClient, StoreConfig};
use crate::observability::{Event, Logger};

type SharedRow = Arc<RwLock<Row>>;

fn read_guard<T>(lock: &RwLock<T>) -> StorageResult<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|_| StorageError::driver_no_source("Lock poisoned"))
}

fn write_guard<T>(lock: &RwLock<T>) -> StorageResult<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|_| StorageError::driver_no_source("Lock poisoned"))
}

/// Shared row table. Clones refer to the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    rows: Arc<RwLock<HashMap<RowKey, SharedRow>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of materialized rows, including empty ones created by `get`
    pub fn len(&self) -> usize {
        self.rows.read().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, namespace: &str, table: &str, key: &str) -> bool {
        self.rows
            .read()
            .map(|rows| rows.contains_key(&RowKey::new(namespace, table, key)))
            .unwrap_or(false)
    }
}

/// Storage client over a [`MemoryStore`]
#[derive(Debug)]
pub struct MemoryStorageClient {
    store: MemoryStore,
    body: BlockSetBodyHelper,
    logger: Logger,
}

impl MemoryStorageClient {
    pub fn new(store: MemoryStore, config: &StoreConfig, logger: Logger) -> Self {
        let body = BlockSetBodyHelper::from_config(config, logger.child("body"));
        Self { store, body, logger }
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    fn get_or_create_row(&self, namespace: &str, table: &str, key: &str) -> StorageResult<SharedRow> {
        let row_key = RowKey::new(namespace, table, key);
        {
            let rows = read_guard(&self.store.rows)?;
            if let Some(row) = rows.get(&row_key) {
                return Ok(Arc::clone(row));
            }
        }

        let mut rows = write_guard(&self.store.rows)?;
        let logger = &self.logger;
        let row = rows.entry(row_key).or_insert_with_key(|k| {
            logger.trace(Event::RowCreated, &[("row", &k.to_string())]);
            Arc::new(RwLock::new(Row::new()))
        });
        Ok(Arc::clone(row))
    }
}

impl StorageClient for MemoryStorageClient {
    fn get(&mut self, namespace: &str, table: &str, key: &str) -> StorageResult<Row> {
        let row = self.get_or_create_row(namespace, table, key)?;
        let snapshot = read_guard(&row)?.clone();
        self.logger.trace(
            Event::RowRead,
            &[
                ("columns", &snapshot.len().to_string()),
                ("row", &RowKey::new(namespace, table, key).to_string()),
            ],
        );
        Ok(snapshot)
    }

    fn insert(
        &mut self,
        namespace: &str,
        table: &str,
        key: &str,
        changes: &Changes,
        _probably_new: bool,
    ) -> StorageResult<()> {
        let row = self.get_or_create_row(namespace, table, key)?;
        let mut guard = write_guard(&row)?;
        changes.apply_to(&mut guard);
        self.logger.trace(
            Event::RowUpdated,
            &[
                ("changes", &changes.len().to_string()),
                ("row", &RowKey::new(namespace, table, key).to_string()),
            ],
        );
        Ok(())
    }

    fn remove(&mut self, namespace: &str, table: &str, key: &str) -> StorageResult<()> {
        let row_key = RowKey::new(namespace, table, key);
        let mut rows = write_guard(&self.store.rows)?;
        if rows.remove(&row_key).is_some() {
            self.logger.trace(Event::RowRemoved, &[("row", &row_key.to_string())]);
        }
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

    fn find(&mut self, _namespace: &str, _table: &str, _criteria: &Row) -> StorageResult<RowIter<'_>> {
        Err(StorageError::unsupported("find"))
    }

    fn activate(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn passivate(&mut self) {}

    fn close(&mut self) {}
}
