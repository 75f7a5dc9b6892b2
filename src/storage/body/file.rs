//! File-backed body layout
//!
//! Bodies are written as plain files under
//! `<root>/<namespace>/<table>/<yyyy>/<mm>/<uuid>`. Only string and integer
//! metadata goes back to the content row, so this helper suits stores that
//! cannot hold binary columns.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Component, Path, PathBuf};

use chrono::{Datelike, Utc};
use uuid::Uuid;

use super::{now_millis, BodyHelper, BLOCKID_FIELD, BODY_LAST_MODIFIED, BODY_LOCATION_FIELD, LENGTH_FIELD};
use crate::observability::{Event, Logger};
use crate::storage::errors::{StorageError, StorageResult};
use crate::storage::value::{Row, Value};
use crate::storage::{StorageClient, StoreConfig};

/// Stores bodies as files below a root directory
#[derive(Debug, Clone)]
pub struct FileBodyHelper {
    root: PathBuf,
    logger: Logger,
}

impl FileBodyHelper {
    pub fn new(root: PathBuf, logger: Logger) -> Self {
        Self { root, logger }
    }

    pub fn from_config(config: &StoreConfig, logger: Logger) -> Self {
        Self::new(config.body_store_dir.clone(), logger)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn relative_location(namespace: &str, table: &str) -> String {
        let now = Utc::now();
        format!(
            "{}/{}/{:04}/{:02}/{}",
            sanitize(namespace),
            sanitize(table),
            now.year(),
            now.month(),
            Uuid::new_v4()
        )
    }
}

/// Keep a path component from escaping its parent directory
fn sanitize(component: &str) -> String {
    let cleaned: String = component
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        format!("_{}", cleaned)
    } else {
        cleaned
    }
}

impl BodyHelper for FileBodyHelper {
    fn write_body(
        &self,
        _rows: &mut dyn StorageClient,
        namespace: &str,
        table: &str,
        content_id: &str,
        block_id: &str,
        body: &mut dyn Read,
    ) -> StorageResult<Row> {
        let location = Self::relative_location(namespace, table);
        let full_path = self.root.join(&location);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                StorageError::io_error(format!("failed to create {}", parent.display()), e)
            })?;
        }

        let file = File::create(&full_path).map_err(|e| {
            StorageError::io_error(format!("failed to create {}", full_path.display()), e)
        })?;
        let mut writer = BufWriter::new(file);
        let length = io::copy(body, &mut writer)
            .and_then(|n| writer.flush().map(|_| n))
            .map_err(|e| StorageError::io_error(format!("failed to write {}", full_path.display()), e))?;

        self.logger.trace(
            Event::BodyWritten,
            &[
                ("block_id", block_id),
                ("content_id", content_id),
                ("length", &length.to_string()),
                ("location", &location),
            ],
        );

        let mut metadata = Row::new();
        metadata.insert(BLOCKID_FIELD.to_string(), Value::from(block_id));
        metadata.insert(LENGTH_FIELD.to_string(), Value::Integer(length as i64));
        metadata.insert(BODY_LOCATION_FIELD.to_string(), Value::String(location));
        metadata.insert(BODY_LAST_MODIFIED.to_string(), Value::Integer(now_millis()));
        Ok(metadata)
    }

    fn read_body(
        &self,
        _rows: &mut dyn StorageClient,
        _namespace: &str,
        _table: &str,
        block_id: &str,
        content: &Row,
    ) -> StorageResult<Box<dyn Read + Send>> {
        let location = content
            .get(BODY_LOCATION_FIELD)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                StorageError::io_error(
                    format!("no body stored for block {}", block_id),
                    io::Error::new(io::ErrorKind::NotFound, BODY_LOCATION_FIELD),
                )
            })?;
        // locations are relative to the root and may not climb out of it
        if !Path::new(location).components().all(|c| matches!(c, Component::Normal(_))) {
            return Err(StorageError::invalid_value(format!(
                "body location {} is outside the body store",
                location
            )));
        }
        let full_path = self.root.join(location);
        let file = File::open(&full_path).map_err(|e| {
            StorageError::io_error(format!("failed to open {}", full_path.display()), e)
        })?;

        self.logger.trace(Event::BodyRead, &[("block_id", block_id), ("location", location)]);
        Ok(Box::new(BufReader::new(file)))
    }
}
