//! SQL dialect resources
//!
//! A dialect is a properties resource mapping symbolic statement names to SQL
//! templates, looked up by database product and version from most to least
//! specific:
//!
//! ```text
//! client.<product>.<major>.<minor>  ->  client.<product>.<major>  ->  client.<product>  ->  client
//! ```
//!
//! Each candidate may also carry a `.ddl` bootstrap script: line oriented,
//! `#` comment lines, statements ended by a trailing `;`.

use std::collections::HashMap;

use super::driver::DriverMetadata;
use crate::observability::{Event, Logger};
use crate::storage::errors::{StorageError, StorageResult};

/// Base resource name every candidate starts from
pub const BASE_RESOURCE: &str = "client";

pub const SQL_VALIDATE: &str = "validate";
pub const SQL_CHECK_SCHEMA: &str = "check-schema";
pub const SQL_DELETE_STRING_ROW: &str = "delete-string-row";
pub const SQL_SELECT_STRING_ROW: &str = "select-string-row";
pub const SQL_INSERT_STRING_COLUMN: &str = "insert-string-column";
pub const SQL_UPDATE_STRING_COLUMN: &str = "update-string-column";
pub const SQL_REMOVE_STRING_COLUMN: &str = "remove-string-column";
/// Dialect property naming the row hash digest
pub const PROP_HASH_ALG: &str = "rowid-hash";

const SQL_SUFFIX: &str = ".sql";
const DDL_SUFFIX: &str = ".ddl";
const DDL_COMMENT: &str = "#";
const DDL_EOL: char = ';';

/// Named dialect resources (statement properties and DDL scripts)
#[derive(Debug, Clone, Default)]
pub struct DialectRegistry {
    resources: HashMap<String, String>,
}

impl DialectRegistry {
    /// Registry with no resources
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry holding the resources shipped with the crate
    pub fn builtin() -> Self {
        Self::empty()
            .with_resource("client.sql", include_str!("../../../resources/sql/client.sql"))
            .with_resource("client.ddl", include_str!("../../../resources/sql/client.ddl"))
            .with_resource(
                "client.SQLite.sql",
                include_str!("../../../resources/sql/client.SQLite.sql"),
            )
            .with_resource(
                "client.SQLite.ddl",
                include_str!("../../../resources/sql/client.SQLite.ddl"),
            )
    }

    /// Add or replace a resource, e.g. `client.PostgreSQL.16.sql`
    pub fn with_resource(mut self, name: &str, contents: &str) -> Self {
        self.resources.insert(name.to_string(), contents.to_string());
        self
    }

    pub fn resource(&self, name: &str) -> Option<&str> {
        self.resources.get(name).map(String::as_str)
    }

    /// DDL script for the first candidate that has one
    pub fn ddl_for<'a>(&'a self, candidates: &'a [String]) -> Option<(String, &'a str)> {
        candidates.iter().find_map(|location| {
            let name = format!("{}{}", location, DDL_SUFFIX);
            self.resource(&name).map(|ddl| (name, ddl))
        })
    }
}

/// Candidate resource locations, most specific first
pub fn candidate_locations(metadata: &DriverMetadata) -> Vec<String> {
    let product: String = metadata.product_name.chars().filter(|c| !c.is_whitespace()).collect();
    vec![
        format!(
            "{}.{}.{}.{}",
            BASE_RESOURCE, product, metadata.major_version, metadata.minor_version
        ),
        format!("{}.{}.{}", BASE_RESOURCE, product, metadata.major_version),
        format!("{}.{}", BASE_RESOURCE, product),
        BASE_RESOURCE.to_string(),
    ]
}

/// A resolved set of statement templates
#[derive(Debug, Clone)]
pub struct Dialect {
    location: String,
    properties: HashMap<String, String>,
}

impl Dialect {
    /// Resolve the first candidate with a `.sql` resource. Fails if none does.
    pub fn resolve(
        registry: &DialectRegistry,
        candidates: &[String],
        logger: &Logger,
    ) -> StorageResult<Self> {
        for location in candidates {
            let name = format!("{}{}", location, SQL_SUFFIX);
            match registry.resource(&name) {
                Some(contents) => {
                    logger.info(Event::DialectResolved, &[("resource", &name)]);
                    return Ok(Self {
                        location: location.clone(),
                        properties: parse_properties(contents),
                    });
                }
                None => logger.trace(Event::DialectMissing, &[("resource", &name)]),
            }
        }

        let tried = candidates.join(", ");
        logger.fatal(Event::DialectUnavailable, &[("tried", &tried)]);
        Err(StorageError::config(format!("no SQL configuration for client, tried [{}]", tried)))
    }

    /// Candidate location the dialect was loaded from, e.g. `client.SQLite`
    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    /// Statement template; missing templates are a configuration error
    pub fn sql(&self, name: &str) -> StorageResult<&str> {
        self.property(name).ok_or_else(|| {
            StorageError::config(format!("dialect {} has no statement {}", self.location, name))
        })
    }
}

/// Parse a properties resource.
///
/// `key = value` or `key: value`, `#`/`!` comment lines, a trailing
/// backslash continues the value on the next line.
pub fn parse_properties(text: &str) -> HashMap<String, String> {
    let mut properties = HashMap::new();
    let mut pending = String::new();

    for raw in text.lines() {
        let line = raw.trim_start();
        if pending.is_empty() && (line.is_empty() || line.starts_with('#') || line.starts_with('!')) {
            continue;
        }

        let trailing = line.chars().rev().take_while(|c| *c == '\\').count();
        if trailing % 2 == 1 {
            pending.push_str(&line[..line.len() - 1]);
            continue;
        }
        pending.push_str(line);

        let logical = std::mem::take(&mut pending);
        if let Some(idx) = logical.find(|c: char| c == '=' || c == ':') {
            let key = logical[..idx].trim();
            let value = logical[idx + 1..].trim();
            if !key.is_empty() {
                properties.insert(key.to_string(), value.to_string());
            }
        } else {
            let key = logical.trim();
            if !key.is_empty() {
                properties.insert(key.to_string(), String::new());
            }
        }
    }

    properties
}

/// One meaningful unit of a DDL script
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DdlLine {
    /// `#` comment
    Comment { line: usize, text: String },
    /// Statement ending on `line`, terminator stripped
    Statement { line: usize, sql: String },
}

/// Split a DDL script into statements purely by line structure.
///
/// Text after the last `;` is dropped.
pub fn parse_ddl(script: &str) -> Vec<DdlLine> {
    let mut out = Vec::new();
    let mut statement = String::new();

    for (idx, raw) in script.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim_end();
        if line.is_empty() {
            continue;
        }
        if line.starts_with(DDL_COMMENT) {
            out.push(DdlLine::Comment {
                line: line_no,
                text: line.to_string(),
            });
        } else if let Some(body) = line.strip_suffix(DDL_EOL) {
            if !statement.is_empty() {
                statement.push(' ');
            }
            statement.push_str(body);
            out.push(DdlLine::Statement {
                line: line_no,
                sql: std::mem::take(&mut statement),
            });
        } else {
            if !statement.is_empty() {
                statement.push(' ');
            }
            statement.push_str(line);
        }
    }

    out
}
