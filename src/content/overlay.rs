//! # Content overlay
//!
//! A [`Content`] is an immutable baseline snapshot of a stored row plus an
//! overlay of pending changes. Reads look at the overlay first, then the
//! baseline. Deletions are staged as [`PendingValue::Tombstone`].
//!
//! # Dirty tracking
//!
//! Staging a value equal to the baseline drops any overlay entry for that
//! name, so a property reverted to its stored value does not keep the object
//! dirty. `is_updated` is true while the object is new (not yet
//! internalized) or the overlay holds at least one entry.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;

use super::fields::{CREATED, CREATED_BY, LASTMODIFIED, LASTMODIFIED_BY, LINKED_PATH_FIELD};
use crate::observability::{Event, Logger};
use crate::storage::{Changes, Row, Value};

/// A staged change to one property
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingValue {
    Set(Value),
    /// Pending delete; distinct from absence and from any real value
    Tombstone,
}

/// A content item: baseline snapshot plus pending overlay
#[derive(Debug, Clone)]
pub struct Content {
    path: String,
    baseline: Arc<Row>,
    overlay: BTreeMap<String, PendingValue>,
    structure: Option<Arc<Row>>,
    pending_create: bool,
    read_only: bool,
    logger: Logger,
}

impl Content {
    /// New, not yet stored content with initial properties
    pub fn new(path: impl Into<String>, properties: Row, logger: Logger) -> Self {
        Self {
            path: path.into(),
            baseline: Arc::new(properties),
            overlay: BTreeMap::new(),
            structure: None,
            pending_create: true,
            read_only: false,
            logger,
        }
    }

    /// Content loaded from storage, already internalized
    pub fn from_storage(path: impl Into<String>, stored: Row, structure: Row, read_only: bool, logger: Logger) -> Self {
        let mut content = Self::new(path, stored, logger);
        content.internalize(structure, read_only);
        content
    }

    /// Bind to its structure record once the store has accepted it.
    ///
    /// Clears the new flag. Staged overlay entries are kept.
    pub fn internalize(&mut self, structure: Row, read_only: bool) {
        self.structure = Some(Arc::new(structure));
        self.pending_create = false;
        self.read_only = read_only;
    }

    /// Replace the baseline and drop all staged changes. Ignored when read-only.
    pub fn reset(&mut self, baseline: Row) {
        if self.read_only {
            return;
        }
        self.baseline = Arc::new(baseline);
        self.overlay.clear();
        self.pending_create = false;
        self.logger.trace(Event::ContentReset, &[("path", &self.path)]);
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_new(&self) -> bool {
        self.pending_create
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Whether there is anything to persist. Always false when read-only.
    pub fn is_updated(&self) -> bool {
        !self.read_only && (self.pending_create || !self.overlay.is_empty())
    }

    pub fn get_property(&self, name: &str) -> Option<&Value> {
        match self.overlay.get(name) {
            Some(PendingValue::Set(value)) => Some(value),
            Some(PendingValue::Tombstone) => None,
            None => self.baseline.get(name),
        }
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.get_property(name).is_some()
    }

    /// Stage a value. Ignored when read-only.
    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        if self.read_only {
            return;
        }
        self.stage(name.into(), PendingValue::Set(value.into()));
    }

    /// Stage a deletion. Ignored when read-only.
    pub fn remove_property(&mut self, name: impl Into<String>) {
        if self.read_only {
            return;
        }
        self.stage(name.into(), PendingValue::Tombstone);
    }

    fn stage(&mut self, name: String, pending: PendingValue) {
        let matches_baseline = match &pending {
            PendingValue::Set(value) => self.baseline.get(&name) == Some(value),
            PendingValue::Tombstone => !self.baseline.contains_key(&name),
        };
        if matches_baseline {
            self.overlay.remove(&name);
        } else {
            self.overlay.insert(name, pending);
        }
    }

    /// Effective properties: baseline merged with the overlay, tombstoned
    /// names left out. The returned row is a copy.
    pub fn properties(&self) -> Row {
        let mut merged = (*self.baseline).clone();
        for (name, pending) in &self.overlay {
            match pending {
                PendingValue::Set(value) => {
                    merged.insert(name.clone(), value.clone());
                }
                PendingValue::Tombstone => {
                    merged.remove(name);
                }
            }
        }
        merged
    }

    /// Properties to hand to a save; same view as [`Content::properties`]
    pub fn properties_for_update(&self) -> Row {
        self.properties()
    }

    /// Column changes that bring the stored row up to date.
    ///
    /// New content writes every effective property; stored content writes
    /// only the overlay, with tombstones as removals.
    pub fn changes(&self) -> Changes {
        let mut changes = Changes::new();
        if self.pending_create {
            for (name, value) in self.properties() {
                changes.set(name, value);
            }
        }
        for (name, pending) in &self.overlay {
            match pending {
                PendingValue::Set(value) => changes.set(name.as_str(), value.clone()),
                PendingValue::Tombstone => changes.delete(name.as_str()),
            }
        }
        changes
    }

    /// Stamp audit fields with the current time in epoch milliseconds.
    ///
    /// `created`/`createdBy` are only written for new content.
    pub fn touch(&mut self, actor: &str) {
        if self.read_only {
            return;
        }
        let now = Utc::now().timestamp_millis();
        if self.pending_create {
            self.set_property(CREATED, now);
            self.set_property(CREATED_BY, actor);
        }
        self.set_property(LASTMODIFIED, now);
        self.set_property(LASTMODIFIED_BY, actor);
    }

    /// Structure record, present once internalized
    pub fn structure(&self) -> Option<&Row> {
        self.structure.as_deref()
    }

    /// Target path if this content is a link
    pub fn link_target(&self) -> Option<&str> {
        self.structure()
            .and_then(|s| s.get(LINKED_PATH_FIELD))
            .and_then(Value::as_str)
    }

    pub(crate) fn logger(&self) -> &Logger {
        &self.logger
    }
}
