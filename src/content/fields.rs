//! Reserved content property names
//!
//! Everything not listed here is opaque to the content layer.

pub use crate::storage::body::{
    BLOCKID_FIELD, BLOCKSIZE_FIELD, BODY_LAST_MODIFIED, BODY_LOCATION_FIELD, LENGTH_FIELD,
    NBLOCKS_FIELD,
};

/// Structure keys starting with this are metadata, not children
pub const METADATA_PREFIX: char = ':';

pub const UUID_FIELD: &str = "id";
pub const PATH_FIELD: &str = "path";
/// Structure column holding the content id
pub const STRUCTURE_UUID_FIELD: &str = ":cid";
/// Structure column holding the target path of a link
pub const LINKED_PATH_FIELD: &str = ":link";

// version chain
pub const PREVIOUS_VERSION_UUID_FIELD: &str = "previousVersion";
pub const PREVIOUS_BLOCKID_FIELD: &str = "previousBlockId";
pub const NEXT_VERSION_FIELD: &str = "nextVersion";
pub const VERSION_HISTORY_ID_FIELD: &str = "versionHistoryId";
pub const VERSION_NUMBER: &str = "versionNumber";
pub const VERSION_SAVEDBY: &str = "versionSavedBy";

pub const READONLY_FIELD: &str = "readOnly";
pub const DELETED_FIELD: &str = "deleted";
/// Stored value of a true flag
pub const TRUE: &str = "Y";

// body
pub const BODY_LAST_MODIFIED_BY: &str = "bodyLastModifiedBy";
pub const BODY_CREATED: &str = "bodyCreated";
pub const BODY_CREATED_BY: &str = "bodyCreatedBy";
pub const MIMETYPE: &str = "mimeType";
pub const ENCODING: &str = "encoding";

// audit
pub const CREATED: &str = "created";
pub const CREATED_BY: &str = "createdBy";
pub const LASTMODIFIED: &str = "lastModified";
pub const LASTMODIFIED_BY: &str = "lastModifiedBy";

// copy provenance
pub const COPIED_FROM_PATH: &str = "copiedFrom";
pub const COPIED_FROM_ID: &str = "copiedFromId";
pub const COPIED_DEEP: &str = "copiedDeep";
