//! # Content Errors

use thiserror::Error;

use crate::storage::StorageError;

/// Result type for content operations
pub type ContentResult<T> = Result<T, ContentError>;

/// Content layer errors
#[derive(Debug, Error)]
pub enum ContentError {
    /// Raised by the access-control layer; traversal skips the item
    #[error("Access denied: {path}")]
    AccessDenied { path: String },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ContentError {
    pub fn access_denied(path: impl Into<String>) -> Self {
        ContentError::AccessDenied { path: path.into() }
    }

    pub fn is_access_denied(&self) -> bool {
        matches!(self, ContentError::AccessDenied { .. })
    }
}
