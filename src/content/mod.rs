//! Content layer
//!
//! Content items sit on top of storage rows. Each one keeps the row it was
//! loaded from as an immutable baseline and stages changes in an overlay
//! until they are persisted through [`Content::changes`] and
//! [`StorageClient::insert`](crate::storage::StorageClient::insert).

mod errors;
pub mod fields;
mod overlay;
mod tree;

pub use errors::{ContentError, ContentResult};
pub use overlay::{Content, PendingValue};
pub use tree::{new_path, ChildPaths, Children, ContentResolver};
