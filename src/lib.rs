//! sparsestore - Pluggable sparse row storage with a content overlay
//!
//! - [`storage`]: backend contract, in-memory and relational backends
//! - [`content`]: baseline/overlay content items and tree navigation
//! - [`observability`]: structured JSON logging handles

pub mod content;
pub mod observability;
pub mod storage;
