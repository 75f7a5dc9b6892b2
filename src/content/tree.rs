//! # Content tree navigation
//!
//! Children of a content item are the non-metadata keys of its structure
//! record. [`Children`] resolves them lazily, one per `next()`:
//!
//! - access denied: logged, child skipped
//! - resolver returns nothing: child skipped
//! - storage failure: traversal stops, error kept in [`Children::error`]

use std::collections::btree_map;

use super::errors::{ContentError, ContentResult};
use super::fields::METADATA_PREFIX;
use super::overlay::Content;
use crate::observability::{Event, Logger};
use crate::storage::Value;

/// Join a parent path and a child name
pub fn new_path(parent: &str, child: &str) -> String {
    let child = child.trim_start_matches('/');
    if parent.ends_with('/') {
        format!("{}{}", parent, child)
    } else {
        format!("{}/{}", parent, child)
    }
}

/// Loads content by path. Implemented by the content manager.
pub trait ContentResolver {
    /// `Ok(None)` if nothing is stored at `path`
    fn resolve(&mut self, path: &str) -> ContentResult<Option<Content>>;
}

impl<F> ContentResolver for F
where
    F: FnMut(&str) -> ContentResult<Option<Content>>,
{
    fn resolve(&mut self, path: &str) -> ContentResult<Option<Content>> {
        self(path)
    }
}

/// Child names of a content item, metadata keys excluded
#[derive(Debug, Clone)]
pub struct ChildPaths<'a> {
    keys: Option<btree_map::Keys<'a, String, Value>>,
}

impl<'a> Iterator for ChildPaths<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let keys = self.keys.as_mut()?;
        keys.find(|k| !k.starts_with(METADATA_PREFIX)).map(String::as_str)
    }
}

/// Lazily resolved children
pub struct Children<'a, R: ContentResolver + ?Sized> {
    parent: &'a str,
    paths: ChildPaths<'a>,
    resolver: &'a mut R,
    logger: &'a Logger,
    error: Option<ContentError>,
}

impl<'a, R: ContentResolver + ?Sized> Children<'a, R> {
    /// Storage failure that ended the traversal early, if any
    pub fn error(&self) -> Option<&ContentError> {
        self.error.as_ref()
    }

    pub fn into_error(self) -> Option<ContentError> {
        self.error
    }
}

impl<'a, R: ContentResolver + ?Sized> Iterator for Children<'a, R> {
    type Item = Content;

    fn next(&mut self) -> Option<Content> {
        if self.error.is_some() {
            return None;
        }

        for child in self.paths.by_ref() {
            let path = new_path(self.parent, child);
            match self.resolver.resolve(&path) {
                Ok(Some(content)) => return Some(content),
                Ok(None) => {
                    self.logger
                        .trace(Event::ChildSkipped, &[("path", &path), ("reason", "missing")]);
                }
                Err(ContentError::AccessDenied { .. }) => {
                    self.logger
                        .trace(Event::ChildSkipped, &[("path", &path), ("reason", "access denied")]);
                }
                Err(e) => {
                    self.logger.warn(
                        Event::ChildTraversalAborted,
                        &[("path", &path), ("reason", &e.to_string())],
                    );
                    self.error = Some(e);
                    return None;
                }
            }
        }
        None
    }
}

impl Content {
    /// Child names from the structure record. Each call starts over.
    pub fn list_child_paths(&self) -> ChildPaths<'_> {
        ChildPaths {
            keys: self.structure().map(|s| s.keys()),
        }
    }

    /// Children resolved through `resolver`, one at a time
    pub fn list_children<'a, R: ContentResolver + ?Sized>(&'a self, resolver: &'a mut R) -> Children<'a, R> {
        Children {
            parent: self.path(),
            paths: self.list_child_paths(),
            resolver,
            logger: self.logger(),
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Row, StorageError};

    fn parent(children: &[&str]) -> Content {
        let structure: Row = children
            .iter()
            .map(|c| (c.to_string(), Value::from("cid")))
            .collect();
        Content::from_storage("/p", Row::new(), structure, false, Logger::discard())
    }

    #[test]
    fn test_new_path() {
        assert_eq!(new_path("/a", "b"), "/a/b");
        assert_eq!(new_path("/", "b"), "/b");
        assert_eq!(new_path("/a/", "/b"), "/a/b");
    }

    #[test]
    fn test_child_paths_skip_metadata_and_restart() {
        let p = parent(&[":cid", "b", ":link", "a"]);
        let first: Vec<_> = p.list_child_paths().collect();
        let second: Vec<_> = p.list_child_paths().collect();
        assert_eq!(first, vec!["a", "b"]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_no_structure_no_children() {
        let c = Content::new("/n", Row::new(), Logger::discard());
        assert_eq!(c.list_child_paths().count(), 0);
    }

    #[test]
    fn test_children_skip_denied_stop_on_storage_error() {
        let p = parent(&["a", "b", "c", "d"]);
        let mut seen = Vec::new();
        let mut resolver = |path: &str| -> ContentResult<Option<Content>> {
            seen.push(path.to_string());
            match path {
                "/p/b" => Err(ContentError::access_denied(path)),
                "/p/c" => Err(StorageError::driver_no_source("boom").into()),
                _ => Ok(Some(Content::new(path, Row::new(), Logger::discard()))),
            }
        };

        let mut children = p.list_children(&mut resolver);
        let paths: Vec<String> = children.by_ref().map(|c| c.path().to_string()).collect();
        assert_eq!(paths, vec!["/p/a"]);
        assert!(matches!(children.error(), Some(ContentError::Storage(_))));
        drop(children);
        assert_eq!(seen, vec!["/p/a", "/p/b", "/p/c"]);
    }

    #[test]
    fn test_children_are_lazy() {
        let p = parent(&["a", "b", "c"]);
        let mut calls = 0;
        let mut resolver = |path: &str| -> ContentResult<Option<Content>> {
            calls += 1;
            Ok(Some(Content::new(path, Row::new(), Logger::discard())))
        };
        let first = p.list_children(&mut resolver).next().map(|c| c.path().to_string());
        assert_eq!(first.as_deref(), Some("/p/a"));
        assert_eq!(calls, 1);
    }
}
