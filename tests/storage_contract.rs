//! Storage Contract Tests
//!
//! Every backend must satisfy the same row semantics:
//! - insert then get returns exactly the net effect of the change set
//! - remove then get returns an empty row
//! - get of an unknown row is empty, never an error
//! - bodies streamed in can be streamed back out unchanged

use std::io::{Cursor, Read};

use sparsestore::observability::Logger;
use sparsestore::storage::{
    Changes, MemoryStorageClient, MemoryStore, RelationalStorageClient, Row, StorageClient,
    StoreConfig, Value,
};
use tempfile::TempDir;

// =============================================================================
// Test Utilities
// =============================================================================

fn memory_client(config: &StoreConfig) -> MemoryStorageClient {
    MemoryStorageClient::new(MemoryStore::new(), config, Logger::discard())
}

fn relational_client(dir: &TempDir) -> RelationalStorageClient {
    let config = StoreConfig::default().with_body_store_dir(dir.path().join("bodies"));
    let mut client =
        RelationalStorageClient::open_sqlite(dir.path().join("store.db"), &config, Logger::discard())
            .expect("open sqlite");
    client.check_schema().expect("schema bootstrap");
    client
}

fn row(pairs: &[(&str, &str)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), Value::from(*v)))
        .collect()
}

/// Run a contract check against both backends
fn for_each_backend(check: impl Fn(&mut dyn StorageClient)) {
    let mut memory = memory_client(&StoreConfig::default());
    check(&mut memory);

    let dir = TempDir::new().expect("temp dir");
    let mut relational = relational_client(&dir);
    check(&mut relational);
}

// =============================================================================
// Row Semantics
// =============================================================================

#[test]
fn test_title_scenario() {
    for_each_backend(|client| {
        client
            .insert("content", "data", "/a/b", &Changes::new().put("title", "Hello"), true)
            .unwrap();
        assert_eq!(client.get("content", "data", "/a/b").unwrap(), row(&[("title", "Hello")]));

        client
            .insert("content", "data", "/a/b", &Changes::new().remove("title"), false)
            .unwrap();
        assert!(client.get("content", "data", "/a/b").unwrap().is_empty());
    });
}

#[test]
fn test_insert_applies_net_effect() {
    for_each_backend(|client| {
        client
            .insert("ns", "t", "k", &Changes::new().put("a", "1").put("b", "2").put("c", "3"), true)
            .unwrap();

        let changes = Changes::new().put("a", "10").remove("b").put("d", "4").remove("never");
        client.insert("ns", "t", "k", &changes, false).unwrap();

        assert_eq!(
            client.get("ns", "t", "k").unwrap(),
            row(&[("a", "10"), ("c", "3"), ("d", "4")])
        );
    });
}

#[test]
fn test_empty_change_set_is_noop() {
    for_each_backend(|client| {
        client.insert("ns", "t", "k", &Changes::new().put("a", "1"), true).unwrap();
        client.insert("ns", "t", "k", &Changes::new(), false).unwrap();
        assert_eq!(client.get("ns", "t", "k").unwrap(), row(&[("a", "1")]));
    });
}

#[test]
fn test_remove_then_get_is_empty() {
    for_each_backend(|client| {
        client.insert("ns", "t", "k", &Changes::new().put("a", "1"), true).unwrap();
        client.remove("ns", "t", "k").unwrap();
        assert!(client.get("ns", "t", "k").unwrap().is_empty());

        client.remove("ns", "t", "k").unwrap();
    });
}

#[test]
fn test_unknown_row_is_empty() {
    for_each_backend(|client| {
        assert!(client.get("ns", "t", "nothing-here").unwrap().is_empty());
    });
}

#[test]
fn test_rows_are_isolated_by_full_key() {
    for_each_backend(|client| {
        client.insert("a", "b:c", "d", &Changes::new().put("x", "1"), true).unwrap();
        client.insert("a:b", "c", "d", &Changes::new().put("x", "2"), true).unwrap();
        client.insert("a", "b", "c:d", &Changes::new().put("x", "3"), true).unwrap();

        assert_eq!(client.get("a", "b:c", "d").unwrap(), row(&[("x", "1")]));
        assert_eq!(client.get("a:b", "c", "d").unwrap(), row(&[("x", "2")]));
        assert_eq!(client.get("a", "b", "c:d").unwrap(), row(&[("x", "3")]));
    });
}

#[test]
fn test_find_is_explicitly_unsupported() {
    for_each_backend(|client| {
        let err = client.find("ns", "t", &row(&[("a", "1")])).err().unwrap();
        assert!(err.is_unsupported());
    });
}

// =============================================================================
// Body Streaming
// =============================================================================

fn round_trip_body(client: &mut dyn StorageClient, body: &[u8]) -> Vec<u8> {
    let metadata = client
        .stream_body_in("ns", "t", "cid-1", "block-1", &mut Cursor::new(body.to_vec()))
        .unwrap();
    assert_eq!(metadata.get("blockId"), Some(&Value::from("block-1")));
    assert_eq!(
        metadata.get("length").and_then(Value::as_i64),
        Some(body.len() as i64)
    );

    // persist the metadata on the content row and read it back, as a content manager would
    client
        .insert("ns", "t", "cid-1", &Changes::from(metadata), true)
        .unwrap();
    let content = client.get("ns", "t", "cid-1").unwrap();

    let mut out = Vec::new();
    client
        .stream_body_out("ns", "t", "cid-1", "block-1", &content)
        .unwrap()
        .read_to_end(&mut out)
        .unwrap();
    out
}

#[test]
fn test_memory_body_spans_block_sets() {
    let config = StoreConfig::default().with_block_layout(4, 2);
    let mut client = memory_client(&config);
    let body: Vec<u8> = (0u8..=40).collect();
    assert_eq!(round_trip_body(&mut client, &body), body);
}

#[test]
fn test_relational_body_through_files() {
    let dir = TempDir::new().unwrap();
    let mut client = relational_client(&dir);
    let body = b"a body that lives on disk".to_vec();
    assert_eq!(round_trip_body(&mut client, &body), body);
}

#[test]
fn test_empty_body() {
    for_each_backend(|client| {
        assert!(round_trip_body(client, b"").is_empty());
    });
}
