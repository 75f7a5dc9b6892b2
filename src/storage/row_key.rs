//! Row key codec
//!
//! A row is addressed by `(namespace, table, key)`. The in-memory backend uses
//! the triple directly; the relational backend replaces it with a fixed-length
//! digest (the row hash) because its primary key column has a fixed width.
//! The row hash is one-way: only exact-key lookup is possible.

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};

use super::errors::StorageError;

/// The logical address of a row
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowKey {
    pub namespace: String,
    pub table: String,
    pub key: String,
}

impl RowKey {
    pub fn new(namespace: &str, table: &str, key: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            table: table.to_string(),
            key: key.to_string(),
        }
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.namespace, self.table, self.key)
    }
}

/// Digest used for row hashes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HashAlgorithm {
    #[serde(rename = "SHA-224")]
    Sha224,
    #[default]
    #[serde(rename = "SHA-256")]
    Sha256,
    #[serde(rename = "SHA-384")]
    Sha384,
    #[serde(rename = "SHA-512")]
    Sha512,
}

impl HashAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha224 => "SHA-224",
            HashAlgorithm::Sha256 => "SHA-256",
            HashAlgorithm::Sha384 => "SHA-384",
            HashAlgorithm::Sha512 => "SHA-512",
        }
    }

    /// Digest size in bytes
    pub fn output_len(&self) -> usize {
        match self {
            HashAlgorithm::Sha224 => 28,
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha384 => 48,
            HashAlgorithm::Sha512 => 64,
        }
    }

    fn digest(&self, input: &[u8]) -> Vec<u8> {
        match self {
            HashAlgorithm::Sha224 => Sha224::digest(input).to_vec(),
            HashAlgorithm::Sha256 => Sha256::digest(input).to_vec(),
            HashAlgorithm::Sha384 => Sha384::digest(input).to_vec(),
            HashAlgorithm::Sha512 => Sha512::digest(input).to_vec(),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_uppercase();
        match normalized.as_str() {
            "SHA224" => Ok(HashAlgorithm::Sha224),
            "SHA256" => Ok(HashAlgorithm::Sha256),
            "SHA384" => Ok(HashAlgorithm::Sha384),
            "SHA512" => Ok(HashAlgorithm::Sha512),
            _ => Err(StorageError::config(format!("unsupported row hash algorithm: {}", s))),
        }
    }
}

/// Computes row hashes
#[derive(Debug, Clone, Copy, Default)]
pub struct RowHasher {
    algorithm: HashAlgorithm,
}

impl RowHasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self { algorithm }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Deterministic, URL-safe, fixed-length hash of the triple.
    ///
    /// Namespace and table are length-prefixed in the digest input so that
    /// separator characters inside a component cannot make two distinct
    /// triples collide.
    pub fn row_hash(&self, namespace: &str, table: &str, key: &str) -> String {
        let mut input = Vec::with_capacity(namespace.len() + table.len() + key.len() + 24);
        input.extend_from_slice(namespace.len().to_string().as_bytes());
        input.push(b':');
        input.extend_from_slice(namespace.as_bytes());
        input.extend_from_slice(table.len().to_string().as_bytes());
        input.push(b':');
        input.extend_from_slice(table.as_bytes());
        input.push(b':');
        input.extend_from_slice(key.as_bytes());
        URL_SAFE_NO_PAD.encode(self.algorithm.digest(&input))
    }

    /// Length of every hash this hasher produces, in characters
    pub fn hash_len(&self) -> usize {
        let bytes = self.algorithm.output_len();
        (bytes * 4 + 2) / 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_row_hash_deterministic() {
        let hasher = RowHasher::default();
        let a = hasher.row_hash("content", "data", "/a/b");
        let b = hasher.row_hash("content", "data", "/a/b");
        assert_eq!(a, b);
        assert_eq!(a.len(), hasher.hash_len());
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_separator_inside_component_does_not_collide() {
        let hasher = RowHasher::default();
        assert_ne!(hasher.row_hash("a:b", "c", "d"), hasher.row_hash("a", "b:c", "d"));
        assert_ne!(hasher.row_hash("a", "b", "c:d"), hasher.row_hash("a", "b:c", "d"));
    }

    #[test]
    fn test_distinct_triples_distinct_hashes() {
        let hasher = RowHasher::new(HashAlgorithm::Sha224);
        let mut seen = HashSet::new();
        for i in 0..5000 {
            let hash = hasher.row_hash("ns", &format!("t{}", i % 7), &format!("/k/{}", i));
            assert_eq!(hash.len(), hasher.hash_len());
            assert!(seen.insert(hash));
        }
    }

    #[test]
    fn test_algorithm_names_parse() {
        assert_eq!("SHA-256".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha256);
        assert_eq!("sha512".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha512);
        assert!("MD5".parse::<HashAlgorithm>().is_err());
    }

    #[test]
    fn test_row_key_display() {
        assert_eq!(RowKey::new("content", "data", "/a").to_string(), "content:data:/a");
    }
}
