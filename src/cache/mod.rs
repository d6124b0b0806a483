//! Single-slot result cache keyed by principal.

pub mod dir;
pub mod memory;

pub use dir::DirCache;
pub use memory::MemoryCache;

use crate::error::PipelineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Identity on whose behalf a run and its cached artifact are scoped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metadata stored next to the artifact bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub name: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    /// blake3 of the artifact bytes, `blake3:<hex>`.
    pub content_hash: String,
}

/// One cached artifact. Built complete before it becomes visible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub metadata: EntryMetadata,
    pub bytes: Vec<u8>,
}

impl CacheEntry {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            metadata: EntryMetadata {
                name: name.into(),
                size: bytes.len() as u64,
                created_at: Utc::now(),
                content_hash: content_hash(&bytes),
            },
            bytes,
        }
    }

    /// Size and hash recorded in the metadata match the bytes.
    pub fn is_consistent(&self) -> bool {
        self.metadata.size == self.bytes.len() as u64
            && self.metadata.content_hash == content_hash(&self.bytes)
    }
}

/// One overwrite-only slot per principal.
///
/// `put` replaces the whole entry in one step; `get` returns either the previous or
/// the new complete entry, never a mix of the two.
pub trait ResultCache: Send + Sync {
    fn put(
        &self,
        principal: &Principal,
        name: &str,
        bytes: Vec<u8>,
    ) -> Result<Arc<CacheEntry>, PipelineError>;

    fn get(&self, principal: &Principal) -> Result<Option<Arc<CacheEntry>>, PipelineError>;
}

pub fn content_hash(bytes: &[u8]) -> String {
    format!("blake3:{}", blake3::hash(bytes).to_hex())
}
