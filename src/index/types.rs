use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Dense 0-based identity of a document within one on-disk snapshot.
/// Reassigned on every merge.
pub type DocNumber = u32;

/// Format signature written at the start of every index file
pub const SIGNATURE: &str = "SYMDEX INDEX VERSION 1.0";

/// Number of document names stored per compressed chunk
pub const CHUNK_SIZE: usize = 100;

/// Postings arrays at least this long are written ahead of their category
/// table and referenced by offset
pub const LARGE_ARRAY_SIZE: usize = 256;

/// Tuning knobs for one index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Number of touched documents after which buffered changes are merged
    pub merge_threshold: usize,
    /// Category tables kept in the LRU while a query session is open
    pub table_cache_size: usize,
    /// Keep the most recently used category table after the last session ends
    pub keep_warm_table: bool,
    /// fsync the new file before it replaces the old one
    pub sync_on_merge: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            merge_threshold: 100,
            table_cache_size: 8,
            keep_warm_table: true,
            sync_on_merge: true,
        }
    }
}

/// Metadata stored in meta.json next to a codebase's index file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMeta {
    pub version: u32,
    pub root_path: PathBuf,
    pub index_file: PathBuf,
    pub doc_count: u32,
    pub created_at: u64,
    pub updated_at: u64,
}

impl Default for IndexMeta {
    fn default() -> Self {
        Self {
            version: 1,
            root_path: PathBuf::new(),
            index_file: PathBuf::new(),
            doc_count: 0,
            created_at: 0,
            updated_at: 0,
        }
    }
}
