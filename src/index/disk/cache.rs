//! Decoded name chunks and category tables kept while query sessions are open.

use super::table::CategoryTable;
use super::DiskIndex;
use lru::LruCache;
use rustc_hash::FxHashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

pub(crate) struct CacheState {
    sessions: usize,
    chunks: FxHashMap<usize, Arc<Vec<String>>>,
    tables: LruCache<String, Arc<CategoryTable>>,
    /// Table retained after the last session ended
    warm: Option<(String, Arc<CategoryTable>)>,
}

impl CacheState {
    pub(crate) fn new(table_capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(table_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            sessions: 0,
            chunks: FxHashMap::default(),
            tables: LruCache::new(capacity),
            warm: None,
        }
    }

    pub(crate) fn in_session(&self) -> bool {
        self.sessions > 0
    }

    pub(crate) fn sessions(&self) -> usize {
        self.sessions
    }

    pub(crate) fn begin(&mut self) {
        self.sessions += 1;
    }

    /// Returns true when this was the last open session
    pub(crate) fn end(&mut self) -> bool {
        self.sessions = self.sessions.saturating_sub(1);
        self.sessions == 0
    }

    pub(crate) fn chunk(&self, chunk: usize) -> Option<Arc<Vec<String>>> {
        self.chunks.get(&chunk).cloned()
    }

    pub(crate) fn store_chunk(&mut self, chunk: usize, names: Arc<Vec<String>>) {
        if self.in_session() {
            self.chunks.insert(chunk, names);
        }
    }

    pub(crate) fn table(&mut self, category: &str) -> Option<Arc<CategoryTable>> {
        if let Some(table) = self.tables.get(category) {
            return Some(Arc::clone(table));
        }
        match &self.warm {
            Some((name, table)) if name == category => Some(Arc::clone(table)),
            _ => None,
        }
    }

    pub(crate) fn store_table(&mut self, category: &str, table: Arc<CategoryTable>) {
        if self.in_session() {
            self.tables.put(category.to_string(), table);
        }
    }

    /// Drop everything, optionally keeping the most recently used table
    pub(crate) fn release(&mut self, keep_warm: bool) {
        self.chunks.clear();
        let most_recent = self
            .tables
            .iter()
            .next()
            .map(|(name, table)| (name.clone(), Arc::clone(table)));
        self.tables.clear();
        if keep_warm {
            if let Some(warm) = most_recent {
                self.warm = Some(warm);
            }
        } else {
            self.warm = None;
        }
    }

    pub(crate) fn cached_table_count(&self) -> usize {
        self.tables.len() + usize::from(self.warm.is_some())
    }
}

/// Open query session on a [`DiskIndex`]. Caches stay populated until the
/// last session is dropped.
#[must_use = "caches are released as soon as the session is dropped"]
pub struct QuerySession<'a> {
    index: &'a DiskIndex,
}

impl<'a> QuerySession<'a> {
    pub(crate) fn new(index: &'a DiskIndex) -> Self {
        index.lock_cache().begin();
        Self { index }
    }
}

impl Drop for QuerySession<'_> {
    fn drop(&mut self) {
        self.index.end_session();
    }
}
