//! The persisted, immutable index snapshot.
//!
//! A [`DiskIndex`] maps its file for its whole lifetime and parses only the
//! header up front. Name chunks and category tables are decoded on demand and
//! cached while a [`QuerySession`] is open. A merge never touches the mapped
//! file: it writes a new one, renames it over the old path and opens it, so
//! snapshots handed out earlier keep answering from the file they mapped.

mod cache;
pub mod format;
mod merge;
pub mod names;
pub mod table;
pub(crate) mod writer;

pub use cache::QuerySession;
pub use format::{read_header, CategoryLocation, HeaderInfo};
pub use table::{CategoryTable, Postings};

use crate::error::{IndexError, Result};
use crate::index::entry_result::EntryResult;
use crate::index::types::{DocNumber, IndexConfig, CHUNK_SIZE};
use crate::query::matcher::{MatchRule, WordMatcher};
use crate::utils::encoding::ByteReader;
use cache::CacheState;
use memmap2::Mmap;
use roaring::RoaringBitmap;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::debug;

pub struct DiskIndex {
    path: PathBuf,
    data: Mmap,
    /// `None` for an index without documents
    header: Option<HeaderInfo>,
    config: IndexConfig,
    cache: Mutex<CacheState>,
}

/// Size and shape of one snapshot
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub path: PathBuf,
    pub document_count: usize,
    pub reference_width: u8,
    pub chunk_count: usize,
    pub file_size: u64,
    pub categories: Vec<CategoryStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryStats {
    pub name: String,
    pub words: usize,
    pub bytes: u32,
}

impl DiskIndex {
    /// Open an existing index file, reading only its header
    pub fn open(path: impl AsRef<Path>, config: IndexConfig) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        // Snapshot files are never written in place once renamed into position
        let data = unsafe { Mmap::map(&file)? };
        let header = read_header(&data)?;

        debug!(
            path = %path.display(),
            documents = header.as_ref().map_or(0, HeaderInfo::document_count),
            categories = header.as_ref().map_or(0, |h| h.categories.len()),
            "opened index"
        );

        Ok(Self {
            path: path.to_path_buf(),
            data,
            header,
            cache: Mutex::new(CacheState::new(config.table_cache_size)),
            config,
        })
    }

    /// Write a brand-new empty index at `path`, replacing any file there
    pub fn create(path: impl AsRef<Path>, config: IndexConfig) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        writer::write_empty(path, config.sync_on_merge)?;
        Self::open(path, config)
    }

    pub fn open_or_create(path: impl AsRef<Path>, config: IndexConfig) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::open(path, config)
        } else {
            Self::create(path, config)
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn header(&self) -> Option<&HeaderInfo> {
        self.header.as_ref()
    }

    pub fn document_count(&self) -> usize {
        self.header.as_ref().map_or(0, HeaderInfo::document_count)
    }

    pub fn is_empty(&self) -> bool {
        self.document_count() == 0
    }

    /// Width in bytes of a document number in this file
    pub fn reference_width(&self) -> u8 {
        self.header.as_ref().map_or(1, |h| h.reference_width)
    }

    /// Category names present in the file, sorted
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.header
            .iter()
            .flat_map(|h| h.categories.keys().map(String::as_str))
    }

    /// Begin a query session. Decoded chunks and tables stay cached until the
    /// last open session is dropped.
    pub fn start_query(&self) -> QuerySession<'_> {
        QuerySession::new(self)
    }

    /// Number of query sessions currently open
    pub fn open_sessions(&self) -> usize {
        self.lock_cache().sessions()
    }

    /// Category tables still held by the cache
    pub fn cached_tables(&self) -> usize {
        self.lock_cache().cached_table_count()
    }

    pub(crate) fn lock_cache(&self) -> MutexGuard<'_, CacheState> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn end_session(&self) {
        let mut cache = self.lock_cache();
        if cache.end() {
            cache.release(self.config.keep_warm_table);
            debug!(
                path = %self.path.display(),
                warm_tables = cache.cached_table_count(),
                "released query caches"
            );
        }
    }

    /// Decode one name chunk
    pub fn read_chunk(&self, chunk: usize) -> Result<Arc<Vec<String>>> {
        let header = self
            .header
            .as_ref()
            .filter(|h| chunk < h.number_of_chunks)
            .ok_or_else(|| IndexError::format(format!("no name chunk {}", chunk)))?;

        if let Some(names) = self.lock_cache().chunk(chunk) {
            return Ok(names);
        }

        let mut reader = ByteReader::at(&self.data, header.chunk_offsets[chunk] as usize)?;
        let names = Arc::new(names::read_chunk(&mut reader, header.chunk_len(chunk))?);
        self.lock_cache().store_chunk(chunk, Arc::clone(&names));
        Ok(names)
    }

    /// Every document name in number order
    pub fn read_all_document_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::with_capacity(self.document_count());
        let chunks = self.header.as_ref().map_or(0, |h| h.number_of_chunks);
        for chunk in 0..chunks {
            names.extend(self.read_chunk(chunk)?.iter().cloned());
        }
        Ok(names)
    }

    pub fn read_document_name(&self, number: DocNumber) -> Result<String> {
        let names = self.read_chunk(number as usize / CHUNK_SIZE)?;
        names
            .get(number as usize % CHUNK_SIZE)
            .cloned()
            .ok_or_else(|| missing_number(number))
    }

    /// Resolve document numbers to names, decoding each chunk once for runs
    /// of numbers that fall into the same chunk
    pub fn read_document_names(&self, numbers: &[DocNumber]) -> Result<Vec<String>> {
        let mut resolved = Vec::with_capacity(numbers.len());
        let mut current: Option<(usize, Arc<Vec<String>>)> = None;

        for &number in numbers {
            let chunk = number as usize / CHUNK_SIZE;
            let names = match current.take() {
                Some((index, names)) if index == chunk => names,
                _ => self.read_chunk(chunk)?,
            };
            let name = names
                .get(number as usize % CHUNK_SIZE)
                .ok_or_else(|| missing_number(number))?;
            resolved.push(name.clone());
            current = Some((chunk, names));
        }

        Ok(resolved)
    }

    /// Literal first name of a chunk, read without decoding the rest
    fn first_name(&self, header: &HeaderInfo, chunk: usize) -> Result<&str> {
        ByteReader::at(&self.data, header.chunk_offsets[chunk] as usize)?.read_str()
    }

    /// Number of a document in this snapshot
    pub fn document_number(&self, name: &str) -> Result<Option<DocNumber>> {
        let Some(header) = &self.header else {
            return Ok(None);
        };

        // Find the last chunk starting at or before `name`
        let (mut low, mut high) = (0, header.number_of_chunks);
        while low < high {
            let mid = (low + high) / 2;
            if self.first_name(header, mid)? <= name {
                low = mid + 1;
            } else {
                high = mid;
            }
        }
        if low == 0 {
            return Ok(None);
        }

        let chunk = low - 1;
        let names = self.read_chunk(chunk)?;
        Ok(names
            .binary_search_by(|n| n.as_str().cmp(name))
            .ok()
            .map(|i| (chunk * CHUNK_SIZE + i) as DocNumber))
    }

    /// Numbers of the named documents that exist in this snapshot
    pub fn excluded_numbers<'n>(
        &self,
        names: impl IntoIterator<Item = &'n str>,
    ) -> Result<RoaringBitmap> {
        let mut excluded = RoaringBitmap::new();
        if self.header.is_none() {
            return Ok(excluded);
        }
        for name in names {
            if let Some(number) = self.document_number(name)? {
                excluded.insert(number);
            }
        }
        Ok(excluded)
    }

    /// Load one category table. With `cache_doc_numbers` large postings
    /// arrays are read right away, otherwise they stay on disk until
    /// [`resolve`](Self::resolve)d.
    pub fn read_category_table(
        &self,
        category: &str,
        cache_doc_numbers: bool,
    ) -> Result<Option<Arc<CategoryTable>>> {
        let Some(header) = &self.header else {
            return Ok(None);
        };
        let Some(&location) = header.categories.get(category) else {
            return Ok(None);
        };

        // A cached table still holding deferred arrays does not satisfy a
        // request for resolved ones
        if let Some(table) = self.lock_cache().table(category) {
            if !cache_doc_numbers || !table.has_deferred() {
                return Ok(Some(table));
            }
        }

        let started = Instant::now();
        let table = Arc::new(table::read_category_table(
            &self.data,
            header,
            location,
            cache_doc_numbers,
        )?);
        debug!(
            category,
            words = table.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "read category table"
        );

        self.lock_cache().store_table(category, Arc::clone(&table));
        Ok(Some(table))
    }

    /// Document numbers of one posting list
    pub fn resolve<'p>(&self, postings: &'p Postings) -> Result<Cow<'p, [DocNumber]>> {
        match postings {
            Postings::Numbers(numbers) => Ok(Cow::Borrowed(numbers)),
            Postings::Deferred(offset) => {
                let header = self
                    .header
                    .as_ref()
                    .ok_or_else(|| IndexError::format("postings in an empty index"))?;
                Ok(Cow::Owned(table::read_document_numbers(
                    &self.data, header, *offset,
                )?))
            }
        }
    }

    /// Add matches from this snapshot to `results`, keyed by word. Numbers in
    /// `excluded` are stale and dropped; words left without documents are
    /// not reported.
    pub fn add_query_results(
        &self,
        categories: &[&str],
        key: Option<&str>,
        rule: MatchRule,
        matcher: &WordMatcher,
        excluded: &RoaringBitmap,
        results: &mut FxHashMap<String, EntryResult>,
    ) -> Result<()> {
        for &category in categories {
            let Some(table) = self.read_category_table(category, false)? else {
                continue;
            };

            match key {
                Some(key) if rule.is_direct_lookup() => {
                    if let Some(postings) = table.get(key) {
                        self.add_result(key, postings, excluded, results)?;
                    }
                }
                _ => {
                    for (word, postings) in table.iter() {
                        if matcher.matches(word) {
                            self.add_result(word, postings, excluded, results)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn add_result(
        &self,
        word: &str,
        postings: &Postings,
        excluded: &RoaringBitmap,
        results: &mut FxHashMap<String, EntryResult>,
    ) -> Result<()> {
        let numbers = self.resolve(postings)?;
        let mut result = EntryResult::new(word);
        result.add_document_numbers(&numbers);
        result.remove_document_numbers(excluded);
        if result.is_empty() {
            return Ok(());
        }

        match results.get_mut(word) {
            Some(existing) => existing.merge(result),
            None => {
                results.insert(word.to_string(), result);
            }
        }
        Ok(())
    }

    /// Add stored document names starting with `prefix` to `results`
    pub fn add_document_names(
        &self,
        prefix: Option<&str>,
        results: &mut BTreeSet<String>,
    ) -> Result<()> {
        let chunks = self.header.as_ref().map_or(0, |h| h.number_of_chunks);
        for chunk in 0..chunks {
            let names = self.read_chunk(chunk)?;
            results.extend(
                names
                    .iter()
                    .filter(|name| prefix.is_none_or(|p| name.starts_with(p)))
                    .cloned(),
            );
        }
        Ok(())
    }

    pub fn stats(&self) -> Result<IndexStats> {
        let mut categories = Vec::new();
        if let Some(header) = &self.header {
            for (name, location) in &header.categories {
                let words = self
                    .read_category_table(name, false)?
                    .map_or(0, |table| table.len());
                categories.push(CategoryStats {
                    name: name.clone(),
                    words,
                    bytes: location.end - location.offset,
                });
            }
        }

        Ok(IndexStats {
            path: self.path.clone(),
            document_count: self.document_count(),
            reference_width: self.reference_width(),
            chunk_count: self.header.as_ref().map_or(0, |h| h.number_of_chunks),
            file_size: self.data.len() as u64,
            categories,
        })
    }
}

fn missing_number(number: DocNumber) -> IndexError {
    IndexError::format(format!("document number {} has no name", number))
}

impl fmt::Debug for DiskIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiskIndex")
            .field("path", &self.path)
            .field("documents", &self.document_count())
            .field("categories", &self.categories().collect::<Vec<_>>())
            .finish()
    }
}
