use crate::error::Result;
use crate::index::disk::{DiskIndex, IndexStats, QuerySession};
use crate::index::entry_result::EntryResult;
use crate::index::memory::MemoryIndex;
use crate::index::types::IndexConfig;
use crate::indexer::{Document, Indexer, IndexerOutput};
use crate::query::matcher::{MatchRule, WordMatcher};
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// A symbol index: the last merged snapshot on disk plus every change made
/// since, buffered in memory.
///
/// Writes only touch the buffer. Queries see both tiers, with the buffer
/// taking precedence for any document it mentions. Buffered changes are
/// folded into a new snapshot by [`save`](Self::save), or automatically once
/// enough documents have been touched.
pub struct Index {
    disk: Arc<DiskIndex>,
    memory: MemoryIndex,
    config: IndexConfig,
}

impl std::fmt::Debug for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Index")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Index {
    pub fn open(path: impl AsRef<Path>, config: IndexConfig) -> Result<Self> {
        let disk = DiskIndex::open(path, config.clone())?;
        Ok(Self::with_disk(disk, config))
    }

    /// Start a new, empty index at `path`, replacing any existing file
    pub fn create(path: impl AsRef<Path>, config: IndexConfig) -> Result<Self> {
        let disk = DiskIndex::create(path, config.clone())?;
        Ok(Self::with_disk(disk, config))
    }

    pub fn open_or_create(path: impl AsRef<Path>, config: IndexConfig) -> Result<Self> {
        let disk = DiskIndex::open_or_create(path, config.clone())?;
        Ok(Self::with_disk(disk, config))
    }

    fn with_disk(disk: DiskIndex, config: IndexConfig) -> Self {
        Self {
            disk: Arc::new(disk),
            memory: MemoryIndex::new(config.merge_threshold),
            config,
        }
    }

    pub fn path(&self) -> &Path {
        self.disk.path()
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// The current on-disk snapshot. It stays usable after later merges.
    pub fn snapshot(&self) -> Arc<DiskIndex> {
        Arc::clone(&self.disk)
    }

    pub fn memory(&self) -> &MemoryIndex {
        &self.memory
    }

    /// Record one `(category, word)` pair for a document. Buffered only.
    pub fn add_index_entry(&mut self, category: &str, word: &str, document_name: &str) {
        self.memory.add_index_entry(category, word, document_name);
    }

    /// Mark a document as gone. Buffered only.
    pub fn remove(&mut self, document_name: &str) {
        self.memory.remove(document_name);
    }

    /// Re-index one document, replacing whatever was recorded for it before
    pub fn add(&mut self, document: &dyn Document, indexer: &dyn Indexer) -> Result<()> {
        let mut output = IndexerOutput::new();
        indexer.index(document, &mut output)?;
        self.add_output(document.name(), &output)?;
        Ok(())
    }

    /// Replace a document's words with an already extracted `output`.
    /// Returns true if the call triggered a merge.
    pub fn add_output(&mut self, document_name: &str, output: &IndexerOutput) -> Result<bool> {
        self.memory.remove(document_name);
        for (category, word) in output.entries() {
            self.memory.add_index_entry(category, word, document_name);
        }
        self.merge_if_needed()
    }

    /// Merge if the buffer has grown past the configured threshold
    pub fn merge_if_needed(&mut self) -> Result<bool> {
        if !self.memory.should_merge() {
            return Ok(false);
        }
        debug!(
            touched = self.memory.touched_documents(),
            threshold = self.config.merge_threshold,
            "merge threshold reached"
        );
        self.save()?;
        Ok(true)
    }

    /// Words in `categories` matching `key` under `rule`, sorted by word.
    /// A `None` key returns every word.
    pub fn query(
        &self,
        categories: &[&str],
        key: Option<&str>,
        rule: MatchRule,
    ) -> Result<Vec<EntryResult>> {
        let matcher = WordMatcher::new(key, rule)?;
        let _session = self.disk.start_query();

        let excluded = self.disk.excluded_numbers(self.memory.document_names())?;
        let mut results = FxHashMap::default();
        self.disk
            .add_query_results(categories, key, rule, &matcher, &excluded, &mut results)?;
        for result in results.values_mut() {
            result.bind_snapshot(Arc::clone(&self.disk));
        }
        self.memory
            .add_query_results(categories, key, rule, &matcher, &mut results);

        let mut results: Vec<EntryResult> = results.into_values().collect();
        results.sort_by(|a, b| a.word().cmp(b.word()));
        Ok(results)
    }

    /// Names of indexed documents, optionally restricted to a prefix
    pub fn query_document_names(&self, prefix: Option<&str>) -> Result<Vec<String>> {
        let _session = self.disk.start_query();
        let mut names = BTreeSet::new();
        self.disk.add_document_names(prefix, &mut names)?;
        self.memory.add_document_names(prefix, &mut names);
        Ok(names.into_iter().collect())
    }

    /// Keep the snapshot's caches alive across several queries
    pub fn start_query(&self) -> QuerySession<'_> {
        self.disk.start_query()
    }

    /// Fold every buffered change into a new snapshot. Nothing is written
    /// when the buffer is empty. On failure the buffer is kept.
    pub fn save(&mut self) -> Result<()> {
        if !self.memory.has_changed() {
            return Ok(());
        }
        let merged = self.disk.merge_with(&self.memory)?;
        self.disk = Arc::new(merged);
        self.memory.clear();
        Ok(())
    }

    pub fn has_changed(&self) -> bool {
        self.memory.has_changed()
    }

    /// Drop buffered changes and start over with an empty file
    pub fn reset(&mut self) -> Result<()> {
        let path = self.disk.path().to_path_buf();
        self.memory.clear();
        self.disk = Arc::new(DiskIndex::create(&path, self.config.clone())?);
        Ok(())
    }

    /// Statistics of the on-disk snapshot; buffered changes are not counted
    pub fn stats(&self) -> Result<IndexStats> {
        let _session = self.disk.start_query();
        self.disk.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::{InMemoryDocument, SourceIndexer, DECLARATIONS, REFERENCES};

    fn config() -> IndexConfig {
        IndexConfig {
            sync_on_merge: false,
            ..IndexConfig::default()
        }
    }

    fn names_for(index: &Index, categories: &[&str], key: &str) -> Vec<String> {
        index
            .query(categories, Some(key), MatchRule::exact())
            .unwrap()
            .into_iter()
            .flat_map(|r| r.document_names().unwrap())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    #[test]
    fn test_add_replaces_previous_words() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = Index::create(dir.path().join("i.index"), config()).unwrap();
        let indexer = SourceIndexer::default();

        index
            .add(&InMemoryDocument::new("a.rs", "fn first() {}"), &indexer)
            .unwrap();
        index.save().unwrap();
        index
            .add(&InMemoryDocument::new("a.rs", "fn second() {}"), &indexer)
            .unwrap();

        assert!(names_for(&index, &[DECLARATIONS], "first").is_empty());
        assert_eq!(names_for(&index, &[DECLARATIONS], "second"), vec!["a.rs"]);
    }

    #[test]
    fn test_auto_merge_at_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let config = IndexConfig {
            merge_threshold: 2,
            ..config()
        };
        let mut index = Index::create(dir.path().join("i.index"), config).unwrap();

        let mut output = IndexerOutput::new();
        output.add_entry(REFERENCES, "shared");
        assert!(!index.add_output("a", &output).unwrap());
        assert!(index.add_output("b", &output).unwrap());
        assert!(!index.has_changed());
        assert_eq!(index.snapshot().document_count(), 2);
    }

    #[test]
    fn test_word_in_both_tiers_is_merged() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = Index::create(dir.path().join("i.index"), config()).unwrap();
        index.add_index_entry("ref", "Foo", "disk.rs");
        index.save().unwrap();
        index.add_index_entry("ref", "Foo", "memory.rs");

        let results = index.query(&["ref"], Some("Foo"), MatchRule::exact()).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document_names().unwrap(), vec!["disk.rs", "memory.rs"]);
    }

    #[test]
    fn test_query_document_names() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = Index::create(dir.path().join("i.index"), config()).unwrap();
        index.add_index_entry("ref", "x", "src/a.rs");
        index.add_index_entry("ref", "x", "src/b.rs");
        index.add_index_entry("ref", "x", "tests/c.rs");
        index.save().unwrap();

        index.remove("src/a.rs");
        index.add_index_entry("ref", "y", "src/d.rs");

        assert_eq!(
            index.query_document_names(Some("src/")).unwrap(),
            vec!["src/b.rs", "src/d.rs"]
        );
        assert_eq!(index.query_document_names(None).unwrap().len(), 3);
    }

    #[test]
    fn test_reset() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = Index::create(dir.path().join("i.index"), config()).unwrap();
        index.add_index_entry("ref", "x", "a");
        index.save().unwrap();
        index.add_index_entry("ref", "y", "b");

        index.reset().unwrap();
        assert!(!index.has_changed());
        assert!(index.query(&["ref"], None, MatchRule::exact()).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let index = Index::create(dir.path().join("i.index"), config()).unwrap();
        let err = index
            .query(&["ref"], Some("(unclosed"), MatchRule::regex())
            .unwrap_err();
        assert!(matches!(err, crate::error::IndexError::Pattern { .. }));
    }

    #[test]
    fn test_failed_save_keeps_buffered_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kept.index");
        let mut index = Index::create(&path, config()).unwrap();
        index.add_index_entry(DECLARATIONS, "Stored", "a.rs");
        index.save().unwrap();

        index.add_index_entry(DECLARATIONS, "Pending", "b.rs");
        index.remove("a.rs");
        // A directory where the temp file should go makes the merge fail
        std::fs::create_dir(crate::index::disk::writer::temp_path_for(&path)).unwrap();

        let err = index.save().unwrap_err();
        assert!(matches!(err, crate::error::IndexError::Merge { .. }));
        assert!(index.has_changed());
        assert_eq!(names_for(&index, &[DECLARATIONS], "Pending"), vec!["b.rs"]);
        assert!(names_for(&index, &[DECLARATIONS], "Stored").is_empty());
        assert_eq!(index.snapshot().read_all_document_names().unwrap(), vec!["a.rs"]);

        std::fs::remove_dir(crate::index::disk::writer::temp_path_for(&path)).unwrap();
        index.save().unwrap();
        assert!(!index.has_changed());
        assert_eq!(index.query_document_names(None).unwrap(), vec!["b.rs"]);
    }
}
