//! Folding buffered changes into a new snapshot.

use super::table::read_category_table;
use super::writer::{self, IndexFileWriter};
use super::DiskIndex;
use crate::error::{IndexError, Result};
use crate::index::memory::{DeltaEntry, MemoryIndex};
use crate::index::types::DocNumber;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

/// What the delta means for a document already on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Unchanged,
    Deleted,
    /// Content re-supplied by the delta; old postings are void
    Reindexed,
}

#[derive(Debug, Default)]
struct MergeSummary {
    documents: usize,
    categories: usize,
    deleted: usize,
    reindexed: usize,
}

impl DiskIndex {
    /// Write a snapshot of this index with `memory` applied, move it over
    /// this index's file and open it.
    ///
    /// `self` is never modified. On failure the error is wrapped in
    /// [`IndexError::Merge`] and the previous file stays in place. If the
    /// previous file was already removed while replacing it, the new
    /// snapshot is left at its temporary path instead of being deleted.
    pub fn merge_with(&self, memory: &MemoryIndex) -> Result<DiskIndex> {
        let started = Instant::now();
        let temp = writer::temp_path_for(&self.path);

        let written = self
            .write_merged(memory, &temp)
            .and_then(|summary| {
                writer::replace_file(&temp, &self.path)?;
                Ok(summary)
            });

        let summary = match written {
            Ok(summary) => summary,
            Err(error) => {
                writer::discard_temp(&temp, &self.path);
                warn!(path = %self.path.display(), %error, "merge aborted");
                return Err(self.merge_error(error));
            }
        };

        let merged = DiskIndex::open(&self.path, self.config.clone())
            .map_err(|e| self.merge_error(e))?;

        info!(
            path = %self.path.display(),
            documents = summary.documents,
            categories = summary.categories,
            deleted = summary.deleted,
            reindexed = summary.reindexed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "merged index"
        );
        Ok(merged)
    }

    fn merge_error(&self, source: IndexError) -> IndexError {
        IndexError::Merge {
            path: self.path.clone(),
            source: Box::new(source),
        }
    }

    fn write_merged(&self, memory: &MemoryIndex, temp: &Path) -> Result<MergeSummary> {
        let old_names = self.read_all_document_names()?;
        let mut summary = MergeSummary::default();

        let statuses: Vec<Status> = old_names
            .iter()
            .map(|name| match memory.entry(name) {
                None => Status::Unchanged,
                Some(DeltaEntry::Removed) => Status::Deleted,
                Some(DeltaEntry::Live(_)) => Status::Reindexed,
            })
            .collect();
        summary.deleted = statuses.iter().filter(|s| **s == Status::Deleted).count();
        summary.reindexed = statuses.iter().filter(|s| **s == Status::Reindexed).count();

        let mut new_names: Vec<String> = old_names
            .iter()
            .zip(&statuses)
            .filter(|(_, status)| **status != Status::Deleted)
            .map(|(name, _)| name.clone())
            .collect();
        new_names.extend(memory.live_documents().map(|(name, _)| name.to_string()));
        new_names.sort_unstable();
        new_names.dedup();
        summary.documents = new_names.len();

        let mut out = IndexFileWriter::create(temp)?;
        if new_names.is_empty() {
            out.finish(self.config.sync_on_merge)?;
            return Ok(summary);
        }
        out.write_document_names(&new_names)?;

        let number_of = |name: &str| -> Result<DocNumber> {
            new_names
                .binary_search_by(|n| n.as_str().cmp(name))
                .map(|i| i as DocNumber)
                .map_err(|_| {
                    IndexError::format(format!(
                        "document {:?} missing from the merged name table",
                        name
                    ))
                })
        };

        // Old number -> new number, only for documents whose postings survive
        let remap = old_names
            .iter()
            .zip(&statuses)
            .map(|(name, status)| match status {
                Status::Unchanged => number_of(name).map(Some),
                Status::Deleted | Status::Reindexed => Ok(None),
            })
            .collect::<Result<Vec<Option<DocNumber>>>>()?;

        let mut categories: BTreeSet<&str> = self.categories().collect();
        categories.extend(memory.categories());

        for &category in &categories {
            let mut words: BTreeMap<String, Vec<DocNumber>> = BTreeMap::new();

            if let Some(header) = &self.header {
                if let Some(&location) = header.categories.get(category) {
                    let table = read_category_table(&self.data, header, location, true)?;
                    for (word, postings) in table.iter() {
                        let remapped: Vec<DocNumber> = self
                            .resolve(postings)?
                            .iter()
                            .filter_map(|&old| remap.get(old as usize).copied().flatten())
                            .collect();
                        if !remapped.is_empty() {
                            words.insert(word.to_string(), remapped);
                        }
                    }
                }
            }

            for (name, document_words) in memory.live_documents() {
                let Some(delta_words) = document_words.get(category) else {
                    continue;
                };
                let number = number_of(name)?;
                for word in delta_words {
                    words.entry(word.to_string()).or_default().push(number);
                }
            }

            for numbers in words.values_mut() {
                numbers.sort_unstable();
                numbers.dedup();
            }
            if !words.is_empty() {
                summary.categories += 1;
            }
            out.write_category(category, &words)?;
        }

        out.finish(self.config.sync_on_merge)?;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::types::IndexConfig;
    use std::fs;

    fn config() -> IndexConfig {
        IndexConfig {
            sync_on_merge: false,
            ..IndexConfig::default()
        }
    }

    fn postings(index: &DiskIndex, category: &str, word: &str) -> Vec<String> {
        let Some(table) = index.read_category_table(category, true).unwrap() else {
            return Vec::new();
        };
        let Some(postings) = table.get(word) else {
            return Vec::new();
        };
        let numbers = index.resolve(postings).unwrap();
        index.read_document_names(&numbers).unwrap()
    }

    #[test]
    fn test_merge_renumbers_by_sort_order() {
        let dir = tempfile::tempdir().unwrap();
        let index = DiskIndex::create(dir.path().join("m.index"), config()).unwrap();

        let mut memory = MemoryIndex::new(100);
        memory.add_index_entry("decl", "Foo", "b");
        memory.add_index_entry("decl", "Foo", "d");
        let index = index.merge_with(&memory).unwrap();
        assert_eq!(index.document_number("d").unwrap(), Some(1));

        let mut memory = MemoryIndex::new(100);
        memory.add_index_entry("decl", "Foo", "a");
        memory.add_index_entry("decl", "Foo", "c");
        let index = index.merge_with(&memory).unwrap();

        assert_eq!(index.read_all_document_names().unwrap(), vec!["a", "b", "c", "d"]);
        assert_eq!(postings(&index, "decl", "Foo"), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_reindexed_document_loses_old_words() {
        let dir = tempfile::tempdir().unwrap();
        let index = DiskIndex::create(dir.path().join("m.index"), config()).unwrap();

        let mut memory = MemoryIndex::new(100);
        memory.add_index_entry("decl", "Old", "A.java");
        memory.add_index_entry("decl", "Keep", "B.java");
        let index = index.merge_with(&memory).unwrap();

        let mut memory = MemoryIndex::new(100);
        memory.add_index_entry("decl", "New", "A.java");
        let index = index.merge_with(&memory).unwrap();

        assert!(postings(&index, "decl", "Old").is_empty());
        assert_eq!(postings(&index, "decl", "New"), vec!["A.java"]);
        assert_eq!(postings(&index, "decl", "Keep"), vec!["B.java"]);
    }

    #[test]
    fn test_deleting_everything_leaves_empty_index() {
        let dir = tempfile::tempdir().unwrap();
        let index = DiskIndex::create(dir.path().join("m.index"), config()).unwrap();

        let mut memory = MemoryIndex::new(100);
        memory.add_index_entry("ref", "x", "only");
        let index = index.merge_with(&memory).unwrap();

        let mut memory = MemoryIndex::new(100);
        memory.remove("only");
        let index = index.merge_with(&memory).unwrap();
        assert!(index.is_empty());
        assert!(index.header().is_none());
    }

    #[test]
    fn test_category_without_words_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let index = DiskIndex::create(dir.path().join("m.index"), config()).unwrap();

        let mut memory = MemoryIndex::new(100);
        memory.add_index_entry("decl", "Foo", "A.java");
        memory.add_index_entry("ref", "Bar", "B.java");
        let index = index.merge_with(&memory).unwrap();

        let mut memory = MemoryIndex::new(100);
        memory.remove("B.java");
        let index = index.merge_with(&memory).unwrap();
        assert_eq!(index.categories().collect::<Vec<_>>(), vec!["decl"]);
    }

    #[test]
    fn test_failed_merge_keeps_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.index");
        let index = DiskIndex::create(&path, config()).unwrap();

        let mut memory = MemoryIndex::new(100);
        memory.add_index_entry("decl", "Foo", "A.java");
        let index = index.merge_with(&memory).unwrap();
        let before = fs::read(&path).unwrap();

        // A directory squatting on the temp path makes the write fail
        fs::create_dir(writer::temp_path_for(&path)).unwrap();
        let mut memory = MemoryIndex::new(100);
        memory.remove("A.java");
        let err = index.merge_with(&memory).unwrap_err();

        assert!(matches!(err, IndexError::Merge { .. }));
        assert!(err.is_io_error());
        assert_eq!(fs::read(&path).unwrap(), before);
        assert_eq!(postings(&index, "decl", "Foo"), vec!["A.java"]);
    }
}
