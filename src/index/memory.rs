//! In-memory write buffer holding every change since the last merge.

use crate::index::entry_result::EntryResult;
use crate::query::matcher::{MatchRule, WordMatcher};
use ahash::RandomState;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

/// Words of one document, by category
pub type DocumentWords = FxHashMap<Arc<str>, FxHashSet<Arc<str>>>;

/// Pending state of one document
#[derive(Debug, Clone, Copy)]
pub enum DeltaEntry<'a> {
    /// Removed, or re-supplied without any word
    Removed,
    /// Added or fully re-supplied
    Live(&'a DocumentWords),
}

/// Buffered additions, changes and removals keyed by document name.
/// `None` marks a removed document.
pub struct MemoryIndex {
    docs: FxHashMap<String, Option<DocumentWords>>,
    /// Every category and word string is stored once
    interned: HashSet<Arc<str>, RandomState>,
    merge_threshold: usize,
}

impl MemoryIndex {
    pub fn new(merge_threshold: usize) -> Self {
        Self {
            docs: FxHashMap::default(),
            interned: HashSet::with_hasher(RandomState::new()),
            merge_threshold,
        }
    }

    fn intern(&mut self, value: &str) -> Arc<str> {
        if let Some(existing) = self.interned.get(value) {
            return Arc::clone(existing);
        }
        let value: Arc<str> = Arc::from(value);
        self.interned.insert(Arc::clone(&value));
        value
    }

    /// Record that `document_name` contains `key` in `category`
    pub fn add_index_entry(&mut self, category: &str, key: &str, document_name: &str) {
        let category = self.intern(category);
        let key = self.intern(key);

        let slot = match self.docs.get_mut(document_name) {
            Some(slot) => slot,
            None => self.docs.entry(document_name.to_string()).or_default(),
        };
        slot.get_or_insert_with(DocumentWords::default)
            .entry(category)
            .or_default()
            .insert(key);
    }

    /// Mark a document as gone, dropping any words buffered for it
    pub fn remove(&mut self, document_name: &str) {
        match self.docs.get_mut(document_name) {
            Some(slot) => *slot = None,
            None => {
                self.docs.insert(document_name.to_string(), None);
            }
        }
    }

    /// Pending state of a document, `None` if the delta does not mention it
    pub fn entry(&self, document_name: &str) -> Option<DeltaEntry<'_>> {
        self.docs.get(document_name).map(|slot| match slot {
            Some(words) if !words.is_empty() => DeltaEntry::Live(words),
            _ => DeltaEntry::Removed,
        })
    }

    /// Every document mentioned by the delta. Their on-disk postings are stale.
    pub fn document_names(&self) -> impl Iterator<Item = &str> {
        self.docs.keys().map(String::as_str)
    }

    /// Documents with live content
    pub fn live_documents(&self) -> impl Iterator<Item = (&str, &DocumentWords)> {
        self.docs.iter().filter_map(|(name, slot)| match slot {
            Some(words) if !words.is_empty() => Some((name.as_str(), words)),
            _ => None,
        })
    }

    /// Categories with at least one buffered word
    pub fn categories(&self) -> BTreeSet<&str> {
        self.live_documents()
            .flat_map(|(_, words)| words.keys().map(|c| &**c))
            .collect()
    }

    /// Add matches over the delta to `results`, keyed by word
    pub fn add_query_results(
        &self,
        categories: &[&str],
        key: Option<&str>,
        rule: MatchRule,
        matcher: &WordMatcher,
        results: &mut FxHashMap<String, EntryResult>,
    ) {
        for (document_name, words) in self.live_documents() {
            for &category in categories {
                let Some(set) = words.get(category) else {
                    continue;
                };

                match key {
                    Some(key) if rule.is_direct_lookup() => {
                        if set.contains(key) {
                            add_name(results, key, document_name);
                        }
                    }
                    _ => {
                        for word in set {
                            if matcher.matches(word) {
                                add_name(results, word, document_name);
                            }
                        }
                    }
                }
            }
        }
    }

    /// Apply the delta to a set of document names collected from disk: live
    /// names starting with `prefix` are added, removed names are dropped
    pub fn add_document_names(&self, prefix: Option<&str>, results: &mut BTreeSet<String>) {
        for (name, slot) in &self.docs {
            if !prefix.is_none_or(|p| name.starts_with(p)) {
                continue;
            }
            match slot {
                Some(words) if !words.is_empty() => {
                    results.insert(name.clone());
                }
                _ => {
                    results.remove(name);
                }
            }
        }
    }

    /// Number of distinct documents touched since the last merge
    pub fn touched_documents(&self) -> usize {
        self.docs.len()
    }

    pub fn should_merge(&self) -> bool {
        self.docs.len() >= self.merge_threshold
    }

    pub fn has_changed(&self) -> bool {
        !self.docs.is_empty()
    }

    pub fn clear(&mut self) {
        self.docs.clear();
        self.interned.clear();
    }
}

fn add_name(results: &mut FxHashMap<String, EntryResult>, word: &str, document_name: &str) {
    match results.get_mut(word) {
        Some(result) => result.add_document_name(document_name),
        None => {
            let mut result = EntryResult::new(word);
            result.add_document_name(document_name);
            results.insert(word.to_string(), result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(
        index: &MemoryIndex,
        categories: &[&str],
        key: Option<&str>,
        rule: MatchRule,
    ) -> Vec<(String, Vec<String>)> {
        let matcher = WordMatcher::new(key, rule).unwrap();
        let mut results = FxHashMap::default();
        index.add_query_results(categories, key, rule, &matcher, &mut results);
        let mut out: Vec<_> = results
            .into_values()
            .map(|r| {
                let names = r.known_document_names().iter().cloned().collect();
                (r.word().to_string(), names)
            })
            .collect();
        out.sort();
        out
    }

    #[test]
    fn test_add_and_query() {
        let mut index = MemoryIndex::new(100);
        index.add_index_entry("decl", "Foo", "A.java");
        index.add_index_entry("ref", "Foo", "B.java");
        index.add_index_entry("ref", "Bar", "B.java");

        let hits = query(&index, &["decl", "ref"], Some("Foo"), MatchRule::exact());
        assert_eq!(
            hits,
            vec![(
                "Foo".to_string(),
                vec!["A.java".to_string(), "B.java".to_string()]
            )]
        );

        let hits = query(&index, &["ref"], None, MatchRule::exact());
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_words_are_interned() {
        let mut index = MemoryIndex::new(100);
        index.add_index_entry("ref", "Shared", "A.java");
        index.add_index_entry("ref", "Shared", "B.java");

        let first_word = |doc: &str| {
            let words = index.docs[doc].as_ref().unwrap();
            words["ref"].iter().next().unwrap().clone()
        };
        let a = first_word("A.java");
        let b = first_word("B.java");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_remove_tombstones_document() {
        let mut index = MemoryIndex::new(100);
        index.add_index_entry("decl", "Foo", "A.java");
        index.remove("A.java");
        index.remove("Gone.java");

        assert!(matches!(index.entry("A.java"), Some(DeltaEntry::Removed)));
        assert!(matches!(index.entry("Gone.java"), Some(DeltaEntry::Removed)));
        assert!(index.entry("Other.java").is_none());
        assert!(query(&index, &["decl"], Some("Foo"), MatchRule::exact()).is_empty());
        assert!(index.has_changed());
    }

    #[test]
    fn test_add_after_remove_revives_document() {
        let mut index = MemoryIndex::new(100);
        index.remove("A.java");
        index.add_index_entry("decl", "Foo", "A.java");
        assert!(matches!(index.entry("A.java"), Some(DeltaEntry::Live(_))));
    }

    #[test]
    fn test_document_names_prefix() {
        let mut index = MemoryIndex::new(100);
        index.add_index_entry("decl", "Foo", "src/A.java");
        index.add_index_entry("decl", "Foo", "test/B.java");
        index.remove("src/Old.java");

        let mut names: BTreeSet<String> =
            ["src/Old.java".to_string()].into_iter().collect();
        index.add_document_names(Some("src/"), &mut names);
        assert_eq!(names.into_iter().collect::<Vec<_>>(), vec!["src/A.java"]);
    }

    #[test]
    fn test_merge_threshold() {
        let mut index = MemoryIndex::new(2);
        assert!(!index.should_merge());
        index.add_index_entry("ref", "x", "a");
        index.add_index_entry("ref", "y", "a");
        assert!(!index.should_merge());
        index.remove("b");
        assert!(index.should_merge());
        index.clear();
        assert!(!index.has_changed());
    }

    #[test]
    fn test_categories_only_from_live_documents() {
        let mut index = MemoryIndex::new(100);
        index.add_index_entry("decl", "Foo", "A.java");
        index.add_index_entry("ref", "Foo", "B.java");
        index.remove("B.java");
        assert_eq!(index.categories().into_iter().collect::<Vec<_>>(), vec!["decl"]);
    }
}
