use crate::error::{IndexError, Result};
use crate::index::disk::DiskIndex;
use crate::index::types::DocNumber;
use roaring::RoaringBitmap;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Answer for one matched word: document numbers from the on-disk snapshot
/// plus document names contributed by the in-memory delta.
///
/// Numbers are only meaningful for the snapshot that produced them; results
/// returned by [`Index::query`](crate::index::Index::query) keep a handle on
/// that snapshot so they resolve correctly even after a later merge.
#[derive(Clone)]
pub struct EntryResult {
    word: String,
    doc_numbers: RoaringBitmap,
    doc_names: BTreeSet<String>,
    snapshot: Option<Arc<DiskIndex>>,
}

impl EntryResult {
    pub fn new(word: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            doc_numbers: RoaringBitmap::new(),
            doc_names: BTreeSet::new(),
            snapshot: None,
        }
    }

    pub fn word(&self) -> &str {
        &self.word
    }

    pub fn add_document_number(&mut self, number: DocNumber) {
        self.doc_numbers.insert(number);
    }

    pub fn add_document_numbers(&mut self, numbers: &[DocNumber]) {
        self.doc_numbers.extend(numbers.iter().copied());
    }

    pub fn add_document_name(&mut self, name: impl Into<String>) {
        self.doc_names.insert(name.into());
    }

    /// Drop numbers of documents whose on-disk copy is stale
    pub fn remove_document_numbers(&mut self, excluded: &RoaringBitmap) {
        self.doc_numbers -= excluded;
    }

    /// True when no document is left, whether nothing matched or every match
    /// was filtered out
    pub fn is_empty(&self) -> bool {
        self.doc_numbers.is_empty() && self.doc_names.is_empty()
    }

    pub fn document_numbers(&self) -> impl Iterator<Item = DocNumber> + '_ {
        self.doc_numbers.iter()
    }

    /// Names added directly, without resolving any document number
    pub fn known_document_names(&self) -> &BTreeSet<String> {
        &self.doc_names
    }

    /// Fold another result for the same word into this one
    pub fn merge(&mut self, other: EntryResult) {
        self.doc_numbers |= other.doc_numbers;
        self.doc_names.extend(other.doc_names);
        if self.snapshot.is_none() {
            self.snapshot = other.snapshot;
        }
    }

    pub(crate) fn bind_snapshot(&mut self, snapshot: Arc<DiskIndex>) {
        if !self.doc_numbers.is_empty() {
            self.snapshot = Some(snapshot);
        }
    }

    /// All matching document names, sorted, resolving numbers through the
    /// snapshot the result was produced from
    pub fn document_names(&self) -> Result<Vec<String>> {
        if self.doc_numbers.is_empty() {
            return Ok(self.doc_names.iter().cloned().collect());
        }
        match &self.snapshot {
            Some(snapshot) => self.document_names_in(snapshot),
            None => Err(IndexError::format(format!(
                "result for {:?} holds document numbers but no owning index",
                self.word
            ))),
        }
    }

    /// Like [`document_names`](Self::document_names) against an explicit snapshot
    pub fn document_names_in(&self, disk: &DiskIndex) -> Result<Vec<String>> {
        let numbers: Vec<DocNumber> = self.doc_numbers.iter().collect();
        let mut names: BTreeSet<String> =
            disk.read_document_names(&numbers)?.into_iter().collect();
        names.extend(self.doc_names.iter().cloned());
        Ok(names.into_iter().collect())
    }
}

impl fmt::Debug for EntryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryResult")
            .field("word", &self.word)
            .field("doc_numbers", &self.doc_numbers.iter().collect::<Vec<_>>())
            .field("doc_names", &self.doc_names)
            .finish()
    }
}
