//! The boundary between an [`Index`](crate::index::Index) and the code that
//! turns documents into `(category, word)` pairs.

use crate::error::{IndexError, Result};
use crate::utils::tokenizer::extract_symbols;
use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Category of identifiers introduced by a declaration
pub const DECLARATIONS: &str = "decl";
/// Category of every other identifier occurrence
pub const REFERENCES: &str = "ref";

/// Number of leading bytes inspected for NUL when detecting binary content
const BINARY_SNIFF_LEN: usize = 8192;

/// Default size above which files are not indexed (1 MiB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1024 * 1024;

/// Something that can be indexed
pub trait Document {
    /// Unique name of the document within its index
    fn name(&self) -> &str;

    fn contents(&self) -> Result<Cow<'_, [u8]>>;
}

/// Extracts `(category, word)` pairs from a document
pub trait Indexer {
    fn index(&self, document: &dyn Document, output: &mut IndexerOutput) -> Result<()>;
}

/// Pairs produced by an [`Indexer`] for one document
#[derive(Debug, Default, Clone)]
pub struct IndexerOutput {
    entries: Vec<(String, String)>,
}

impl IndexerOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entry(&mut self, category: &str, word: &str) {
        self.entries.push((category.to_string(), word.to_string()));
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(c, w)| (c.as_str(), w.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A file on disk, indexed under a name of the caller's choosing
#[derive(Debug, Clone)]
pub struct FileDocument {
    name: String,
    path: PathBuf,
}

impl FileDocument {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Document for FileDocument {
    fn name(&self) -> &str {
        &self.name
    }

    fn contents(&self) -> Result<Cow<'_, [u8]>> {
        fs::read(&self.path)
            .map(Cow::Owned)
            .map_err(|source| IndexError::Document {
                name: self.name.clone(),
                source,
            })
    }
}

/// Document whose contents are already in memory
#[derive(Debug, Clone)]
pub struct InMemoryDocument {
    name: String,
    contents: Vec<u8>,
}

impl InMemoryDocument {
    pub fn new(name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            contents: contents.into(),
        }
    }
}

impl Document for InMemoryDocument {
    fn name(&self) -> &str {
        &self.name
    }

    fn contents(&self) -> Result<Cow<'_, [u8]>> {
        Ok(Cow::Borrowed(&self.contents))
    }
}

/// Indexes source text: identifiers following a declaring keyword go to
/// [`DECLARATIONS`], all others to [`REFERENCES`]. Binary and oversized
/// documents produce nothing.
#[derive(Debug, Clone)]
pub struct SourceIndexer {
    pub max_file_size: u64,
}

impl Default for SourceIndexer {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl SourceIndexer {
    pub fn new(max_file_size: u64) -> Self {
        Self { max_file_size }
    }
}

impl Indexer for SourceIndexer {
    fn index(&self, document: &dyn Document, output: &mut IndexerOutput) -> Result<()> {
        let contents = document.contents()?;
        if contents.len() as u64 > self.max_file_size {
            debug!(
                document = document.name(),
                size = contents.len(),
                "skipping oversized document"
            );
            return Ok(());
        }
        if is_binary(&contents) {
            debug!(document = document.name(), "skipping binary document");
            return Ok(());
        }

        let text = String::from_utf8_lossy(&contents);
        let symbols = extract_symbols(&text);
        for word in &symbols.declarations {
            output.add_entry(DECLARATIONS, word);
        }
        for word in &symbols.references {
            output.add_entry(REFERENCES, word);
        }
        Ok(())
    }
}

/// True if the leading bytes contain a NUL
pub fn is_binary(content: &[u8]) -> bool {
    let sniff = &content[..content.len().min(BINARY_SNIFF_LEN)];
    memchr::memchr(0, sniff).is_some()
}
