//! # symdex - persistent symbol index
//!
//! symdex answers "where is X declared / referenced" queries over a source
//! tree without rescanning it, by keeping an inverted index of
//! `(category, word) -> documents` in a single compact file.
//!
//! ## Architecture
//!
//! - [`index`] - the two-tier store: an immutable on-disk snapshot
//!   ([`DiskIndex`]) plus an in-memory buffer of pending changes
//!   ([`MemoryIndex`]), coordinated by the [`Index`] facade
//! - [`indexer`] - the `Document`/`Indexer` boundary and a default source indexer
//! - [`query`] - match rules applied to indexed words
//! - [`output`] - terminal and JSON rendering of results
//! - [`utils`] - binary codec, identifier extraction, app data directory
//!
//! ## Quick Start
//!
//! ```no_run
//! use symdex::{Index, IndexConfig, MatchRule};
//!
//! let mut index = Index::open_or_create("symbols.index", IndexConfig::default())?;
//! index.add_index_entry("decl", "Foo", "src/A.java");
//! index.add_index_entry("ref", "Foo", "src/B.java");
//! index.save()?;
//!
//! for result in index.query(&["decl", "ref"], Some("Foo"), MatchRule::exact())? {
//!     println!("{}: {:?}", result.word(), result.document_names()?);
//! }
//! # Ok::<(), symdex::IndexError>(())
//! ```
//!
//! Writes are buffered and visible to queries immediately. [`Index::save`]
//! (or the automatic merge once enough documents changed) folds them into a
//! new file, written beside the old one and renamed over it.

pub mod error;
pub mod index;
pub mod indexer;
pub mod output;
pub mod query;
pub mod utils;

pub use error::{IndexError, Result};
pub use index::{DiskIndex, EntryResult, Index, IndexConfig, MemoryIndex};
pub use query::{MatchMode, MatchRule};
