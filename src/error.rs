use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the index storage engine
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Index signature mismatch: expected {expected:?}, found {found:?}")]
    Signature { expected: String, found: String },

    #[error("Corrupt index file: {0}")]
    Format(String),

    #[error("Merge into {path} aborted: {source}")]
    Merge {
        path: PathBuf,
        #[source]
        source: Box<IndexError>,
    },

    #[error("Invalid pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Cannot read document {name}: {source}")]
    Document {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for index operations
pub type Result<T> = std::result::Result<T, IndexError>;

impl IndexError {
    pub(crate) fn format(reason: impl Into<String>) -> Self {
        IndexError::Format(reason.into())
    }

    /// True when the file on disk is unusable and has to be rebuilt
    pub fn is_format_error(&self) -> bool {
        match self {
            IndexError::Signature { .. } | IndexError::Format(_) => true,
            IndexError::Merge { source, .. } => source.is_format_error(),
            _ => false,
        }
    }

    /// True for failures of the underlying storage that may succeed on a later attempt
    pub fn is_io_error(&self) -> bool {
        match self {
            IndexError::Io(_) | IndexError::Document { .. } => true,
            IndexError::Merge { source, .. } => source.is_io_error(),
            _ => false,
        }
    }
}
