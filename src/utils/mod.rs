//! Utility functions and data structures.
//!
//! ## Modules
//!
//! - [`app_data`] - Application data directory, config and per-codebase index location
//! - [`encoding`] - Little-endian binary codec and varints used by the index file
//! - [`tokenizer`] - Declaration/reference identifier extraction

pub mod app_data;
pub mod encoding;
pub mod tokenizer;

pub use app_data::*;
pub use encoding::*;
pub use tokenizer::*;
