pub mod build;
pub mod disk;
pub mod entry_result;
pub mod facade;
pub mod memory;
pub mod stats;
pub mod types;

pub use disk::{DiskIndex, IndexStats, QuerySession};
pub use entry_result::EntryResult;
pub use facade::Index;
pub use memory::{DeltaEntry, DocumentWords, MemoryIndex};
pub use types::*;
