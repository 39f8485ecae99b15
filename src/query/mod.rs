pub mod matcher;

pub use matcher::{MatchMode, MatchRule, WordMatcher};
