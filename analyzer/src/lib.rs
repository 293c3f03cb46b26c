//! Incremental word-frequency analysis over scraped Reddit posts.

pub mod analyzer;
pub mod files;
pub mod memory;
pub mod query;
pub mod store;
pub mod tokenizer;

#[cfg(test)]
mod tests;

pub use analyzer::{AnalysisOutcome, RunPhase, WordFrequencyAnalyzer};
pub use files::{read_post_file, FilePostSource};
pub use memory::{MemoryFrequencyStore, MemoryPostSource};
pub use query::{rank_words, summarize, top_n, WordPattern};
pub use store::{FrequencyStore, PostSource};
pub use tokenizer::{tokenize, Tokenizer};
