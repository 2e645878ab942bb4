//! sist: crawl directories into a search index, one isolated task at a time.
//!
//! A crawl walks a directory, guesses each file's mime type, hands the file to the parser
//! registered for that type (or the default parser), and writes the parsed documents to a
//! [`SearchIndex`](search::SearchIndex) in batches. The [`Orchestrator`](tasks::Orchestrator)
//! runs queued tasks in worker processes, at most one at a time, and reports their progress
//! through shared counters.

pub mod engine;
pub mod parsing;
pub mod pipeline;
pub mod search;
pub mod storage;
pub mod tasks;
pub mod tracker;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use types::*;

pub use parsing::{FileParser, MimeGuesser, ParserRegistry};
pub use pipeline::{CrawlOptions, CrawlSummary, Crawler};
pub use search::SearchIndex;
pub use storage::{SqliteStorage, Storage, StorageError};
pub use tasks::{Orchestrator, OrchestratorState, TickOutcome};
pub use tracker::SharedProgress;

/// Result alias used by the public sist API
pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;
