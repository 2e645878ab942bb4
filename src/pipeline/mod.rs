//! Crawl pipeline: walker → bounded input queue → parser workers → output queue → batching consumer.

pub mod batch;
pub mod context;
pub mod crawler;
pub mod parse;
pub mod walk;

pub use batch::{BatchOutcome, BatchParams, run_batch_consumer};
pub use context::{Message, PendingCounter, PipelineChannels, PipelineContext, create_pipeline_channels};
pub use crawler::{CrawlOptions, CrawlSummary, Crawler};
pub use parse::{ParseShared, parse_one, parse_worker_loop};
pub use walk::{WalkOutcome, WalkStats, run_walk_loop, to_outcome_jwalk, to_outcome_walkdir};
