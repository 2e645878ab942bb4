//! Crawl engine: one walker, N parser workers and one batching consumer, wired by two queues.
//!
//! Shutdown order: the walker finishes, the input queue is joined (every pushed path processed),
//! one `Stop` per worker goes into the input queue, the workers are joined, then one `Stop` goes
//! into the output queue and the consumer drains, flushes and exits.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use crate::parsing::{MimeGuesser, ParserRegistry};
use crate::search::SearchIndex;
use crate::tracker::SharedProgress;
use crate::utils::config::{QueueConsts, Settings};

use super::batch::{BatchOutcome, BatchParams, run_batch_consumer};
use super::context::{Message, PipelineContext, create_pipeline_channels};
use super::parse::{ParseShared, parse_worker_loop};
use super::walk::{WalkStats, jwalk_iter, run_walk_loop, walkdir_iter};

/// Tuning for one crawl.
#[derive(Clone, Debug)]
pub struct CrawlOptions {
    pub parse_threads: usize,
    pub index_every: usize,
    pub input_queue_cap: usize,
    pub consumer_idle_timeout: Duration,
    pub parallel_walk: bool,
    pub follow_links: bool,
    pub exclude: Vec<String>,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl CrawlOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            parse_threads: settings.parse_threads,
            index_every: settings.index_every,
            input_queue_cap: settings.input_queue_cap,
            consumer_idle_timeout: settings.consumer_idle_timeout,
            parallel_walk: settings.parallel_walk,
            follow_links: settings.follow_links,
            exclude: settings.exclude.clone(),
        }
    }
}

/// Counts from a finished crawl. The authoritative progress is the [`SharedProgress`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CrawlSummary {
    pub total: u64,
    pub parsed: u64,
    pub failed: u64,
    pub flush_sizes: Vec<usize>,
    pub walk_errors: usize,
}

pub struct Crawler<'a> {
    registry: ParserRegistry,
    guesser: Box<dyn MimeGuesser>,
    index: &'a dyn SearchIndex,
    directory_id: i64,
    opts: CrawlOptions,
    shutdown: Arc<AtomicBool>,
}

impl<'a> Crawler<'a> {
    pub fn new(
        registry: ParserRegistry,
        guesser: Box<dyn MimeGuesser>,
        index: &'a dyn SearchIndex,
        directory_id: i64,
        opts: CrawlOptions,
    ) -> Self {
        Self {
            registry,
            guesser,
            index,
            directory_id,
            opts,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share an existing stop flag (e.g. one raised by a Ctrl+C handler).
    pub fn with_shutdown(mut self, shutdown: Arc<AtomicBool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Raising this flag stops the crawl early; the partial batch is still flushed.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Crawl `root`, feeding the index. Progress goes to `progress`; `done` is left to the caller.
    /// Fails if the root cannot be read, a flush to the index failed, or the indexer gave up waiting
    /// for documents.
    pub fn crawl(&self, root: &Path, progress: &SharedProgress) -> Result<CrawlSummary> {
        let root = root
            .canonicalize()
            .with_context(|| format!("canonicalize crawl root {}", root.display()))?;
        let channels = create_pipeline_channels(self.opts.input_queue_cap);
        let num_workers = self.opts.parse_threads.max(1);
        let failed = AtomicU64::new(0);
        let shutdown: &AtomicBool = &self.shutdown;

        log::debug!("Creating {num_workers} parser threads");

        let batch_params = BatchParams {
            index: self.index,
            directory_id: self.directory_id,
            index_every: self.opts.index_every,
            idle_timeout: self.opts.consumer_idle_timeout,
            progress,
        };
        let shared = ParseShared {
            registry: &self.registry,
            guesser: &*self.guesser,
            pending: &channels.pending,
            shutdown,
            failed: &failed,
        };
        let ctx = PipelineContext {
            root: root.clone(),
            exclude: &self.opts.exclude,
            follow_links: self.opts.follow_links,
            shutdown,
        };
        let parallel_walk = self.opts.parallel_walk;

        let (walk, batch): (Option<WalkStats>, Option<BatchOutcome>) = thread::scope(|s| {
            let doc_rx = channels.doc_rx.clone();
            let batch_params = &batch_params;
            let consumer = s.spawn(move || {
                let outcome = run_batch_consumer(doc_rx, batch_params);
                if outcome.timed_out {
                    // Nobody drains the output queue any more; stop producing into it.
                    shutdown.store(true, Ordering::Relaxed);
                }
                outcome
            });

            let shared = &shared;
            let workers: Vec<_> = (0..num_workers)
                .map(|_| {
                    let path_rx = channels.path_rx.clone();
                    let doc_tx = channels.doc_tx.clone();
                    s.spawn(move || parse_worker_loop(path_rx, doc_tx, shared))
                })
                .collect();

            let ctx = &ctx;
            let path_tx = &channels.path_tx;
            let pending = &channels.pending;
            let walker = s.spawn(move || {
                let iter = if parallel_walk {
                    jwalk_iter(ctx)
                } else {
                    walkdir_iter(ctx)
                };
                run_walk_loop(ctx, iter, path_tx, pending, progress)
            });

            let walk = walker.join().ok();
            if walk.is_none() {
                log::error!("walk thread panicked; stopping the crawl");
                shutdown.store(true, Ordering::Relaxed);
            }

            // Queue join: every pushed path has been handled by some worker.
            if !channels.pending.wait_idle(shutdown, QueueConsts::JOIN_POLL) {
                log::info!("crawl interrupted; {} paths left unparsed", channels.pending.pending());
            }
            if !shutdown.load(Ordering::Relaxed) {
                for _ in 0..num_workers {
                    let _ = channels.path_tx.send(Message::Stop);
                }
            }
            for w in workers {
                if w.join().is_err() {
                    log::error!("parser worker panicked");
                }
            }

            let _ = channels.doc_tx.send(Message::Stop);
            let batch = consumer.join().ok();
            (walk, batch)
        });

        let walk = walk.ok_or_else(|| anyhow::anyhow!("walk thread panicked"))?;
        let batch = batch.ok_or_else(|| anyhow::anyhow!("index consumer panicked"))?;
        if let Some(e) = batch.error {
            return Err(e.context("flush parsed documents to the index"));
        }
        if batch.timed_out {
            anyhow::bail!(
                "indexer got no document for {:?}; crawl of {} abandoned after {} of {} files",
                self.opts.consumer_idle_timeout,
                root.display(),
                progress.parsed(),
                progress.total()
            );
        }

        let summary = CrawlSummary {
            total: progress.total(),
            parsed: progress.parsed(),
            failed: failed.load(Ordering::Relaxed),
            flush_sizes: batch.flush_sizes,
            walk_errors: walk.skipped.len(),
        };
        log::info!(
            "Crawled {}: {} files, {} parsed, {} skipped, {} flushes",
            root.display(),
            summary.total,
            summary.parsed,
            summary.failed,
            summary.flush_sizes.len()
        );
        Ok(summary)
    }
}
