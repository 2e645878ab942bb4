//! Batching consumer: drain the output queue, flush to the index every `index_every` documents.

use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::time::Duration;

use crate::search::SearchIndex;
use crate::tracker::SharedProgress;
use crate::types::ParsedDocument;

use super::context::Message;

/// Parameters for [`run_batch_consumer`].
pub struct BatchParams<'a> {
    pub index: &'a dyn SearchIndex,
    pub directory_id: i64,
    pub index_every: usize,
    /// Time without a document after which the consumer flushes and exits.
    pub idle_timeout: Duration,
    pub progress: &'a SharedProgress,
}

/// Result of a consumer run.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Sizes of the successful flushes, in order.
    pub flush_sizes: Vec<usize>,
    /// First failed flush. Once set, later documents are drained but not sent.
    pub error: Option<anyhow::Error>,
    /// The consumer stopped on the idle timeout rather than a sentinel.
    pub timed_out: bool,
}

impl BatchOutcome {
    /// Send `batch` to the index (unless an earlier flush failed) and clear it.
    fn flush(&mut self, params: &BatchParams<'_>, batch: &mut Vec<ParsedDocument>) {
        if batch.is_empty() {
            return;
        }
        if self.error.is_none() {
            match params.index.index_batch(batch, params.directory_id) {
                Ok(()) => {
                    log::debug!("flushed {} documents", batch.len());
                    self.flush_sizes.push(batch.len());
                }
                Err(e) => {
                    log::error!("index flush of {} documents failed: {:#}", batch.len(), e);
                    self.error = Some(e);
                }
            }
        }
        batch.clear();
    }
}

/// Run the single consumer until a `Stop` sentinel (or the idle timeout), then flush what is left.
pub fn run_batch_consumer(
    doc_rx: Receiver<Message<ParsedDocument>>,
    params: &BatchParams<'_>,
) -> BatchOutcome {
    let every = params.index_every.max(1);
    let mut outcome = BatchOutcome::default();
    let mut batch: Vec<ParsedDocument> = Vec::with_capacity(every.min(10_000));

    loop {
        match doc_rx.recv_timeout(params.idle_timeout) {
            Ok(Message::Item(doc)) => {
                batch.push(doc);
                let parsed = params.progress.inc_parsed();
                if parsed.is_multiple_of(every as u64) {
                    outcome.flush(params, &mut batch);
                }
            }
            Ok(Message::Stop) => break,
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "no documents for {:?}; flushing and stopping the indexer",
                    params.idle_timeout
                );
                outcome.timed_out = true;
                break;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    outcome.flush(params, &mut batch);
    outcome
}
