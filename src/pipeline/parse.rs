//! Parser workers: input queue → mime guess → registry → parse → output queue.

use anyhow::Result;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::parsing::{MimeGuesser, ParserRegistry};
use crate::types::ParsedDocument;
use crate::utils::config::QueueConsts;

use super::context::{Message, PendingCounter};

/// Everything a worker borrows from the crawl for its lifetime.
pub struct ParseShared<'a> {
    pub registry: &'a ParserRegistry,
    pub guesser: &'a dyn MimeGuesser,
    pub pending: &'a PendingCounter,
    pub shutdown: &'a AtomicBool,
    /// Files whose parser failed or panicked.
    pub failed: &'a AtomicU64,
}

/// Guess, dispatch and parse one file; the document carries the guessed `mime`.
pub fn parse_one(
    path: &Path,
    registry: &ParserRegistry,
    guesser: &dyn MimeGuesser,
) -> Result<ParsedDocument> {
    let mime = guesser.guess_mime(path);
    let parser = registry.lookup(&mime);
    let mut doc = parser.parse(path)?;
    doc.insert("mime", mime);
    Ok(doc)
}

/// One worker. Exits on a `Stop` sentinel, or when the shutdown flag is seen between items.
/// A failing or panicking parser only loses that one file.
pub fn parse_worker_loop(
    path_rx: Receiver<Message<PathBuf>>,
    doc_tx: Sender<Message<ParsedDocument>>,
    shared: &ParseShared<'_>,
) {
    loop {
        if shared.shutdown.load(Ordering::Relaxed) {
            break;
        }
        let path = match path_rx.recv_timeout(QueueConsts::WORKER_RECV_TIMEOUT) {
            Ok(Message::Item(path)) => path,
            Ok(Message::Stop) => break,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            parse_one(&path, shared.registry, shared.guesser)
        }));
        match outcome {
            Ok(Ok(doc)) => {
                let _ = doc_tx.send(Message::Item(doc));
            }
            Ok(Err(e)) => {
                shared.failed.fetch_add(1, Ordering::Relaxed);
                log::debug!("skipping {}: {:#}", path.display(), e);
            }
            Err(_) => {
                shared.failed.fetch_add(1, Ordering::Relaxed);
                log::warn!("parser panicked on {}; skipped", path.display());
            }
        }
        shared.pending.done();
    }
}
