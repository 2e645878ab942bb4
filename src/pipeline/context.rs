//! Pipeline plumbing: queue messages, the input queue's pending counter, channels and walk context.

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::types::ParsedDocument;

/// Queue item: work, or the sentinel telling one consumer to exit.
#[derive(Debug)]
pub enum Message<T> {
    Item(T),
    Stop,
}

/// Counts paths pushed onto the input queue that no worker has finished yet.
/// [`PendingCounter::wait_idle`] is the queue join the shutdown protocol waits on.
#[derive(Default)]
pub struct PendingCounter {
    count: Mutex<usize>,
    idle: Condvar,
}

impl PendingCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call before pushing an item.
    pub fn add(&self) {
        let mut n = self.count.lock().unwrap_or_else(|e| e.into_inner());
        *n += 1;
    }

    /// Call once per item taken off the queue, whatever happened to it.
    pub fn done(&self) {
        let mut n = self.count.lock().unwrap_or_else(|e| e.into_inner());
        *n = n.saturating_sub(1);
        if *n == 0 {
            self.idle.notify_all();
        }
    }

    pub fn pending(&self) -> usize {
        *self.count.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Block until every pushed item is done. Returns false if `shutdown` was raised first.
    pub fn wait_idle(&self, shutdown: &AtomicBool, poll: Duration) -> bool {
        let mut n = self.count.lock().unwrap_or_else(|e| e.into_inner());
        while *n > 0 {
            if shutdown.load(Ordering::Relaxed) {
                return false;
            }
            n = self
                .idle
                .wait_timeout(n, poll)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|e| e.into_inner().0);
        }
        true
    }
}

/// Settings the walker needs, borrowed by the walk thread for the whole walk.
pub struct PipelineContext<'a> {
    pub root: PathBuf,
    pub exclude: &'a [String],
    pub follow_links: bool,
    pub shutdown: &'a AtomicBool,
}

/// The two queues. Input is bounded (walker backpressure); output is unbounded.
pub struct PipelineChannels {
    pub path_tx: Sender<Message<PathBuf>>,
    pub path_rx: Receiver<Message<PathBuf>>,
    pub doc_tx: Sender<Message<ParsedDocument>>,
    pub doc_rx: Receiver<Message<ParsedDocument>>,
    pub pending: PendingCounter,
}

pub fn create_pipeline_channels(input_queue_cap: usize) -> PipelineChannels {
    let (path_tx, path_rx) = bounded::<Message<PathBuf>>(input_queue_cap.max(1));
    let (doc_tx, doc_rx) = unbounded::<Message<ParsedDocument>>();
    PipelineChannels {
        path_tx,
        path_rx,
        doc_tx,
        doc_rx,
        pending: PendingCounter::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn wait_idle_returns_when_all_done() {
        let pending = Arc::new(PendingCounter::new());
        pending.add();
        pending.add();
        let p = Arc::clone(&pending);
        let h = std::thread::spawn(move || {
            p.done();
            p.done();
        });
        let shutdown = AtomicBool::new(false);
        assert!(pending.wait_idle(&shutdown, Duration::from_millis(10)));
        h.join().unwrap();
        assert_eq!(pending.pending(), 0);
    }

    #[test]
    fn wait_idle_gives_up_on_shutdown() {
        let pending = PendingCounter::new();
        pending.add();
        let shutdown = AtomicBool::new(true);
        assert!(!pending.wait_idle(&shutdown, Duration::from_millis(10)));
    }
}
