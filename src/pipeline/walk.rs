//! Discovery: walk the tree and push every regular file onto the bounded input queue.

use crossbeam_channel::{SendTimeoutError, Sender};
use std::path::PathBuf;
use std::sync::atomic::Ordering;

use crate::engine::tools::should_include_in_walk;
use crate::tracker::SharedProgress;
use crate::utils::config::QueueConsts;

use super::context::{Message, PendingCounter, PipelineContext};

/// One result from a directory walk: a path (and whether it is a regular file), or an error.
pub enum WalkOutcome {
    Ok { path: PathBuf, is_file: bool },
    Err { msg: String, path: Option<PathBuf> },
}

/// Convert a jwalk result into [`WalkOutcome`].
pub fn to_outcome_jwalk(r: Result<jwalk::DirEntry<((), ())>, jwalk::Error>) -> WalkOutcome {
    match r {
        Ok(entry) => WalkOutcome::Ok {
            is_file: entry.file_type().is_file(),
            path: entry.path(),
        },
        Err(err) => WalkOutcome::Err {
            msg: format!("{}", err),
            path: err.path().map(PathBuf::from),
        },
    }
}

/// Convert a walkdir result into [`WalkOutcome`].
pub fn to_outcome_walkdir(r: Result<walkdir::DirEntry, walkdir::Error>) -> WalkOutcome {
    match r {
        Ok(entry) => WalkOutcome::Ok {
            is_file: entry.file_type().is_file(),
            path: entry.into_path(),
        },
        Err(err) => WalkOutcome::Err {
            msg: format!("{}", err),
            path: err.path().map(PathBuf::from),
        },
    }
}

pub fn jwalk_iter(ctx: &PipelineContext<'_>) -> Box<dyn Iterator<Item = WalkOutcome>> {
    use jwalk::Parallelism;
    use std::time::Duration;
    Box::new(
        jwalk::WalkDir::new(&ctx.root)
            .follow_links(ctx.follow_links)
            .parallelism(Parallelism::RayonDefaultPool {
                busy_timeout: Duration::from_secs(60),
            })
            .into_iter()
            .map(to_outcome_jwalk),
    )
}

pub fn walkdir_iter(ctx: &PipelineContext<'_>) -> Box<dyn Iterator<Item = WalkOutcome>> {
    Box::new(
        walkdir::WalkDir::new(&ctx.root)
            .follow_links(ctx.follow_links)
            .into_iter()
            .map(to_outcome_walkdir),
    )
}

/// What the walk did.
#[derive(Debug, Default)]
pub struct WalkStats {
    /// Paths accepted by the input queue.
    pub sent: u64,
    /// Entries the walker could not read (permission errors and the like).
    pub skipped: Vec<(PathBuf, String)>,
    /// The walk stopped early (shutdown raised or every worker gone).
    pub interrupted: bool,
}

/// Push `path` onto the input queue, retrying every [`QueueConsts::WALKER_SEND_TIMEOUT`] while it
/// is full. Returns false if the crawl is shutting down or no worker is left to receive.
fn push_with_retry(
    path_tx: &Sender<Message<PathBuf>>,
    path: PathBuf,
    ctx: &PipelineContext<'_>,
) -> bool {
    let mut msg = Message::Item(path);
    loop {
        match path_tx.send_timeout(msg, QueueConsts::WALKER_SEND_TIMEOUT) {
            Ok(()) => return true,
            Err(SendTimeoutError::Timeout(back)) => {
                if ctx.shutdown.load(Ordering::Relaxed) {
                    return false;
                }
                log::debug!("input queue full; walker waiting");
                msg = back;
            }
            Err(SendTimeoutError::Disconnected(_)) => return false,
        }
    }
}

/// Consume `iter`, push included regular files to `path_tx` and count each accepted push in
/// `total_files`. Walk errors are recorded and skipped.
pub fn run_walk_loop<I>(
    ctx: &PipelineContext<'_>,
    iter: I,
    path_tx: &Sender<Message<PathBuf>>,
    pending: &PendingCounter,
    progress: &SharedProgress,
) -> WalkStats
where
    I: Iterator<Item = WalkOutcome>,
{
    let mut stats = WalkStats::default();
    for outcome in iter {
        if ctx.shutdown.load(Ordering::Relaxed) {
            stats.interrupted = true;
            break;
        }
        match outcome {
            WalkOutcome::Ok { path, is_file } => {
                if !is_file || !should_include_in_walk(&path, &ctx.root, ctx.exclude) {
                    continue;
                }
                pending.add();
                if !push_with_retry(path_tx, path, ctx) {
                    pending.done();
                    stats.interrupted = true;
                    break;
                }
                progress.add_total(1);
                stats.sent += 1;
            }
            WalkOutcome::Err { msg, path } => {
                log::debug!("walk error: {msg}");
                stats
                    .skipped
                    .push((path.unwrap_or_else(|| PathBuf::from("<no-path>")), msg));
            }
        }
    }
    if !stats.skipped.is_empty() {
        log::warn!(
            "Skipped {} entries due to permission errors or access issues",
            stats.skipped.len()
        );
    }
    stats
}
