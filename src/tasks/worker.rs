//! Worker process entry point: run one task against the shared progress counters.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use crate::parsing::{MimeGuesserKind, ParserRegistry};
use crate::pipeline::{CrawlOptions, CrawlSummary, Crawler};
use crate::search::{SearchIndex, open_index};
use crate::storage::{SqliteStorage, Storage};
use crate::tracker::SharedProgress;
use crate::types::{Directory, TaskKind};
use crate::utils::config::Settings;
use crate::utils::fd_limit::cap_parse_threads;

use super::thumbnail::{ThumbnailOptions, generate_thumbnails};

/// What the orchestrator passes on the worker command line.
#[derive(Clone, Debug)]
pub struct WorkerArgs {
    pub task_id: i64,
    pub kind: TaskKind,
    pub directory_id: i64,
    pub progress: PathBuf,
}

/// Run the task described by `args`. Sets `done` only when the job finished; any error leaves it
/// unset so the orchestrator treats the exit as a crash.
pub fn run_worker(settings: &Settings, args: &WorkerArgs) -> Result<()> {
    let storage = SqliteStorage::open(&settings.db_path)?;
    let directory = storage
        .get_directory(args.directory_id)
        .with_context(|| format!("load directory {}", args.directory_id))?;
    let progress = SharedProgress::open(&args.progress)?;
    let index = open_index(settings)?;

    log::debug!("task {}: {} {}", args.task_id, args.kind, directory.path.display());
    match args.kind {
        TaskKind::Index => {
            let mut opts = CrawlOptions::from_settings(settings);
            opts.parse_threads = cap_parse_threads(opts.parse_threads);
            let shutdown = Arc::new(AtomicBool::new(false));
            index_directory(&directory, index.as_ref(), opts, &progress, shutdown)?;
        }
        TaskKind::GenerateThumbnails => {
            generate_thumbnails(
                &directory,
                index.as_ref(),
                &settings.thumbnail_dir,
                &ThumbnailOptions::for_directory(&directory),
                settings.tn_threads,
                &progress,
            )?;
        }
    }
    progress.set_done();
    Ok(())
}

/// Replace the directory's documents: delete them from the index, then crawl it again.
/// Raising `shutdown` ends the crawl early with what was parsed so far.
pub fn index_directory(
    directory: &Directory,
    index: &dyn SearchIndex,
    opts: CrawlOptions,
    progress: &SharedProgress,
    shutdown: Arc<AtomicBool>,
) -> Result<CrawlSummary> {
    let registry = ParserRegistry::for_directory(directory)?;
    let guesser = MimeGuesserKind::from_option(&directory.get_option("MimeGuesser")).build();
    index
        .delete_directory(directory.id)
        .with_context(|| format!("clear documents of directory {}", directory.id))?;
    Crawler::new(registry, guesser, index, directory.id, opts)
        .with_shutdown(shutdown)
        .crawl(&directory.path, progress)
}
