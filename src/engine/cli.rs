//! CLI command handlers.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crate::engine::arg_parser::{Cli, Commands, WorkerCommand};
use crate::engine::progress::{create_bar, follow_progress};
use crate::pipeline::CrawlOptions;
use crate::search::open_index;
use crate::storage::{SqliteStorage, Storage};
use crate::tasks::{Orchestrator, ProcessLauncher, WorkerArgs, index_directory, run_worker};
use crate::tracker::SharedProgress;
use crate::types::{DirOption, Directory, TaskKind};
use crate::utils::config::Settings;
use crate::utils::fd_limit::cap_parse_threads;
use crate::utils::{load_settings, resolve_config_path, setup_logging};

/// Dispatch `cli` to its command.
pub fn handle_run(cli: &Cli) -> Result<()> {
    let _ = dotenvy::dotenv();
    let role = matches!(cli.command, Commands::Worker(_)).then_some("worker");
    setup_logging(cli.verbose, role);

    let config_path = resolve_config_path(cli.config.as_deref());
    let settings = load_settings(&config_path);
    log::debug!("config {}: {:#?}", config_path.display(), settings);

    match &cli.command {
        Commands::Serve => handle_serve(cli, &settings),
        Commands::AddDir {
            path,
            name,
            options,
        } => handle_add_dir(&settings, path, name.as_deref(), options),
        Commands::Dirs => handle_dirs(&settings),
        Commands::Index { directory_id } => queue_task(&settings, TaskKind::Index, *directory_id),
        Commands::Thumbnails { directory_id } => {
            queue_task(&settings, TaskKind::GenerateThumbnails, *directory_id)
        }
        Commands::Cancel { task_id } => handle_cancel(&settings, *task_id),
        Commands::Crawl { directory_id } => handle_crawl(&settings, *directory_id),
        Commands::Worker(w) => handle_worker(&settings, w),
    }
}

fn handle_serve(cli: &Cli, settings: &Settings) -> Result<()> {
    let storage = SqliteStorage::open(&settings.db_path)?;
    let launcher = ProcessLauncher::current_exe(cli.config.clone(), cli.verbose)?;
    let mut orchestrator = Orchestrator::new(
        storage,
        launcher,
        settings.data_dir.join("progress"),
        settings.poll_interval,
    );

    let stop = Arc::new(AtomicBool::new(false));
    let stop_handler = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        stop_handler.store(true, Ordering::Relaxed);
    })
    .context("set Ctrl+C handler")?;

    log::info!("Scheduler started (poll every {:?})", settings.poll_interval);
    orchestrator.run(&stop)
}

fn handle_add_dir(
    settings: &Settings,
    path: &Path,
    name: Option<&str>,
    options: &[(String, String)],
) -> Result<()> {
    let path = path
        .canonicalize()
        .with_context(|| format!("resolve {}", path.display()))?;
    if !path.is_dir() {
        anyhow::bail!("{} is not a directory", path.display());
    }
    let name = name
        .map(str::to_string)
        .or_else(|| path.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| path.to_string_lossy().into_owned());
    let options = options
        .iter()
        .map(|(k, v)| DirOption::new(k.as_str(), v.as_str()))
        .collect();

    let storage = SqliteStorage::open(&settings.db_path)?;
    let id = storage.save_directory(&Directory::new(path.clone(), true, options, &name))?;
    println!("{id}\t{}", path.display());
    Ok(())
}

fn handle_dirs(settings: &Settings) -> Result<()> {
    let storage = SqliteStorage::open(&settings.db_path)?;
    for dir in storage.directories()? {
        let overrides: Vec<String> = dir
            .options
            .iter()
            .map(|o| format!("{}={}", o.key, o.value))
            .collect();
        println!(
            "{}\t{}\t{}\t{}",
            dir.id,
            dir.name,
            dir.path.display(),
            overrides.join(",")
        );
    }
    Ok(())
}

fn queue_task(settings: &Settings, kind: TaskKind, directory_id: i64) -> Result<()> {
    let storage = SqliteStorage::open(&settings.db_path)?;
    let id = storage.save_task(kind, directory_id)?;
    log::info!("Queued task {} ({} of directory {})", id, kind, directory_id);
    println!("{id}");
    Ok(())
}

fn handle_cancel(settings: &Settings, task_id: i64) -> Result<()> {
    let storage = SqliteStorage::open(&settings.db_path)?;
    if storage.request_cancel(task_id)? {
        log::info!("Task {} flagged for cancellation", task_id);
    } else {
        log::warn!("no task with id {}", task_id);
    }
    Ok(())
}

fn handle_crawl(settings: &Settings, directory_id: i64) -> Result<()> {
    let storage = SqliteStorage::open(&settings.db_path)?;
    let directory = storage.get_directory(directory_id)?;
    let index = open_index(settings)?;
    let progress = SharedProgress::anonymous()?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_handler = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        shutdown_handler.store(true, Ordering::Relaxed);
    })
    .context("set Ctrl+C handler")?;

    let mut opts = CrawlOptions::from_settings(settings);
    opts.parse_threads = cap_parse_threads(opts.parse_threads);

    let finished = AtomicBool::new(false);
    let result = thread::scope(|s| {
        let bar = s.spawn(|| {
            let mut bar = create_bar("Indexing");
            follow_progress(&mut bar, &progress, &finished);
        });
        let result = index_directory(&directory, index.as_ref(), opts, &progress, shutdown);
        finished.store(true, Ordering::Relaxed);
        let _ = bar.join();
        result
    });
    let summary = result?;
    progress.set_done();
    log::info!(
        "Indexed {} of {} files ({} could not be parsed)",
        summary.parsed,
        summary.total,
        summary.failed
    );
    Ok(())
}

fn handle_worker(settings: &Settings, w: &WorkerCommand) -> Result<()> {
    run_worker(
        settings,
        &WorkerArgs {
            task_id: w.task_id,
            kind: w.kind,
            directory_id: w.directory_id,
            progress: w.progress.clone(),
        },
    )
}
