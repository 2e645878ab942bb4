//! Single-flight task scheduler.
//!
//! At most one task runs at a time. Each `tick` either starts the oldest pending task or checks
//! the running one for completion, cancellation or a dead worker, and reclaims it. Reclaiming
//! always kills and reaps the worker, deletes the task and removes its progress file.

use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::storage::Storage;
use crate::tracker::SharedProgress;
use crate::types::{ProgressSnapshot, Task};

use super::launcher::{TaskLauncher, WorkerHandle, WorkerStatus};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    Running(i64),
}

/// What one [`Orchestrator::tick`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing running, nothing pending.
    Idle,
    Started(i64),
    StillRunning(i64),
    Completed(i64),
    Cancelled(i64),
    /// The worker exited without marking the task done.
    Crashed(i64),
    /// The worker could not be started; the task was dropped.
    LaunchFailed(i64),
}

struct RunningTask {
    task: Task,
    handle: Box<dyn WorkerHandle>,
    progress: SharedProgress,
    progress_path: PathBuf,
}

pub struct Orchestrator<S: Storage, L: TaskLauncher> {
    storage: S,
    launcher: L,
    progress_dir: PathBuf,
    poll_interval: Duration,
    running: Option<RunningTask>,
    cancel_requested: Arc<AtomicBool>,
}

impl<S: Storage, L: TaskLauncher> Orchestrator<S, L> {
    /// Progress files for running tasks are created under `progress_dir`.
    pub fn new(storage: S, launcher: L, progress_dir: PathBuf, poll_interval: Duration) -> Self {
        Self {
            storage,
            launcher,
            progress_dir,
            poll_interval,
            running: None,
            cancel_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn state(&self) -> OrchestratorState {
        match self.running {
            Some(ref r) => OrchestratorState::Running(r.task.id),
            None => OrchestratorState::Idle,
        }
    }

    /// Ask for the running task to be stopped. Takes effect on the next tick; no-op when idle.
    pub fn cancel(&self) {
        if self.running.is_some() {
            self.cancel_requested.store(true, Ordering::Relaxed);
        }
    }

    /// Counters of the running task, or `None` when idle.
    pub fn progress(&self) -> Option<ProgressSnapshot> {
        self.running
            .as_ref()
            .map(|r| r.progress.snapshot(r.task.id))
    }

    pub fn tick(&mut self) -> Result<TickOutcome> {
        if self.running.is_some() {
            return self.check_running();
        }
        let tasks = self.storage.list_pending_tasks().context("list pending tasks")?;
        match tasks.into_iter().min_by_key(|t| t.id) {
            Some(task) => self.start(task),
            None => Ok(TickOutcome::Idle),
        }
    }

    /// Tick every poll interval until `stop` is raised, then cancel whatever is running.
    pub fn run(&mut self, stop: &AtomicBool) -> Result<()> {
        let mut last: Option<ProgressSnapshot> = None;
        while !stop.load(Ordering::Relaxed) {
            if let Err(e) = self.tick() {
                log::error!("scheduler tick failed: {:#}", e);
            }
            let now = self.progress();
            if now != last
                && let Some(ref snap) = now
            {
                log::info!("{}", snap.to_json());
            }
            last = now;
            thread::sleep(self.poll_interval);
        }
        if self.running.is_some() {
            log::info!("stopping; cancelling the running task");
            self.reclaim(TickOutcome::Cancelled)?;
        }
        Ok(())
    }

    fn progress_path(&self, task_id: i64) -> PathBuf {
        self.progress_dir.join(format!("task-{task_id}.progress"))
    }

    fn start(&mut self, task: Task) -> Result<TickOutcome> {
        let id = task.id;
        let path = self.progress_path(id);
        self.cancel_requested.store(false, Ordering::Relaxed);

        let launched = SharedProgress::create(&path)
            .and_then(|progress| Ok((progress, self.launcher.launch(&task, &path)?)));
        match launched {
            Ok((progress, handle)) => {
                log::info!("Started task {} ({} of directory {})", id, task.kind, task.directory_id);
                self.running = Some(RunningTask {
                    task,
                    handle,
                    progress,
                    progress_path: path,
                });
                Ok(TickOutcome::Started(id))
            }
            Err(e) => {
                log::error!("could not launch task {}: {:#}; dropping it", id, e);
                remove_progress_file(&path);
                self.storage
                    .delete_task(id)
                    .with_context(|| format!("delete task {id}"))?;
                Ok(TickOutcome::LaunchFailed(id))
            }
        }
    }

    fn check_running(&mut self) -> Result<TickOutcome> {
        let Some(running) = self.running.as_mut() else {
            return Ok(TickOutcome::Idle);
        };
        let id = running.task.id;

        if running.progress.is_done() {
            return self.reclaim(TickOutcome::Completed);
        }
        let cancel_flagged = match self.storage.is_cancel_requested(id) {
            Ok(flag) => flag,
            Err(e) => {
                log::warn!("could not read cancel flag of task {}: {:#}", id, e);
                false
            }
        };
        if self.cancel_requested.swap(false, Ordering::Relaxed) || cancel_flagged {
            log::info!("Cancelling task {}", id);
            return self.reclaim(TickOutcome::Cancelled);
        }
        match running.handle.status()? {
            WorkerStatus::Running => Ok(TickOutcome::StillRunning(id)),
            WorkerStatus::Exited(code) => {
                log::warn!(
                    "worker for task {} exited (code {:?}) without finishing; dropping the task",
                    id,
                    code
                );
                self.reclaim(TickOutcome::Crashed)
            }
        }
    }

    /// Kill and reap the worker, delete the task and its progress file, go back to idle.
    fn reclaim(&mut self, outcome: fn(i64) -> TickOutcome) -> Result<TickOutcome> {
        let Some(mut running) = self.running.take() else {
            return Ok(TickOutcome::Idle);
        };
        let id = running.task.id;
        if let Err(e) = running.handle.terminate() {
            log::warn!("could not stop worker of task {}: {:#}", id, e);
        }
        drop(running.progress);
        remove_progress_file(&running.progress_path);
        self.cancel_requested.store(false, Ordering::Relaxed);
        self.storage
            .delete_task(id)
            .with_context(|| format!("delete task {id}"))?;
        let outcome = outcome(id);
        if let TickOutcome::Completed(_) = outcome {
            log::info!("Task {} done", id);
        }
        Ok(outcome)
    }
}

fn remove_progress_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path)
        && e.kind() != ErrorKind::NotFound
    {
        log::debug!("could not remove {}: {}", path.display(), e);
    }
}
