//! Starting task workers. The default launcher re-executes this binary with the hidden `worker`
//! subcommand, so each task runs in its own process and can be killed without harming the caller.

use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use crate::types::Task;

/// Liveness of a launched worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerStatus {
    Running,
    /// Exited on its own; the exit code when there is one (none when killed by a signal).
    Exited(Option<i32>),
}

/// A launched worker the orchestrator can poll and stop.
pub trait WorkerHandle: Send {
    /// Non-blocking liveness check.
    fn status(&mut self) -> Result<WorkerStatus>;

    /// Force the worker to stop and reap it. Must succeed for a worker that already exited.
    fn terminate(&mut self) -> Result<()>;
}

/// Starts a worker for `task`, writing progress to the counters file at `progress_path`.
pub trait TaskLauncher {
    fn launch(&self, task: &Task, progress_path: &Path) -> Result<Box<dyn WorkerHandle>>;
}

/// Runs each task as `<exe> [--config F] [-v] worker --task-id .. --kind .. --directory-id .. --progress ..`.
pub struct ProcessLauncher {
    exe: PathBuf,
    config: Option<PathBuf>,
    verbose: bool,
}

impl ProcessLauncher {
    pub fn new(exe: PathBuf, config: Option<PathBuf>, verbose: bool) -> Self {
        Self {
            exe,
            config,
            verbose,
        }
    }

    /// Launcher re-executing the running binary.
    pub fn current_exe(config: Option<PathBuf>, verbose: bool) -> Result<Self> {
        let exe = std::env::current_exe().context("locate current executable")?;
        Ok(Self::new(exe, config, verbose))
    }

    fn command(&self, task: &Task, progress_path: &Path) -> Command {
        let mut cmd = Command::new(&self.exe);
        if let Some(ref config) = self.config {
            cmd.arg("--config").arg(config);
        }
        if self.verbose {
            cmd.arg("--verbose");
        }
        cmd.arg("worker")
            .arg("--task-id")
            .arg(task.id.to_string())
            .arg("--kind")
            .arg(task.kind.as_arg())
            .arg("--directory-id")
            .arg(task.directory_id.to_string())
            .arg("--progress")
            .arg(progress_path)
            .stdin(Stdio::null());
        cmd
    }
}

impl TaskLauncher for ProcessLauncher {
    fn launch(&self, task: &Task, progress_path: &Path) -> Result<Box<dyn WorkerHandle>> {
        let child = self
            .command(task, progress_path)
            .spawn()
            .with_context(|| format!("spawn worker {} for task {}", self.exe.display(), task.id))?;
        log::debug!("task {} running as pid {}", task.id, child.id());
        Ok(Box::new(ChildHandle { child }))
    }
}

struct ChildHandle {
    child: Child,
}

impl WorkerHandle for ChildHandle {
    fn status(&mut self) -> Result<WorkerStatus> {
        let status = self.child.try_wait().context("poll worker process")?;
        Ok(match status {
            Some(s) => WorkerStatus::Exited(s.code()),
            None => WorkerStatus::Running,
        })
    }

    fn terminate(&mut self) -> Result<()> {
        match self.child.kill() {
            Ok(()) => {}
            // Already exited and reaped.
            Err(e) if e.kind() == ErrorKind::InvalidInput => {}
            Err(e) => return Err(e).context("kill worker process"),
        }
        self.child.wait().context("reap worker process")?;
        Ok(())
    }
}
