//! Task and directory storage: the interface the orchestrator and workers read through.

mod sqlite;

use anyhow::Result;

use crate::types::{Directory, Task};

pub use sqlite::SqliteStorage;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("a directory with path {0} is already registered")]
    DuplicateDirectory(String),
    #[error("no directory with id {0}")]
    UnknownDirectory(i64),
    #[error("task {0} has unknown kind code {1}")]
    UnknownTaskKind(i64, i64),
}

/// What the scheduler and the worker processes need from storage.
///
/// Several processes read the same store at once (the orchestrator polls while a worker reads
/// its directory's options); implementations must allow that.
pub trait Storage {
    /// Incomplete tasks, lowest id first.
    fn list_pending_tasks(&self) -> Result<Vec<Task>>;

    fn delete_task(&self, id: i64) -> Result<()>;

    /// Directory with its per-directory options.
    fn get_directory(&self, id: i64) -> Result<Directory>;

    /// True once someone asked for `id` to be cancelled.
    fn is_cancel_requested(&self, id: i64) -> Result<bool>;
}

/// Schema for directories, their options and tasks.
pub(crate) const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS directories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL UNIQUE,
    enabled INTEGER NOT NULL,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS options (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    directory_id INTEGER NOT NULL REFERENCES directories(id) ON DELETE CASCADE,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    UNIQUE (directory_id, key)
);

CREATE TABLE IF NOT EXISTS tasks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind INTEGER NOT NULL,
    directory_id INTEGER NOT NULL,
    completed INTEGER NOT NULL DEFAULT 0,
    cancel_requested INTEGER NOT NULL DEFAULT 0
);
"#;

/// WAL tuning pragmas. Use after `PRAGMA journal_mode = WAL`.
pub(crate) const WAL_PRAGMAS: &str = r#"
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        PRAGMA foreign_keys = ON;
        "#;
