use anyhow::{Context, Result};
use rusqlite::{Connection, ErrorCode, OptionalExtension};
use std::path::{Path, PathBuf};

use crate::types::{DirOption, Directory, Task, TaskKind};

use super::{SCHEMA, Storage, StorageError, WAL_PRAGMAS};

/// SQLite-backed [`Storage`], plus the directory/task management the CLI uses.
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Open or create the database at `path`, enabling WAL and applying the schema (idempotent).
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create database dir {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("open database {}", path.display()))?;
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))
            .context("enable WAL")?;
        conn.execute_batch(WAL_PRAGMAS).context("set WAL pragmas")?;
        conn.execute_batch(SCHEMA).context("create schema")?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory database")?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .context("enable foreign keys")?;
        conn.execute_batch(SCHEMA).context("create schema")?;
        Ok(Self { conn })
    }

    /// Insert `directory` with its options; returns the new id.
    pub fn save_directory(&self, directory: &Directory) -> Result<i64> {
        let path = directory.path.to_string_lossy().into_owned();
        let inserted = self.conn.execute(
            "INSERT INTO directories (path, enabled, name) VALUES (?1, ?2, ?3)",
            (path.as_str(), directory.enabled, directory.name.as_str()),
        );
        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                return Err(StorageError::DuplicateDirectory(path).into());
            }
            Err(e) => return Err(e).context("insert directory"),
        }
        let id = self.conn.last_insert_rowid();
        for opt in &directory.options {
            self.set_option(id, &opt.key, &opt.value)?;
        }
        Ok(id)
    }

    /// Insert or replace one per-directory option.
    pub fn set_option(&self, directory_id: i64, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO options (directory_id, key, value) VALUES (?1, ?2, ?3)
                 ON CONFLICT (directory_id, key) DO UPDATE SET value = excluded.value",
                (directory_id, key, value),
            )
            .context("save option")?;
        Ok(())
    }

    pub fn remove_directory(&self, id: i64) -> Result<()> {
        let n = self
            .conn
            .execute("DELETE FROM directories WHERE id = ?1", [id])
            .context("delete directory")?;
        if n == 0 {
            return Err(StorageError::UnknownDirectory(id).into());
        }
        Ok(())
    }

    /// All directories, by id.
    pub fn directories(&self) -> Result<Vec<Directory>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM directories ORDER BY id")
            .context("prepare directory list")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        ids.into_iter().map(|id| self.get_directory(id)).collect()
    }

    /// Queue a task; returns its id.
    pub fn save_task(&self, kind: TaskKind, directory_id: i64) -> Result<i64> {
        self.get_directory(directory_id)?;
        self.conn
            .execute(
                "INSERT INTO tasks (kind, directory_id) VALUES (?1, ?2)",
                (kind.code(), directory_id),
            )
            .context("insert task")?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Flag `id` for cancellation; the orchestrator picks it up on its next poll.
    /// Returns false when there is no such task.
    pub fn request_cancel(&self, id: i64) -> Result<bool> {
        let n = self
            .conn
            .execute("UPDATE tasks SET cancel_requested = 1 WHERE id = ?1", [id])
            .context("flag task for cancellation")?;
        Ok(n > 0)
    }

    fn options_of(&self, directory_id: i64) -> Result<Vec<DirOption>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value FROM options WHERE directory_id = ?1 ORDER BY id")
            .context("prepare option select")?;
        let rows = stmt.query_map([directory_id], |row| {
            Ok(DirOption {
                key: row.get(0)?,
                value: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

impl Storage for SqliteStorage {
    fn list_pending_tasks(&self) -> Result<Vec<Task>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, kind, directory_id, completed FROM tasks WHERE completed = 0 ORDER BY id",
            )
            .context("prepare task select")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, bool>(3)?,
            ))
        })?;
        let mut tasks = Vec::new();
        let mut unknown = Vec::new();
        for row in rows {
            let (id, code, directory_id, completed) = row?;
            match TaskKind::from_code(code) {
                Some(kind) => tasks.push(Task {
                    id,
                    kind,
                    directory_id,
                    completed,
                }),
                None => unknown.push((id, code)),
            }
        }
        // Nothing can run these; left in place they would be listed on every poll.
        for (id, code) in unknown {
            log::warn!("{}; dropping it", StorageError::UnknownTaskKind(id, code));
            self.delete_task(id)?;
        }
        Ok(tasks)
    }

    fn delete_task(&self, id: i64) -> Result<()> {
        self.conn
            .execute("DELETE FROM tasks WHERE id = ?1", [id])
            .context("delete task")?;
        Ok(())
    }

    fn get_directory(&self, id: i64) -> Result<Directory> {
        let row = self
            .conn
            .query_row(
                "SELECT path, enabled, name FROM directories WHERE id = ?1",
                [id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, bool>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()
            .context("select directory")?;
        let (path, enabled, name) = row.ok_or(StorageError::UnknownDirectory(id))?;
        Ok(Directory {
            id,
            path: PathBuf::from(path),
            enabled,
            options: self.options_of(id)?,
            name,
        })
    }

    fn is_cancel_requested(&self, id: i64) -> Result<bool> {
        let flag: Option<bool> = self
            .conn
            .query_row(
                "SELECT cancel_requested FROM tasks WHERE id = ?1",
                [id],
                |row| row.get(0),
            )
            .optional()
            .context("read cancel flag")?;
        Ok(flag.unwrap_or(false))
    }
}
