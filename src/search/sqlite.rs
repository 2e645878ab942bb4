//! Local document store in SQLite: one JSON row per document, keyed by directory.

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::types::{DocumentSummary, ParsedDocument};

use super::SearchIndex;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    directory_id INTEGER NOT NULL,
    body TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_documents_directory ON documents(directory_id);
"#;

/// WAL tuning pragmas, applied after `journal_mode = WAL`.
const WAL_PRAGMAS: &str = r#"
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        PRAGMA wal_autocheckpoint = 10000;
        "#;

const INSERT_DOCUMENT_SQL: &str = "INSERT INTO documents (directory_id, body) VALUES (?1, ?2)";

pub struct SqliteIndex {
    conn: Mutex<Connection>,
}

impl SqliteIndex {
    /// Open or create the store at `path` (WAL, so readers in other processes are not blocked).
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("open document store {}", path.display()))?;
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))
            .context("enable WAL")?;
        conn.execute_batch(WAL_PRAGMAS).context("set WAL pragmas")?;
        conn.execute_batch(SCHEMA).context("create document schema")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory document store")?;
        conn.execute_batch(SCHEMA).context("create document schema")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("document store connection poisoned"))
    }

    /// Full stored documents of `directory_id`, in insertion order.
    pub fn documents(&self, directory_id: i64) -> Result<Vec<ParsedDocument>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT body FROM documents WHERE directory_id = ?1 ORDER BY id")
            .context("prepare document select")?;
        let rows = stmt.query_map([directory_id], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for body in rows {
            out.push(serde_json::from_str(&body?).context("decode stored document")?);
        }
        Ok(out)
    }
}

impl SearchIndex for SqliteIndex {
    fn delete_directory(&self, directory_id: i64) -> Result<()> {
        let n = self
            .conn()?
            .execute("DELETE FROM documents WHERE directory_id = ?1", [directory_id])
            .context("delete directory documents")?;
        log::debug!("deleted {n} documents of directory {directory_id}");
        Ok(())
    }

    /// One transaction per batch.
    fn index_batch(&self, documents: &[ParsedDocument], directory_id: i64) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().context("begin transaction")?;
        {
            let mut stmt = tx.prepare(INSERT_DOCUMENT_SQL).context("prepare insert")?;
            for doc in documents {
                let body = serde_json::to_string(doc).context("encode document")?;
                stmt.execute((directory_id, body.as_str()))
                    .context("insert document")?;
            }
        }
        tx.commit().context("commit transaction")?;
        Ok(())
    }

    fn get_all_documents(&self, directory_id: i64) -> Result<Vec<DocumentSummary>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT id, body FROM documents WHERE directory_id = ?1 ORDER BY id")
            .context("prepare summary select")?;
        let rows = stmt.query_map([directory_id], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (id, body) = row?;
            let mut summary: DocumentSummary =
                serde_json::from_str(&body).context("decode stored document")?;
            summary.id = id.to_string();
            out.push(summary);
        }
        Ok(out)
    }

    fn document_count(&self) -> Result<u64> {
        let n: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
            .context("count documents")?;
        Ok(n.max(0) as u64)
    }
}
