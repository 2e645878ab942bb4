//! Public and internal types shared by the pipeline, the scheduler and the collaborators.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::utils::config::default_option;

/// Kind of work a [`Task`] asks for. Stored as an integer code in the tasks table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum TaskKind {
    /// Crawl the directory and (re)build its documents in the index.
    Index,
    /// Regenerate thumbnails for the directory's indexed documents.
    GenerateThumbnails,
}

impl TaskKind {
    pub fn code(self) -> i64 {
        match self {
            TaskKind::Index => 1,
            TaskKind::GenerateThumbnails => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(TaskKind::Index),
            2 => Some(TaskKind::GenerateThumbnails),
            _ => None,
        }
    }

    /// Name used on the worker command line.
    pub fn as_arg(self) -> &'static str {
        match self {
            TaskKind::Index => "index",
            TaskKind::GenerateThumbnails => "generate-thumbnails",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_arg())
    }
}

/// A unit of work created by a submitter and consumed (then deleted) by the orchestrator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Task {
    pub id: i64,
    pub kind: TaskKind,
    pub directory_id: i64,
    pub completed: bool,
}

/// One per-directory option override.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirOption {
    pub key: String,
    pub value: String,
}

impl DirOption {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A crawlable directory as kept by the storage layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Directory {
    /// Assigned by storage; 0 before the directory is saved.
    pub id: i64,
    pub path: PathBuf,
    pub enabled: bool,
    pub options: Vec<DirOption>,
    pub name: String,
}

impl Directory {
    pub fn new(path: impl Into<PathBuf>, enabled: bool, options: Vec<DirOption>, name: &str) -> Self {
        Self {
            id: 0,
            path: path.into(),
            enabled,
            options,
            name: name.to_string(),
        }
    }

    /// Per-directory value for `key`, falling back to the built-in default.
    /// Returns an empty string for keys nobody knows about.
    pub fn get_option(&self, key: &str) -> String {
        self.options
            .iter()
            .find(|o| o.key == key)
            .map(|o| o.value.clone())
            .or_else(|| default_option(key).map(str::to_string))
            .unwrap_or_default()
    }

    /// Numeric option; an unparsable override falls back to the default value.
    pub fn get_option_usize(&self, key: &str) -> usize {
        self.get_option(key)
            .trim()
            .parse()
            .ok()
            .or_else(|| default_option(key).and_then(|v| v.parse().ok()))
            .unwrap_or(0)
    }
}

/// Value of one field in a [`ParsedDocument`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Integer(n)
    }
}

impl From<u64> for FieldValue {
    fn from(n: u64) -> Self {
        FieldValue::Integer(n.min(i64::MAX as u64) as i64)
    }
}

impl From<u32> for FieldValue {
    fn from(n: u32) -> Self {
        FieldValue::Integer(n as i64)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Float(n)
    }
}

/// Schema-flexible record produced by a parser for one file.
///
/// Field order is insertion order. Every document that reaches the index carries `mime`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParsedDocument {
    fields: IndexMap<String, FieldValue>,
}

impl ParsedDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    pub fn get_text(&self, key: &str) -> Option<&str> {
        match self.fields.get(key) {
            Some(FieldValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn get_integer(&self, key: &str) -> Option<i64> {
        match self.fields.get(key) {
            Some(FieldValue::Integer(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter()
    }
}

/// Subset of an indexed document needed to locate its file again (thumbnail generation).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mime: String,
    #[serde(default)]
    pub extension: String,
}

impl DocumentSummary {
    /// Absolute path of the file under `root`: `root/path/name[.extension]`.
    pub fn full_path(&self, root: &std::path::Path) -> PathBuf {
        let file_name = if self.extension.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.name, self.extension)
        };
        let mut p = root.to_path_buf();
        for part in self.path.split('/').filter(|s| !s.is_empty()) {
            p.push(part);
        }
        p.push(file_name);
        p
    }
}

/// Progress of the running task, as shown by a status display.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub parsed: u64,
    pub total: u64,
    pub id: i64,
}

impl ProgressSnapshot {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
