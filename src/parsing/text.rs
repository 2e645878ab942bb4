//! Plain text and source files: generic fields plus a content excerpt.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::engine::hashing::ChecksumAlgorithm;
use crate::types::ParsedDocument;

use super::FileParser;
use super::generic::generic_document;

const TEXT_MIME_TYPES: &[&str] = &[
    "text/plain",
    "text/csv",
    "text/css",
    "text/html",
    "text/markdown",
    "text/x-markdown",
    "text/xml",
    "text/x-c",
    "text/x-python",
    "text/x-sh",
    "text/x-shellscript",
    "text/javascript",
    "application/javascript",
    "application/json",
    "application/toml",
    "application/xml",
    "application/x-sh",
    "application/x-yaml",
];

pub struct TextFileParser {
    checksums: Vec<ChecksumAlgorithm>,
    content_length: usize,
    root: PathBuf,
}

impl TextFileParser {
    pub fn new(checksums: Vec<ChecksumAlgorithm>, content_length: usize, root: PathBuf) -> Self {
        Self {
            checksums,
            content_length,
            root,
        }
    }
}

impl FileParser for TextFileParser {
    fn name(&self) -> &'static str {
        "text"
    }

    fn mime_types(&self) -> &[&'static str] {
        TEXT_MIME_TYPES
    }

    fn parse(&self, path: &Path) -> Result<ParsedDocument> {
        let mut doc = generic_document(path, &self.root, &self.checksums)?;
        let mut buf = Vec::with_capacity(self.content_length.min(64 * 1024));
        File::open(path)
            .and_then(|f| f.take(self.content_length as u64).read_to_end(&mut buf))
            .with_context(|| format!("read {}", path.display()))?;
        doc.insert("content", decode_prefix(&buf));
        Ok(doc)
    }
}

/// Lossy UTF-8 decode of a byte prefix, dropping a multi-byte char cut off at the end.
pub fn decode_prefix(buf: &[u8]) -> String {
    match std::str::from_utf8(buf) {
        Ok(s) => s.to_string(),
        Err(e) if e.error_len().is_none() => {
            String::from_utf8_lossy(&buf[..e.valid_up_to()]).into_owned()
        }
        Err(_) => String::from_utf8_lossy(buf).into_owned(),
    }
}
