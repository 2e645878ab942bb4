//! Default parser: file system metadata and checksums, no content.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use crate::engine::hashing::{ChecksumAlgorithm, checksum_file};
use crate::engine::tools::{path_relative_to, path_to_index_string};
use crate::types::ParsedDocument;

use super::FileParser;

pub struct GenericFileParser {
    checksums: Vec<ChecksumAlgorithm>,
    root: PathBuf,
}

impl GenericFileParser {
    pub fn new(checksums: Vec<ChecksumAlgorithm>, root: PathBuf) -> Self {
        Self { checksums, root }
    }
}

impl FileParser for GenericFileParser {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn mime_types(&self) -> &[&'static str] {
        &[]
    }

    fn is_default(&self) -> bool {
        true
    }

    fn parse(&self, path: &Path) -> Result<ParsedDocument> {
        generic_document(path, &self.root, &self.checksums)
    }
}

/// Fields every parser starts from: `path` (parent directory relative to `root`), `name` (file
/// stem), `extension`, `size`, `mtime` (unix seconds) and one hex field per checksum.
pub(crate) fn generic_document(
    path: &Path,
    root: &Path,
    checksums: &[ChecksumAlgorithm],
) -> Result<ParsedDocument> {
    let meta = std::fs::metadata(path).with_context(|| format!("stat {}", path.display()))?;
    if !meta.is_file() {
        anyhow::bail!("{} is not a regular file", path.display());
    }
    let rel_parent = path
        .parent()
        .and_then(|p| path_relative_to(p, root))
        .unwrap_or_default();
    let mtime = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let mut doc = ParsedDocument::new();
    doc.insert("path", path_to_index_string(&rel_parent));
    let extension = path
        .extension()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    // `foo.` has an empty extension; keep the trailing dot in the name so the path rebuilds.
    let name = if extension.is_empty() {
        path.file_name()
    } else {
        path.file_stem()
    };
    doc.insert(
        "name",
        name.map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
    );
    doc.insert("extension", extension);
    doc.insert("size", meta.len());
    doc.insert("mtime", mtime);
    for (algo, digest) in checksum_file(path, meta.len(), checksums)
        .with_context(|| format!("checksum {}", path.display()))?
    {
        doc.insert(algo.field_name(), digest);
    }
    Ok(doc)
}
