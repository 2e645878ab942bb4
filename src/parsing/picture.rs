//! Raster images: generic fields plus pixel dimensions.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::engine::hashing::ChecksumAlgorithm;
use crate::types::ParsedDocument;

use super::FileParser;
use super::generic::generic_document;

const PICTURE_MIME_TYPES: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/gif",
    "image/webp",
    "image/bmp",
];

pub struct PictureFileParser {
    checksums: Vec<ChecksumAlgorithm>,
    root: PathBuf,
}

impl PictureFileParser {
    pub fn new(checksums: Vec<ChecksumAlgorithm>, root: PathBuf) -> Self {
        Self { checksums, root }
    }
}

impl FileParser for PictureFileParser {
    fn name(&self) -> &'static str {
        "picture"
    }

    fn mime_types(&self) -> &[&'static str] {
        PICTURE_MIME_TYPES
    }

    fn parse(&self, path: &Path) -> Result<ParsedDocument> {
        let mut doc = generic_document(path, &self.root, &self.checksums)?;
        let (width, height) = image::image_dimensions(path)
            .with_context(|| format!("read image header {}", path.display()))?;
        doc.insert("width", width);
        doc.insert("height", height);
        Ok(doc)
    }
}
