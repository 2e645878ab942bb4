//! Parser capability, mime-keyed registry and the shipped parsers.

pub mod document;
pub mod generic;
pub mod mime;
pub mod picture;
pub mod text;

use anyhow::Result;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::engine::hashing::parse_checksum_option;
use crate::types::{Directory, ParsedDocument};

pub use document::{DocxParser, EbookParser, PdfFileParser, SpreadsheetParser};
pub use generic::GenericFileParser;
pub use mime::{ContentMimeGuesser, ExtensionMimeGuesser, FALLBACK_MIME, MimeGuesser, MimeGuesserKind};
pub use picture::PictureFileParser;
pub use text::TextFileParser;

/// Turns one file into a [`ParsedDocument`].
///
/// Implementations must be callable from many worker threads at once. Errors are per file: the
/// crawl skips the file and carries on.
pub trait FileParser: Send + Sync {
    /// Short name, as used in the `FileParsers` directory option.
    fn name(&self) -> &'static str;

    /// Mime types this parser claims.
    fn mime_types(&self) -> &[&'static str];

    /// The fallback for every mime type nobody claims. Exactly one per registry.
    fn is_default(&self) -> bool {
        false
    }

    fn parse(&self, path: &Path) -> Result<ParsedDocument>;
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("no default parser among the enabled parsers")]
    NoDefaultParser,
    #[error("more than one default parser: {0} and {1}")]
    MultipleDefaultParsers(&'static str, &'static str),
}

/// Mime type → parser, plus the fallback parser. Built once per crawl run.
pub struct ParserRegistry {
    by_mime: HashMap<String, Arc<dyn FileParser>>,
    default: Arc<dyn FileParser>,
}

impl ParserRegistry {
    /// Later parsers win when two claim the same mime type.
    pub fn new(parsers: Vec<Arc<dyn FileParser>>) -> Result<Self, RegistryError> {
        let mut default: Option<Arc<dyn FileParser>> = None;
        let mut by_mime = HashMap::new();
        for parser in parsers {
            if parser.is_default() {
                if let Some(ref d) = default {
                    return Err(RegistryError::MultipleDefaultParsers(d.name(), parser.name()));
                }
                default = Some(Arc::clone(&parser));
            }
            for mime in parser.mime_types() {
                by_mime.insert((*mime).to_string(), Arc::clone(&parser));
            }
        }
        let default = default.ok_or(RegistryError::NoDefaultParser)?;
        Ok(Self { by_mime, default })
    }

    /// Parser registered for `mime`, or the default parser.
    pub fn lookup(&self, mime: &str) -> &dyn FileParser {
        self.by_mime
            .get(mime)
            .map(|p| p.as_ref())
            .unwrap_or(self.default.as_ref())
    }

    pub fn default_parser(&self) -> &dyn FileParser {
        self.default.as_ref()
    }

    /// Registry for `directory`: the generic default parser plus every parser named in its
    /// `FileParsers` option, all configured from the directory's options.
    pub fn for_directory(directory: &Directory) -> Result<Self, RegistryError> {
        let checksums = parse_checksum_option(&directory.get_option("CheckSumCalculators"));
        let root = directory.path.clone();

        let mut parsers: Vec<Arc<dyn FileParser>> = vec![Arc::new(GenericFileParser::new(
            checksums.clone(),
            root.clone(),
        ))];
        for name in directory
            .get_option("FileParsers")
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            match name {
                "text" => parsers.push(Arc::new(TextFileParser::new(
                    checksums.clone(),
                    directory.get_option_usize("TextFileContentLength"),
                    root.clone(),
                ))),
                "picture" => parsers.push(Arc::new(PictureFileParser::new(
                    checksums.clone(),
                    root.clone(),
                ))),
                "pdf" => parsers.push(Arc::new(PdfFileParser::new(
                    checksums.clone(),
                    directory.get_option_usize("PdfFileContentLength"),
                    root.clone(),
                ))),
                "docx" => parsers.push(Arc::new(DocxParser::new(
                    checksums.clone(),
                    directory.get_option_usize("DocxContentLength"),
                    root.clone(),
                ))),
                "spreadsheet" => parsers.push(Arc::new(SpreadsheetParser::new(
                    checksums.clone(),
                    directory.get_option_usize("SpreadSheetContentLength"),
                    root.clone(),
                ))),
                "ebook" => parsers.push(Arc::new(EbookParser::new(
                    checksums.clone(),
                    directory.get_option_usize("EbookContentLength"),
                    root.clone(),
                ))),
                other => log::debug!("no parser named {other:?}; its files go to the default parser"),
            }
        }
        Self::new(parsers)
    }
}
